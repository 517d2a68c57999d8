//! CVE identifier. Flat kind.

use super::meta::{MetaOptions, ObjectMeta};
use super::{AilObject, ObjectBase};
use crate::context::Context;
use crate::export::ExportObject;
use crate::primitives::DEFAULT_ICON_RADIUS;
use crate::{ObjectType, SvgIcon, TesseraError};

pub struct Cve {
    base: ObjectBase,
}

impl Cve {
    pub fn new(id: &str) -> Result<Self, TesseraError> {
        Ok(Self {
            base: ObjectBase::new(ObjectType::Cve, "", id)?,
        })
    }
}

impl AilObject for Cve {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn svg_icon(&self) -> SvgIcon {
        SvgIcon::new("fas", "\u{f188}", "#1E88E5", DEFAULT_ICON_RADIUS)
    }

    fn get_meta(&self, ctx: &Context, options: &MetaOptions) -> Result<ObjectMeta, TesseraError> {
        self.base
            .base_meta(ctx.store(), ctx.settings(), options, self.svg_icon())
    }

    fn to_export_object(&self, ctx: &Context) -> Result<Option<ExportObject>, TesseraError> {
        self.base
            .export_object(ctx.store(), "vulnerability", "id", "vulnerability")
            .map(Some)
    }

    fn delete(&self, ctx: &Context) -> Result<(), TesseraError> {
        self.base.purge(ctx.store())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CoreSettings;

    #[test]
    fn exports_vulnerability_object() {
        let ctx = Context::in_memory(CoreSettings::default());
        let cve = Cve::new("CVE-2020-16856").expect("cve");
        let object = cve.to_export_object(&ctx).expect("export").expect("some");
        assert_eq!(object.name, "vulnerability");
        assert_eq!(object.attributes[0].object_relation, "id");
        assert_eq!(object.attributes[0].value, "CVE-2020-16856");
    }
}
