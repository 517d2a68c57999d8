//! Domain name. Flat kind: the subtype is always empty.

use super::meta::{MetaOptions, ObjectMeta};
use super::{AilObject, ObjectBase};
use crate::context::Context;
use crate::export::ExportObject;
use crate::primitives::DEFAULT_ICON_RADIUS;
use crate::{ObjectType, SvgIcon, TesseraError};

pub struct Domain {
    base: ObjectBase,
}

impl Domain {
    pub fn new(id: &str) -> Result<Self, TesseraError> {
        Ok(Self {
            base: ObjectBase::new(ObjectType::Domain, "", id)?,
        })
    }
}

impl AilObject for Domain {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn svg_icon(&self) -> SvgIcon {
        SvgIcon::new("fas", "\u{f0ac}", "#3C82F0", DEFAULT_ICON_RADIUS)
    }

    fn get_meta(&self, ctx: &Context, options: &MetaOptions) -> Result<ObjectMeta, TesseraError> {
        self.base
            .base_meta(ctx.store(), ctx.settings(), options, self.svg_icon())
    }

    fn to_export_object(&self, ctx: &Context) -> Result<Option<ExportObject>, TesseraError> {
        self.base
            .export_object(ctx.store(), "domain-ip", "domain", "domain")
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
    fn exports_domain_ip_object() {
        let ctx = Context::in_memory(CoreSettings::default());
        let domain = Domain::new("circl.lu").expect("domain");
        domain.update_seen(&ctx, 1_600_000_000).expect("seen");

        let object = domain.to_export_object(&ctx).expect("export").expect("some");
        assert_eq!(object.name, "domain-ip");
        assert_eq!(object.attributes[0].attr_type, "domain");
        assert_eq!(object.attributes[0].value, "circl.lu");
        assert_eq!(object.first_seen.as_deref(), Some("2020-09-13T12:26:40Z"));
    }

    #[test]
    fn global_id_has_empty_subtype() {
        let domain = Domain::new("circl.lu").expect("domain");
        assert_eq!(domain.global_id().to_string(), "domain::circl.lu");
    }
}
