//! Username string observed on a platform. Subtype = platform, id = the name.

use super::meta::{MetaOptions, ObjectMeta};
use super::user_account::platform_template;
use super::{AilObject, ObjectBase, platform_icon};
use crate::context::Context;
use crate::export::ExportObject;
use crate::{ObjectType, SvgIcon, TesseraError};

pub struct Username {
    base: ObjectBase,
}

impl Username {
    pub fn new(subtype: &str, id: &str) -> Result<Self, TesseraError> {
        Ok(Self {
            base: ObjectBase::new(ObjectType::Username, subtype, id)?,
        })
    }
}

impl AilObject for Username {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn svg_icon(&self) -> SvgIcon {
        platform_icon(self.base.gid().subtype())
    }

    fn get_meta(&self, ctx: &Context, options: &MetaOptions) -> Result<ObjectMeta, TesseraError> {
        self.base
            .base_meta(ctx.store(), ctx.settings(), options, self.svg_icon())
    }

    fn to_export_object(&self, ctx: &Context) -> Result<Option<ExportObject>, TesseraError> {
        let (template, relation) = platform_template(self.base.gid().subtype());
        self.base
            .export_object(ctx.store(), template, relation, "text")
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
    use crate::objects::MetaOption;

    #[test]
    fn tags_only_when_requested() {
        let ctx = Context::in_memory(CoreSettings::default());
        let name = Username::new("telegram", "alice").expect("username");
        name.add_tag(&ctx, "tlp:amber").expect("tag");

        let bare = name.get_meta(&ctx, &MetaOptions::none()).expect("meta");
        assert!(bare.tags.is_none());

        let tagged = name
            .get_meta(&ctx, &MetaOptions::none().with(MetaOption::Tags))
            .expect("meta");
        assert_eq!(tagged.tags.map(|t| t.len()), Some(1));
    }

    #[test]
    fn twitter_username_exports_as_name() {
        let ctx = Context::in_memory(CoreSettings::default());
        let name = Username::new("twitter", "bob").expect("username");
        let object = name.to_export_object(&ctx).expect("export").expect("some");
        assert_eq!(object.name, "twitter-account");
        assert_eq!(object.attributes[0].object_relation, "name");
    }
}
