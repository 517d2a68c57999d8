//! Account on a messaging or social platform. Subtype = platform.

use super::meta::{MetaOption, MetaOptions, MetaValue, ObjectMeta};
use super::username::Username;
use super::{AilObject, ObjectBase, platform_icon};
use crate::context::Context;
use crate::export::ExportObject;
use crate::{GlobalId, ObjectType, SvgIcon, TesseraError};

const USERNAME_TIMELINE: &str = "username";

pub struct UserAccount {
    base: ObjectBase,
}

impl UserAccount {
    pub fn new(subtype: &str, id: &str) -> Result<Self, TesseraError> {
        Ok(Self {
            base: ObjectBase::new(ObjectType::UserAccount, subtype, id)?,
        })
    }

    pub fn get_first_name(&self, ctx: &Context) -> Result<Option<String>, TesseraError> {
        self.base.get_field(ctx.store(), "firstname")
    }

    pub fn set_first_name(&self, ctx: &Context, firstname: &str) -> Result<(), TesseraError> {
        self.base.set_field(ctx.store(), "firstname", firstname)
    }

    pub fn get_last_name(&self, ctx: &Context) -> Result<Option<String>, TesseraError> {
        self.base.get_field(ctx.store(), "lastname")
    }

    pub fn set_last_name(&self, ctx: &Context, lastname: &str) -> Result<(), TesseraError> {
        self.base.set_field(ctx.store(), "lastname", lastname)
    }

    pub fn get_phone(&self, ctx: &Context) -> Result<Option<String>, TesseraError> {
        self.base.get_field(ctx.store(), "phone")
    }

    pub fn set_phone(&self, ctx: &Context, phone: &str) -> Result<(), TesseraError> {
        self.base.set_field(ctx.store(), "phone", phone)
    }

    pub fn get_info(&self, ctx: &Context) -> Result<Option<String>, TesseraError> {
        self.base.get_field(ctx.store(), "info")
    }

    pub fn set_info(&self, ctx: &Context, info: &str) -> Result<(), TesseraError> {
        self.base.set_field(ctx.store(), "info", info)
    }

    /// Icon reference, stored as `kind:ref` and returned as `ref`.
    pub fn get_icon(&self, ctx: &Context) -> Result<Option<String>, TesseraError> {
        Ok(self
            .base
            .get_field(ctx.store(), "icon")?
            .and_then(|raw| raw.rsplit_once(':').map(|(_, reference)| reference.to_string())))
    }

    pub fn set_icon(&self, ctx: &Context, icon: &str) -> Result<(), TesseraError> {
        self.base.set_field(ctx.store(), "icon", icon)
    }

    // =========================================================================
    // USERNAME HISTORY
    // =========================================================================

    /// Global id of the most recent username.
    pub fn get_username(&self, ctx: &Context) -> Result<Option<String>, TesseraError> {
        self.base
            .timeline(ctx.store(), USERNAME_TIMELINE)
            .get_last_value()
    }

    /// Every username global id, oldest first.
    pub fn get_usernames(&self, ctx: &Context) -> Result<Vec<String>, TesseraError> {
        self.base
            .timeline(ctx.store(), USERNAME_TIMELINE)
            .get_all_values()
    }

    /// Record that the account used `username` at `timestamp`.
    pub fn update_username_timeline(
        &self,
        ctx: &Context,
        username: &GlobalId,
        timestamp: i64,
    ) -> Result<(), TesseraError> {
        self.base.register(ctx.store())?;
        self.base
            .timeline(ctx.store(), USERNAME_TIMELINE)
            .add_timestamp(timestamp, &username.to_string())
    }
}

impl AilObject for UserAccount {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn svg_icon(&self) -> SvgIcon {
        platform_icon(self.base.gid().subtype())
    }

    fn get_meta(&self, ctx: &Context, options: &MetaOptions) -> Result<ObjectMeta, TesseraError> {
        let mut meta =
            self.base
                .base_meta(ctx.store(), ctx.settings(), options, self.svg_icon())?;
        meta.tags = Some(self.base.get_tags(ctx.store())?);

        if options.contains(MetaOption::Username) {
            let username = self.get_username(ctx)?;
            let value = match username {
                Some(raw) if options.contains(MetaOption::UsernameMeta) => {
                    let gid = GlobalId::parse(&raw)?;
                    let username = Username::new(gid.subtype(), gid.id())?;
                    MetaValue::Meta(Box::new(username.get_meta(ctx, &MetaOptions::none())?))
                }
                other => MetaValue::from(other),
            };
            meta.insert(MetaOption::Username, value);
        }
        if options.contains(MetaOption::Usernames) {
            meta.insert(MetaOption::Usernames, MetaValue::List(self.get_usernames(ctx)?));
        }
        if options.contains(MetaOption::Icon) {
            meta.insert(MetaOption::Icon, self.get_icon(ctx)?);
        }
        Ok(meta)
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

/// MISP object template and primary relation for an account on `platform`.
pub(crate) fn platform_template(platform: &str) -> (&'static str, &'static str) {
    match platform {
        "telegram" => ("telegram-account", "username"),
        "twitter" => ("twitter-account", "name"),
        _ => ("user-account", "username"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CoreSettings;

    fn ctx() -> Context {
        Context::in_memory(CoreSettings::new("https://ail.example.org"))
    }

    #[test]
    fn scalar_fields_overwrite() {
        let ctx = ctx();
        let account = UserAccount::new("telegram", "1").expect("account");
        account.set_phone(&ctx, "+100").expect("set");
        account.set_phone(&ctx, "+200").expect("set");
        account.set_first_name(&ctx, "Ada").expect("set");

        assert_eq!(account.get_phone(&ctx).expect("get").as_deref(), Some("+200"));
        assert_eq!(account.get_first_name(&ctx).expect("get").as_deref(), Some("Ada"));
        assert_eq!(account.get_last_name(&ctx).expect("get"), None);

        account.set_last_name(&ctx, "Lovelace").expect("set");
        account.set_info(&ctx, "moderator of chat42").expect("set");
        assert_eq!(account.get_last_name(&ctx).expect("get").as_deref(), Some("Lovelace"));
        assert_eq!(
            account.get_info(&ctx).expect("get").as_deref(),
            Some("moderator of chat42")
        );
    }

    #[test]
    fn icon_reads_back_reference_only() {
        let ctx = ctx();
        let account = UserAccount::new("telegram", "1").expect("account");
        account.set_icon(&ctx, "image:abc123").expect("set");
        assert_eq!(account.get_icon(&ctx).expect("get").as_deref(), Some("abc123"));
    }

    #[test]
    fn username_history_tracks_latest_by_timestamp() {
        let ctx = ctx();
        let account = UserAccount::new("telegram", "1").expect("account");
        let old = GlobalId::new("username", "telegram", "old_name").expect("gid");
        let new = GlobalId::new("username", "telegram", "new_name").expect("gid");

        account.update_username_timeline(&ctx, &new, 2000).expect("add");
        account.update_username_timeline(&ctx, &old, 1000).expect("add");

        assert_eq!(
            account.get_username(&ctx).expect("get"),
            Some("username:telegram:new_name".to_string())
        );
        assert_eq!(
            account.get_usernames(&ctx).expect("all"),
            vec![
                "username:telegram:old_name".to_string(),
                "username:telegram:new_name".to_string()
            ]
        );
        assert!(account.exists(&ctx).expect("exists"));
    }

    #[test]
    fn meta_resolves_username_meta() {
        let ctx = ctx();
        let account = UserAccount::new("telegram", "1").expect("account");
        let name = GlobalId::new("username", "telegram", "alice").expect("gid");
        account.update_username_timeline(&ctx, &name, 10).expect("add");

        let options = MetaOptions::none()
            .with(MetaOption::Username)
            .with(MetaOption::UsernameMeta);
        let meta = account.get_meta(&ctx, &options).expect("meta");

        assert_eq!(meta.tags, Some(Default::default()));
        assert!(matches!(
            meta.get("username"),
            Some(MetaValue::Meta(inner)) if inner.id == "alice"
        ));
    }

    #[test]
    fn meta_username_absent_is_null() {
        let ctx = ctx();
        let account = UserAccount::new("twitter", "1").expect("account");
        let meta = account
            .get_meta(&ctx, &MetaOptions::none().with(MetaOption::Username))
            .expect("meta");
        assert_eq!(meta.get("username"), Some(&MetaValue::Null));
        assert!(meta.get("usernames").is_none());
    }

    #[test]
    fn export_uses_platform_template() {
        let ctx = ctx();
        for (platform, template, relation) in [
            ("telegram", "telegram-account", "username"),
            ("twitter", "twitter-account", "name"),
            ("mastodon", "user-account", "username"),
        ] {
            let account = UserAccount::new(platform, "someone").expect("account");
            account.update_seen(&ctx, 1_700_000_000).expect("seen");
            account.add_tag(&ctx, "infoleak:automatic-detection").expect("tag");

            let object = account
                .to_export_object(&ctx)
                .expect("export")
                .expect("user accounts always export");
            assert_eq!(object.name, template);
            assert_eq!(object.attributes[0].object_relation, relation);
            assert_eq!(object.attributes[0].value, "someone");
            assert_eq!(object.attributes[0].tags.len(), 1);
            assert!(object.first_seen.is_some());
            assert!(object.last_seen.is_some());
        }
    }

    #[test]
    fn export_proceeds_without_seen() {
        let ctx = ctx();
        let account = UserAccount::new("telegram", "nobody").expect("account");
        let object = account
            .to_export_object(&ctx)
            .expect("export")
            .expect("some");
        assert!(object.first_seen.is_none());
        assert!(object.last_seen.is_none());
    }
}
