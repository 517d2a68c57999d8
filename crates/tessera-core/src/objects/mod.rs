//! # Object Taxonomy
//!
//! Every entity kind implements one object-safe contract, `AilObject`.
//! Shared behavior lives in the composed `ObjectBase` helper; kinds only add
//! their own fields, timelines, meta extras and export template.
//!
//! Two structural variants share the contract:
//! - subtype-keyed kinds (`UserAccount`, `Username`, `ChatSubChannel`)
//! - flat kinds with an empty subtype (`Domain`, `Cve`)
//!
//! Entities are created implicitly on first write. The registry under
//! `objs:*` is maintained by every write and backs the enumeration helpers.

mod base;
mod chat_subchannel;
mod cve;
mod domain;
mod meta;
mod user_account;
mod username;

pub use base::ObjectBase;
pub use chat_subchannel::ChatSubChannel;
pub use cve::Cve;
pub use domain::Domain;
pub use meta::{MetaOption, MetaOptions, MetaValue, ObjectMeta};
pub use user_account::UserAccount;
pub use username::Username;

use crate::context::Context;
use crate::export::ExportObject;
use crate::primitives::{ACCOUNT_ICON_COLOR, DEFAULT_ICON_RADIUS};
use crate::{GlobalId, ObjectType, SvgIcon, TesseraError};
use base::{registry_ids_key, registry_subtypes_key};
use std::collections::{BTreeMap, BTreeSet};

/// How a UI link is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Path relative to the web UI root.
    Relative,
    /// Fully qualified URL under the configured base domain.
    Standalone,
}

// =============================================================================
// OBJECT CONTRACT
// =============================================================================

/// The polymorphic entity contract.
pub trait AilObject: Send + Sync {
    /// The shared identity helper.
    fn base(&self) -> &ObjectBase;

    /// Graph presentation descriptor.
    fn svg_icon(&self) -> SvgIcon;

    /// Presentation/export-ready summary restricted to `options`.
    fn get_meta(&self, ctx: &Context, options: &MetaOptions) -> Result<ObjectMeta, TesseraError>;

    /// Exchange-format representation, or `None` when the kind declines.
    fn to_export_object(&self, ctx: &Context) -> Result<Option<ExportObject>, TesseraError>;

    /// Best-effort purge. Leaves neighbors' edges dangling.
    fn delete(&self, ctx: &Context) -> Result<(), TesseraError>;

    fn kind(&self) -> ObjectType {
        self.base().kind()
    }

    fn global_id(&self) -> &GlobalId {
        self.base().gid()
    }

    fn get_link(&self, ctx: &Context, mode: LinkMode) -> String {
        self.base().link(ctx.settings(), mode)
    }

    fn exists(&self, ctx: &Context) -> Result<bool, TesseraError> {
        self.base().exists(ctx.store())
    }

    fn get_tags(&self, ctx: &Context) -> Result<BTreeSet<String>, TesseraError> {
        self.base().get_tags(ctx.store())
    }

    fn add_tag(&self, ctx: &Context, tag: &str) -> Result<bool, TesseraError> {
        self.base().add_tag(ctx.store(), tag)
    }

    fn remove_tag(&self, ctx: &Context, tag: &str) -> Result<bool, TesseraError> {
        self.base().remove_tag(ctx.store(), tag)
    }

    fn get_first_seen(&self, ctx: &Context) -> Result<Option<i64>, TesseraError> {
        self.base().get_first_seen(ctx.store())
    }

    fn get_last_seen(&self, ctx: &Context) -> Result<Option<i64>, TesseraError> {
        self.base().get_last_seen(ctx.store())
    }

    fn update_seen(&self, ctx: &Context, timestamp: i64) -> Result<(), TesseraError> {
        self.base().update_seen(ctx.store(), timestamp)
    }

    /// Correlate with `other`, tagged with `other`'s type.
    ///
    /// `other` must name a known kind. Both endpoints exist afterwards.
    fn add_correlation(&self, ctx: &Context, other: &GlobalId) -> Result<(), TesseraError> {
        self.base().add_correlation(ctx.store(), other)
    }
}

/// Glyph for account-like kinds on `platform`.
pub(crate) fn platform_icon(platform: &str) -> SvgIcon {
    let (style, icon) = match platform {
        "telegram" => ("fab", "\u{f2c6}"),
        "twitter" => ("fab", "\u{f099}"),
        _ => ("fas", "\u{f007}"),
    };
    SvgIcon::new(style, icon, ACCOUNT_ICON_COLOR, DEFAULT_ICON_RADIUS)
}

// =============================================================================
// FACTORY
// =============================================================================

/// Instantiate the entity named by `gid`.
pub fn get_object(gid: &GlobalId) -> Result<Box<dyn AilObject>, TesseraError> {
    let kind: ObjectType = gid.obj_type().parse()?;
    let object: Box<dyn AilObject> = match kind {
        ObjectType::UserAccount => Box::new(UserAccount::new(gid.subtype(), gid.id())?),
        ObjectType::Username => Box::new(Username::new(gid.subtype(), gid.id())?),
        ObjectType::ChatSubChannel => Box::new(ChatSubChannel::new(gid.subtype(), gid.id())?),
        ObjectType::Domain => Box::new(Domain::new(flat_id(gid)?)?),
        ObjectType::Cve => Box::new(Cve::new(flat_id(gid)?)?),
    };
    Ok(object)
}

/// Instantiate every entity in `gids`, in order.
pub fn get_objects(gids: &[GlobalId]) -> Result<Vec<Box<dyn AilObject>>, TesseraError> {
    gids.iter().map(get_object).collect()
}

/// Id of a flat-kind identifier. A non-empty subtype is refused rather
/// than silently dropped.
fn flat_id(gid: &GlobalId) -> Result<&str, TesseraError> {
    if !gid.subtype().is_empty() {
        return Err(TesseraError::InvalidIdentifier(gid.to_string()));
    }
    Ok(gid.id())
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Every subtype with at least one known entity of `kind`.
pub fn get_all_subtypes(ctx: &Context, kind: ObjectType) -> Result<BTreeSet<String>, TesseraError> {
    ctx.store().smembers(&registry_subtypes_key(kind))
}

/// Every known id of `kind` under `subtype`.
pub fn get_all_by_subtype(
    ctx: &Context,
    kind: ObjectType,
    subtype: &str,
) -> Result<BTreeSet<String>, TesseraError> {
    ctx.store().smembers(&registry_ids_key(kind, subtype))
}

/// Every known id of `kind`, grouped by subtype.
pub fn get_all(
    ctx: &Context,
    kind: ObjectType,
) -> Result<BTreeMap<String, BTreeSet<String>>, TesseraError> {
    get_all_subtypes(ctx, kind)?
        .into_iter()
        .map(|subtype| {
            let ids = get_all_by_subtype(ctx, kind, &subtype)?;
            Ok((subtype, ids))
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CoreSettings;

    #[test]
    fn factory_dispatches_on_type() {
        for raw in [
            "user-account:telegram:1",
            "username:twitter:bob",
            "chat-subchannel:uuid:chat/1",
            "domain::example.com",
            "cve::CVE-2014-6585",
        ] {
            let gid = GlobalId::parse(raw).expect("gid");
            let object = get_object(&gid).expect("object");
            assert_eq!(object.global_id(), &gid);
            assert_eq!(object.kind().as_str(), gid.obj_type());
        }
    }

    #[test]
    fn factory_rejects_unknown_type() {
        let gid = GlobalId::parse("item::crawled/2020/09/14/x").expect("gid");
        assert!(matches!(
            get_object(&gid),
            Err(TesseraError::UnknownObjectType(_))
        ));
    }

    #[test]
    fn factory_rejects_subtype_on_flat_kind() {
        let gid = GlobalId::parse("domain:tor:example.onion").expect("gid");
        assert!(matches!(
            get_object(&gid),
            Err(TesseraError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn registry_enumerates_by_subtype() {
        let ctx = Context::in_memory(CoreSettings::default());
        UserAccount::new("telegram", "1")
            .expect("account")
            .add_tag(&ctx, "t")
            .expect("tag");
        UserAccount::new("telegram", "2")
            .expect("account")
            .update_seen(&ctx, 5)
            .expect("seen");
        UserAccount::new("twitter", "3")
            .expect("account")
            .set_phone(&ctx, "+1")
            .expect("phone");

        let subtypes = get_all_subtypes(&ctx, ObjectType::UserAccount).expect("subtypes");
        assert_eq!(
            subtypes.into_iter().collect::<Vec<_>>(),
            vec!["telegram".to_string(), "twitter".to_string()]
        );

        let all = get_all(&ctx, ObjectType::UserAccount).expect("all");
        assert_eq!(all["telegram"].len(), 2);
        assert_eq!(all["twitter"].len(), 1);
        assert!(get_all(&ctx, ObjectType::Cve).expect("all").is_empty());
    }

    #[test]
    fn correlation_target_exists_afterwards() {
        let ctx = Context::in_memory(CoreSettings::default());
        let account = UserAccount::new("telegram", "1").expect("account");
        let domain = Domain::new("c2.example").expect("domain");

        account
            .add_correlation(&ctx, domain.global_id())
            .expect("correlate");

        assert!(domain.exists(&ctx).expect("exists"));
        assert_eq!(
            get_all_by_subtype(&ctx, ObjectType::Domain, "").expect("ids").len(),
            1
        );
        let unknown = GlobalId::parse("item::crawled/x").expect("gid");
        assert!(account.add_correlation(&ctx, &unknown).is_err());
    }

    #[test]
    fn links_through_the_context() {
        let ctx = Context::in_memory(CoreSettings::new("https://ail.example.org"));
        let cve = Cve::new("CVE-2015-0410").expect("cve");
        assert_eq!(
            cve.get_link(&ctx, LinkMode::Standalone),
            "https://ail.example.org/correlation/show?type=cve&subtype=&id=CVE-2015-0410"
        );
        assert_eq!(
            cve.get_link(&ctx, LinkMode::Relative),
            "/correlation/show?type=cve&subtype=&id=CVE-2015-0410"
        );
    }

    #[test]
    fn platform_icons() {
        assert_eq!(platform_icon("telegram").icon, "\u{f2c6}");
        assert_eq!(platform_icon("twitter").style, "fab");
        assert_eq!(platform_icon("discord").style, "fas");
        assert_eq!(platform_icon("discord").color, "#4dffff");
    }
}
