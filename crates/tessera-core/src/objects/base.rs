//! Shared per-entity helper composed into every kind.
//!
//! Owns the identity triple and implements everything that only depends on
//! it: scalar fields, tags, first/last seen, registry bookkeeping, links and
//! the common part of meta and export assembly.

use super::meta::{MetaOption, MetaOptions, ObjectMeta};
use super::LinkMode;
use crate::context::CoreSettings;
use crate::correlation::CorrelationIndex;
use crate::export::ExportObject;
use crate::primitives::{
    CORRELATION_SHOW_PATH, META_PREFIX, REGISTRY_IDS_PREFIX, REGISTRY_SUBTYPES_PREFIX, TAG_PREFIX,
};
use crate::store::KvStore;
use crate::timeline::{Timeline, timeline_attributes};
use crate::{CorrelationType, GlobalId, ObjectType, SvgIcon, TesseraError};
use std::collections::BTreeSet;

const FIRST_SEEN: &str = "first_seen";
const LAST_SEEN: &str = "last_seen";

/// Identity plus the store-backed behavior common to all kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectBase {
    kind: ObjectType,
    gid: GlobalId,
}

impl ObjectBase {
    /// Build the base of a `kind` entity.
    ///
    /// Flat kinds must have an empty subtype.
    pub fn new(kind: ObjectType, subtype: &str, id: &str) -> Result<Self, TesseraError> {
        if !kind.is_subtyped() && !subtype.is_empty() {
            return Err(TesseraError::InvalidIdentifier(format!(
                "{kind} has no subtype, got {subtype:?}"
            )));
        }
        Ok(Self {
            kind,
            gid: GlobalId::new(kind.as_str(), subtype, id)?,
        })
    }

    #[must_use]
    pub fn kind(&self) -> ObjectType {
        self.kind
    }

    #[must_use]
    pub fn gid(&self) -> &GlobalId {
        &self.gid
    }

    fn meta_key(&self) -> String {
        format!("{META_PREFIX}:{}", self.gid)
    }

    fn tag_key(&self) -> String {
        format!("{TAG_PREFIX}:{}", self.gid)
    }

    // =========================================================================
    // EXISTENCE & REGISTRY
    // =========================================================================

    /// Record the entity in the per-type registry. Every write calls this.
    pub fn register(&self, store: &dyn KvStore) -> Result<(), TesseraError> {
        store.sadd(
            &registry_subtypes_key(self.kind),
            self.gid.subtype(),
        )?;
        store.sadd(
            &registry_ids_key(self.kind, self.gid.subtype()),
            self.gid.id(),
        )?;
        Ok(())
    }

    /// An entity exists once anything has been written for it.
    pub fn exists(&self, store: &dyn KvStore) -> Result<bool, TesseraError> {
        Ok(store.exists(&self.meta_key())?
            || store.sismember(
                &registry_ids_key(self.kind, self.gid.subtype()),
                self.gid.id(),
            )?)
    }

    // =========================================================================
    // FIELDS
    // =========================================================================

    pub fn get_field(&self, store: &dyn KvStore, name: &str) -> Result<Option<String>, TesseraError> {
        store.hget(&self.meta_key(), name)
    }

    pub fn set_field(&self, store: &dyn KvStore, name: &str, value: &str) -> Result<(), TesseraError> {
        self.register(store)?;
        store.hset(&self.meta_key(), name, value)
    }

    fn get_epoch_field(&self, store: &dyn KvStore, name: &str) -> Result<Option<i64>, TesseraError> {
        self.get_field(store, name)?
            .map(|raw| {
                raw.parse::<i64>().map_err(|e| {
                    TesseraError::Serialization(format!("{}: bad {name} {raw:?}: {e}", self.gid))
                })
            })
            .transpose()
    }

    // =========================================================================
    // TAGS
    // =========================================================================

    pub fn get_tags(&self, store: &dyn KvStore) -> Result<BTreeSet<String>, TesseraError> {
        store.smembers(&self.tag_key())
    }

    pub fn add_tag(&self, store: &dyn KvStore, tag: &str) -> Result<bool, TesseraError> {
        self.register(store)?;
        store.sadd(&self.tag_key(), tag)
    }

    pub fn remove_tag(&self, store: &dyn KvStore, tag: &str) -> Result<bool, TesseraError> {
        store.srem(&self.tag_key(), tag)
    }

    // =========================================================================
    // FIRST / LAST SEEN
    // =========================================================================

    pub fn get_first_seen(&self, store: &dyn KvStore) -> Result<Option<i64>, TesseraError> {
        self.get_epoch_field(store, FIRST_SEEN)
    }

    pub fn get_last_seen(&self, store: &dyn KvStore) -> Result<Option<i64>, TesseraError> {
        self.get_epoch_field(store, LAST_SEEN)
    }

    /// Widen the seen range to include `timestamp`. Never narrows it.
    pub fn update_seen(&self, store: &dyn KvStore, timestamp: i64) -> Result<(), TesseraError> {
        match self.get_first_seen(store)? {
            Some(first) if first <= timestamp => {}
            _ => self.set_field(store, FIRST_SEEN, &timestamp.to_string())?,
        }
        match self.get_last_seen(store)? {
            Some(last) if last >= timestamp => {}
            _ => self.set_field(store, LAST_SEEN, &timestamp.to_string())?,
        }
        Ok(())
    }

    // =========================================================================
    // TIMELINES & CORRELATIONS
    // =========================================================================

    pub fn timeline<'a>(&self, store: &'a dyn KvStore, attribute: &str) -> Timeline<'a> {
        Timeline::new(store, &self.gid, attribute)
    }

    /// Link this entity with `other`, tagged with `other`'s type.
    ///
    /// Both endpoints are registered, so either one exists afterwards.
    pub fn add_correlation(&self, store: &dyn KvStore, other: &GlobalId) -> Result<(), TesseraError> {
        self.register(store)?;
        super::get_object(other)?.base().register(store)?;
        CorrelationIndex::new(store).add_edge(&self.gid, other, &CorrelationType::of(other))
    }

    // =========================================================================
    // PRESENTATION
    // =========================================================================

    /// UI link to the correlation view of this entity.
    ///
    /// Standalone links are prefixed with the configured base domain.
    /// Components are inserted verbatim.
    #[must_use]
    pub fn link(&self, settings: &CoreSettings, mode: LinkMode) -> String {
        let path = format!(
            "{CORRELATION_SHOW_PATH}?type={}&subtype={}&id={}",
            self.gid.obj_type(),
            self.gid.subtype(),
            self.gid.id()
        );
        match mode {
            LinkMode::Relative => path,
            LinkMode::Standalone => format!("{}{path}", settings.base_domain),
        }
    }

    /// The fields every kind's meta starts from.
    pub fn base_meta(
        &self,
        store: &dyn KvStore,
        settings: &CoreSettings,
        options: &MetaOptions,
        svg_icon: SvgIcon,
    ) -> Result<ObjectMeta, TesseraError> {
        let mut meta = ObjectMeta {
            obj_type: self.gid.obj_type().to_string(),
            subtype: self.gid.subtype().to_string(),
            id: self.gid.id().to_string(),
            first_seen: self.get_first_seen(store)?,
            last_seen: self.get_last_seen(store)?,
            ..ObjectMeta::default()
        };
        if options.contains(MetaOption::Tags) {
            meta.tags = Some(self.get_tags(store)?);
        }
        if options.contains(MetaOption::Link) {
            meta.link = Some(self.link(settings, LinkMode::Relative));
        }
        if options.contains(MetaOption::SvgIcon) {
            meta.svg_icon = Some(svg_icon);
        }
        Ok(meta)
    }

    // =========================================================================
    // EXPORT
    // =========================================================================

    /// Single-attribute export object carrying seen range and tags.
    ///
    /// A missing first or last seen is logged and the export proceeds.
    pub fn export_object(
        &self,
        store: &dyn KvStore,
        template: &str,
        relation: &str,
        attr_type: &str,
    ) -> Result<ExportObject, TesseraError> {
        let mut object = ExportObject::new(template);
        object.add_attribute(relation, attr_type, self.gid.id());

        let first_seen = self.get_first_seen(store)?;
        let last_seen = self.get_last_seen(store)?;
        if let Some(first) = first_seen {
            object.set_first_seen(first);
        }
        if let Some(last) = last_seen {
            object.set_last_seen(last);
        }
        if first_seen.is_none() || last_seen.is_none() {
            tracing::warn!(
                gid = %self.gid,
                first = ?first_seen,
                last = ?last_seen,
                "Export error, missing seen timestamp"
            );
        }

        let tags = self.get_tags(store)?;
        for attribute in &mut object.attributes {
            for tag in &tags {
                attribute.add_tag(tag);
            }
        }
        Ok(object)
    }

    // =========================================================================
    // PURGE
    // =========================================================================

    /// Remove everything stored for this entity, including every timeline
    /// ever appended to and its side of every correlation edge.
    ///
    /// UNSAFE: neighbors keep their edges pointing at this entity.
    pub fn purge(&self, store: &dyn KvStore) -> Result<(), TesseraError> {
        store.delete(&self.meta_key())?;
        store.delete(&self.tag_key())?;
        for attribute in timeline_attributes(store, &self.gid)? {
            self.timeline(store, &attribute).delete()?;
        }
        CorrelationIndex::new(store).purge(&self.gid)?;

        let ids_key = registry_ids_key(self.kind, self.gid.subtype());
        store.srem(&ids_key, self.gid.id())?;
        if !store.exists(&ids_key)? {
            store.srem(&registry_subtypes_key(self.kind), self.gid.subtype())?;
        }
        tracing::debug!(gid = %self.gid, "purged entity");
        Ok(())
    }
}

pub(crate) fn registry_subtypes_key(kind: ObjectType) -> String {
    format!("{REGISTRY_SUBTYPES_PREFIX}:{kind}")
}

pub(crate) fn registry_ids_key(kind: ObjectType, subtype: &str) -> String {
    format!("{REGISTRY_IDS_PREFIX}:{kind}:{subtype}")
}

// =============================================================================
// TESTS
// =============================================================================
