//! # Export Basket
//!
//! Per-actor staging area of entities awaiting export, stored as a single
//! hash `user:obj:misp:export:{actor}` mapping `type:subtype:id` to a
//! correlation level.
//!
//! Entries never expire and have no order. They stay until the actor removes
//! them, clears the basket, or a submission of the basket succeeds.

use crate::correlation::CorrelationIndex;
use crate::export::RawCode;
use crate::primitives::{BASKET_PREFIX, MAX_BASKET_LEVEL, MAX_EXPORT_OBJECTS};
use crate::store::KvStore;
use crate::{GlobalId, TesseraError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

/// One staged entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketEntry {
    #[serde(rename = "type")]
    pub obj_type: String,
    pub subtype: String,
    pub id: String,
    /// Correlation depth to include on export.
    pub lvl: i64,
}

impl BasketEntry {
    pub fn global_id(&self) -> Result<GlobalId, TesseraError> {
        GlobalId::new(self.obj_type.as_str(), self.subtype.as_str(), self.id.as_str())
    }
}

/// Coerce a requested level into `0..=MAX_BASKET_LEVEL`, falling back to `0`.
///
/// Unlike event codes, numeric text is accepted here.
pub fn sanitize_level(raw: impl Into<RawCode>) -> i64 {
    let level = match raw.into() {
        RawCode::Int(n) => n,
        RawCode::Text(text) => text.trim().parse().unwrap_or(0),
        RawCode::Missing | RawCode::Other(_) => 0,
    };
    if (0..=MAX_BASKET_LEVEL).contains(&level) {
        level
    } else {
        0
    }
}

/// Basket view over a store.
pub struct ExportBasket<'a> {
    store: &'a dyn KvStore,
}

impl<'a> ExportBasket<'a> {
    pub fn new(store: &'a dyn KvStore) -> Self {
        Self { store }
    }

    fn key(actor: &str) -> String {
        format!("{BASKET_PREFIX}:{actor}")
    }

    /// Every entry staged by `actor`.
    ///
    /// A stored key that is not `type:subtype:id` is store corruption and is
    /// returned as an error. A stored level that is not an integer reads as `0`.
    pub fn list(&self, actor: &str) -> Result<Vec<BasketEntry>, TesseraError> {
        self.store
            .hgetall(&Self::key(actor))?
            .into_iter()
            .map(|(raw_gid, raw_lvl)| {
                let gid = GlobalId::parse(&raw_gid)?;
                Ok(BasketEntry {
                    obj_type: gid.obj_type().to_string(),
                    subtype: gid.subtype().to_string(),
                    id: gid.id().to_string(),
                    lvl: raw_lvl.parse().unwrap_or(0),
                })
            })
            .collect()
    }

    /// Stage (or re-stage with a new level) one entity.
    pub fn add(
        &self,
        actor: &str,
        obj_type: &str,
        subtype: Option<&str>,
        id: &str,
        lvl: impl Into<RawCode>,
    ) -> Result<BasketEntry, TesseraError> {
        let gid = GlobalId::new(obj_type, subtype.unwrap_or_default(), id)?;
        let lvl = sanitize_level(lvl);
        self.store
            .hset(&Self::key(actor), &gid.to_string(), &lvl.to_string())?;
        tracing::debug!(actor, %gid, lvl, "basket entry staged");
        Ok(BasketEntry {
            obj_type: gid.obj_type().to_string(),
            subtype: gid.subtype().to_string(),
            id: gid.id().to_string(),
            lvl,
        })
    }

    /// Unstage one entity. Returns whether it was staged.
    pub fn remove(
        &self,
        actor: &str,
        obj_type: &str,
        subtype: Option<&str>,
        id: &str,
    ) -> Result<bool, TesseraError> {
        let field = format!("{obj_type}:{}:{id}", subtype.unwrap_or_default());
        self.store.hdel(&Self::key(actor), &field)
    }

    /// Empty `actor`'s basket.
    pub fn clear(&self, actor: &str) -> Result<bool, TesseraError> {
        self.store.delete(&Self::key(actor))
    }

    /// Unstage exactly `entries`, leaving anything staged since in place.
    /// Returns how many were still staged.
    pub fn remove_exported(
        &self,
        actor: &str,
        entries: &[BasketEntry],
    ) -> Result<usize, TesseraError> {
        let key = Self::key(actor);
        let mut removed = 0;
        for entry in entries {
            if self.store.hdel(&key, &entry.global_id()?.to_string())? {
                removed += 1;
            }
        }
        tracing::debug!(actor, removed, "exported basket entries unstaged");
        Ok(removed)
    }

    /// The explicit object list an export of `actor`'s basket covers.
    ///
    /// Each entry contributes itself plus its correlation neighbors up to
    /// `lvl` hops away, breadth first. The result is deduplicated, keeps
    /// first-reached order and stops at `MAX_EXPORT_OBJECTS`.
    pub fn resolve(&self, actor: &str) -> Result<Vec<GlobalId>, TesseraError> {
        self.expand(actor, &self.list(actor)?)
    }

    pub(crate) fn expand(
        &self,
        actor: &str,
        entries: &[BasketEntry],
    ) -> Result<Vec<GlobalId>, TesseraError> {
        let index = CorrelationIndex::new(self.store);
        let mut seen = BTreeSet::new();
        let mut resolved = Vec::new();

        for entry in entries {
            let root = entry.global_id()?;
            if !seen.insert(root.clone()) {
                continue;
            }
            resolved.push(root.clone());

            let mut queue = VecDeque::from([(root, 0_i64)]);
            while let Some((gid, depth)) = queue.pop_front() {
                if depth >= entry.lvl {
                    continue;
                }
                for neighbor in index.neighbors(&gid)? {
                    if resolved.len() >= MAX_EXPORT_OBJECTS {
                        tracing::warn!(actor, limit = MAX_EXPORT_OBJECTS, "basket expansion truncated");
                        return Ok(resolved);
                    }
                    if seen.insert(neighbor.clone()) {
                        resolved.push(neighbor.clone());
                        queue.push_back((neighbor, depth + 1));
                    }
                }
            }
            if resolved.len() >= MAX_EXPORT_OBJECTS {
                break;
            }
        }
        Ok(resolved)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CorrelationType;
    use crate::store::MemoryStore;

    #[test]
    fn add_then_list_exactly_once() {
        let store = MemoryStore::new();
        let basket = ExportBasket::new(&store);

        basket
            .add("analyst", "user-account", Some("telegram"), "u1", 2_i64)
            .expect("add");
        basket
            .add("analyst", "user-account", Some("telegram"), "u1", 2_i64)
            .expect("add");

        let entries = basket.list("analyst").expect("list");
        assert_eq!(
            entries,
            vec![BasketEntry {
                obj_type: "user-account".to_string(),
                subtype: "telegram".to_string(),
                id: "u1".to_string(),
                lvl: 2,
            }]
        );

        basket.clear("analyst").expect("clear");
        assert!(basket.list("analyst").expect("list").is_empty());
    }

    #[test]
    fn re_add_overwrites_level() {
        let store = MemoryStore::new();
        let basket = ExportBasket::new(&store);
        basket.add("a", "domain", None, "x.example", 1_i64).expect("add");
        basket.add("a", "domain", None, "x.example", 3_i64).expect("add");

        let entries = basket.list("a").expect("list");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].lvl, 3);
        assert_eq!(entries[0].subtype, "");
    }

    #[test]
    fn invalid_levels_coerce_to_zero() {
        assert_eq!(sanitize_level(-1_i64), 0);
        assert_eq!(sanitize_level(4_i64), 0);
        assert_eq!(sanitize_level("high"), 0);
        assert_eq!(sanitize_level("2"), 2);
        assert_eq!(sanitize_level(None::<i64>), 0);
    }

    #[test]
    fn stored_level_garbage_reads_as_zero() {
        let store = MemoryStore::new();
        store
            .hset("user:obj:misp:export:a", "cve::CVE-1", "abc")
            .expect("hset");
        let entries = ExportBasket::new(&store).list("a").expect("list");
        assert_eq!(entries[0].lvl, 0);
    }

    #[test]
    fn malformed_stored_key_is_fatal() {
        let store = MemoryStore::new();
        store
            .hset("user:obj:misp:export:a", "not-an-id", "0")
            .expect("hset");
        assert!(matches!(
            ExportBasket::new(&store).list("a"),
            Err(TesseraError::MalformedIdentifier(_))
        ));
    }

    #[test]
    fn remove_one_entry() {
        let store = MemoryStore::new();
        let basket = ExportBasket::new(&store);
        basket.add("a", "cve", None, "CVE-1", 0_i64).expect("add");
        basket.add("a", "cve", None, "CVE-2", 0_i64).expect("add");

        assert!(basket.remove("a", "cve", None, "CVE-1").expect("remove"));
        assert!(!basket.remove("a", "cve", None, "CVE-1").expect("remove"));
        assert_eq!(basket.list("a").expect("list").len(), 1);
    }

    #[test]
    fn remove_exported_keeps_later_entries() {
        let store = MemoryStore::new();
        let basket = ExportBasket::new(&store);
        basket.add("a", "cve", None, "CVE-1", 0_i64).expect("add");
        let snapshot = basket.list("a").expect("list");
        basket.add("a", "cve", None, "CVE-2", 0_i64).expect("add");

        assert_eq!(basket.remove_exported("a", &snapshot).expect("remove"), 1);
        assert_eq!(basket.remove_exported("a", &snapshot).expect("remove"), 0);
        let left = basket.list("a").expect("list");
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, "CVE-2");
    }

    #[test]
    fn resolve_follows_correlations_up_to_level() {
        let store = MemoryStore::new();
        let index = CorrelationIndex::new(&store);
        let chain: Vec<GlobalId> = (0..4)
            .map(|i| GlobalId::new("domain", "", format!("d{i}.example")).expect("gid"))
            .collect();
        let tag = CorrelationType::new("domain").expect("tag");
        for pair in chain.windows(2) {
            index.add_edge(&pair[0], &pair[1], &tag).expect("edge");
        }

        let basket = ExportBasket::new(&store);
        basket.add("a", "domain", None, "d0.example", 2_i64).expect("add");

        let resolved = basket.resolve("a").expect("resolve");
        assert_eq!(resolved, chain[..3].to_vec());
    }

    #[test]
    fn resolve_level_zero_is_entry_only() {
        let store = MemoryStore::new();
        let index = CorrelationIndex::new(&store);
        let a = GlobalId::new("cve", "", "CVE-A").expect("gid");
        let b = GlobalId::new("cve", "", "CVE-B").expect("gid");
        index
            .add_edge(&a, &b, &CorrelationType::new("cve").expect("tag"))
            .expect("edge");

        let basket = ExportBasket::new(&store);
        basket.add("a", "cve", None, "CVE-A", 0_i64).expect("add");
        assert_eq!(basket.resolve("a").expect("resolve"), vec![a]);
    }
}
