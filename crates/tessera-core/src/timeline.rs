//! # Timeline Engine
//!
//! Append-only, timestamp-ordered history of one named attribute of one
//! entity (an account's username, a channel's name, ...).
//!
//! Appends are not ordered at write time. Ordering is resolved at read time
//! by timestamp, so concurrent appends from different writers commute and
//! need no locking. An empty timeline means "attribute unknown".

use crate::primitives::{TIMELINE_INDEX_PREFIX, TIMELINE_PREFIX};
use crate::store::KvStore;
use crate::{GlobalId, TesseraError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One `(timestamp, value)` pair of a timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Unix epoch seconds.
    pub timestamp: i64,
    pub value: String,
}

/// Handle on the timeline of `(entity, attribute)`.
pub struct Timeline<'a> {
    store: &'a dyn KvStore,
    key: String,
    index_key: String,
    attribute: String,
}

impl<'a> Timeline<'a> {
    /// Open the timeline of `attribute` for `owner`.
    pub fn new(store: &'a dyn KvStore, owner: &GlobalId, attribute: &str) -> Self {
        Self {
            store,
            key: timeline_key(owner, attribute),
            index_key: timeline_index_key(owner),
            attribute: attribute.to_string(),
        }
    }

    /// The store key backing this timeline.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Append `(timestamp, value)`. Earlier timestamps may arrive later.
    ///
    /// The attribute is recorded in the owner's timeline index so a purge
    /// finds it.
    pub fn add_timestamp(&self, timestamp: i64, value: &str) -> Result<(), TesseraError> {
        self.store.sadd(&self.index_key, &self.attribute)?;
        self.store.append_scored(&self.key, timestamp, value)
    }

    /// The value recorded with the highest timestamp, if any.
    ///
    /// When several values share the highest timestamp, the last one
    /// appended wins.
    pub fn get_last_value(&self) -> Result<Option<String>, TesseraError> {
        Ok(self.get_last_entry()?.map(|entry| entry.value))
    }

    /// The entry recorded with the highest timestamp, if any.
    pub fn get_last_entry(&self) -> Result<Option<TimelineEntry>, TesseraError> {
        Ok(self
            .store
            .scored_last(&self.key)?
            .map(|(timestamp, value)| TimelineEntry { timestamp, value }))
    }

    /// Every value, ascending by timestamp.
    pub fn get_all_values(&self) -> Result<Vec<String>, TesseraError> {
        Ok(self
            .store
            .scored_range(&self.key)?
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }

    /// Every `(timestamp, value)` pair, ascending by timestamp.
    pub fn get_entries(&self) -> Result<Vec<TimelineEntry>, TesseraError> {
        Ok(self
            .store
            .scored_range(&self.key)?
            .into_iter()
            .map(|(timestamp, value)| TimelineEntry { timestamp, value })
            .collect())
    }

    /// Whether nothing has ever been recorded.
    pub fn is_empty(&self) -> Result<bool, TesseraError> {
        Ok(!self.store.exists(&self.key)?)
    }

    /// Drop the whole history. Used by entity purge only.
    pub fn delete(&self) -> Result<bool, TesseraError> {
        self.store.srem(&self.index_key, &self.attribute)?;
        self.store.delete(&self.key)
    }
}

/// Every attribute of `owner` that has ever had a value appended.
pub fn timeline_attributes(
    store: &dyn KvStore,
    owner: &GlobalId,
) -> Result<BTreeSet<String>, TesseraError> {
    store.smembers(&timeline_index_key(owner))
}

fn timeline_index_key(owner: &GlobalId) -> String {
    format!("{TIMELINE_INDEX_PREFIX}:{owner}")
}

/// Store key of the timeline of `attribute` for `owner`.
#[must_use]
pub fn timeline_key(owner: &GlobalId, attribute: &str) -> String {
    format!("{TIMELINE_PREFIX}:{owner}:{attribute}")
}

// =============================================================================
// TESTS
// =============================================================================
