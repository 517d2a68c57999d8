//! # Store Adapter
//!
//! The key-value boundary every higher component goes through.
//!
//! This module defines the `KvStore` trait and the volatile `MemoryStore`
//! backend. The durable backend lives in `storage::RedbStore`.
//!
//! The store is the only shared mutable resource of the engine. Every write
//! is immediately visible; no batching or multi-key transaction is exposed at
//! this layer, so concurrent writers to the same field race last-write-wins.

use crate::TesseraError;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

// =============================================================================
// KVSTORE TRAIT
// =============================================================================

/// Hash/set/scored-log store used by the object engine.
///
/// Callers own the value schema: the store never validates value shape.
/// Store unavailability is reported as `TesseraError::Store` and is fatal to
/// the calling operation. No retry happens at this layer.
pub trait KvStore: Send + Sync {
    /// Get a scalar value.
    fn get(&self, key: &str) -> Result<Option<String>, TesseraError>;

    /// Set a scalar value, overwriting any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), TesseraError>;

    /// Get one field of a hash.
    fn hget(&self, key: &str, field: &str) -> Result<Option<String>, TesseraError>;

    /// Set one field of a hash.
    fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), TesseraError>;

    /// Delete one field of a hash. Returns whether the field existed.
    fn hdel(&self, key: &str, field: &str) -> Result<bool, TesseraError>;

    /// Get every field of a hash.
    fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>, TesseraError>;

    /// Add a member to a set. Returns whether it was newly added.
    fn sadd(&self, key: &str, member: &str) -> Result<bool, TesseraError>;

    /// Remove a member from a set. Returns whether it was present.
    fn srem(&self, key: &str, member: &str) -> Result<bool, TesseraError>;

    /// Check set membership.
    fn sismember(&self, key: &str, member: &str) -> Result<bool, TesseraError>;

    /// Get all members of a set, in sorted order.
    fn smembers(&self, key: &str) -> Result<BTreeSet<String>, TesseraError>;

    /// Append `(score, member)` to a scored log.
    ///
    /// Duplicate scores and members are kept; entries sharing a score are
    /// ordered by insertion.
    fn append_scored(&self, key: &str, score: i64, member: &str) -> Result<(), TesseraError>;

    /// All entries of a scored log, ascending by `(score, insertion)`.
    fn scored_range(&self, key: &str) -> Result<Vec<(i64, String)>, TesseraError>;

    /// The entry with the highest score (latest insertion on ties).
    fn scored_last(&self, key: &str) -> Result<Option<(i64, String)>, TesseraError>;

    /// Delete whatever structure is stored under `key`.
    fn delete(&self, key: &str) -> Result<bool, TesseraError>;

    /// Check whether anything is stored under `key`.
    fn exists(&self, key: &str) -> Result<bool, TesseraError>;
}

// =============================================================================
// MEMORY STORE
// =============================================================================

#[derive(Debug, Default)]
struct MemoryData {
    scalars: BTreeMap<String, String>,
    hashes: BTreeMap<String, BTreeMap<String, String>>,
    sets: BTreeMap<String, BTreeSet<String>>,
    /// key -> (score, sequence) -> member
    logs: BTreeMap<String, BTreeMap<(i64, u64), String>>,
    next_seq: u64,
}

/// Volatile in-process store.
///
/// Uses `BTreeMap` throughout so iteration order is deterministic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryData>, TesseraError> {
        self.data
            .read()
            .map_err(|_| TesseraError::Store("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryData>, TesseraError> {
        self.data
            .write()
            .map_err(|_| TesseraError::Store("memory store lock poisoned".to_string()))
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, TesseraError> {
        Ok(self.read()?.scalars.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TesseraError> {
        self.write()?
            .scalars
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn hget(&self, key: &str, field: &str) -> Result<Option<String>, TesseraError> {
        Ok(self
            .read()?
            .hashes
            .get(key)
            .and_then(|hash| hash.get(field))
            .cloned())
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), TesseraError> {
        self.write()?
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    fn hdel(&self, key: &str, field: &str) -> Result<bool, TesseraError> {
        let mut data = self.write()?;
        let Some(hash) = data.hashes.get_mut(key) else {
            return Ok(false);
        };
        let removed = hash.remove(field).is_some();
        if hash.is_empty() {
            data.hashes.remove(key);
        }
        Ok(removed)
    }

    fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>, TesseraError> {
        Ok(self.read()?.hashes.get(key).cloned().unwrap_or_default())
    }

    fn sadd(&self, key: &str, member: &str) -> Result<bool, TesseraError> {
        Ok(self
            .write()?
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    fn srem(&self, key: &str, member: &str) -> Result<bool, TesseraError> {
        let mut data = self.write()?;
        let Some(set) = data.sets.get_mut(key) else {
            return Ok(false);
        };
        let removed = set.remove(member);
        if set.is_empty() {
            data.sets.remove(key);
        }
        Ok(removed)
    }

    fn sismember(&self, key: &str, member: &str) -> Result<bool, TesseraError> {
        Ok(self
            .read()?
            .sets
            .get(key)
            .is_some_and(|set| set.contains(member)))
    }

    fn smembers(&self, key: &str) -> Result<BTreeSet<String>, TesseraError> {
        Ok(self.read()?.sets.get(key).cloned().unwrap_or_default())
    }

    fn append_scored(&self, key: &str, score: i64, member: &str) -> Result<(), TesseraError> {
        let mut data = self.write()?;
        let seq = data.next_seq;
        data.next_seq = data.next_seq.saturating_add(1);
        data.logs
            .entry(key.to_string())
            .or_default()
            .insert((score, seq), member.to_string());
        Ok(())
    }

    fn scored_range(&self, key: &str) -> Result<Vec<(i64, String)>, TesseraError> {
        Ok(self
            .read()?
            .logs
            .get(key)
            .map(|log| {
                log.iter()
                    .map(|((score, _), member)| (*score, member.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn scored_last(&self, key: &str) -> Result<Option<(i64, String)>, TesseraError> {
        Ok(self
            .read()?
            .logs
            .get(key)
            .and_then(|log| log.last_key_value())
            .map(|((score, _), member)| (*score, member.clone())))
    }

    fn delete(&self, key: &str) -> Result<bool, TesseraError> {
        let mut data = self.write()?;
        let scalar = data.scalars.remove(key).is_some();
        let hash = data.hashes.remove(key).is_some();
        let set = data.sets.remove(key).is_some();
        let log = data.logs.remove(key).is_some();
        Ok(scalar || hash || set || log)
    }

    fn exists(&self, key: &str) -> Result<bool, TesseraError> {
        let data = self.read()?;
        Ok(data.scalars.contains_key(key)
            || data.hashes.contains_key(key)
            || data.sets.contains_key(key)
            || data.logs.contains_key(key))
    }
}

// =============================================================================
// TESTS
// =============================================================================
