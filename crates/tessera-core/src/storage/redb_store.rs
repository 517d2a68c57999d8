//! # redb-backed Store
//!
//! A disk-backed `KvStore` using the redb embedded database, providing:
//! - ACID transactions (one per store call)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//! - Zero configuration
//!
//! Each logical structure (scalar, hash, set, scored log) has its own table
//! keyed by a tuple whose first component is the logical key, so a
//! range scan over `(key, ..)` yields exactly one structure.

use crate::TesseraError;
use crate::store::KvStore;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Table for scalars: key -> value
const SCALARS: TableDefinition<&str, &str> = TableDefinition::new("scalars");

/// Table for hashes: (key, field) -> value
const HASHES: TableDefinition<(&str, &str), &str> = TableDefinition::new("hashes");

/// Table for sets: (key, member) -> ()
const SETS: TableDefinition<(&str, &str), ()> = TableDefinition::new("sets");

/// Table for scored logs: (key, score, sequence) -> member
const LOGS: TableDefinition<(&str, i64, u64), &str> = TableDefinition::new("logs");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_SEQ: &str = "next_log_seq";

fn store_err(e: impl std::fmt::Display) -> TesseraError {
    TesseraError::Store(e.to_string())
}

/// A disk-backed store using redb.
///
/// Holds no in-memory cache: every call opens its own transaction, so the
/// handle can be shared across threads behind an `Arc`.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TesseraError> {
        let db = Database::create(path.as_ref()).map_err(store_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(store_err)?;
            let _ = write_txn.open_table(SCALARS).map_err(store_err)?;
            let _ = write_txn.open_table(HASHES).map_err(store_err)?;
            let _ = write_txn.open_table(SETS).map_err(store_err)?;
            let _ = write_txn.open_table(LOGS).map_err(store_err)?;
            let _ = write_txn.open_table(METADATA).map_err(store_err)?;
            write_txn.commit().map_err(store_err)?;
        }

        Ok(Self { db })
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), TesseraError> {
        self.db.compact().map_err(store_err)?;
        Ok(())
    }

    /// Collect the second key component of every `(key, _)` row in a
    /// string-pair table.
    fn pair_members<V: redb::Value + 'static>(
        &self,
        table: TableDefinition<'static, (&'static str, &'static str), V>,
        key: &str,
    ) -> Result<Vec<String>, TesseraError> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = read_txn.open_table(table).map_err(store_err)?;

        let mut members = Vec::new();
        for entry in table.range((key, "")..).map_err(store_err)? {
            let (k, _) = entry.map_err(store_err)?;
            let (owner, member) = k.value();
            if owner != key {
                break;
            }
            members.push(member.to_string());
        }
        Ok(members)
    }

    fn log_keys(&self, key: &str) -> Result<Vec<(i64, u64)>, TesseraError> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = read_txn.open_table(LOGS).map_err(store_err)?;

        let mut keys = Vec::new();
        for entry in table
            .range((key, i64::MIN, 0u64)..=(key, i64::MAX, u64::MAX))
            .map_err(store_err)?
        {
            let (k, _) = entry.map_err(store_err)?;
            let (_, score, seq) = k.value();
            keys.push((score, seq));
        }
        Ok(keys)
    }
}

// =============================================================================
// KVSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl KvStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<String>, TesseraError> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = read_txn.open_table(SCALARS).map_err(store_err)?;
        let value = table
            .get(key)
            .map_err(store_err)?
            .map(|v| v.value().to_string());
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TesseraError> {
        let write_txn = self.db.begin_write().map_err(store_err)?;
        {
            let mut table = write_txn.open_table(SCALARS).map_err(store_err)?;
            table.insert(key, value).map_err(store_err)?;
        }
        write_txn.commit().map_err(store_err)?;
        Ok(())
    }

    fn hget(&self, key: &str, field: &str) -> Result<Option<String>, TesseraError> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = read_txn.open_table(HASHES).map_err(store_err)?;
        let value = table
            .get((key, field))
            .map_err(store_err)?
            .map(|v| v.value().to_string());
        Ok(value)
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), TesseraError> {
        let write_txn = self.db.begin_write().map_err(store_err)?;
        {
            let mut table = write_txn.open_table(HASHES).map_err(store_err)?;
            table.insert((key, field), value).map_err(store_err)?;
        }
        write_txn.commit().map_err(store_err)?;
        Ok(())
    }

    fn hdel(&self, key: &str, field: &str) -> Result<bool, TesseraError> {
        let write_txn = self.db.begin_write().map_err(store_err)?;
        let removed = {
            let mut table = write_txn.open_table(HASHES).map_err(store_err)?;
            let removed = table.remove((key, field)).map_err(store_err)?.is_some();
            removed
        };
        write_txn.commit().map_err(store_err)?;
        Ok(removed)
    }

    fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>, TesseraError> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = read_txn.open_table(HASHES).map_err(store_err)?;

        let mut hash = BTreeMap::new();
        for entry in table.range((key, "")..).map_err(store_err)? {
            let (k, v) = entry.map_err(store_err)?;
            let (owner, field) = k.value();
            if owner != key {
                break;
            }
            hash.insert(field.to_string(), v.value().to_string());
        }
        Ok(hash)
    }

    fn sadd(&self, key: &str, member: &str) -> Result<bool, TesseraError> {
        let write_txn = self.db.begin_write().map_err(store_err)?;
        let added = {
            let mut table = write_txn.open_table(SETS).map_err(store_err)?;
            let added = table.insert((key, member), ()).map_err(store_err)?.is_none();
            added
        };
        write_txn.commit().map_err(store_err)?;
        Ok(added)
    }

    fn srem(&self, key: &str, member: &str) -> Result<bool, TesseraError> {
        let write_txn = self.db.begin_write().map_err(store_err)?;
        let removed = {
            let mut table = write_txn.open_table(SETS).map_err(store_err)?;
            let removed = table.remove((key, member)).map_err(store_err)?.is_some();
            removed
        };
        write_txn.commit().map_err(store_err)?;
        Ok(removed)
    }

    fn sismember(&self, key: &str, member: &str) -> Result<bool, TesseraError> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = read_txn.open_table(SETS).map_err(store_err)?;
        let present = table.get((key, member)).map_err(store_err)?.is_some();
        Ok(present)
    }

    fn smembers(&self, key: &str) -> Result<BTreeSet<String>, TesseraError> {
        Ok(self.pair_members(SETS, key)?.into_iter().collect())
    }

    fn append_scored(&self, key: &str, score: i64, member: &str) -> Result<(), TesseraError> {
        let write_txn = self.db.begin_write().map_err(store_err)?;
        {
            let mut meta_table = write_txn.open_table(METADATA).map_err(store_err)?;
            let seq = meta_table
                .get(NEXT_SEQ)
                .map_err(store_err)?
                .map(|v| v.value())
                .unwrap_or(0);
            meta_table
                .insert(NEXT_SEQ, seq.saturating_add(1))
                .map_err(store_err)?;

            let mut logs_table = write_txn.open_table(LOGS).map_err(store_err)?;
            logs_table
                .insert((key, score, seq), member)
                .map_err(store_err)?;
        }
        write_txn.commit().map_err(store_err)?;
        Ok(())
    }

    fn scored_range(&self, key: &str) -> Result<Vec<(i64, String)>, TesseraError> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = read_txn.open_table(LOGS).map_err(store_err)?;

        let mut entries = Vec::new();
        for entry in table
            .range((key, i64::MIN, 0u64)..=(key, i64::MAX, u64::MAX))
            .map_err(store_err)?
        {
            let (k, v) = entry.map_err(store_err)?;
            let (_, score, _) = k.value();
            entries.push((score, v.value().to_string()));
        }
        Ok(entries)
    }

    fn scored_last(&self, key: &str) -> Result<Option<(i64, String)>, TesseraError> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = read_txn.open_table(LOGS).map_err(store_err)?;

        let mut range = table
            .range((key, i64::MIN, 0u64)..=(key, i64::MAX, u64::MAX))
            .map_err(store_err)?;
        match range.next_back() {
            Some(entry) => {
                let (k, v) = entry.map_err(store_err)?;
                let (_, score, _) = k.value();
                Ok(Some((score, v.value().to_string())))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> Result<bool, TesseraError> {
        let fields = self.pair_members(HASHES, key)?;
        let members = self.pair_members(SETS, key)?;
        let log_keys = self.log_keys(key)?;

        let write_txn = self.db.begin_write().map_err(store_err)?;
        let scalar_removed = {
            let mut scalars = write_txn.open_table(SCALARS).map_err(store_err)?;
            let removed = scalars.remove(key).map_err(store_err)?.is_some();

            let mut hashes = write_txn.open_table(HASHES).map_err(store_err)?;
            for field in &fields {
                hashes
                    .remove((key, field.as_str()))
                    .map_err(store_err)?;
            }

            let mut sets = write_txn.open_table(SETS).map_err(store_err)?;
            for member in &members {
                sets.remove((key, member.as_str())).map_err(store_err)?;
            }

            let mut logs = write_txn.open_table(LOGS).map_err(store_err)?;
            for (score, seq) in &log_keys {
                logs.remove((key, *score, *seq)).map_err(store_err)?;
            }
            removed
        };
        write_txn.commit().map_err(store_err)?;

        Ok(scalar_removed || !fields.is_empty() || !members.is_empty() || !log_keys.is_empty())
    }

    fn exists(&self, key: &str) -> Result<bool, TesseraError> {
        if self.get(key)?.is_some() {
            return Ok(true);
        }
        if !self.pair_members(HASHES, key)?.is_empty() {
            return Ok(true);
        }
        if !self.pair_members(SETS, key)?.is_empty() {
            return Ok(true);
        }
        Ok(!self.log_keys(key)?.is_empty())
    }
}
