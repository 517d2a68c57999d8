//! # Durable Storage Backends
//!
//! Disk-backed implementations of `KvStore`.

mod redb_store;

pub use redb_store::RedbStore;
