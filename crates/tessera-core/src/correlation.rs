//! # Correlation Index
//!
//! Symmetric, typed edges between two global identifiers.
//!
//! An edge `{A, B}` tagged `t` is written on both endpoints, so it is
//! discoverable from either side. Insertion is an idempotent set-add, which
//! makes concurrent identical insertions safe without locking.
//!
//! There is no edge-removal operation here. Edges disappear only when an
//! endpoint is purged, and then only on the purged side (see `purge`).

use crate::primitives::{CORRELATION_PREFIX, CORRELATION_TYPES_PREFIX};
use crate::store::KvStore;
use crate::{CorrelationType, GlobalId, TesseraError};
use std::collections::{BTreeMap, BTreeSet};

/// Correlation graph view over a store.
pub struct CorrelationIndex<'a> {
    store: &'a dyn KvStore,
}

impl<'a> CorrelationIndex<'a> {
    pub fn new(store: &'a dyn KvStore) -> Self {
        Self { store }
    }

    /// Insert (or re-insert) the edge `{a, b}` tagged `correlation`.
    pub fn add_edge(
        &self,
        a: &GlobalId,
        b: &GlobalId,
        correlation: &CorrelationType,
    ) -> Result<(), TesseraError> {
        self.add_half(a, b, correlation)?;
        self.add_half(b, a, correlation)
    }

    fn add_half(
        &self,
        from: &GlobalId,
        to: &GlobalId,
        correlation: &CorrelationType,
    ) -> Result<(), TesseraError> {
        self.store
            .sadd(&neighbors_key(from, correlation), &to.to_string())?;
        self.store
            .sadd(&types_key(from), correlation.as_str())?;
        Ok(())
    }

    /// Whether `{a, b}` is linked with tag `correlation`.
    pub fn is_correlated(
        &self,
        a: &GlobalId,
        b: &GlobalId,
        correlation: &CorrelationType,
    ) -> Result<bool, TesseraError> {
        self.store
            .sismember(&neighbors_key(a, correlation), &b.to_string())
    }

    /// Every neighbor of `entity` linked with tag `correlation`.
    ///
    /// A stored neighbor that does not parse as `type:subtype:id` is
    /// reported as `TesseraError::MalformedIdentifier`.
    pub fn get_edges(
        &self,
        entity: &GlobalId,
        correlation: &CorrelationType,
    ) -> Result<BTreeSet<GlobalId>, TesseraError> {
        self.store
            .smembers(&neighbors_key(entity, correlation))?
            .iter()
            .map(|raw| GlobalId::parse(raw))
            .collect()
    }

    /// Every neighbor of `entity`, grouped by correlation tag.
    pub fn get_all_edges(
        &self,
        entity: &GlobalId,
    ) -> Result<BTreeMap<CorrelationType, BTreeSet<GlobalId>>, TesseraError> {
        let mut all = BTreeMap::new();
        for tag in self.store.smembers(&types_key(entity))? {
            let correlation = CorrelationType::new(tag)?;
            let neighbors = self.get_edges(entity, &correlation)?;
            if !neighbors.is_empty() {
                all.insert(correlation, neighbors);
            }
        }
        Ok(all)
    }

    /// Neighbors of `entity` regardless of tag.
    pub fn neighbors(&self, entity: &GlobalId) -> Result<BTreeSet<GlobalId>, TesseraError> {
        Ok(self
            .get_all_edges(entity)?
            .into_values()
            .flatten()
            .collect())
    }

    /// Remove the edges stored on `entity`'s side.
    ///
    /// UNSAFE by contract: the mirror halves held by the neighbors are left
    /// in place and keep pointing at `entity`.
    pub fn purge(&self, entity: &GlobalId) -> Result<(), TesseraError> {
        for tag in self.store.smembers(&types_key(entity))? {
            let correlation = CorrelationType::new(tag)?;
            self.store.delete(&neighbors_key(entity, &correlation))?;
        }
        self.store.delete(&types_key(entity))?;
        Ok(())
    }
}

fn neighbors_key(entity: &GlobalId, correlation: &CorrelationType) -> String {
    format!("{CORRELATION_PREFIX}:{entity}:{correlation}")
}

fn types_key(entity: &GlobalId) -> String {
    format!("{CORRELATION_TYPES_PREFIX}:{entity}")
}

// =============================================================================
// TESTS
// =============================================================================
