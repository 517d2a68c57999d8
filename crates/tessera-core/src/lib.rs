//! # tessera-core
//!
//! The object / timeline / correlation engine for Tessera - THE LOGIC.
//!
//! This crate models threat-intelligence observables (accounts, usernames,
//! chat channels, domains, CVEs) stored in a key-value store:
//! - every entity has a stable `type:subtype:id` identity
//! - history-bearing attributes are append-only timelines
//! - entities are linked by a symmetric, typed correlation index
//! - any entity set can be turned into a MISP-shaped export event
//!
//! ## Architectural Constraints
//!
//! - Has NO async, NO network dependencies (pure Rust)
//! - All store access goes through the `KvStore` trait
//! - All remote submission goes through the `EventSubmitter` trait
//! - No module-scope state: a `Context` is built once and passed by reference

// =============================================================================
// MODULES
// =============================================================================

pub mod basket;
pub mod context;
pub mod correlation;
pub mod export;
pub mod investigation;
pub mod objects;
pub mod primitives;
pub mod storage;
pub mod store;
pub mod timeline;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{CorrelationType, GlobalId, ObjectType, SvgIcon, TesseraError};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use basket::{BasketEntry, ExportBasket};
pub use context::{Context, CoreSettings};
pub use correlation::CorrelationIndex;
pub use export::{
    EventRequest, EventSubmitter, ExportEvent, ExportObject, ExportOutcome, Exporter, RawCode,
    SubmissionReceipt, SubmittedEvent,
};
pub use investigation::{Investigation, InvestigationSummary, NewInvestigation};
pub use objects::{AilObject, LinkMode, MetaOption, MetaOptions, ObjectMeta, get_object, get_objects};
pub use storage::RedbStore;
pub use store::{KvStore, MemoryStore};
pub use timeline::{Timeline, TimelineEntry};
