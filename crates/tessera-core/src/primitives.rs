//! # Engine Primitives
//!
//! Hardcoded constants for the Tessera CORE: store key layout, export code
//! bounds and traversal limits. They are compiled into the binary and are
//! immutable at runtime.

// =============================================================================
// STORE KEY LAYOUT
// =============================================================================

/// Hash of scalar fields: `meta:{gid}`.
pub const META_PREFIX: &str = "meta";

/// Set of tags: `tag:{gid}`.
pub const TAG_PREFIX: &str = "tag";

/// Timeline log: `timeline:{gid}:{attribute}`.
pub const TIMELINE_PREFIX: &str = "timeline";

/// Set of attributes with a timeline: `timeline_attrs:{gid}`.
pub const TIMELINE_INDEX_PREFIX: &str = "timeline_attrs";

/// Neighbor set: `correl:{gid}:{correlation_type}`.
pub const CORRELATION_PREFIX: &str = "correl";

/// Set of correlation types present for an entity: `correl_types:{gid}`.
///
/// Kept outside the `correl:` namespace, where a gid of type `types` would
/// otherwise collide with a neighbor-set key.
pub const CORRELATION_TYPES_PREFIX: &str = "correl_types";

/// Registry of subtypes per type: `objs:subtypes:{type}`.
pub const REGISTRY_SUBTYPES_PREFIX: &str = "objs:subtypes";

/// Registry of ids per type and subtype: `objs:ids:{type}:{subtype}`.
pub const REGISTRY_IDS_PREFIX: &str = "objs:ids";

/// Set of message ids posted in a chat sub-channel: `messages:{gid}`.
pub const MESSAGES_PREFIX: &str = "messages";

/// Per-actor export basket hash: `user:obj:misp:export:{actor}`.
pub const BASKET_PREFIX: &str = "user:obj:misp:export";

/// Investigation record prefix: `investigation:{uuid}`.
pub const INVESTIGATION_PREFIX: &str = "investigation";

// =============================================================================
// PRESENTATION
// =============================================================================

/// Node color shared by account-like entities in the graph UI.
pub const ACCOUNT_ICON_COLOR: &str = "#4dffff";

/// Node radius used by every entity kind.
pub const DEFAULT_ICON_RADIUS: u32 = 5;

/// Route of the correlation view in the web UI.
pub const CORRELATION_SHOW_PATH: &str = "/correlation/show";

// =============================================================================
// EXPORT CODES
// =============================================================================

/// Event description used when the caller supplies none.
pub const DEFAULT_EVENT_INFO: &str = "AIL framework export";

/// Highest distribution code (`0` = organisation only ... `3` = all communities).
pub const MAX_DISTRIBUTION: i64 = 3;

/// Threat level codes run from `1` (high) to `4` (undefined).
pub const MIN_THREAT_LEVEL: i64 = 1;

/// `4` = undefined, the lowest-confidence threat level and the default.
pub const DEFAULT_THREAT_LEVEL: i64 = 4;

/// Highest analysis code (`0` initial, `1` ongoing, `2` completed).
pub const MAX_ANALYSIS: i64 = 2;

// =============================================================================
// TRAVERSAL LIMITS
// =============================================================================

/// Highest correlation depth a basket entry may request.
pub const MAX_BASKET_LEVEL: i64 = 3;

/// Maximum number of objects gathered when expanding a basket.
pub const MAX_EXPORT_OBJECTS: usize = 300;
