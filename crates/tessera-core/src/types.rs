//! # Core Type Definitions
//!
//! This module contains the shared types of the Tessera object engine:
//! - Global identity (`GlobalId`, `ObjectType`)
//! - Correlation tags (`CorrelationType`)
//! - Presentation descriptor (`SvgIcon`)
//! - Error types (`TesseraError`)
//!
//! ## Identity Guarantees
//!
//! A `GlobalId` is immutable once built. Its canonical string form is
//! `type:subtype:id` and is re-split with a max-split of 2, so `type` and
//! `subtype` may never contain `:` while `id` may.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between the three identity components.
pub const ID_SEPARATOR: char = ':';

// =============================================================================
// GLOBAL IDENTIFIER
// =============================================================================

/// The `(type, subtype, id)` triple uniquely naming an entity.
///
/// `subtype` is empty for flat entities (`domain::example.com`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalId {
    obj_type: String,
    subtype: String,
    id: String,
}

impl GlobalId {
    /// Build an identifier from its three components.
    ///
    /// Returns `TesseraError::InvalidIdentifier` if `type` or `id` is empty,
    /// or if `type`/`subtype` contain the `:` separator.
    pub fn new(
        obj_type: impl Into<String>,
        subtype: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<Self, TesseraError> {
        let obj_type = obj_type.into();
        let subtype = subtype.into();
        let id = id.into();

        if obj_type.is_empty() || id.is_empty() {
            return Err(TesseraError::InvalidIdentifier(format!(
                "{obj_type}:{subtype}:{id}"
            )));
        }
        if obj_type.contains(ID_SEPARATOR) || subtype.contains(ID_SEPARATOR) {
            return Err(TesseraError::InvalidIdentifier(format!(
                "{obj_type}:{subtype}:{id}"
            )));
        }

        Ok(Self {
            obj_type,
            subtype,
            id,
        })
    }

    /// Parse the canonical `type:subtype:id` form.
    ///
    /// A string that does not split into three valid parts is treated as
    /// store corruption and reported as `TesseraError::MalformedIdentifier`.
    pub fn parse(raw: &str) -> Result<Self, TesseraError> {
        let mut parts = raw.splitn(3, ID_SEPARATOR);
        let (Some(obj_type), Some(subtype), Some(id)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(TesseraError::MalformedIdentifier(raw.to_string()));
        };
        Self::new(obj_type, subtype, id)
            .map_err(|_| TesseraError::MalformedIdentifier(raw.to_string()))
    }

    /// The entity type (`user-account`, `domain`, ...).
    #[must_use]
    pub fn obj_type(&self) -> &str {
        &self.obj_type
    }

    /// The subtype, empty for flat entities.
    #[must_use]
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// The entity id within its type and subtype.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.obj_type,
            self.subtype,
            self.id,
            sep = ID_SEPARATOR
        )
    }
}

impl FromStr for GlobalId {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for GlobalId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GlobalId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// OBJECT TYPE
// =============================================================================

/// The entity kinds known to the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectType {
    /// Account on a messaging or social platform (subtype = platform).
    UserAccount,
    /// Username string observed on a platform (subtype = platform).
    Username,
    /// Sub-channel of a chat (subtype = chat instance uuid).
    ChatSubChannel,
    /// Domain name (flat).
    Domain,
    /// CVE identifier (flat).
    Cve,
}

impl ObjectType {
    /// All known kinds, in registry order.
    pub const ALL: [ObjectType; 5] = [
        ObjectType::UserAccount,
        ObjectType::Username,
        ObjectType::ChatSubChannel,
        ObjectType::Domain,
        ObjectType::Cve,
    ];

    /// The canonical type name used in global identifiers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserAccount => "user-account",
            Self::Username => "username",
            Self::ChatSubChannel => "chat-subchannel",
            Self::Domain => "domain",
            Self::Cve => "cve",
        }
    }

    /// Whether the subtype is a meaningful part of the identity.
    #[must_use]
    pub const fn is_subtyped(self) -> bool {
        matches!(
            self,
            Self::UserAccount | Self::Username | Self::ChatSubChannel
        )
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TesseraError::UnknownObjectType(s.to_string()))
    }
}

// =============================================================================
// CORRELATION TYPE
// =============================================================================

/// Tag naming the kind of link between two entities.
///
/// By convention the tag is the type of the entity on the far side
/// (`CorrelationType::of`), but any non-empty tag is accepted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CorrelationType(String);

impl CorrelationType {
    /// Create a correlation tag. Empty tags are rejected.
    pub fn new(tag: impl Into<String>) -> Result<Self, TesseraError> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(TesseraError::InvalidIdentifier(
                "empty correlation type".to_string(),
            ));
        }
        Ok(Self(tag))
    }

    /// The conventional tag for a link pointing at `target`.
    #[must_use]
    pub fn of(target: &GlobalId) -> Self {
        Self(target.obj_type().to_string())
    }

    /// Get the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// PRESENTATION
// =============================================================================

/// Icon descriptor used by the graph UI (font-awesome glyph + color).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SvgIcon {
    pub style: String,
    pub icon: String,
    pub color: String,
    pub radius: u32,
}

impl SvgIcon {
    #[must_use]
    pub fn new(style: &str, icon: &str, color: &str, radius: u32) -> Self {
        Self {
            style: style.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
            radius,
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Tessera engine.
///
/// - Store and network failures are surfaced unmodified to the caller
/// - Input sanitization never produces an error (values are coerced)
/// - Malformed stored identifiers are fatal
#[derive(Debug, Error)]
pub enum TesseraError {
    /// The key-value store failed or is unavailable.
    #[error("Store error: {0}")]
    Store(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored identifier could not be split into `type:subtype:id`.
    #[error("Malformed stored identifier: {0}")]
    MalformedIdentifier(String),

    /// Caller-supplied identity components are not valid.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The object type is not part of the taxonomy.
    #[error("Unknown object type: {0}")]
    UnknownObjectType(String),

    /// The requested investigation does not exist.
    #[error("Investigation not found: {0}")]
    InvestigationNotFound(String),

    /// Submission was requested but no exchange instance is configured.
    #[error("No MISP instance configured: missing url or api key")]
    SubmitterUnavailable,

    /// The exchange instance rejected or failed the submission.
    #[error("Submission failed: {0}")]
    Submission(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error outside the store (config file, listener socket).
    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_id_display_and_parse() {
        let gid = GlobalId::new("user-account", "telegram", "12345").expect("valid");
        assert_eq!(gid.to_string(), "user-account:telegram:12345");
        assert_eq!(GlobalId::parse("user-account:telegram:12345").expect("parse"), gid);
    }

    #[test]
    fn global_id_empty_subtype_round_trip() {
        let gid = GlobalId::new("domain", "", "example.com").expect("valid");
        assert_eq!(gid.to_string(), "domain::example.com");

        let parsed = GlobalId::parse("domain::example.com").expect("parse");
        assert_eq!(parsed.subtype(), "");
        assert_eq!(parsed, gid);
    }

    #[test]
    fn global_id_keeps_colons_in_id() {
        let gid = GlobalId::parse("chat-subchannel:abc:chat/1:2").expect("parse");
        assert_eq!(gid.obj_type(), "chat-subchannel");
        assert_eq!(gid.subtype(), "abc");
        assert_eq!(gid.id(), "chat/1:2");
    }

    #[test]
    fn global_id_rejects_separator_in_subtype() {
        assert!(matches!(
            GlobalId::new("username", "tele:gram", "x"),
            Err(TesseraError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn malformed_identifier_is_fatal() {
        assert!(matches!(
            GlobalId::parse("username-only"),
            Err(TesseraError::MalformedIdentifier(_))
        ));
        assert!(matches!(
            GlobalId::parse("domain:"),
            Err(TesseraError::MalformedIdentifier(_))
        ));
    }

    #[test]
    fn global_id_serializes_as_string() {
        let gid = GlobalId::new("cve", "", "CVE-2020-16856").expect("valid");
        let json = serde_json::to_string(&gid).expect("serialize");
        assert_eq!(json, "\"cve::CVE-2020-16856\"");
        let back: GlobalId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, gid);
    }

    #[test]
    fn object_type_names() {
        for kind in ObjectType::ALL {
            assert_eq!(kind.as_str().parse::<ObjectType>().expect("parse"), kind);
        }
        assert!("item".parse::<ObjectType>().is_err());
        assert!(ObjectType::UserAccount.is_subtyped());
        assert!(!ObjectType::Domain.is_subtyped());
    }

    #[test]
    fn correlation_type_of_target() {
        let target = GlobalId::new("username", "telegram", "alice").expect("valid");
        assert_eq!(CorrelationType::of(&target).as_str(), "username");
        assert!(CorrelationType::new("").is_err());
    }
}
