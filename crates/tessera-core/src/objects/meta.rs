//! Meta assembly options and the resulting summary structure.

use crate::SvgIcon;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// One optional field a caller may request from `get_meta`.
///
/// Fields that are not requested are neither computed nor returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaOption {
    /// Tag set (always included by account-like kinds).
    Tags,
    /// Relative UI link.
    Link,
    /// Stored icon reference (user-account).
    Icon,
    /// Graph presentation descriptor.
    SvgIcon,
    /// Latest username global id (user-account).
    Username,
    /// Resolve the latest username into its own meta (user-account).
    UsernameMeta,
    /// Full username history (user-account).
    Usernames,
    /// Parent chat (chat-subchannel).
    Chat,
    /// Image reference (chat-subchannel).
    Img,
    /// Number of messages (chat-subchannel).
    NbMessages,
}

impl MetaOption {
    pub const ALL: [MetaOption; 10] = [
        MetaOption::Tags,
        MetaOption::Link,
        MetaOption::Icon,
        MetaOption::SvgIcon,
        MetaOption::Username,
        MetaOption::UsernameMeta,
        MetaOption::Usernames,
        MetaOption::Chat,
        MetaOption::Img,
        MetaOption::NbMessages,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tags => "tags",
            Self::Link => "link",
            Self::Icon => "icon",
            Self::SvgIcon => "svg_icon",
            Self::Username => "username",
            Self::UsernameMeta => "username_meta",
            Self::Usernames => "usernames",
            Self::Chat => "chat",
            Self::Img => "img",
            Self::NbMessages => "nb_messages",
        }
    }
}

impl fmt::Display for MetaOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetaOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|opt| opt.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Set of requested meta fields, passed by value per call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaOptions(BTreeSet<MetaOption>);

impl MetaOptions {
    /// No optional field.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, option: MetaOption) -> Self {
        self.0.insert(option);
        self
    }

    #[must_use]
    pub fn contains(&self, option: MetaOption) -> bool {
        self.0.contains(&option)
    }

    /// Parse a comma-separated flag list (`tags,link,username`).
    ///
    /// Unrecognized flags are ignored, like any other unrequested field.
    #[must_use]
    pub fn parse_list(raw: &str) -> Self {
        let mut options = Self::none();
        for flag in raw.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            match flag.parse::<MetaOption>() {
                Ok(option) => {
                    options.0.insert(option);
                }
                Err(unknown) => tracing::debug!(flag = %unknown, "ignoring unknown meta option"),
            }
        }
        options
    }
}

impl FromIterator<MetaOption> for MetaOptions {
    fn from_iter<I: IntoIterator<Item = MetaOption>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Kind-specific meta value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Text(String),
    Count(u64),
    List(Vec<String>),
    Meta(Box<ObjectMeta>),
    Null,
}

impl From<Option<String>> for MetaValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::Text)
    }
}

/// Presentation/export-ready summary of one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectMeta {
    #[serde(rename = "type")]
    pub obj_type: String,
    pub subtype: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub svg_icon: Option<SvgIcon>,
    /// Kind-specific extras keyed by option name.
    #[serde(flatten)]
    pub extra: BTreeMap<String, MetaValue>,
}

impl ObjectMeta {
    pub fn insert(&mut self, key: MetaOption, value: impl Into<MetaValue>) {
        self.extra.insert(key.as_str().to_string(), value.into());
    }

    /// Insert a kind-specific field that is not an option flag (`name`).
    pub fn insert_field(&mut self, key: &str, value: impl Into<MetaValue>) {
        self.extra.insert(key.to_string(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.extra.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_ignores_unknown_flags() {
        let options = MetaOptions::parse_list("tags, link,,bogus,nb_messages");
        assert!(options.contains(MetaOption::Tags));
        assert!(options.contains(MetaOption::Link));
        assert!(options.contains(MetaOption::NbMessages));
        assert!(!options.contains(MetaOption::Icon));
    }

    #[test]
    fn unrequested_fields_are_not_serialized() {
        let meta = ObjectMeta {
            obj_type: "domain".to_string(),
            id: "example.com".to_string(),
            ..ObjectMeta::default()
        };
        let json = serde_json::to_value(&meta).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"type": "domain", "subtype": "", "id": "example.com"})
        );
    }

    #[test]
    fn extras_are_flattened() {
        let mut meta = ObjectMeta::default();
        meta.insert(MetaOption::NbMessages, MetaValue::Count(3));
        meta.insert(MetaOption::Username, None::<String>);
        let json = serde_json::to_value(&meta).expect("serialize");
        assert_eq!(json["nb_messages"], 3);
        assert!(json["username"].is_null());
    }
}
