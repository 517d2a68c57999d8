//! # Settings
//!
//! Process settings loaded once at startup from a TOML file, then overridden
//! by `TESSERA_*` environment variables.
//!
//! ```toml
//! [store]
//! path = "tessera.redb"
//! backend = "redb"          # or "memory"
//!
//! [notifications]
//! base_domain = "https://ail.example.org"
//!
//! [misp]
//! url = "https://misp.example.org"
//! key = "..."
//! verify_cert = true        # false, or a path to a CA bundle
//!
//! [api]
//! rate_limit = 100          # requests/second, 0 disables
//! ```
//!
//! ## Environment Overrides
//!
//! - `TESSERA_MISP_URL`, `TESSERA_MISP_KEY`
//! - `TESSERA_BASE_DOMAIN`
//! - `TESSERA_API_KEY`: enables bearer authentication on the HTTP API
//! - `TESSERA_RATE_LIMIT`
//! - `TESSERA_CORS_ORIGINS`: comma-separated list, or `*`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tessera_core::{Context, CoreSettings, TesseraError};

/// Default database file.
pub const DEFAULT_STORE_PATH: &str = "tessera.redb";

/// Default API rate limit (requests per second).
pub const DEFAULT_RATE_LIMIT: u32 = 100;

// =============================================================================
// SECTIONS
// =============================================================================

/// Store backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redb,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub path: PathBuf,
    pub backend: StoreBackend,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
            backend: StoreBackend::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Base URL of the web UI, used for standalone links.
    pub base_domain: String,
}

/// Certificate verification policy for the MISP instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TlsVerify {
    /// Verify against system roots (`true`) or not at all (`false`).
    Enabled(bool),
    /// Verify against an extra PEM bundle.
    CaBundle(PathBuf),
}

impl Default for TlsVerify {
    fn default() -> Self {
        Self::Enabled(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MispSettings {
    pub url: Option<String>,
    pub key: Option<String>,
    pub verify_cert: TlsVerify,
}

impl MispSettings {
    /// Both url and key are present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.key.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Bearer key; `None` leaves the API open.
    pub api_key: Option<String>,
    pub rate_limit: u32,
    /// Allowed CORS origins; `None` means localhost only.
    pub cors_origins: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            cors_origins: None,
        }
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

/// The whole settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub notifications: NotificationSettings,
    pub misp: MispSettings,
    pub api: ApiSettings,
}

impl Settings {
    /// Load `path` (defaults when it does not exist), apply environment
    /// overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, TesseraError> {
        let mut settings = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            Some(path) => {
                tracing::debug!(path = %path.display(), "settings file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        settings.apply_overrides(|name| std::env::var(name).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Parse a settings file without overrides or validation.
    pub fn from_file(path: &Path) -> Result<Self, TesseraError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| TesseraError::Io(format!("Read {}: {}", path.display(), e)))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, TesseraError> {
        toml::from_str(raw).map_err(|e| TesseraError::Config(format!("Invalid settings: {}", e)))
    }

    /// Apply `TESSERA_*` overrides read through `lookup`.
    ///
    /// Empty values are ignored, as are rate limits that are not integers.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(url) = var("TESSERA_MISP_URL") {
            self.misp.url = Some(url);
        }
        if let Some(key) = var("TESSERA_MISP_KEY") {
            self.misp.key = Some(key);
        }
        if let Some(domain) = var("TESSERA_BASE_DOMAIN") {
            self.notifications.base_domain = domain;
        }
        if let Some(key) = var("TESSERA_API_KEY") {
            self.api.api_key = Some(key);
        }
        if let Some(rate) = var("TESSERA_RATE_LIMIT").and_then(|r| r.parse().ok()) {
            self.api.rate_limit = rate;
        }
        if let Some(origins) = var("TESSERA_CORS_ORIGINS") {
            self.api.cors_origins = Some(origins);
        }
    }

    /// Normalize URLs and reject a half-configured MISP section.
    pub fn validate(&mut self) -> Result<(), TesseraError> {
        self.misp.url = self
            .misp
            .url
            .take()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        self.misp.key = self.misp.key.take().filter(|key| !key.is_empty());
        self.notifications.base_domain = self
            .notifications
            .base_domain
            .trim_end_matches('/')
            .to_string();

        if self.misp.url.is_some() != self.misp.key.is_some() {
            return Err(TesseraError::Config(
                "[misp] needs both url and key, or neither".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn core_settings(&self) -> CoreSettings {
        CoreSettings::new(self.notifications.base_domain.as_str())
    }

    /// Open the configured store.
    pub fn open_context(&self) -> Result<Context, TesseraError> {
        match self.store.backend {
            StoreBackend::Redb => Context::with_redb(&self.store.path, self.core_settings()),
            StoreBackend::Memory => Ok(Context::in_memory(self.core_settings())),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let settings = Settings::from_toml("").expect("parse");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.store.path, PathBuf::from(DEFAULT_STORE_PATH));
        assert_eq!(settings.api.rate_limit, DEFAULT_RATE_LIMIT);
        assert_eq!(settings.misp.verify_cert, TlsVerify::Enabled(true));
    }

    #[test]
    fn verify_cert_accepts_bool_or_path() {
        let off = Settings::from_toml("[misp]\nverify_cert = false").expect("parse");
        assert_eq!(off.misp.verify_cert, TlsVerify::Enabled(false));

        let bundle =
            Settings::from_toml("[misp]\nverify_cert = \"/etc/ssl/misp.pem\"").expect("parse");
        assert_eq!(
            bundle.misp.verify_cert,
            TlsVerify::CaBundle(PathBuf::from("/etc/ssl/misp.pem"))
        );
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(matches!(
            Settings::from_toml("[store]\nbackend = \"postgres\""),
            Err(TesseraError::Config(_))
        ));
    }
}
