//! # MISP Client
//!
//! Blocking client for a MISP instance. Implements `EventSubmitter` so the
//! core exporter can hand it finished events.
//!
//! Calls are synchronous with no timeout or retry. Async callers run them
//! inside `tokio::task::spawn_blocking`.

use crate::config::{MispSettings, TlsVerify};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;
use tessera_core::{EventSubmitter, ExportEvent, SubmissionReceipt, TesseraError};

/// Errors from the MISP client layer.
#[derive(Debug)]
pub enum ClientError {
    /// Cannot reach the instance.
    ConnectionFailed(String),
    /// 401/403 - invalid or missing automation key.
    Unauthorized,
    /// 429 Too Many Requests.
    RateLimited,
    /// Any other non-success status.
    ServerError(u16, String),
    /// Failed to parse the response body.
    ParseError(String),
    /// The TLS setup could not be built.
    Tls(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionFailed(url) => write!(f, "Cannot connect to MISP at {url}"),
            Self::Unauthorized => write!(f, "Unauthorized: invalid or missing MISP key"),
            Self::RateLimited => write!(f, "Rate limited: too many requests"),
            Self::ServerError(status, msg) => write!(f, "MISP error ({status}): {msg}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
            Self::Tls(msg) => write!(f, "TLS setup failed: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<ClientError> for TesseraError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Tls(msg) => TesseraError::Config(msg),
            other => TesseraError::Submission(other.to_string()),
        }
    }
}

/// Pull `Event.uuid` out of an `/events/add` response.
pub fn parse_event_uuid(response: &Value) -> Result<String, ClientError> {
    response
        .get("Event")
        .and_then(|event| event.get("uuid"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ClientError::ParseError(format!("no Event.uuid in response: {response}")))
}

// =============================================================================
// CLIENT
// =============================================================================

/// Connection to one MISP instance.
#[derive(Clone)]
pub struct MispClient {
    http: reqwest::blocking::Client,
    url: String,
    key: String,
}

impl std::fmt::Debug for MispClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MispClient").field("url", &self.url).finish()
    }
}

impl MispClient {
    /// Build a client for `url`, authenticating with `key`.
    pub fn new(url: &str, key: &str, verify: &TlsVerify) -> Result<Self, ClientError> {
        let mut builder = reqwest::blocking::Client::builder();
        match verify {
            TlsVerify::Enabled(true) => {}
            TlsVerify::Enabled(false) => {
                tracing::warn!(url, "MISP certificate verification disabled");
                builder = builder.danger_accept_invalid_certs(true);
            }
            TlsVerify::CaBundle(path) => {
                let pem = std::fs::read(path)
                    .map_err(|e| ClientError::Tls(format!("{}: {e}", path.display())))?;
                let cert = reqwest::Certificate::from_pem(&pem)
                    .map_err(|e| ClientError::Tls(format!("{}: {e}", path.display())))?;
                builder = builder.add_root_certificate(cert);
            }
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::Tls(e.to_string()))?;

        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
        })
    }

    /// Build a client from settings; `Ok(None)` when no instance is configured.
    pub fn from_settings(settings: &MispSettings) -> Result<Option<Self>, ClientError> {
        match (&settings.url, &settings.key) {
            (Some(url), Some(key)) => Self::new(url, key, &settings.verify_cert).map(Some),
            _ => Ok(None),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build a request carrying the automation key.
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::blocking::RequestBuilder {
        let url = format!("{}{}", self.url, path);
        self.http
            .request(method, &url)
            .header(AUTHORIZATION, &self.key)
            .header(ACCEPT, "application/json")
    }

    /// Check status codes and parse JSON.
    fn handle_response(&self, resp: reqwest::blocking::Response) -> Result<Value, ClientError> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ClientError::Unauthorized);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(ClientError::ServerError(status.as_u16(), body));
        }
        resp.json::<Value>()
            .map_err(|e| ClientError::ParseError(e.to_string()))
    }

    fn send(&self, req: reqwest::blocking::RequestBuilder) -> Result<Value, ClientError> {
        let resp = req
            .send()
            .map_err(|e| ClientError::ConnectionFailed(format!("{}: {e}", self.url)))?;
        self.handle_response(resp)
    }

    /// POST /events/add
    pub fn add_event(&self, event: &ExportEvent) -> Result<Value, ClientError> {
        let body = event
            .to_document()
            .map_err(|e| ClientError::ParseError(e.to_string()))?;
        self.send(self.request(reqwest::Method::POST, "/events/add").json(&body))
    }

    /// GET /servers/getVersion
    pub fn ping(&self) -> Result<Value, ClientError> {
        self.send(self.request(reqwest::Method::GET, "/servers/getVersion"))
    }

    /// The instance's own uuid setting, if exposed.
    pub fn instance_uuid(&self) -> Result<Option<String>, ClientError> {
        let response = self.send(self.request(
            reqwest::Method::GET,
            "/servers/getSetting/MISP.uuid",
        ))?;
        Ok(response
            .get("value")
            .and_then(Value::as_str)
            .filter(|uuid| !uuid.is_empty())
            .map(str::to_string))
    }
}

impl EventSubmitter for MispClient {
    fn base_url(&self) -> &str {
        &self.url
    }

    fn submit(&self, event: &ExportEvent) -> Result<SubmissionReceipt, TesseraError> {
        tracing::debug!(uuid = %event.uuid, url = %self.url, "submitting event");
        let response = self.add_event(event)?;
        let uuid = parse_event_uuid(&response)?;
        Ok(SubmissionReceipt { uuid, response })
    }
}

// =============================================================================
// TESTS
// =============================================================================
