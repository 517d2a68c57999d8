//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tessera_core::{EventRequest, GlobalId, RawCode, TesseraError};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// OBJECT QUERIES
// =============================================================================

/// `GET /object` query string.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectQuery {
    /// Canonical `type:subtype:id`.
    pub gid: String,
    /// Comma-separated meta options (`tags,link,username`).
    #[serde(default)]
    pub options: Option<String>,
}

/// `GET /object/correlations` query string.
#[derive(Debug, Clone, Deserialize)]
pub struct CorrelationQuery {
    pub gid: String,
    /// Restrict to one correlation type.
    #[serde(default, rename = "type")]
    pub correlation_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationResponse {
    pub gid: String,
    pub correlations: BTreeMap<String, BTreeSet<GlobalId>>,
}

// =============================================================================
// BASKET
// =============================================================================

/// `POST /basket/{actor}` body.
#[derive(Debug, Clone, Deserialize)]
pub struct BasketAddRequest {
    #[serde(rename = "type")]
    pub obj_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub id: String,
    #[serde(default = "missing_level")]
    pub lvl: RawCode,
}

fn missing_level() -> RawCode {
    RawCode::Missing
}

/// `DELETE /basket/{actor}/entry` query string.
#[derive(Debug, Clone, Deserialize)]
pub struct BasketEntryQuery {
    #[serde(rename = "type")]
    pub obj_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedResponse {
    pub removed: bool,
}

// =============================================================================
// EXPORT PREVIEW
// =============================================================================

/// `POST /export/preview` body: explicit objects, an actor's basket, or both.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub gids: Vec<String>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(flatten)]
    pub event: EventRequest,
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Engine error mapped onto an HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<TesseraError> for ApiError {
    fn from(err: TesseraError) -> Self {
        let status = match &err {
            TesseraError::InvalidIdentifier(_) | TesseraError::UnknownObjectType(_) => {
                StatusCode::BAD_REQUEST
            }
            TesseraError::InvestigationNotFound(_) => StatusCode::NOT_FOUND,
            TesseraError::SubmitterUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            TesseraError::Submission(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}
