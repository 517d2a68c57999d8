//! # Tessera HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /object?gid=&options=` - Meta summary of one entity
//! - `GET /object/correlations?gid=&type=` - Correlations of one entity
//! - `GET /basket/{actor}` - List an actor's export basket
//! - `POST /basket/{actor}` - Stage one entity
//! - `DELETE /basket/{actor}` - Clear the basket
//! - `DELETE /basket/{actor}/entry?type=&subtype=&id=` - Unstage one entity
//! - `POST /export/preview` - Build an event without submitting it
//!
//! Submission to a MISP instance is CLI-only.
//!
//! ## Security Configuration
//!
//! See `config::ApiSettings`: CORS origins (default localhost only), rate
//! limit (default 100/s, 0 disables) and an optional bearer key.

mod auth;
mod handlers;
mod middleware;
mod types;

pub use middleware::create_rate_limiter;
pub use types::{
    ApiError, BasketAddRequest, CorrelationResponse, ErrorResponse, HealthResponse,
    PreviewRequest, RemovedResponse,
};

use crate::config::ApiSettings;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tessera_core::{Context, TesseraError};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Engine context; the store handles its own locking.
    pub ctx: Context,
}

impl AppState {
    #[must_use]
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer.
///
/// - `"*"`: allows all origins (development only)
/// - not set: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                restricted_cors(allowed_origins)
            }
        }
        None => {
            tracing::info!("CORS: No origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();
    restricted_cors(origins)
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting (if enabled)
/// 4. Authentication (if a key is configured)
pub fn create_router(state: AppState, api: &ApiSettings) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/object", get(handlers::object_handler))
        .route("/object/correlations", get(handlers::correlations_handler))
        .route(
            "/basket/{actor}",
            get(handlers::basket_list_handler)
                .post(handlers::basket_add_handler)
                .delete(handlers::basket_clear_handler),
        )
        .route("/basket/{actor}/entry", delete(handlers::basket_remove_handler))
        .route("/export/preview", post(handlers::export_preview_handler));

    match api.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => {
            tracing::info!("API key authentication enabled");
            let key: auth::ApiKey = Arc::from(key);
            router = router.layer(axum_middleware::from_fn_with_state(
                key,
                auth::api_key_auth_middleware,
            ));
        }
        None => {
            tracing::warn!(
                "API key authentication DISABLED - all endpoints are publicly accessible! \
                 Set TESSERA_API_KEY to enable authentication."
            );
        }
    }

    if api.rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", api.rate_limit);
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(api.rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(api.cors_origins.as_deref())),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, ctx: Context, api: &ApiSettings) -> Result<(), TesseraError> {
    let router = create_router(AppState::new(ctx), api);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| TesseraError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Tessera HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| TesseraError::Io(format!("Server error: {}", e)))
}
