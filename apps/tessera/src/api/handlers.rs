//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{
        ApiError, BasketAddRequest, BasketEntryQuery, CorrelationQuery, CorrelationResponse,
        HealthResponse, ObjectQuery, PreviewRequest, RemovedResponse,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::collections::BTreeMap;
use tessera_core::{
    CorrelationIndex, CorrelationType, ExportBasket, Exporter, GlobalId, MetaOptions, get_object,
    get_objects,
};

/// Parse a caller-supplied identifier; any failure is the caller's fault.
fn parse_gid(raw: &str) -> Result<GlobalId, ApiError> {
    GlobalId::parse(raw).map_err(|_| ApiError {
        status: StatusCode::BAD_REQUEST,
        message: format!("Invalid identifier: {raw}"),
    })
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// OBJECT HANDLERS
// =============================================================================

/// Meta summary of one entity.
pub async fn object_handler(
    State(state): State<AppState>,
    Query(query): Query<ObjectQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let gid = parse_gid(&query.gid)?;
    let object = get_object(&gid)?;
    if !object.exists(&state.ctx)? {
        return Err(ApiError::not_found(format!("Unknown object: {gid}")));
    }

    let options = query
        .options
        .as_deref()
        .map(MetaOptions::parse_list)
        .unwrap_or_else(MetaOptions::none);
    let meta = object.get_meta(&state.ctx, &options)?;
    Ok((StatusCode::OK, Json(meta)))
}

/// Correlations of one entity, grouped by type.
pub async fn correlations_handler(
    State(state): State<AppState>,
    Query(query): Query<CorrelationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let gid = parse_gid(&query.gid)?;
    let index = CorrelationIndex::new(state.ctx.store());

    let correlations = match query.correlation_type.as_deref() {
        Some(raw) => {
            let ctype = CorrelationType::new(raw).map_err(|e| ApiError {
                status: StatusCode::BAD_REQUEST,
                message: e.to_string(),
            })?;
            let edges = index.get_edges(&gid, &ctype)?;
            BTreeMap::from([(ctype.as_str().to_string(), edges)])
        }
        None => index
            .get_all_edges(&gid)?
            .into_iter()
            .map(|(ctype, edges)| (ctype.as_str().to_string(), edges))
            .collect(),
    };

    Ok((
        StatusCode::OK,
        Json(CorrelationResponse {
            gid: gid.to_string(),
            correlations,
        }),
    ))
}

// =============================================================================
// BASKET HANDLERS
// =============================================================================

pub async fn basket_list_handler(
    State(state): State<AppState>,
    Path(actor): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = ExportBasket::new(state.ctx.store()).list(&actor)?;
    Ok((StatusCode::OK, Json(entries)))
}

pub async fn basket_add_handler(
    State(state): State<AppState>,
    Path(actor): Path<String>,
    Json(req): Json<BasketAddRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = ExportBasket::new(state.ctx.store()).add(
        &actor,
        &req.obj_type,
        req.subtype.as_deref(),
        &req.id,
        req.lvl,
    )?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn basket_clear_handler(
    State(state): State<AppState>,
    Path(actor): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = ExportBasket::new(state.ctx.store()).clear(&actor)?;
    Ok((StatusCode::OK, Json(RemovedResponse { removed })))
}

pub async fn basket_remove_handler(
    State(state): State<AppState>,
    Path(actor): Path<String>,
    Query(query): Query<BasketEntryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = ExportBasket::new(state.ctx.store()).remove(
        &actor,
        &query.obj_type,
        query.subtype.as_deref(),
        &query.id,
    )?;
    Ok((StatusCode::OK, Json(RemovedResponse { removed })))
}

// =============================================================================
// EXPORT HANDLER
// =============================================================================

/// Build an event without submitting it.
///
/// Objects are the explicit `gids` first, then the resolved basket of
/// `actor` when given.
pub async fn export_preview_handler(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut gids = req
        .gids
        .iter()
        .map(|raw| parse_gid(raw))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(actor) = req.actor.as_deref() {
        for gid in ExportBasket::new(state.ctx.store()).resolve(actor)? {
            if !gids.contains(&gid) {
                gids.push(gid);
            }
        }
    }

    let objects = get_objects(&gids)?;
    let event = Exporter::new(&state.ctx).build_event(&objects, &req.event)?;
    Ok((StatusCode::OK, Json(event)))
}
