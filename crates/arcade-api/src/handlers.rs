//! REST API handlers.
//!
//! Each handler validates the player id against the configured prefix,
//! then calls into the orchestrator (returning the JSON envelope) or hands
//! the request to the player router.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::warn;

use arcade_core::PlayerId;
use arcade_orchestrator::OrchestratorError;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

fn parse_player(state: &ApiState, raw: String) -> Result<PlayerId, Response> {
    state
        .lifecycle
        .config()
        .parse_player(raw)
        .map_err(|e| error_response(&e.to_string(), StatusCode::BAD_REQUEST))
}

#[derive(serde::Serialize)]
struct Readiness {
    player: PlayerId,
    ready: bool,
}

/// GET /alive
pub async fn alive() -> impl IntoResponse {
    Json(serde_json::json!({ "success": true }))
}

/// POST /api/v1/players/:player_id
pub async fn register_player(
    State(state): State<ApiState>,
    Path(player_id): Path<String>,
) -> Response {
    let player = match parse_player(&state, player_id) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match state.lifecycle.register(&player).await {
        Ok(()) => (
            StatusCode::CREATED,
            ApiResponse::ok(serde_json::json!({ "player": player })),
        )
            .into_response(),
        Err(e @ OrchestratorError::InvalidPlayer(_)) => {
            error_response(&e.to_string(), StatusCode::BAD_REQUEST)
        }
        Err(e) if e.is_conflict() => {
            warn!(%player, error = %e, "registration conflicted with existing resources");
            error_response(&e.to_string(), StatusCode::CONFLICT)
        }
        Err(e) => {
            warn!(%player, error = %e, "registration failed");
            error_response(&e.to_string(), StatusCode::BAD_GATEWAY)
        }
    }
}

/// GET /api/v1/players/:player_id/ready
pub async fn player_ready(
    State(state): State<ApiState>,
    Path(player_id): Path<String>,
) -> Response {
    let player = match parse_player(&state, player_id) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let ready = state.lifecycle.is_ready(&player).await;
    ApiResponse::ok(Readiness { player, ready }).into_response()
}

/// GET /api/v1/players/:player_id/enter
///
/// 302 to the player's cabinet once ready, 202 while the caller should keep
/// waiting.
pub async fn enter_player(
    State(state): State<ApiState>,
    Path(player_id): Path<String>,
) -> Response {
    let player = match parse_player(&state, player_id) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    if !state.lifecycle.is_ready(&player).await {
        return (
            StatusCode::ACCEPTED,
            ApiResponse::ok(Readiness {
                player,
                ready: false,
            }),
        )
            .into_response();
    }

    match state.lifecycle.player_url(&player) {
        Some(url) => (StatusCode::FOUND, [(header::LOCATION, url)]).into_response(),
        None => error_response("ingress host is not configured", StatusCode::SERVICE_UNAVAILABLE),
    }
}

/// ANY /player/:player_id/*rest
pub async fn proxy_player(
    State(state): State<ApiState>,
    Path(params): Path<HashMap<String, String>>,
    req: Request,
) -> Response {
    let raw = params.get("player_id").cloned().unwrap_or_default();
    let player = match parse_player(&state, raw) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    state.proxy.forward(&player, req).await
}
