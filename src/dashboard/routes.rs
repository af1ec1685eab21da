//! REST bridge between the rendering client and the dashboard controller.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use super::controller::DashboardStateController;
use crate::stages::{ActorType, definitions_for};
use crate::store::StageData;

/// Shared state for dashboard routes.
#[derive(Clone)]
pub struct DashboardRouteState {
    pub controller: Arc<DashboardStateController>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeRequest {
    actor_type: ActorType,
}

/// Build the dashboard REST routes.
pub fn dashboard_routes(controller: Arc<DashboardStateController>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stages/{actor}", get(get_definitions))
        .route("/api/dashboard", get(get_snapshot).delete(teardown))
        .route("/api/dashboard/initialize", post(initialize))
        .route("/api/dashboard/navigate/{stage}", post(navigate))
        .route("/api/dashboard/advance", post(advance))
        .route("/api/dashboard/back", post(go_back))
        .route(
            "/api/dashboard/stages/{stage}",
            put(update_stage).get(get_stage),
        )
        .route("/api/dashboard/stages/{stage}/autosave", post(auto_save))
        .layer(CorsLayer::permissive())
        .with_state(DashboardRouteState { controller })
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "staged-onboarding"
    }))
}

/// GET /api/stages/{actor}
async fn get_definitions(Path(actor): Path<String>) -> impl IntoResponse {
    match actor.parse::<ActorType>() {
        Ok(actor) => Json(serde_json::json!({ "stages": definitions_for(actor) })).into_response(),
        Err(e) => (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": e }))).into_response(),
    }
}

/// GET /api/dashboard
async fn get_snapshot(State(state): State<DashboardRouteState>) -> impl IntoResponse {
    Json(state.controller.snapshot().await)
}

/// POST /api/dashboard/initialize
async fn initialize(
    State(state): State<DashboardRouteState>,
    Json(req): Json<InitializeRequest>,
) -> impl IntoResponse {
    Json(state.controller.initialize(req.actor_type).await)
}

/// POST /api/dashboard/navigate/{stage}
async fn navigate(
    State(state): State<DashboardRouteState>,
    Path(stage): Path<u32>,
) -> impl IntoResponse {
    Json(state.controller.navigate_to_stage(stage).await)
}

async fn advance(State(state): State<DashboardRouteState>) -> impl IntoResponse {
    Json(state.controller.advance().await)
}

async fn go_back(State(state): State<DashboardRouteState>) -> impl IntoResponse {
    Json(state.controller.go_back().await)
}

/// GET /api/dashboard/stages/{stage}
///
/// Always 200; an unreachable backend with no draft yields `{}`.
async fn get_stage(
    State(state): State<DashboardRouteState>,
    Path(stage): Path<u32>,
) -> impl IntoResponse {
    Json(state.controller.get_stage_data(stage).await)
}

/// PUT /api/dashboard/stages/{stage}
async fn update_stage(
    State(state): State<DashboardRouteState>,
    Path(stage): Path<u32>,
    Json(patch): Json<StageData>,
) -> impl IntoResponse {
    match state.controller.update_stage_data(stage, patch).await {
        Some(sync_status) => Json(serde_json::json!({
            "syncStatus": sync_status,
            "state": state.controller.snapshot().await,
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("Unknown stage {stage}") })),
        )
            .into_response(),
    }
}

/// POST /api/dashboard/stages/{stage}/autosave
async fn auto_save(
    State(state): State<DashboardRouteState>,
    Path(stage): Path<u32>,
    Json(data): Json<StageData>,
) -> impl IntoResponse {
    if state.controller.auto_save(stage, data).await {
        StatusCode::ACCEPTED
    } else {
        StatusCode::NOT_FOUND
    }
}

/// DELETE /api/dashboard
async fn teardown(State(state): State<DashboardRouteState>) -> impl IntoResponse {
    state.controller.teardown().await;
    StatusCode::NO_CONTENT
}
