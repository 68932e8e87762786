use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::loadviz::layout::{LayoutMode, RenderContext, build_load_map};
use crate::loadviz::snapshot::Resource;
use crate::models::views;

#[derive(Debug, Default, Deserialize)]
pub struct LoadMapParams {
    pub resource: Option<Resource>,
    pub mode: Option<LayoutMode>,
}

pub async fn handle_load_map(
    State(state): State<AppState>,
    Query(params): Query<LoadMapParams>,
) -> Response {
    let Some(snapshot) = state.poller.snapshot().await else {
        return no_snapshot();
    };

    let render = &state.config.render;
    let ctx = RenderContext {
        resource: params.resource.unwrap_or(render.resource),
        mode: params.mode.unwrap_or(render.layout_mode),
        node_side: render.node_side,
        drawing_area_width: render.drawing_area_width,
        scheme: render.heatmap,
    };

    let map = build_load_map(&snapshot, &ctx);
    let mut view = views::LoadMapView::from_map(map, ctx.resource, snapshot.taken_at);
    // carry snapshot-build warnings alongside the layout ones
    view.warnings.extend(snapshot.warnings.iter().cloned());

    Json(view).into_response()
}

pub async fn handle_nodes(State(state): State<AppState>) -> Response {
    let Some(snapshot) = state.poller.snapshot().await else {
        return no_snapshot();
    };
    Json(views::cluster_summary(&snapshot)).into_response()
}

pub async fn handle_namespaces(State(state): State<AppState>) -> Response {
    let Some(snapshot) = state.poller.snapshot().await else {
        return no_snapshot();
    };
    Json(views::namespace_usage(&snapshot)).into_response()
}

pub async fn handle_healthz(State(state): State<AppState>) -> Response {
    let loaded = state.poller.snapshot().await.is_some();
    Json(json!({
        "status": "ok",
        "snapshot_loaded": loaded,
    }))
    .into_response()
}

fn no_snapshot() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({"error": "no metrics snapshot loaded yet"})),
    )
        .into_response()
}
