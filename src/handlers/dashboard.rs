// src/handlers/dashboard.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    common::error::AppError,
    config::AppState,
    models::dashboard::{DashboardSummary, LowStockEntry, RecentActivityEntry},
};

// GET /api/dashboard/stats
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Cards do topo: produtos, valor em estoque, alertas e movimentações do dia", body = DashboardSummary)
    )
)]
pub async fn get_summary(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let summary = app_state.dashboard_service.get_summary().await?;
    Ok((StatusCode::OK, Json(summary)))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecentActivityParams {
    /// Padrão: 5
    pub limit: Option<u32>,
}

// GET /api/dashboard/recent-activity
#[utoipa::path(
    get,
    path = "/api/dashboard/recent-activity",
    tag = "Dashboard",
    params(RecentActivityParams),
    responses(
        (status = 200, description = "Últimas movimentações, mais recentes primeiro", body = Vec<RecentActivityEntry>)
    )
)]
pub async fn get_recent_activity(
    State(app_state): State<AppState>,
    Query(params): Query<RecentActivityParams>,
) -> Result<impl IntoResponse, AppError> {
    let feed = app_state.dashboard_service.get_recent_activity(params.limit).await?;
    Ok((StatusCode::OK, Json(feed)))
}

// GET /api/products/low-stock
#[utoipa::path(
    get,
    path = "/api/products/low-stock",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Produtos com total ≤ estoque mínimo", body = Vec<LowStockEntry>)
    )
)]
pub async fn get_low_stock(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let entries = app_state.dashboard_service.get_low_stock().await?;
    Ok((StatusCode::OK, Json(entries)))
}
