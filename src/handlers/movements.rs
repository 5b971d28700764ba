// src/handlers/movements.rs

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    models::ledger::{BalanceView, Movement, MovementFilter, MovementPage, MovementRequest},
};

// ---
// Handler: submit_movement
// ---
#[utoipa::path(
    post,
    path = "/api/movements",
    tag = "Movimentações",
    request_body = MovementRequest,
    responses(
        (status = 201, description = "Movimentação aplicada e registrada", body = Movement),
        (status = 400, description = "Quantidade ou par de locais inválido"),
        (status = 404, description = "Produto ou local inexistente"),
        (status = 409, description = "Estoque insuficiente ou conflito concorrente"),
        (status = 503, description = "Armazenamento indisponível (pode repetir)")
    )
)]
pub async fn submit_movement(
    State(app_state): State<AppState>,
    payload: Result<Json<MovementRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let movement = app_state.movement_service.submit(&payload).await?;

    Ok((StatusCode::CREATED, Json(movement)))
}

// ---
// Handler: list_movements
// ---
#[utoipa::path(
    get,
    path = "/api/movements",
    tag = "Movimentações",
    params(MovementFilter),
    responses(
        (status = 200, description = "Página do histórico", body = MovementPage)
    )
)]
pub async fn list_movements(
    State(app_state): State<AppState>,
    Query(filter): Query<MovementFilter>,
) -> Result<impl IntoResponse, AppError> {
    let page = app_state.movement_service.list_movements(&filter).await?;
    Ok((StatusCode::OK, Json(page)))
}

// ---
// Handler: read_balance
// ---
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BalanceParams {
    /// Sem local, devolve o total e a quebra por local.
    pub location_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/balances/{product_id}",
    tag = "Movimentações",
    params(
        ("product_id" = Uuid, Path, description = "ID do produto"),
        BalanceParams
    ),
    responses(
        (status = 200, description = "Saldo do par ou total por local", body = BalanceView),
        (status = 404, description = "Produto ou local inexistente")
    )
)]
pub async fn read_balance(
    State(app_state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(params): Query<BalanceParams>,
) -> Result<impl IntoResponse, AppError> {
    let view = app_state
        .movement_service
        .read_balance(product_id, params.location_id)
        .await?;
    Ok((StatusCode::OK, Json(view)))
}
