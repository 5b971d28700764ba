// src/handlers/operators.rs

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    models::catalog::{NewOperator, Operator, OperatorUpdate},
};

#[utoipa::path(
    post,
    path = "/api/operators",
    tag = "Operadores",
    request_body = NewOperator,
    responses(
        (status = 201, description = "Operador criado", body = Operator),
        (status = 409, description = "Nome de usuário já existe")
    )
)]
pub async fn create_operator(
    State(app_state): State<AppState>,
    payload: Result<Json<NewOperator>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let operator = app_state.catalog_service.create_operator(&payload).await?;
    Ok((StatusCode::CREATED, Json(operator)))
}

#[utoipa::path(
    get,
    path = "/api/operators",
    tag = "Operadores",
    responses((status = 200, description = "Operadores, ativos e inativos", body = Vec<Operator>))
)]
pub async fn list_operators(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let operators = app_state.catalog_service.list_operators().await?;
    Ok((StatusCode::OK, Json(operators)))
}

#[utoipa::path(
    get,
    path = "/api/operators/{id}",
    tag = "Operadores",
    params(("id" = Uuid, Path, description = "ID do operador")),
    responses(
        (status = 200, description = "Operador", body = Operator),
        (status = 404, description = "Não encontrado")
    )
)]
pub async fn get_operator(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let operator = app_state.catalog_service.get_operator(id).await?;
    Ok((StatusCode::OK, Json(operator)))
}

#[utoipa::path(
    patch,
    path = "/api/operators/{id}",
    tag = "Operadores",
    params(("id" = Uuid, Path, description = "ID do operador")),
    request_body = OperatorUpdate,
    responses(
        (status = 200, description = "Operador atualizado", body = Operator),
        (status = 400, description = "Campo desconhecido (o username não muda) ou nenhum campo informado"),
        (status = 404, description = "Não encontrado")
    )
)]
pub async fn update_operator(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<OperatorUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let operator = app_state.catalog_service.update_operator(id, &payload).await?;
    Ok((StatusCode::OK, Json(operator)))
}

// DELETE só desativa: as movimentações continuam referenciando o operador.
#[utoipa::path(
    delete,
    path = "/api/operators/{id}",
    tag = "Operadores",
    params(("id" = Uuid, Path, description = "ID do operador")),
    responses(
        (status = 200, description = "Operador desativado", body = Operator),
        (status = 404, description = "Não encontrado")
    )
)]
pub async fn deactivate_operator(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let operator = app_state.catalog_service.deactivate_operator(id).await?;
    Ok((StatusCode::OK, Json(operator)))
}
