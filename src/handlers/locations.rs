// src/handlers/locations.rs

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
    models::catalog::{Location, LocationUpdate, NewLocation},
};

#[utoipa::path(
    post,
    path = "/api/locations",
    tag = "Locais",
    request_body = NewLocation,
    responses(
        (status = 201, description = "Local criado", body = Location),
        (status = 409, description = "Código já existe")
    )
)]
pub async fn create_location(
    State(app_state): State<AppState>,
    payload: Result<Json<NewLocation>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let location = app_state.catalog_service.create_location(&payload).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

#[utoipa::path(
    get,
    path = "/api/locations",
    tag = "Locais",
    responses((status = 200, description = "Locais, por código", body = Vec<Location>))
)]
pub async fn list_locations(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let locations = app_state.catalog_service.list_locations().await?;
    Ok((StatusCode::OK, Json(locations)))
}

#[utoipa::path(
    get,
    path = "/api/locations/{id}",
    tag = "Locais",
    params(("id" = Uuid, Path, description = "ID do local")),
    responses(
        (status = 200, description = "Local", body = Location),
        (status = 404, description = "Não encontrado")
    )
)]
pub async fn get_location(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let location = app_state.catalog_service.get_location(id).await?;
    Ok((StatusCode::OK, Json(location)))
}

#[utoipa::path(
    patch,
    path = "/api/locations/{id}",
    tag = "Locais",
    params(("id" = Uuid, Path, description = "ID do local")),
    request_body = LocationUpdate,
    responses(
        (status = 200, description = "Local atualizado", body = Location),
        (status = 400, description = "Campo desconhecido ou nenhum campo informado"),
        (status = 404, description = "Não encontrado")
    )
)]
pub async fn update_location(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<LocationUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let location = app_state.catalog_service.update_location(id, &payload).await?;
    Ok((StatusCode::OK, Json(location)))
}

// Sem cascade: histórico de transferência é compartilhado com outro local.
#[utoipa::path(
    delete,
    path = "/api/locations/{id}",
    tag = "Locais",
    params(("id" = Uuid, Path, description = "ID do local")),
    responses(
        (status = 204, description = "Removido"),
        (status = 404, description = "Não encontrado"),
        (status = 409, description = "Local com saldo ou movimentações")
    )
)]
pub async fn delete_location(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.catalog_service.delete_location(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
