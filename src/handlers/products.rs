// src/handlers/products.rs

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    models::{
        catalog::{NewProduct, Product, ProductUpdate},
        dashboard::ProductStock,
    },
};

#[utoipa::path(
    post,
    path = "/api/products",
    tag = "Produtos",
    request_body = NewProduct,
    responses(
        (status = 201, description = "Produto criado", body = Product),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "Código de barras já existe")
    )
)]
pub async fn create_product(
    State(app_state): State<AppState>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let product = app_state.catalog_service.create_product(&payload).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[utoipa::path(
    get,
    path = "/api/products",
    tag = "Produtos",
    responses(
        (status = 200, description = "Produtos, por nome", body = Vec<Product>)
    )
)]
pub async fn list_products(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let products = app_state.catalog_service.list_products().await?;
    Ok((StatusCode::OK, Json(products)))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    tag = "Produtos",
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 200, description = "Produto", body = Product),
        (status = 404, description = "Não encontrado")
    )
)]
pub async fn get_product(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let product = app_state.catalog_service.get_product(id).await?;
    Ok((StatusCode::OK, Json(product)))
}

// Campos desconhecidos (ex: "stock") caem no JsonRejection -> 400.
#[utoipa::path(
    patch,
    path = "/api/products/{id}",
    tag = "Produtos",
    params(("id" = Uuid, Path, description = "ID do produto")),
    request_body = ProductUpdate,
    responses(
        (status = 200, description = "Produto atualizado", body = Product),
        (status = 400, description = "Campo desconhecido ou nenhum campo informado"),
        (status = 404, description = "Não encontrado")
    )
)]
pub async fn update_product(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ProductUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let product = app_state.catalog_service.update_product(id, &payload).await?;
    Ok((StatusCode::OK, Json(product)))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteProductParams {
    /// Remove também saldos e histórico do produto.
    #[serde(default)]
    pub cascade: bool,
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    tag = "Produtos",
    params(("id" = Uuid, Path, description = "ID do produto"), DeleteProductParams),
    responses(
        (status = 204, description = "Removido"),
        (status = 404, description = "Não encontrado"),
        (status = 409, description = "Produto com saldo ou histórico (use cascade=true)")
    )
)]
pub async fn delete_product(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteProductParams>,
) -> Result<impl IntoResponse, AppError> {
    app_state.catalog_service.delete_product(id, params.cascade).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Tela do scanner (QR / código de barras)
#[utoipa::path(
    get,
    path = "/api/products/by-barcode/{code}",
    tag = "Produtos",
    params(("code" = String, Path, description = "Código de barras")),
    responses(
        (status = 200, description = "Produto com estoque por local", body = ProductStock),
        (status = 404, description = "Código não cadastrado")
    )
)]
pub async fn get_product_by_barcode(
    State(app_state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let stock = app_state.catalog_service.product_by_barcode(&code).await?;
    Ok((StatusCode::OK, Json(stock)))
}
