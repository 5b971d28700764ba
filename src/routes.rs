// src/routes.rs

use axum::{
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers};

pub fn router(app_state: AppState) -> Router {
    let movement_routes = Router::new()
        .route("/"
               ,post(handlers::movements::submit_movement)
               .get(handlers::movements::list_movements)
        );

    let balance_routes = Router::new()
        .route("/{product_id}", get(handlers::movements::read_balance));

    let dashboard_routes = Router::new()
        .route("/stats", get(handlers::dashboard::get_summary))
        .route("/recent-activity", get(handlers::dashboard::get_recent_activity));

    // Rotas fixas (low-stock, by-barcode) têm prioridade sobre /{id}.
    let product_routes = Router::new()
        .route("/"
               ,post(handlers::products::create_product)
               .get(handlers::products::list_products)
        )
        .route("/low-stock", get(handlers::dashboard::get_low_stock))
        .route("/by-barcode/{code}", get(handlers::products::get_product_by_barcode))
        .route("/{id}"
               ,get(handlers::products::get_product)
               .patch(handlers::products::update_product)
               .delete(handlers::products::delete_product)
        );

    let location_routes = Router::new()
        .route("/"
               ,post(handlers::locations::create_location)
               .get(handlers::locations::list_locations)
        )
        .route("/{id}"
               ,get(handlers::locations::get_location)
               .patch(handlers::locations::update_location)
               .delete(handlers::locations::delete_location)
        );

    let operator_routes = Router::new()
        .route("/"
               ,post(handlers::operators::create_operator)
               .get(handlers::operators::list_operators)
        )
        .route("/{id}"
               ,get(handlers::operators::get_operator)
               .patch(handlers::operators::update_operator)
               .delete(handlers::operators::deactivate_operator)
        );

    // Combina tudo no router principal
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/movements", movement_routes)
        .nest("/api/balances", balance_routes)
        .nest("/api/dashboard", dashboard_routes)
        .nest("/api/products", product_routes)
        .nest("/api/locations", location_routes)
        .nest("/api/operators", operator_routes)
        .with_state(app_state)
}
