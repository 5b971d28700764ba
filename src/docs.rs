// src/docs.rs

use utoipa::OpenApi;
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(title = "WMS Ledger", description = "Livro-razão de movimentações de estoque por local"),
    paths(
        // --- Movimentações ---
        handlers::movements::submit_movement,
        handlers::movements::list_movements,
        handlers::movements::read_balance,

        // --- Dashboard ---
        handlers::dashboard::get_summary,
        handlers::dashboard::get_recent_activity,
        handlers::dashboard::get_low_stock,

        // --- Produtos ---
        handlers::products::create_product,
        handlers::products::list_products,
        handlers::products::get_product,
        handlers::products::update_product,
        handlers::products::delete_product,
        handlers::products::get_product_by_barcode,

        // --- Locais ---
        handlers::locations::create_location,
        handlers::locations::list_locations,
        handlers::locations::get_location,
        handlers::locations::update_location,
        handlers::locations::delete_location,

        // --- Operadores ---
        handlers::operators::create_operator,
        handlers::operators::list_operators,
        handlers::operators::get_operator,
        handlers::operators::update_operator,
        handlers::operators::deactivate_operator,
    ),
    components(
        schemas(
            // --- Ledger ---
            models::ledger::MovementKind,
            models::ledger::Movement,
            models::ledger::MovementRequest,
            models::ledger::MovementOrder,
            models::ledger::MovementPage,
            models::ledger::Balance,
            models::ledger::BalanceView,
            models::ledger::LocationBalance,

            // --- Catálogo ---
            models::catalog::Product,
            models::catalog::NewProduct,
            models::catalog::ProductUpdate,
            models::catalog::Location,
            models::catalog::NewLocation,
            models::catalog::LocationUpdate,
            models::catalog::Operator,
            models::catalog::NewOperator,
            models::catalog::OperatorUpdate,

            // --- DASHBOARD ---
            models::dashboard::DashboardSummary,
            models::dashboard::LowStockEntry,
            models::dashboard::RecentActivityEntry,
            models::dashboard::ProductStock,
        )
    ),
    tags(
        (name = "Movimentações", description = "Entradas, saídas, transferências e saldos"),
        (name = "Produtos", description = "Catálogo de produtos e consulta por código de barras"),
        (name = "Locais", description = "Endereços físicos do armazém"),
        (name = "Operadores", description = "Quem registra as movimentações"),
        (name = "Dashboard", description = "Indicadores derivados dos saldos e do histórico")
    )
)]
pub struct ApiDoc;
