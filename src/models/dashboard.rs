// src/models/dashboard.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::ledger::MovementKind;

// 1. Os Cards do Topo
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_products: i64,
    pub total_valued_stock: Decimal, // Σ quantidade × valor unitário
    pub low_stock_count: i64,
    pub movements_today: i64,        // No fuso de referência do servidor
}

// 2. Alertas de estoque baixo
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LowStockEntry {
    pub product_id: Uuid,
    pub product_name: String,
    pub barcode: String,
    pub total_quantity: Decimal,
    pub min_stock: Decimal,
}

// 3. Atividade recente
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivityEntry {
    pub id: i64,
    pub kind: MovementKind,
    pub product_name: String,
    pub quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
    pub source_code: Option<String>,
    pub destination_code: Option<String>,
    pub actor: String,
}

// 4. Consulta por código de barras (tela do scanner)
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductStock {
    pub product: crate::models::catalog::Product,
    pub total_quantity: Decimal,
    pub locations: Vec<crate::models::ledger::LocationBalance>,
}
