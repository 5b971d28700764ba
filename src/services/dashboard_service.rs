// src/services/dashboard_service.rs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::LedgerStore,
    models::{
        dashboard::{DashboardSummary, LowStockEntry, RecentActivityEntry},
        ledger::{MovementFilter, MovementOrder, StockSnapshot, TimeWindow},
    },
};

pub const DEFAULT_RECENT_ACTIVITY: u32 = 5;

// ---
// Agregações puras sobre uma fotografia
// ---

// Valores são limitados a 10^14 na entrada, mas somas de muitos saldos
// ainda podem passar do que um Decimal representa.
fn overflow(what: &str) -> AppError {
    AppError::InternalServerError(anyhow::anyhow!("estouro numérico ao calcular {what}"))
}

/// Σ quantidade × valor unitário, linha a linha.
pub fn valued_stock_by_row(snapshot: &StockSnapshot) -> Result<Decimal, AppError> {
    let unit_values: HashMap<Uuid, Decimal> =
        snapshot.products.iter().map(|p| (p.id, p.unit_value)).collect();
    snapshot.balances.iter().try_fold(Decimal::ZERO, |acc, b| {
        let unit_value = unit_values.get(&b.product_id).copied().unwrap_or(Decimal::ZERO);
        b.quantity
            .checked_mul(unit_value)
            .and_then(|value| acc.checked_add(value))
            .ok_or_else(|| overflow("o estoque valorizado"))
    })
}

/// Mesmo total, agrupando a quantidade por produto antes de multiplicar.
pub fn valued_stock_by_product(snapshot: &StockSnapshot) -> Result<Decimal, AppError> {
    let totals = totals_by_product(snapshot)?;
    snapshot.products.iter().try_fold(Decimal::ZERO, |acc, p| {
        let total = totals.get(&p.id).copied().unwrap_or(Decimal::ZERO);
        total
            .checked_mul(p.unit_value)
            .and_then(|value| acc.checked_add(value))
            .ok_or_else(|| overflow("o estoque valorizado"))
    })
}

fn totals_by_product(snapshot: &StockSnapshot) -> Result<HashMap<Uuid, Decimal>, AppError> {
    let mut totals: HashMap<Uuid, Decimal> = HashMap::new();
    for b in &snapshot.balances {
        let total = totals.entry(b.product_id).or_default();
        *total = total
            .checked_add(b.quantity)
            .ok_or_else(|| overflow("o total por produto"))?;
    }
    Ok(totals)
}

/// Produtos cujo total (todos os locais) é ≤ estoque mínimo.
/// Produto sem nenhum saldo conta como 0. Ordem: quantidade, depois nome.
pub fn low_stock(snapshot: &StockSnapshot) -> Result<Vec<LowStockEntry>, AppError> {
    let totals = totals_by_product(snapshot)?;
    let mut entries: Vec<LowStockEntry> = snapshot
        .products
        .iter()
        .filter_map(|p| {
            let total = totals.get(&p.id).copied().unwrap_or(Decimal::ZERO);
            (total <= p.min_stock).then(|| LowStockEntry {
                product_id: p.id,
                product_name: p.name.clone(),
                barcode: p.barcode.clone(),
                total_quantity: total,
                min_stock: p.min_stock,
            })
        })
        .collect();
    entries.sort_by(|a, b| {
        a.total_quantity
            .cmp(&b.total_quantity)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
    Ok(entries)
}

/// Início e fim (exclusivo) do dia corrente no fuso de referência, em UTC.
pub fn day_bounds(now: DateTime<Utc>, offset: FixedOffset) -> TimeWindow {
    let local_midnight = now.with_timezone(&offset).date_naive().and_time(NaiveTime::MIN);
    let start_naive = local_midnight - Duration::seconds(i64::from(offset.local_minus_utc()));
    let start = Utc.from_utc_datetime(&start_naive);
    (start, start + Duration::days(1))
}

#[derive(Clone)]
pub struct DashboardService {
    ledger: Arc<dyn LedgerStore>,
    report_offset: FixedOffset,
}

impl DashboardService {
    pub fn new(ledger: Arc<dyn LedgerStore>, report_offset: FixedOffset) -> Self {
        Self { ledger, report_offset }
    }

    // --- 1. Cards ---
    pub async fn get_summary(&self) -> Result<DashboardSummary, AppError> {
        // Contagem do dia na mesma leitura dos saldos.
        let today = day_bounds(Utc::now(), self.report_offset);
        let snapshot = self.ledger.stock_snapshot(Some(today)).await?;

        Ok(DashboardSummary {
            total_products: snapshot.products.len() as i64,
            total_valued_stock: valued_stock_by_row(&snapshot)?,
            low_stock_count: low_stock(&snapshot)?.len() as i64,
            movements_today: snapshot.movements_in_window,
        })
    }

    // --- 2. Estoque baixo ---
    pub async fn get_low_stock(&self) -> Result<Vec<LowStockEntry>, AppError> {
        let snapshot = self.ledger.stock_snapshot(None).await?;
        low_stock(&snapshot)
    }

    // --- 3. Atividade recente ---
    pub async fn get_recent_activity(&self, limit: Option<u32>) -> Result<Vec<RecentActivityEntry>, AppError> {
        let filter = MovementFilter {
            order: MovementOrder::Newest,
            limit: Some(limit.unwrap_or(DEFAULT_RECENT_ACTIVITY)),
            ..Default::default()
        };
        let movements = self.ledger.list_movements(&filter).await?;
        if movements.is_empty() {
            return Ok(Vec::new());
        }

        // Nomes e códigos para exibição
        let snapshot = self.ledger.stock_snapshot(None).await?;
        let names: HashMap<Uuid, &str> =
            snapshot.products.iter().map(|p| (p.id, p.name.as_str())).collect();
        let codes: HashMap<Uuid, &str> =
            snapshot.locations.iter().map(|l| (l.id, l.code.as_str())).collect();
        let code_of = |id: Option<Uuid>| id.and_then(|id| codes.get(&id).map(|c| c.to_string()));

        Ok(movements
            .into_iter()
            .map(|m| RecentActivityEntry {
                id: m.id,
                kind: m.kind,
                product_name: names
                    .get(&m.product_id)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| m.product_id.to_string()),
                quantity: m.quantity,
                occurred_at: m.occurred_at,
                source_code: code_of(m.source_location_id),
                destination_code: code_of(m.destination_location_id),
                actor: m.actor,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CatalogStore, InMemoryStore};
    use crate::models::catalog::{NewLocation, NewOperator, NewProduct, Product};
    use crate::models::ledger::{Balance, MovementKind, MovementRequest};
    use crate::services::movement_service::MovementService;
    use proptest::prelude::*;

    struct Setup {
        store: InMemoryStore,
        dashboard: DashboardService,
        movements: MovementService,
    }

    async fn setup() -> Setup {
        let store = InMemoryStore::new();
        store
            .create_operator(&NewOperator { username: "operador".into(), full_name: "Operador".into(), role: None })
            .await
            .unwrap();
        let ledger: Arc<dyn LedgerStore> = Arc::new(store.clone());
        let catalog: Arc<dyn CatalogStore> = Arc::new(store.clone());
        Setup {
            dashboard: DashboardService::new(ledger.clone(), FixedOffset::east_opt(0).unwrap()),
            movements: MovementService::new(ledger, catalog),
            store,
        }
    }

    fn new_product(barcode: &str, name: &str, unit_value: i64, min_stock: i64) -> NewProduct {
        NewProduct {
            barcode: barcode.into(),
            name: name.into(),
            description: None,
            unit_of_measure: "UN".into(),
            unit_value: Decimal::from(unit_value),
            category: None,
            supplier: None,
            min_stock: Decimal::from(min_stock),
            primary_location: None,
        }
    }

    fn new_location(code: &str) -> NewLocation {
        NewLocation { code: code.into(), description: None, kind: None, warehouse: None, level: None }
    }

    fn movement(
        kind: MovementKind,
        product_id: Uuid,
        qty: i64,
        source: Option<Uuid>,
        destination: Option<Uuid>,
    ) -> MovementRequest {
        MovementRequest {
            kind,
            product_id,
            quantity: Decimal::from(qty),
            source_location_id: source,
            destination_location_id: destination,
            actor: "operador".into(),
            external_ref: None,
            occurred_at: None,
        }
    }

    #[tokio::test]
    async fn low_stock_entry_clears_after_receipt() {
        let s = setup().await;
        let p = s.store.create_product(&new_product("P-1", "Parafuso", 2, 5)).await.unwrap();
        let a = s.store.create_location(&new_location("A1-01")).await.unwrap();

        s.movements
            .submit(&movement(MovementKind::Receipt, p.id, 1, None, Some(a.id)))
            .await
            .unwrap();
        let low = s.dashboard.get_low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].product_id, p.id);
        assert_eq!(low[0].total_quantity, Decimal::ONE);

        s.movements
            .submit(&movement(MovementKind::Receipt, p.id, 5, None, Some(a.id)))
            .await
            .unwrap();
        assert!(s.dashboard.get_low_stock().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn product_without_balances_is_low_stock() {
        let s = setup().await;
        s.store.create_product(&new_product("P-2", "Zíper", 1, 0)).await.unwrap();
        s.store.create_product(&new_product("P-3", "Arruela", 1, 0)).await.unwrap();

        let low = s.dashboard.get_low_stock().await.unwrap();
        let names: Vec<_> = low.iter().map(|e| e.product_name.as_str()).collect();
        assert_eq!(names, vec!["Arruela", "Zíper"]);
    }

    #[tokio::test]
    async fn summary_counts_and_values_stock() {
        let s = setup().await;
        let p = s.store.create_product(&new_product("P-4", "Cabo", 10, 1)).await.unwrap();
        let q = s.store.create_product(&new_product("P-5", "Fonte", 3, 100)).await.unwrap();
        let a = s.store.create_location(&new_location("A1-01")).await.unwrap();
        let b = s.store.create_location(&new_location("B2-05")).await.unwrap();

        s.movements.submit(&movement(MovementKind::Receipt, p.id, 4, None, Some(a.id))).await.unwrap();
        s.movements
            .submit(&movement(MovementKind::Transfer, p.id, 1, Some(a.id), Some(b.id)))
            .await
            .unwrap();
        s.movements.submit(&movement(MovementKind::Receipt, q.id, 2, None, Some(b.id))).await.unwrap();

        let summary = s.dashboard.get_summary().await.unwrap();
        assert_eq!(summary.total_products, 2);
        assert_eq!(summary.total_valued_stock, Decimal::from(4 * 10 + 2 * 3));
        assert_eq!(summary.low_stock_count, 1);
        assert_eq!(summary.movements_today, 3);
    }

    #[tokio::test]
    async fn recent_activity_resolves_names_and_codes() {
        let s = setup().await;
        let p = s.store.create_product(&new_product("P-6", "Monitor", 1, 0)).await.unwrap();
        let a = s.store.create_location(&new_location("A1-01")).await.unwrap();
        let b = s.store.create_location(&new_location("B2-05")).await.unwrap();
        s.movements.submit(&movement(MovementKind::Receipt, p.id, 3, None, Some(a.id))).await.unwrap();
        s.movements
            .submit(&movement(MovementKind::Transfer, p.id, 2, Some(a.id), Some(b.id)))
            .await
            .unwrap();

        let feed = s.dashboard.get_recent_activity(Some(1)).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].kind, MovementKind::Transfer);
        assert_eq!(feed[0].product_name, "Monitor");
        assert_eq!(feed[0].source_code.as_deref(), Some("A1-01"));
        assert_eq!(feed[0].destination_code.as_deref(), Some("B2-05"));

        let feed = s.dashboard.get_recent_activity(None).await.unwrap();
        assert_eq!(feed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[tokio::test]
    async fn backdated_movement_is_neither_recent_nor_today() {
        let s = setup().await;
        let p = s.store.create_product(&new_product("P-7", "Lacre", 1, 0)).await.unwrap();
        let a = s.store.create_location(&new_location("A1-01")).await.unwrap();
        s.movements.submit(&movement(MovementKind::Receipt, p.id, 1, None, Some(a.id))).await.unwrap();

        let mut late = movement(MovementKind::Receipt, p.id, 2, None, Some(a.id));
        late.occurred_at = Some(Utc::now() - Duration::days(2));
        let late = s.movements.submit(&late).await.unwrap();
        assert_eq!(late.id, 2);

        let feed = s.dashboard.get_recent_activity(None).await.unwrap();
        assert_eq!(feed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2]);

        let summary = s.dashboard.get_summary().await.unwrap();
        assert_eq!(summary.movements_today, 1);
        assert_eq!(summary.total_valued_stock, Decimal::from(3));
    }

    #[tokio::test]
    async fn oversized_unit_value_is_rejected_before_valuation() {
        let s = setup().await;
        let catalog = crate::services::catalog_service::CatalogService::new(
            Arc::new(s.store.clone()),
            Arc::new(s.store.clone()),
        );
        let mut huge = new_product("P-8", "Ouro", 0, 0);
        huge.unit_value = Decimal::from(10_000_000_000_000_000_000u64);
        let err = catalog.create_product(&huge).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn valuation_overflow_is_an_error() {
        let mut rich = product(1, 0);
        rich.unit_value = Decimal::from(10_000_000_000_000_000_000u64);
        let snapshot = StockSnapshot {
            balances: vec![Balance {
                product_id: rich.id,
                location_id: Uuid::from_u128(1000),
                quantity: Decimal::from(10_000_000_000u64),
                updated_at: Utc::now(),
            }],
            products: vec![rich],
            ..Default::default()
        };
        assert_eq!(valued_stock_by_row(&snapshot).unwrap_err().code(), "INTERNAL_ERROR");
        assert_eq!(valued_stock_by_product(&snapshot).unwrap_err().code(), "INTERNAL_ERROR");
    }

    #[test]
    fn day_bounds_follow_reference_offset() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 2, 30, 0).unwrap();

        let (start, end) = day_bounds(now, FixedOffset::east_opt(0).unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).unwrap());

        // 02:30 UTC ainda é dia 9 em UTC-3.
        let (start, _) = day_bounds(now, FixedOffset::west_opt(3 * 3600).unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 9, 3, 0, 0).unwrap());
    }

    // --- Comutatividade da valorização ---
    fn product(id: u128, unit_cents: i64) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::from_u128(id),
            barcode: format!("B{id}"),
            name: format!("Produto {id}"),
            description: None,
            unit_of_measure: "UN".into(),
            unit_value: Decimal::new(unit_cents, 2),
            category: None,
            supplier: None,
            min_stock: Decimal::ZERO,
            primary_location: None,
            created_at: now,
            updated_at: now,
        }
    }

    proptest! {
        #[test]
        fn valuation_is_the_same_grouped_or_per_row(
            prices in proptest::collection::vec(0..1_000_000i64, 1..6),
            rows in proptest::collection::vec((0..6usize, 0..4u128, 0..100_000i64), 0..30),
        ) {
            let products: Vec<Product> =
                prices.iter().enumerate().map(|(i, c)| product(i as u128, *c)).collect();
            let mut balances: HashMap<(Uuid, Uuid), Balance> = HashMap::new();
            for (p, loc, qty) in rows {
                let product_id = products[p % products.len()].id;
                let location_id = Uuid::from_u128(1000 + loc);
                balances.insert((product_id, location_id), Balance {
                    product_id,
                    location_id,
                    quantity: Decimal::new(qty, 1),
                    updated_at: Utc::now(),
                });
            }
            let snapshot = StockSnapshot {
                products,
                balances: balances.into_values().collect(),
                ..Default::default()
            };
            prop_assert_eq!(
                valued_stock_by_row(&snapshot).unwrap(),
                valued_stock_by_product(&snapshot).unwrap()
            );
        }
    }
}
