// src/db/memory_store.rs

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{CatalogStore, LedgerStore, LedgerTx},
    models::{
        catalog::{
            Location, LocationUpdate, NewLocation, NewOperator, NewProduct, Operator,
            OperatorUpdate, Product, ProductUpdate,
        },
        ledger::{
            Balance, LocationBalance, Movement, MovementFilter, MovementOrder, NewMovement,
            StockSnapshot, TimeWindow,
        },
    },
};

/// Ponto de falha injetável, consumido pela próxima transação aberta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// Falha na N-ésima chamada (1 = primeira) de `apply_delta`.
    ApplyDelta(usize),
    AppendMovement,
    Commit,
}

#[derive(Debug, Default)]
struct LedgerState {
    products: BTreeMap<Uuid, Product>,
    locations: BTreeMap<Uuid, Location>,
    operators: BTreeMap<Uuid, Operator>,
    balances: BTreeMap<(Uuid, Uuid), Balance>,
    movements: Vec<Movement>,
    last_movement_id: i64,
}

impl LedgerState {
    fn usage_counts(&self, id: Uuid, of_product: bool) -> (usize, usize) {
        let stocked = self
            .balances
            .values()
            .filter(|b| if of_product { b.product_id == id } else { b.location_id == id })
            .filter(|b| !b.quantity.is_zero())
            .count();
        let movements = self
            .movements
            .iter()
            .filter(|m| if of_product { m.product_id == id } else { m.touches_location(id) })
            .count();
        (stocked, movements)
    }
}

/// Backend em memória para desenvolvimento e testes.
///
/// Uma transação segura o mutex até o commit (ou até ser descartada), então
/// transações são serializadas. Os saldos são alterados no lugar e o valor
/// anterior de cada linha vai para um log de desfazer.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<LedgerState>>,
    failpoint: Arc<StdMutex<Option<FailPoint>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arma uma falha para a próxima transação (uma vez só).
    pub fn inject_failure(&self, point: FailPoint) {
        if let Ok(mut slot) = self.failpoint.lock() {
            *slot = Some(point);
        }
    }

    fn take_failpoint(&self) -> Option<FailPoint> {
        self.failpoint.lock().ok().and_then(|mut slot| slot.take())
    }
}

pub struct InMemoryTx {
    guard: OwnedMutexGuard<LedgerState>,
    // Valor anterior da linha em cada escrita desta transação.
    undo: Vec<((Uuid, Uuid), Option<Balance>)>,
    // Lançamentos só entram no histórico no commit.
    appended: Vec<Movement>,
    failpoint: Option<FailPoint>,
    delta_calls: usize,
}

// Sem commit, desfaz as escritas na ordem inversa.
impl Drop for InMemoryTx {
    fn drop(&mut self) {
        while let Some((key, previous)) = self.undo.pop() {
            match previous {
                Some(balance) => {
                    self.guard.balances.insert(key, balance);
                }
                None => {
                    self.guard.balances.remove(&key);
                }
            }
        }
    }
}

fn injected(point: FailPoint) -> AppError {
    AppError::StorageUnavailable(format!("falha injetada em {point:?}"))
}

#[async_trait]
impl LedgerTx for InMemoryTx {
    async fn product_exists(&mut self, product_id: Uuid) -> Result<bool, AppError> {
        Ok(self.guard.products.contains_key(&product_id))
    }

    async fn location_exists(&mut self, location_id: Uuid) -> Result<bool, AppError> {
        Ok(self.guard.locations.contains_key(&location_id))
    }

    async fn operator_active(&mut self, username: &str) -> Result<bool, AppError> {
        Ok(self.guard.operators.values().any(|o| o.username == username && o.active))
    }

    async fn lock_balance(&mut self, product_id: Uuid, location_id: Uuid) -> Result<Decimal, AppError> {
        // O mutex da transação já é o lock.
        Ok(self
            .guard
            .balances
            .get(&(product_id, location_id))
            .map(|b| b.quantity)
            .unwrap_or(Decimal::ZERO))
    }

    async fn apply_delta(
        &mut self,
        product_id: Uuid,
        location_id: Uuid,
        delta: Decimal,
    ) -> Result<Balance, AppError> {
        self.delta_calls += 1;
        if let Some(FailPoint::ApplyDelta(n)) = self.failpoint {
            if n == self.delta_calls {
                return Err(injected(FailPoint::ApplyDelta(n)));
            }
        }

        let key = (product_id, location_id);
        let previous = self.guard.balances.get(&key).cloned();
        let current = previous.as_ref().map(|b| b.quantity).unwrap_or(Decimal::ZERO);
        let next = current + delta;
        if next < Decimal::ZERO {
            return Err(AppError::InsufficientStock {
                product_id,
                location_id,
                requested: -delta,
                available: Some(current),
            });
        }

        let balance = Balance { product_id, location_id, quantity: next, updated_at: Utc::now() };
        self.undo.push((key, previous));
        self.guard.balances.insert(key, balance.clone());
        Ok(balance)
    }

    async fn append_movement(&mut self, movement: &NewMovement) -> Result<Movement, AppError> {
        if self.failpoint == Some(FailPoint::AppendMovement) {
            return Err(injected(FailPoint::AppendMovement));
        }

        let row = Movement {
            id: self.guard.last_movement_id + self.appended.len() as i64 + 1,
            kind: movement.parties.kind(),
            product_id: movement.product_id,
            quantity: movement.quantity,
            source_location_id: movement.parties.source(),
            destination_location_id: movement.parties.destination(),
            actor: movement.actor.clone(),
            external_ref: movement.external_ref.clone(),
            occurred_at: movement.occurred_at.unwrap_or_else(Utc::now),
        };
        self.appended.push(row.clone());
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        if self.failpoint == Some(FailPoint::Commit) {
            // `self` cai aqui e o Drop desfaz tudo.
            return Err(injected(FailPoint::Commit));
        }
        let mut tx = *self;
        tx.undo.clear();
        let appended = std::mem::take(&mut tx.appended);
        if let Some(last) = appended.last() {
            tx.guard.last_movement_id = last.id;
        }
        tx.guard.movements.extend(appended);
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(InMemoryTx {
            guard,
            undo: Vec::new(),
            appended: Vec::new(),
            failpoint: self.take_failpoint(),
            delta_calls: 0,
        }))
    }

    async fn balance(&self, product_id: Uuid, location_id: Uuid) -> Result<Decimal, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .balances
            .get(&(product_id, location_id))
            .map(|b| b.quantity)
            .unwrap_or(Decimal::ZERO))
    }

    async fn balances_for_product(&self, product_id: Uuid) -> Result<Vec<LocationBalance>, AppError> {
        let state = self.state.lock().await;
        let mut rows: Vec<LocationBalance> = state
            .balances
            .values()
            .filter(|b| b.product_id == product_id)
            .filter_map(|b| {
                state.locations.get(&b.location_id).map(|l| LocationBalance {
                    location_id: b.location_id,
                    location_code: l.code.clone(),
                    description: l.description.clone(),
                    quantity: b.quantity,
                    updated_at: b.updated_at,
                })
            })
            .collect();
        rows.sort_by(|a, b| a.location_code.cmp(&b.location_code));
        Ok(rows)
    }

    async fn list_movements(&self, filter: &MovementFilter) -> Result<Vec<Movement>, AppError> {
        let state = self.state.lock().await;

        // Cursor que não existe mais (produto excluído) encerra a sequência, como no SQL.
        let after = match filter.cursor {
            Some(cursor) => match state.movements.iter().find(|m| m.id == cursor) {
                Some(m) => Some(m.order_key()),
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        let mut rows: Vec<&Movement> = state
            .movements
            .iter()
            .filter(|m| filter.matches(m))
            .filter(|m| match (after, filter.order) {
                (Some(key), MovementOrder::Newest) => m.order_key() < key,
                (Some(key), MovementOrder::Oldest) => m.order_key() > key,
                (None, _) => true,
            })
            .collect();
        match filter.order {
            MovementOrder::Newest => rows.sort_by(|a, b| b.order_key().cmp(&a.order_key())),
            MovementOrder::Oldest => rows.sort_by_key(|m| m.order_key()),
        }

        let limit = filter.effective_limit() as usize;
        Ok(rows.into_iter().take(limit).cloned().collect())
    }

    async fn stock_snapshot(&self, window: Option<TimeWindow>) -> Result<StockSnapshot, AppError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        let mut locations: Vec<Location> = state.locations.values().cloned().collect();
        locations.sort_by(|a, b| a.code.cmp(&b.code));
        let movements_in_window = window
            .map(|(from, to)| {
                state
                    .movements
                    .iter()
                    .filter(|m| m.occurred_at >= from && m.occurred_at < to)
                    .count() as i64
            })
            .unwrap_or(0);
        Ok(StockSnapshot {
            products,
            locations,
            balances: state.balances.values().cloned().collect(),
            movements_in_window,
        })
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn create_product(&self, new: &NewProduct) -> Result<Product, AppError> {
        let mut state = self.state.lock().await;
        if state.products.values().any(|p| p.barcode == new.barcode) {
            return Err(AppError::DuplicateBarcode(new.barcode.clone()));
        }
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            barcode: new.barcode.clone(),
            name: new.name.clone(),
            description: new.description.clone(),
            unit_of_measure: new.unit_of_measure.clone(),
            unit_value: new.unit_value,
            category: new.category.clone(),
            supplier: new.supplier.clone(),
            min_stock: new.min_stock,
            primary_location: new.primary_location.clone(),
            created_at: now,
            updated_at: now,
        };
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn find_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>, AppError> {
        let state = self.state.lock().await;
        Ok(state.products.values().find(|p| p.barcode == barcode).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn update_product(&self, id: Uuid, update: &ProductUpdate) -> Result<Option<Product>, AppError> {
        let mut state = self.state.lock().await;
        if let Some(barcode) = &update.barcode {
            if state.products.values().any(|p| p.id != id && &p.barcode == barcode) {
                return Err(AppError::DuplicateBarcode(barcode.clone()));
            }
        }
        let Some(product) = state.products.get_mut(&id) else {
            return Ok(None);
        };
        update.apply_to(product);
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, id: Uuid, cascade: bool) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if !state.products.contains_key(&id) {
            return Err(AppError::product_not_found(id));
        }
        if !cascade {
            let (stocked, movements) = state.usage_counts(id, true);
            if stocked > 0 {
                return Err(AppError::InUse(format!("produto {id} ainda tem saldo em {stocked} local(is)")));
            }
            if movements > 0 {
                return Err(AppError::InUse(format!("produto {id} tem {movements} movimentação(ões)")));
            }
        }
        state.balances.retain(|(product_id, _), _| *product_id != id);
        state.movements.retain(|m| m.product_id != id);
        state.products.remove(&id);
        Ok(())
    }

    async fn create_location(&self, new: &NewLocation) -> Result<Location, AppError> {
        let mut state = self.state.lock().await;
        if state.locations.values().any(|l| l.code == new.code) {
            return Err(AppError::DuplicateLocationCode(new.code.clone()));
        }
        let location = Location {
            id: Uuid::new_v4(),
            code: new.code.clone(),
            description: new.description.clone(),
            kind: new.kind.clone(),
            warehouse: new.warehouse.clone(),
            level: new.level.clone(),
            created_at: Utc::now(),
        };
        state.locations.insert(location.id, location.clone());
        Ok(location)
    }

    async fn get_location(&self, id: Uuid) -> Result<Option<Location>, AppError> {
        Ok(self.state.lock().await.locations.get(&id).cloned())
    }

    async fn list_locations(&self) -> Result<Vec<Location>, AppError> {
        let state = self.state.lock().await;
        let mut locations: Vec<Location> = state.locations.values().cloned().collect();
        locations.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(locations)
    }

    async fn update_location(&self, id: Uuid, update: &LocationUpdate) -> Result<Option<Location>, AppError> {
        let mut state = self.state.lock().await;
        if let Some(code) = &update.code {
            if state.locations.values().any(|l| l.id != id && &l.code == code) {
                return Err(AppError::DuplicateLocationCode(code.clone()));
            }
        }
        let Some(location) = state.locations.get_mut(&id) else {
            return Ok(None);
        };
        update.apply_to(location);
        Ok(Some(location.clone()))
    }

    async fn delete_location(&self, id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if !state.locations.contains_key(&id) {
            return Err(AppError::location_not_found(id));
        }
        let (stocked, movements) = state.usage_counts(id, false);
        if stocked > 0 {
            return Err(AppError::InUse(format!("local {id} ainda tem saldo de {stocked} produto(s)")));
        }
        if movements > 0 {
            return Err(AppError::InUse(format!("local {id} tem {movements} movimentação(ões)")));
        }
        state.balances.retain(|(_, location_id), _| *location_id != id);
        state.locations.remove(&id);
        Ok(())
    }

    async fn create_operator(&self, new: &NewOperator) -> Result<Operator, AppError> {
        let mut state = self.state.lock().await;
        if state.operators.values().any(|o| o.username == new.username) {
            return Err(AppError::DuplicateOperator(new.username.clone()));
        }
        let operator = Operator {
            id: Uuid::new_v4(),
            username: new.username.clone(),
            full_name: new.full_name.clone(),
            role: new.role.clone(),
            active: true,
            created_at: Utc::now(),
        };
        state.operators.insert(operator.id, operator.clone());
        Ok(operator)
    }

    async fn get_operator(&self, id: Uuid) -> Result<Option<Operator>, AppError> {
        Ok(self.state.lock().await.operators.get(&id).cloned())
    }

    async fn list_operators(&self) -> Result<Vec<Operator>, AppError> {
        let state = self.state.lock().await;
        let mut operators: Vec<Operator> = state.operators.values().cloned().collect();
        operators.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(operators)
    }

    async fn update_operator(&self, id: Uuid, update: &OperatorUpdate) -> Result<Option<Operator>, AppError> {
        let mut state = self.state.lock().await;
        let Some(operator) = state.operators.get_mut(&id) else {
            return Ok(None);
        };
        update.apply_to(operator);
        Ok(Some(operator.clone()))
    }

    async fn deactivate_operator(&self, id: Uuid) -> Result<Option<Operator>, AppError> {
        let mut state = self.state.lock().await;
        let Some(operator) = state.operators.get_mut(&id) else {
            return Ok(None);
        };
        operator.active = false;
        Ok(Some(operator.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ledger::MovementParties;

    async fn seeded() -> (InMemoryStore, Uuid, Uuid) {
        let store = InMemoryStore::new();
        let product = store
            .create_product(&NewProduct {
                barcode: "PROD010".into(),
                name: "Grampeador".into(),
                description: None,
                unit_of_measure: "UN".into(),
                unit_value: Decimal::from(12),
                category: None,
                supplier: None,
                min_stock: Decimal::ZERO,
                primary_location: None,
            })
            .await
            .unwrap()
            .id;
        let location = store
            .create_location(&NewLocation {
                code: "C3-02".into(),
                description: None,
                kind: None,
                warehouse: None,
                level: None,
            })
            .await
            .unwrap()
            .id;
        (store, product, location)
    }

    fn receipt(product_id: Uuid, destination: Uuid, quantity: i64) -> NewMovement {
        NewMovement {
            product_id,
            quantity: Decimal::from(quantity),
            parties: MovementParties::Receipt { destination },
            actor: "operador".into(),
            external_ref: None,
            occurred_at: None,
        }
    }

    #[tokio::test]
    async fn negative_delta_without_row_is_insufficient_stock() {
        let (store, product, location) = seeded().await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.apply_delta(product, location, Decimal::from(-1)).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientStock { available: Some(a), .. } if a.is_zero()
        ));
        drop(tx);

        assert_eq!(store.balance(product, location).await.unwrap(), Decimal::ZERO);
        assert!(store.balances_for_product(product).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overdraw_is_rejected_and_dropping_the_tx_restores_rows() {
        let (store, product, location) = seeded().await;

        let mut tx = store.begin().await.unwrap();
        tx.apply_delta(product, location, Decimal::from(5)).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let partial = tx.apply_delta(product, location, Decimal::from(-2)).await.unwrap();
        assert_eq!(partial.quantity, Decimal::from(3));
        let err = tx.apply_delta(product, location, Decimal::from(-4)).await.unwrap_err();
        match err {
            AppError::InsufficientStock { requested, available, .. } => {
                assert_eq!(requested, Decimal::from(4));
                assert_eq!(available, Some(Decimal::from(3)));
            }
            other => panic!("esperava InsufficientStock, veio {other:?}"),
        }
        drop(tx);

        assert_eq!(store.balance(product, location).await.unwrap(), Decimal::from(5));
    }

    #[tokio::test]
    async fn failed_commit_leaves_no_trace() {
        let (store, product, location) = seeded().await;

        store.inject_failure(FailPoint::Commit);
        let mut tx = store.begin().await.unwrap();
        tx.apply_delta(product, location, Decimal::from(7)).await.unwrap();
        tx.append_movement(&receipt(product, location, 7)).await.unwrap();
        assert!(tx.commit().await.is_err());

        assert_eq!(store.balance(product, location).await.unwrap(), Decimal::ZERO);
        assert!(store.list_movements(&MovementFilter::default()).await.unwrap().is_empty());

        // O id não foi consumido pela transação desfeita.
        let mut tx = store.begin().await.unwrap();
        tx.apply_delta(product, location, Decimal::from(2)).await.unwrap();
        let row = tx.append_movement(&receipt(product, location, 2)).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(row.id, 1);
    }

    #[tokio::test]
    async fn inactive_operator_is_not_active() {
        let (store, _, _) = seeded().await;
        let operator = store
            .create_operator(&NewOperator { username: "maria".into(), full_name: "Maria".into(), role: None })
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.operator_active("maria").await.unwrap());
        assert!(!tx.operator_active("ninguem").await.unwrap());
        drop(tx);

        store.deactivate_operator(operator.id).await.unwrap();
        let mut tx = store.begin().await.unwrap();
        assert!(!tx.operator_active("maria").await.unwrap());
    }
}
