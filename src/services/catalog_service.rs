// src/services/catalog_service.rs

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::{CatalogStore, LedgerStore},
    models::{
        catalog::{
            Location, LocationUpdate, NewLocation, NewOperator, NewProduct, Operator,
            OperatorUpdate, Product, ProductUpdate,
        },
        dashboard::ProductStock,
    },
};

#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn CatalogStore>,
    ledger: Arc<dyn LedgerStore>,
}

impl CatalogService {
    pub fn new(catalog: Arc<dyn CatalogStore>, ledger: Arc<dyn LedgerStore>) -> Self {
        Self { catalog, ledger }
    }

    // --- PRODUTOS ---
    pub async fn create_product(&self, new: &NewProduct) -> Result<Product, AppError> {
        new.validate()?;
        let product = self.catalog.create_product(new).await?;
        tracing::info!("Produto {} criado (barcode {})", product.id, product.barcode);
        Ok(product)
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Product, AppError> {
        self.catalog
            .get_product(id)
            .await?
            .ok_or_else(|| AppError::product_not_found(id))
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        self.catalog.list_products().await
    }

    /// Nenhum campo de estoque passa por aqui; o comando já rejeita na leitura.
    pub async fn update_product(&self, id: Uuid, update: &ProductUpdate) -> Result<Product, AppError> {
        if update.is_empty() {
            return Err(AppError::EmptyUpdate);
        }
        update.validate()?;
        self.catalog
            .update_product(id, update)
            .await?
            .ok_or_else(|| AppError::product_not_found(id))
    }

    pub async fn delete_product(&self, id: Uuid, cascade: bool) -> Result<(), AppError> {
        self.catalog.delete_product(id, cascade).await?;
        if cascade {
            tracing::warn!("Produto {} removido junto com saldos e histórico", id);
        } else {
            tracing::info!("Produto {} removido", id);
        }
        Ok(())
    }

    /// Tela do scanner: produto + quebra por local.
    pub async fn product_by_barcode(&self, barcode: &str) -> Result<ProductStock, AppError> {
        let product = self
            .catalog
            .find_product_by_barcode(barcode)
            .await?
            .ok_or_else(|| AppError::NotFound { entity: "Produto", reference: barcode.to_string() })?;

        let locations = self.ledger.balances_for_product(product.id).await?;
        let total_quantity = locations.iter().map(|l| l.quantity).sum();
        Ok(ProductStock { product, total_quantity, locations })
    }

    // --- LOCAIS ---
    pub async fn create_location(&self, new: &NewLocation) -> Result<Location, AppError> {
        new.validate()?;
        let location = self.catalog.create_location(new).await?;
        tracing::info!("Local {} criado ({})", location.id, location.code);
        Ok(location)
    }

    pub async fn get_location(&self, id: Uuid) -> Result<Location, AppError> {
        self.catalog
            .get_location(id)
            .await?
            .ok_or_else(|| AppError::location_not_found(id))
    }

    pub async fn list_locations(&self) -> Result<Vec<Location>, AppError> {
        self.catalog.list_locations().await
    }

    pub async fn update_location(&self, id: Uuid, update: &LocationUpdate) -> Result<Location, AppError> {
        if update.is_empty() {
            return Err(AppError::EmptyUpdate);
        }
        update.validate()?;
        self.catalog
            .update_location(id, update)
            .await?
            .ok_or_else(|| AppError::location_not_found(id))
    }

    pub async fn delete_location(&self, id: Uuid) -> Result<(), AppError> {
        self.catalog.delete_location(id).await?;
        tracing::info!("Local {} removido", id);
        Ok(())
    }

    // --- OPERADORES ---
    pub async fn create_operator(&self, new: &NewOperator) -> Result<Operator, AppError> {
        new.validate()?;
        let operator = self.catalog.create_operator(new).await?;
        tracing::info!("Operador {} criado ({})", operator.id, operator.username);
        Ok(operator)
    }

    pub async fn get_operator(&self, id: Uuid) -> Result<Operator, AppError> {
        self.catalog
            .get_operator(id)
            .await?
            .ok_or_else(|| AppError::operator_not_found(id.to_string()))
    }

    pub async fn list_operators(&self) -> Result<Vec<Operator>, AppError> {
        self.catalog.list_operators().await
    }

    pub async fn update_operator(&self, id: Uuid, update: &OperatorUpdate) -> Result<Operator, AppError> {
        if update.is_empty() {
            return Err(AppError::EmptyUpdate);
        }
        update.validate()?;
        self.catalog
            .update_operator(id, update)
            .await?
            .ok_or_else(|| AppError::operator_not_found(id.to_string()))
    }

    /// O histórico continua apontando para o operador; ele só deixa de poder lançar.
    pub async fn deactivate_operator(&self, id: Uuid) -> Result<Operator, AppError> {
        let operator = self
            .catalog
            .deactivate_operator(id)
            .await?
            .ok_or_else(|| AppError::operator_not_found(id.to_string()))?;
        tracing::info!("Operador {} ({}) desativado", operator.id, operator.username);
        Ok(operator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;
    use crate::models::ledger::{MovementKind, MovementRequest};
    use crate::services::movement_service::MovementService;
    use rust_decimal::Decimal;

    async fn services() -> (CatalogService, MovementService) {
        let store = InMemoryStore::new();
        let catalog: Arc<dyn CatalogStore> = Arc::new(store.clone());
        let ledger: Arc<dyn LedgerStore> = Arc::new(store);
        let service = CatalogService::new(catalog.clone(), ledger.clone());
        service.create_operator(&new_operator("recebimento")).await.unwrap();
        (service, MovementService::new(ledger, catalog))
    }

    fn new_operator(username: &str) -> NewOperator {
        NewOperator { username: username.into(), full_name: "Equipe de Recebimento".into(), role: Some("operador".into()) }
    }

    fn new_product(barcode: &str, name: &str) -> NewProduct {
        NewProduct {
            barcode: barcode.into(),
            name: name.into(),
            description: None,
            unit_of_measure: "UN".into(),
            unit_value: Decimal::new(2550, 2),
            category: None,
            supplier: None,
            min_stock: Decimal::from(10),
            primary_location: None,
        }
    }

    fn new_location(code: &str) -> NewLocation {
        NewLocation { code: code.into(), description: None, kind: None, warehouse: None, level: None }
    }

    fn receipt(product_id: Uuid, to: Uuid, qty: i64) -> MovementRequest {
        MovementRequest {
            kind: MovementKind::Receipt,
            product_id,
            quantity: Decimal::from(qty),
            source_location_id: None,
            destination_location_id: Some(to),
            actor: "recebimento".into(),
            external_ref: Some("NF-1001".into()),
            occurred_at: None,
        }
    }

    #[tokio::test]
    async fn duplicate_barcode_is_rejected() {
        let (catalog, _) = services().await;
        catalog.create_product(&new_product("7890001", "Cabo HDMI")).await.unwrap();
        let err = catalog.create_product(&new_product("7890001", "Outro")).await.unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_BARCODE");
    }

    #[tokio::test]
    async fn empty_update_is_rejected_before_lookup() {
        let (catalog, _) = services().await;
        let err = catalog.update_product(Uuid::new_v4(), &ProductUpdate::default()).await.unwrap_err();
        assert!(matches!(err, AppError::EmptyUpdate));

        let update = ProductUpdate { name: Some("Novo".into()), ..Default::default() };
        let err = catalog.update_product(Uuid::new_v4(), &update).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn update_keeps_untouched_fields() {
        let (catalog, _) = services().await;
        let product = catalog.create_product(&new_product("7890002", "Mouse")).await.unwrap();

        let update = ProductUpdate { min_stock: Some(Decimal::from(3)), ..Default::default() };
        let updated = catalog.update_product(product.id, &update).await.unwrap();
        assert_eq!(updated.min_stock, Decimal::from(3));
        assert_eq!(updated.name, "Mouse");
        assert_eq!(updated.unit_value, product.unit_value);
    }

    #[tokio::test]
    async fn product_with_history_needs_cascade() {
        let (catalog, movements) = services().await;
        let product = catalog.create_product(&new_product("7890003", "Teclado")).await.unwrap();
        let loc = catalog.create_location(&new_location("A1-01")).await.unwrap();
        movements.submit(&receipt(product.id, loc.id, 4)).await.unwrap();

        let err = catalog.delete_product(product.id, false).await.unwrap_err();
        assert_eq!(err.code(), "IN_USE");

        // Local também fica protegido pelo histórico.
        let err = catalog.delete_location(loc.id).await.unwrap_err();
        assert_eq!(err.code(), "IN_USE");

        catalog.delete_product(product.id, true).await.unwrap();
        assert_eq!(catalog.get_product(product.id).await.unwrap_err().code(), "NOT_FOUND");

        // Sem saldo nem histórico restantes, o local pode sair.
        catalog.delete_location(loc.id).await.unwrap();
    }

    #[tokio::test]
    async fn barcode_lookup_returns_breakdown() {
        let (catalog, movements) = services().await;
        let product = catalog.create_product(&new_product("7890004", "Monitor")).await.unwrap();
        let a = catalog.create_location(&new_location("A1-01")).await.unwrap();
        let b = catalog.create_location(&new_location("B2-05")).await.unwrap();
        movements.submit(&receipt(product.id, a.id, 7)).await.unwrap();
        movements.submit(&receipt(product.id, b.id, 3)).await.unwrap();

        let stock = catalog.product_by_barcode("7890004").await.unwrap();
        assert_eq!(stock.total_quantity, Decimal::from(10));
        let codes: Vec<_> = stock.locations.iter().map(|l| l.location_code.as_str()).collect();
        assert_eq!(codes, vec!["A1-01", "B2-05"]);

        let err = catalog.product_by_barcode("nao-existe").await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn invalid_payload_fails_validation() {
        let (catalog, _) = services().await;
        let mut bad = new_product("", "Sem código");
        bad.min_stock = Decimal::from(-1);
        let err = catalog.create_product(&bad).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn operators_are_deactivated_not_removed() {
        let (catalog, movements) = services().await;
        let product = catalog.create_product(&new_product("7890005", "Etiqueta")).await.unwrap();
        let loc = catalog.create_location(&new_location("A1-01")).await.unwrap();

        let err = catalog.create_operator(&new_operator("recebimento")).await.unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_OPERATOR");

        let operator = catalog.list_operators().await.unwrap().remove(0);
        movements.submit(&receipt(product.id, loc.id, 2)).await.unwrap();

        let update = OperatorUpdate { role: Some("supervisor".into()), ..Default::default() };
        let updated = catalog.update_operator(operator.id, &update).await.unwrap();
        assert_eq!(updated.role.as_deref(), Some("supervisor"));
        assert!(updated.active);

        let gone = catalog.deactivate_operator(operator.id).await.unwrap();
        assert!(!gone.active);
        assert_eq!(catalog.get_operator(operator.id).await.unwrap().username, "recebimento");

        let err = movements.submit(&receipt(product.id, loc.id, 2)).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        let err = catalog.update_operator(operator.id, &OperatorUpdate::default()).await.unwrap_err();
        assert!(matches!(err, AppError::EmptyUpdate));
        let err = catalog.deactivate_operator(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
