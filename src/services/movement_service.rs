// src/services/movement_service.rs

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::{CatalogStore, LedgerStore},
    models::{
        catalog::MAX_AMOUNT,
        ledger::{
            BalanceView, Movement, MovementFilter, MovementKind, MovementPage, MovementParties,
            MovementRequest, NewMovement,
        },
    },
};

// NUMERIC(18, 4) no banco: mais casas seriam arredondadas silenciosamente.
const MAX_QUANTITY_SCALE: u32 = 4;

// ---
// Validação (regras 1 e 2, sem tocar no banco)
// ---
/// Transforma o pedido numa movimentação validada. O resultado é o que será
/// aplicado e gravado, sem nenhum recálculo posterior.
pub fn validate_request(request: &MovementRequest) -> Result<NewMovement, AppError> {
    // 1. Quantidade
    let quantity = request.quantity.normalize();
    if quantity <= Decimal::ZERO {
        return Err(AppError::InvalidQuantity(format!(
            "a quantidade deve ser positiva (recebido {})",
            request.quantity
        )));
    }
    if quantity.scale() > MAX_QUANTITY_SCALE {
        return Err(AppError::InvalidQuantity(format!(
            "no máximo {MAX_QUANTITY_SCALE} casas decimais (recebido {})",
            request.quantity
        )));
    }
    if quantity >= Decimal::from(MAX_AMOUNT) {
        return Err(AppError::InvalidQuantity(format!("quantidade fora do limite: {}", request.quantity)));
    }

    // 2. Locais exigidos por tipo
    let source = request.source_location_id;
    let destination = request.destination_location_id;
    let parties = match (request.kind, source, destination) {
        (MovementKind::Receipt, None, Some(destination)) => MovementParties::Receipt { destination },
        (MovementKind::Issue, Some(source), None) => MovementParties::Issue { source },
        (MovementKind::Transfer, Some(source), Some(destination)) if source != destination => {
            MovementParties::Transfer { source, destination }
        }
        (MovementKind::Transfer, Some(_), Some(_)) => {
            return Err(AppError::InvalidLocationPair(
                "TRANSFER exige origem e destino diferentes".into(),
            ));
        }
        (MovementKind::Receipt, _, _) => {
            return Err(AppError::InvalidLocationPair("RECEIPT exige apenas o destino".into()));
        }
        (MovementKind::Issue, _, _) => {
            return Err(AppError::InvalidLocationPair("ISSUE exige apenas a origem".into()));
        }
        (MovementKind::Transfer, _, _) => {
            return Err(AppError::InvalidLocationPair("TRANSFER exige origem e destino".into()));
        }
    };

    // Demais campos (actor, referência externa)
    request.validate()?;
    let actor = request.actor.trim();
    if actor.is_empty() {
        let mut errors = validator::ValidationErrors::new();
        let mut err = validator::ValidationError::new("required");
        err.message = Some("O campo 'actor' é obrigatório.".into());
        errors.add("actor", err);
        return Err(AppError::ValidationError(errors));
    }

    Ok(NewMovement {
        product_id: request.product_id,
        quantity,
        parties,
        actor: actor.to_string(),
        external_ref: request.external_ref.clone().filter(|r| !r.trim().is_empty()),
        occurred_at: request.occurred_at,
    })
}

#[derive(Clone)]
pub struct MovementService {
    ledger: Arc<dyn LedgerStore>,
    catalog: Arc<dyn CatalogStore>,
}

impl MovementService {
    pub fn new(ledger: Arc<dyn LedgerStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { ledger, catalog }
    }

    // --- SUBMIT (o processador) ---
    /// Valida e aplica uma movimentação numa única transação.
    /// Ou tudo (saldos + lançamento) fica visível, ou nada. Não há retry aqui.
    pub async fn submit(&self, request: &MovementRequest) -> Result<Movement, AppError> {
        let movement = validate_request(request).inspect_err(|e| {
            tracing::warn!("Movimentação rejeitada na validação [{}]: {}", e.code(), e);
        })?;

        match self.apply(&movement).await {
            Ok(committed) => {
                tracing::info!(
                    "Movimentação {} aceita: {} de {} x {}",
                    committed.id, committed.kind, committed.product_id, committed.quantity
                );
                Ok(committed)
            }
            Err(e) => {
                tracing::warn!(
                    "Movimentação {} de {} rejeitada [{}]: {}",
                    movement.parties.kind(), movement.product_id, e.code(), e
                );
                Err(e)
            }
        }
    }

    async fn apply(&self, movement: &NewMovement) -> Result<Movement, AppError> {
        let mut tx = self.ledger.begin().await?;

        // 3. Referências existem (e ficam protegidas até o commit)
        if !tx.product_exists(movement.product_id).await? {
            return Err(AppError::product_not_found(movement.product_id));
        }
        let lock_order = movement.parties.locations_in_lock_order();
        for location_id in &lock_order {
            if !tx.location_exists(*location_id).await? {
                return Err(AppError::location_not_found(*location_id));
            }
        }
        if !tx.operator_active(&movement.actor).await? {
            return Err(AppError::operator_not_found(movement.actor.as_str()));
        }

        // 4. Saldo suficiente na origem, checado sob lock.
        // RECEIPT não tem origem e não trava nada. A ordem fixa (por id de local)
        // evita deadlock entre transferências em sentidos opostos.
        if let Some(source) = movement.parties.source() {
            for location_id in &lock_order {
                let available = tx.lock_balance(movement.product_id, *location_id).await?;
                if *location_id == source && available < movement.quantity {
                    return Err(AppError::InsufficientStock {
                        product_id: movement.product_id,
                        location_id: source,
                        requested: movement.quantity,
                        available: Some(available),
                    });
                }
            }
        }

        // Aplicação: saída primeiro, depois entrada.
        for (location_id, delta) in movement.parties.deltas(movement.quantity) {
            tx.apply_delta(movement.product_id, location_id, delta).await?;
        }
        let committed = tx.append_movement(movement).await?;

        tx.commit().await?;
        Ok(committed)
    }

    // --- READ BALANCE ---
    pub async fn read_balance(
        &self,
        product_id: Uuid,
        location_id: Option<Uuid>,
    ) -> Result<BalanceView, AppError> {
        if self.catalog.get_product(product_id).await?.is_none() {
            return Err(AppError::product_not_found(product_id));
        }

        match location_id {
            Some(location_id) => {
                if self.catalog.get_location(location_id).await?.is_none() {
                    return Err(AppError::location_not_found(location_id));
                }
                let quantity = self.ledger.balance(product_id, location_id).await?;
                Ok(BalanceView { product_id, location_id: Some(location_id), quantity, locations: None })
            }
            None => {
                let locations = self.ledger.balances_for_product(product_id).await?;
                let quantity = locations.iter().map(|l| l.quantity).sum();
                Ok(BalanceView { product_id, location_id: None, quantity, locations: Some(locations) })
            }
        }
    }

    // --- LIST MOVEMENTS ---
    /// Uma página do histórico. Para continuar, repasse `next_cursor` como `cursor`;
    /// para recomeçar, chame sem cursor.
    pub async fn list_movements(&self, filter: &MovementFilter) -> Result<MovementPage, AppError> {
        let items = self.ledger.list_movements(filter).await?;
        let next_cursor = if items.len() == filter.effective_limit() as usize {
            items.last().map(|m| m.id)
        } else {
            None
        };
        Ok(MovementPage { items, next_cursor })
    }
}
