// src/models/ledger.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

// --- 1. Tipos de Movimentação ---
// Aceita também os nomes antigos do frontend (ENTRADA/SALIDA/TRASLADO).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "movement_kind", rename_all = "SCREAMING_SNAKE_CASE")] // Banco
#[serde(rename_all = "SCREAMING_SNAKE_CASE")] // JSON
pub enum MovementKind {
    #[serde(alias = "ENTRADA")]
    Receipt,
    #[serde(alias = "SALIDA")]
    Issue,
    #[serde(alias = "TRASLADO")]
    Transfer,
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MovementKind::Receipt => "RECEIPT",
            MovementKind::Issue => "ISSUE",
            MovementKind::Transfer => "TRANSFER",
        };
        f.write_str(s)
    }
}

// --- 2. Saldo (produto, local) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub quantity: Decimal,
    pub updated_at: DateTime<Utc>,
}

// --- 3. Movimentação (livro-razão, imutável) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub id: i64,
    pub kind: MovementKind,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub source_location_id: Option<Uuid>,
    pub destination_location_id: Option<Uuid>,
    pub actor: String,
    pub external_ref: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl Movement {
    /// Delta assinado que este lançamento aplicou no par (produto, local).
    pub fn signed_delta_at(&self, location_id: Uuid) -> Decimal {
        let mut delta = Decimal::ZERO;
        if self.source_location_id == Some(location_id) {
            delta -= self.quantity;
        }
        if self.destination_location_id == Some(location_id) {
            delta += self.quantity;
        }
        delta
    }

    pub fn touches_location(&self, location_id: Uuid) -> bool {
        self.source_location_id == Some(location_id)
            || self.destination_location_id == Some(location_id)
    }
}

// ---
// As partes de uma movimentação, já validadas.
// ---
// O formato do enum garante que um RECEIPT nunca tem origem, etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementParties {
    Receipt { destination: Uuid },
    Issue { source: Uuid },
    Transfer { source: Uuid, destination: Uuid },
}

impl MovementParties {
    pub fn kind(&self) -> MovementKind {
        match self {
            MovementParties::Receipt { .. } => MovementKind::Receipt,
            MovementParties::Issue { .. } => MovementKind::Issue,
            MovementParties::Transfer { .. } => MovementKind::Transfer,
        }
    }

    pub fn source(&self) -> Option<Uuid> {
        match *self {
            MovementParties::Issue { source } | MovementParties::Transfer { source, .. } => Some(source),
            MovementParties::Receipt { .. } => None,
        }
    }

    pub fn destination(&self) -> Option<Uuid> {
        match *self {
            MovementParties::Receipt { destination }
            | MovementParties::Transfer { destination, .. } => Some(destination),
            MovementParties::Issue { .. } => None,
        }
    }

    /// Locais envolvidos, em ordem global (por id). É a ordem de aquisição dos locks.
    pub fn locations_in_lock_order(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.source().into_iter().chain(self.destination()).collect();
        ids.sort();
        ids
    }

    /// Deltas a aplicar: saída primeiro, depois entrada.
    pub fn deltas(&self, quantity: Decimal) -> Vec<(Uuid, Decimal)> {
        let mut legs = Vec::with_capacity(2);
        if let Some(source) = self.source() {
            legs.push((source, -quantity));
        }
        if let Some(destination) = self.destination() {
            legs.push((destination, quantity));
        }
        legs
    }
}

/// Movimentação que passou pela validação. É exatamente isto que vai para o
/// banco: nada é recalculado depois da checagem.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMovement {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub parties: MovementParties,
    pub actor: String,
    pub external_ref: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

// --- Pedido de movimentação (entrada do processador) ---
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovementRequest {
    pub kind: MovementKind,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub source_location_id: Option<Uuid>,
    pub destination_location_id: Option<Uuid>,

    #[validate(length(min = 1, message = "O campo 'actor' é obrigatório."))]
    pub actor: String,

    #[validate(length(max = 120, message = "A referência externa aceita no máximo 120 caracteres."))]
    pub external_ref: Option<String>,

    // Se não vier, o servidor usa o horário do commit.
    pub occurred_at: Option<DateTime<Utc>>,
}

// --- Leitura de saldo ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationBalance {
    pub location_id: Uuid,
    pub location_code: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Resposta do read-balance. Com `locationId`, `quantity` é o saldo do par
/// (0 se nunca criado); sem ele, é o total do produto e `locations` traz a quebra.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub product_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<Uuid>,
    pub quantity: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<LocationBalance>>,
}

// --- Listagem do histórico ---
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MovementOrder {
    #[default]
    Newest,
    Oldest,
}

pub const DEFAULT_MOVEMENT_PAGE: u32 = 50;
pub const MAX_MOVEMENT_PAGE: u32 = 500;

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct MovementFilter {
    pub kind: Option<MovementKind>,
    pub product_id: Option<Uuid>,
    /// Local de origem OU destino.
    pub location_id: Option<Uuid>,
    #[serde(default)]
    pub order: MovementOrder,
    pub limit: Option<u32>,
    /// Id do último item da página anterior (o `nextCursor`); a página seguinte
    /// começa logo depois dele na ordem (occurredAt, id).
    ///
    /// Ids saem de uma sequência no momento do INSERT, não do commit: um
    /// lançamento que confirma depois de uma página já lida, com chave menor que
    /// o cursor, só aparece recomeçando a leitura sem cursor.
    pub cursor: Option<i64>,
}

impl MovementFilter {
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_MOVEMENT_PAGE).clamp(1, MAX_MOVEMENT_PAGE)
    }

    /// Mesmo critério do WHERE no SQL (sem o cursor), para o backend em memória.
    pub fn matches(&self, m: &Movement) -> bool {
        if self.kind.is_some_and(|k| k != m.kind) {
            return false;
        }
        if self.product_id.is_some_and(|p| p != m.product_id) {
            return false;
        }
        if self.location_id.is_some_and(|l| !m.touches_location(l)) {
            return false;
        }
        true
    }
}

impl Movement {
    /// Chave de ordenação do histórico: data do lançamento, desempate pelo id.
    pub fn order_key(&self) -> (DateTime<Utc>, i64) {
        (self.occurred_at, self.id)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovementPage {
    pub items: Vec<Movement>,
    /// `None` quando a sequência terminou.
    pub next_cursor: Option<i64>,
}

/// Fotografia consistente do catálogo e dos saldos, base das agregações.
#[derive(Debug, Clone, Default)]
pub struct StockSnapshot {
    pub products: Vec<crate::models::catalog::Product>,
    pub locations: Vec<crate::models::catalog::Location>,
    pub balances: Vec<Balance>,
    /// Lançamentos dentro da janela pedida (0 se nenhuma foi pedida).
    pub movements_in_window: i64,
}

/// Intervalo `[from, to)` em UTC.
pub type TimeWindow = (DateTime<Utc>, DateTime<Utc>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_kind_names_are_accepted() {
        let k: MovementKind = serde_json::from_str("\"ENTRADA\"").unwrap();
        assert_eq!(k, MovementKind::Receipt);
        let k: MovementKind = serde_json::from_str("\"TRASLADO\"").unwrap();
        assert_eq!(k, MovementKind::Transfer);
        assert_eq!(serde_json::to_string(&MovementKind::Issue).unwrap(), "\"ISSUE\"");
    }

    #[test]
    fn transfer_locks_in_id_order_but_applies_source_first() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        let parties = MovementParties::Transfer { source: high, destination: low };

        assert_eq!(parties.locations_in_lock_order(), vec![low, high]);
        assert_eq!(
            parties.deltas(Decimal::from(6)),
            vec![(high, Decimal::from(-6)), (low, Decimal::from(6))]
        );
    }

    #[test]
    fn filter_limit_is_clamped() {
        let f = MovementFilter { limit: Some(10_000), ..Default::default() };
        assert_eq!(f.effective_limit(), MAX_MOVEMENT_PAGE);
        let f = MovementFilter { limit: Some(0), ..Default::default() };
        assert_eq!(f.effective_limit(), 1);
        assert_eq!(MovementFilter::default().effective_limit(), DEFAULT_MOVEMENT_PAGE);
    }
}
