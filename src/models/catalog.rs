// src/models/catalog.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

// ---
// Validação Customizada
// ---
// Mesmo teto das quantidades: NUMERIC(18, 4) guarda menos de 10^14.
pub const MAX_AMOUNT: i64 = 100_000_000_000_000;

fn validate_amount(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() && !val.is_zero() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    if *val >= Decimal::from(MAX_AMOUNT) {
        let mut err = ValidationError::new("range");
        err.add_param("max".into(), &MAX_AMOUNT);
        err.message = Some("O valor deve ser menor que 10^14.".into());
        return Err(err);
    }
    Ok(())
}

// --- 1. Produto (catálogo) ---
// Não existe coluna de estoque: a quantidade vem sempre dos saldos.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub barcode: String,
    pub name: String,
    pub description: Option<String>,
    pub unit_of_measure: String,
    pub unit_value: Decimal,
    pub category: Option<String>,
    pub supplier: Option<String>,
    pub min_stock: Decimal,
    pub primary_location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- 2. Local (posição física no armazém) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub warehouse: Option<String>,
    pub level: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    #[validate(length(min = 1, message = "O código de barras é obrigatório."))]
    pub barcode: String,

    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub name: String,

    pub description: Option<String>,

    #[serde(default = "default_unit_of_measure")]
    #[validate(length(min = 1, message = "A unidade de medida é obrigatória."))]
    pub unit_of_measure: String,

    #[serde(default)]
    #[validate(custom(function = "validate_amount"))]
    pub unit_value: Decimal,

    pub category: Option<String>,
    pub supplier: Option<String>,

    #[serde(default)]
    #[validate(custom(function = "validate_amount"))]
    pub min_stock: Decimal,

    pub primary_location: Option<String>,
}

fn default_unit_of_measure() -> String {
    "UN".to_string()
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewLocation {
    #[validate(length(min = 1, message = "O código do local é obrigatório."))]
    pub code: String,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub warehouse: Option<String>,
    pub level: Option<String>,
}

// ---
// Comandos de atualização tipados
// ---
// Cada campo ausente fica como está. Campos desconhecidos (ex: "stock") são
// rejeitados na desserialização: estoque só muda por movimentação.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProductUpdate {
    #[validate(length(min = 1, message = "O código de barras não pode ser vazio."))]
    pub barcode: Option<String>,
    #[validate(length(min = 1, message = "O nome não pode ser vazio."))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "A unidade de medida não pode ser vazia."))]
    pub unit_of_measure: Option<String>,
    #[validate(custom(function = "validate_amount"))]
    pub unit_value: Option<Decimal>,
    pub category: Option<String>,
    pub supplier: Option<String>,
    #[validate(custom(function = "validate_amount"))]
    pub min_stock: Option<Decimal>,
    pub primary_location: Option<String>,
}

impl ProductUpdate {
    pub fn is_empty(&self) -> bool {
        self.barcode.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.unit_of_measure.is_none()
            && self.unit_value.is_none()
            && self.category.is_none()
            && self.supplier.is_none()
            && self.min_stock.is_none()
            && self.primary_location.is_none()
    }

    /// Aplica o comando sobre uma cópia (usado pelo backend em memória).
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(v) = &self.barcode { product.barcode = v.clone(); }
        if let Some(v) = &self.name { product.name = v.clone(); }
        if let Some(v) = &self.description { product.description = Some(v.clone()); }
        if let Some(v) = &self.unit_of_measure { product.unit_of_measure = v.clone(); }
        if let Some(v) = self.unit_value { product.unit_value = v; }
        if let Some(v) = &self.category { product.category = Some(v.clone()); }
        if let Some(v) = &self.supplier { product.supplier = Some(v.clone()); }
        if let Some(v) = self.min_stock { product.min_stock = v; }
        if let Some(v) = &self.primary_location { product.primary_location = Some(v.clone()); }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LocationUpdate {
    #[validate(length(min = 1, message = "O código do local não pode ser vazio."))]
    pub code: Option<String>,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub warehouse: Option<String>,
    pub level: Option<String>,
}

impl LocationUpdate {
    pub fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.description.is_none()
            && self.kind.is_none()
            && self.warehouse.is_none()
            && self.level.is_none()
    }

    pub fn apply_to(&self, location: &mut Location) {
        if let Some(v) = &self.code { location.code = v.clone(); }
        if let Some(v) = &self.description { location.description = Some(v.clone()); }
        if let Some(v) = &self.kind { location.kind = Some(v.clone()); }
        if let Some(v) = &self.warehouse { location.warehouse = Some(v.clone()); }
        if let Some(v) = &self.level { location.level = Some(v.clone()); }
    }
}

// --- 3. Operador (quem registra as movimentações) ---
// O `username` é a referência usada como `actor` nas movimentações e não muda.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Operator {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub role: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewOperator {
    #[validate(length(min = 1, max = 60, message = "O nome de usuário é obrigatório (até 60 caracteres)."))]
    pub username: String,
    #[validate(length(min = 1, message = "O nome completo é obrigatório."))]
    pub full_name: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OperatorUpdate {
    #[validate(length(min = 1, message = "O nome completo não pode ser vazio."))]
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub active: Option<bool>,
}

impl OperatorUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.role.is_none() && self.active.is_none()
    }

    pub fn apply_to(&self, operator: &mut Operator) {
        if let Some(v) = &self.full_name { operator.full_name = v.clone(); }
        if let Some(v) = &self.role { operator.role = Some(v.clone()); }
        if let Some(v) = self.active { operator.active = v; }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_update_rejects_unknown_fields() {
        let err = serde_json::from_str::<ProductUpdate>(r#"{"name":"X","stock":10}"#);
        assert!(err.is_err());

        let ok: ProductUpdate = serde_json::from_str(r#"{"minStock":5}"#).unwrap();
        assert_eq!(ok.min_stock, Some(Decimal::from(5)));
        assert!(!ok.is_empty());
    }

    #[test]
    fn empty_update_is_detected() {
        let update: ProductUpdate = serde_json::from_str("{}").unwrap();
        assert!(update.is_empty());
        let update: LocationUpdate = serde_json::from_str("{}").unwrap();
        assert!(update.is_empty());
    }

    #[test]
    fn negative_values_fail_validation() {
        let payload: NewProduct = serde_json::from_str(
            r#"{"barcode":"PROD001","name":"Laptop","unitValue":-1}"#,
        )
        .unwrap();
        assert!(payload.validate().is_err());

        let payload: NewProduct =
            serde_json::from_str(r#"{"barcode":"PROD001","name":"Laptop","unitValue":1299.99}"#)
                .unwrap();
        assert!(payload.validate().is_ok());
        assert_eq!(payload.unit_of_measure, "UN");
    }

    #[test]
    fn amounts_beyond_storage_range_fail_validation() {
        let payload: NewProduct = serde_json::from_str(
            r#"{"barcode":"PROD001","name":"Laptop","unitValue":10000000000000000000}"#,
        )
        .unwrap();
        assert!(payload.validate().is_err());

        let update = ProductUpdate { min_stock: Some(Decimal::from(MAX_AMOUNT)), ..Default::default() };
        assert!(update.validate().is_err());
        let update = ProductUpdate { min_stock: Some(Decimal::from(MAX_AMOUNT - 1)), ..Default::default() };
        assert!(update.validate().is_ok());
    }

    #[test]
    fn operator_username_cannot_be_updated() {
        assert!(serde_json::from_str::<OperatorUpdate>(r#"{"username":"outro"}"#).is_err());
        let update: OperatorUpdate = serde_json::from_str(r#"{"active":false}"#).unwrap();
        assert_eq!(update.active, Some(false));
    }
}
