// src/common/error.rs

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

// Nosso tipo de erro único. As seis primeiras variantes são os "tipos" do
// livro-razão; o resto é fronteira (payload, catálogo, infraestrutura).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Quantidade inválida: {0}")]
    InvalidQuantity(String),

    #[error("Par de locais inválido: {0}")]
    InvalidLocationPair(String),

    #[error("{entity} não encontrado: {reference}")]
    NotFound {
        entity: &'static str,
        reference: String,
    },

    #[error("Estoque insuficiente do produto {product_id} no local {location_id} (solicitado {requested})")]
    InsufficientStock {
        product_id: Uuid,
        location_id: Uuid,
        requested: Decimal,
        // `None` quando a rejeição veio do CHECK do banco, não da validação.
        available: Option<Decimal>,
    },

    #[error("Conflito de escrita concorrente: {0}")]
    Conflict(String),

    #[error("Armazenamento indisponível: {0}")]
    StorageUnavailable(String),

    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Payload inválido: {0}")]
    InvalidPayload(#[from] JsonRejection),

    #[error("Nenhum campo informado para atualizar")]
    EmptyUpdate,

    #[error("Código de barras já existe: {0}")]
    DuplicateBarcode(String),

    #[error("Código de local já existe: {0}")]
    DuplicateLocationCode(String),

    #[error("Nome de usuário já existe: {0}")]
    DuplicateOperator(String),

    #[error("Registro em uso: {0}")]
    InUse(String),

    // Erros de banco que não se encaixam em nenhuma classificação acima.
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(String),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn product_not_found(id: Uuid) -> Self {
        AppError::NotFound { entity: "Produto", reference: id.to_string() }
    }

    pub fn location_not_found(id: Uuid) -> Self {
        AppError::NotFound { entity: "Local", reference: id.to_string() }
    }

    pub fn operator_not_found(reference: impl Into<String>) -> Self {
        AppError::NotFound { entity: "Operador", reference: reference.into() }
    }

    /// Código estável para o cliente (não muda com o texto da mensagem).
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidQuantity(_) => "INVALID_QUANTITY",
            AppError::InvalidLocationPair(_) => "INVALID_LOCATION_PAIR",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::Conflict(_) => "CONFLICT",
            AppError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidPayload(_) => "INVALID_PAYLOAD",
            AppError::EmptyUpdate => "EMPTY_UPDATE",
            AppError::DuplicateBarcode(_) => "DUPLICATE_BARCODE",
            AppError::DuplicateLocationCode(_) => "DUPLICATE_LOCATION_CODE",
            AppError::DuplicateOperator(_) => "DUPLICATE_OPERATOR",
            AppError::InUse(_) => "IN_USE",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_ERROR",
        }
    }

    /// Só conflito e indisponibilidade podem ser repetidos pelo chamador.
    /// O processador nunca repete sozinho.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Conflict(_) | AppError::StorageUnavailable(_))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidQuantity(_)
            | AppError::InvalidLocationPair(_)
            | AppError::ValidationError(_)
            | AppError::InvalidPayload(_)
            | AppError::EmptyUpdate => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::InsufficientStock { .. }
            | AppError::Conflict(_)
            | AppError::DuplicateBarcode(_)
            | AppError::DuplicateLocationCode(_)
            | AppError::DuplicateOperator(_)
            | AppError::InUse(_) => StatusCode::CONFLICT,
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        crate::common::db_utils::classify_sqlx_error(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let details = match &self {
            // Retorna todos os detalhes da validação, campo a campo.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                Some(json!(details))
            }
            AppError::InsufficientStock { product_id, location_id, requested, available } => Some(json!({
                "productId": product_id,
                "locationId": location_id,
                "requested": requested,
                "available": available,
            })),
            _ => None,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // O detalhe vai para o log, nunca para o cliente.
            tracing::error!("Erro Interno do Servidor: {:?}", self);
            "Ocorreu um erro inesperado.".to_string()
        } else {
            self.to_string()
        };

        let mut body = json!({
            "error": self.code(),
            "message": message,
            "retryable": self.is_retryable(),
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflict_and_storage_are_retryable() {
        assert!(AppError::Conflict("x".into()).is_retryable());
        assert!(AppError::StorageUnavailable("x".into()).is_retryable());
        assert!(!AppError::InvalidQuantity("x".into()).is_retryable());
        assert!(!AppError::product_not_found(Uuid::nil()).is_retryable());
        let insufficient = AppError::InsufficientStock {
            product_id: Uuid::nil(),
            location_id: Uuid::nil(),
            requested: Decimal::from(5),
            available: Some(Decimal::from(1)),
        };
        assert!(!insufficient.is_retryable());
    }

    #[test]
    fn ledger_errors_map_to_expected_status() {
        assert_eq!(AppError::InvalidLocationPair("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::location_not_found(Uuid::nil()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::StorageUnavailable("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(AppError::EmptyUpdate.code(), "EMPTY_UPDATE");
        assert_eq!(AppError::operator_not_found("maria").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::DuplicateOperator("maria".into()).status(), StatusCode::CONFLICT);
    }
}
