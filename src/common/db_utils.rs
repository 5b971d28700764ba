// src/common/db_utils.rs

use crate::common::error::AppError;

// SQLSTATEs que o Postgres usa quando desiste de uma transação concorrente.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";

// ---
// Classificação de erros do sqlx
// ---
/// Converte um `sqlx::Error` no tipo do livro-razão correspondente.
/// Conflitos e falhas de conexão viram tipos "repetíveis"; o resto é erro de banco.
pub(crate) fn classify_sqlx_error(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code();
            match code.as_deref() {
                Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) | Some(LOCK_NOT_AVAILABLE) => {
                    tracing::warn!("Conflito concorrente no banco: {}", db_err.message());
                    AppError::Conflict(db_err.message().to_string())
                }
                _ => AppError::DatabaseError(e.to_string()),
            }
        }
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => {
            tracing::error!("Banco de dados indisponível: {}", e);
            AppError::StorageUnavailable(e.to_string())
        }
        _ => AppError::DatabaseError(e.to_string()),
    }
}

/// `true` quando o erro é a violação de um CHECK específico.
pub(crate) fn is_check_violation(e: &sqlx::Error, constraint: &str) -> bool {
    match e {
        sqlx::Error::Database(db_err) => {
            db_err.is_check_violation() && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

/// `true` quando o erro é violação de unicidade (opcionalmente de uma constraint).
pub(crate) fn is_unique_violation(e: &sqlx::Error, constraint: &str) -> bool {
    match e {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation()
                && db_err.constraint().map(|c| c.contains(constraint)).unwrap_or(true)
        }
        _ => false,
    }
}
