// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use chrono::FixedOffset;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{CatalogStore, InMemoryStore, LedgerStore, PgStore},
    services::{
        catalog_service::CatalogService, dashboard_service::DashboardService,
        movement_service::MovementService,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    // Só para desenvolvimento e testes: nada sobrevive a um restart.
    Memory,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: Backend,
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    /// Fuso de referência para "movimentações de hoje".
    pub report_offset: FixedOffset,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Lê as configurações de qualquer fonte chave -> valor.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let backend = match lookup("LEDGER_BACKEND").as_deref().map(str::trim) {
            None | Some("") | Some("postgres") => Backend::Postgres,
            Some("memory") => Backend::Memory,
            Some(other) => bail!("LEDGER_BACKEND inválido: {other} (use postgres ou memory)"),
        };

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        if backend == Backend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL deve ser definida para o backend postgres");
        }

        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 5u32)?;
        let acquire_secs = parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 3u64)?;
        let offset_minutes = parse_or(&lookup, "REPORT_UTC_OFFSET_MINUTES", 0i32)?;
        let report_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .with_context(|| format!("REPORT_UTC_OFFSET_MINUTES fora do intervalo: {offset_minutes}"))?;

        Ok(Self {
            backend,
            database_url,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            db_max_connections,
            db_acquire_timeout: Duration::from_secs(acquire_secs),
            report_offset,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} inválido: {raw}")),
        _ => Ok(default),
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    // `None` no backend em memória.
    pub db_pool: Option<PgPool>,
    pub movement_service: MovementService,
    pub catalog_service: CatalogService,
    pub dashboard_service: DashboardService,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        match settings.backend {
            Backend::Postgres => {
                let database_url = settings
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL deve ser definida")?;

                // O pool é criado aqui e injetado no store; nada de global.
                let db_pool = PgPoolOptions::new()
                    .max_connections(settings.db_max_connections)
                    .acquire_timeout(settings.db_acquire_timeout)
                    .connect(database_url)
                    .await
                    .context("Falha ao conectar ao banco de dados")?;

                tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

                let store = Arc::new(PgStore::new(db_pool.clone()));
                let mut state = Self::with_stores(store.clone(), store, settings.report_offset);
                state.db_pool = Some(db_pool);
                Ok(state)
            }
            Backend::Memory => {
                tracing::warn!("Backend em memória: os dados se perdem ao reiniciar");
                Ok(Self::in_memory(settings.report_offset))
            }
        }
    }

    pub fn in_memory(report_offset: FixedOffset) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::with_stores(store.clone(), store, report_offset)
    }

    // --- Monta o gráfico de dependências ---
    fn with_stores(
        ledger: Arc<dyn LedgerStore>,
        catalog: Arc<dyn CatalogStore>,
        report_offset: FixedOffset,
    ) -> Self {
        Self {
            db_pool: None,
            movement_service: MovementService::new(ledger.clone(), catalog.clone()),
            catalog_service: CatalogService::new(catalog, ledger.clone()),
            dashboard_service: DashboardService::new(ledger, report_offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = settings(&[("DATABASE_URL", "postgres://localhost/wms")]).unwrap();
        assert_eq!(s.backend, Backend::Postgres);
        assert_eq!(s.bind_addr, "0.0.0.0:3000");
        assert_eq!(s.db_max_connections, 5);
        assert_eq!(s.db_acquire_timeout, Duration::from_secs(3));
        assert_eq!(s.report_offset.local_minus_utc(), 0);
    }

    #[test]
    fn postgres_requires_database_url() {
        assert!(settings(&[]).is_err());
        let s = settings(&[("LEDGER_BACKEND", "memory")]).unwrap();
        assert_eq!(s.backend, Backend::Memory);
    }

    #[test]
    fn invalid_values_fail() {
        assert!(settings(&[("LEDGER_BACKEND", "redis")]).is_err());
        assert!(settings(&[("LEDGER_BACKEND", "memory"), ("DB_MAX_CONNECTIONS", "muitas")]).is_err());
        assert!(settings(&[("LEDGER_BACKEND", "memory"), ("REPORT_UTC_OFFSET_MINUTES", "100000")]).is_err());

        let s = settings(&[("LEDGER_BACKEND", "memory"), ("REPORT_UTC_OFFSET_MINUTES", "-180")]).unwrap();
        assert_eq!(s.report_offset.local_minus_utc(), -180 * 60);
    }
}
