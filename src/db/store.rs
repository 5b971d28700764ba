// src/db/store.rs

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        catalog::{
            Location, LocationUpdate, NewLocation, NewOperator, NewProduct, Operator,
            OperatorUpdate, Product, ProductUpdate,
        },
        ledger::{
            Balance, LocationBalance, Movement, MovementFilter, NewMovement, StockSnapshot,
            TimeWindow,
        },
    },
};

// ---
// A unidade atômica do livro-razão
// ---
/// Uma transação aberta. Tudo que passa por aqui fica invisível até `commit`;
/// se o valor for descartado sem commit, nada acontece (rollback).
#[async_trait]
pub trait LedgerTx: Send {
    /// Verifica a existência do produto e o protege contra exclusão até o commit.
    async fn product_exists(&mut self, product_id: Uuid) -> Result<bool, AppError>;

    async fn location_exists(&mut self, location_id: Uuid) -> Result<bool, AppError>;

    /// `true` só para operador cadastrado e ativo.
    async fn operator_active(&mut self, username: &str) -> Result<bool, AppError>;

    /// Trava a linha do saldo (se existir) e devolve a quantidade; 0 se ausente.
    async fn lock_balance(&mut self, product_id: Uuid, location_id: Uuid) -> Result<Decimal, AppError>;

    /// Soma `delta` ao saldo, criando a linha se preciso.
    /// Falha com `InsufficientStock` se o resultado ficar negativo.
    async fn apply_delta(
        &mut self,
        product_id: Uuid,
        location_id: Uuid,
        delta: Decimal,
    ) -> Result<Balance, AppError>;

    /// Grava o lançamento; o id é crescente e a data é a do servidor se não vier.
    async fn append_movement(&mut self, movement: &NewMovement) -> Result<Movement, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}

// ---
// Saldos + Livro-razão
// ---
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, AppError>;

    /// Saldo do par; 0 se a linha não existe.
    async fn balance(&self, product_id: Uuid, location_id: Uuid) -> Result<Decimal, AppError>;

    async fn balances_for_product(&self, product_id: Uuid) -> Result<Vec<LocationBalance>, AppError>;

    /// Ordem (occurredAt, id), crescente ou decrescente conforme o filtro.
    async fn list_movements(&self, filter: &MovementFilter) -> Result<Vec<Movement>, AppError>;

    /// Catálogo + saldos lidos de uma vez só (nunca vê movimentação pela metade).
    /// Com `window`, conta na mesma leitura os lançamentos do intervalo.
    async fn stock_snapshot(&self, window: Option<TimeWindow>) -> Result<StockSnapshot, AppError>;
}

// ---
// Catálogo (produtos e locais)
// ---
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_product(&self, new: &NewProduct) -> Result<Product, AppError>;
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, AppError>;
    async fn find_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>, AppError>;
    async fn list_products(&self) -> Result<Vec<Product>, AppError>;
    async fn update_product(&self, id: Uuid, update: &ProductUpdate) -> Result<Option<Product>, AppError>;
    /// Sem `cascade`, recusa se houver saldo não-zero ou histórico.
    /// Com `cascade`, apaga saldos, movimentações e o produto juntos.
    async fn delete_product(&self, id: Uuid, cascade: bool) -> Result<(), AppError>;

    async fn create_location(&self, new: &NewLocation) -> Result<Location, AppError>;
    async fn get_location(&self, id: Uuid) -> Result<Option<Location>, AppError>;
    async fn list_locations(&self) -> Result<Vec<Location>, AppError>;
    async fn update_location(&self, id: Uuid, update: &LocationUpdate) -> Result<Option<Location>, AppError>;
    /// Recusa enquanto houver saldo não-zero ou movimentação no local.
    async fn delete_location(&self, id: Uuid) -> Result<(), AppError>;

    async fn create_operator(&self, new: &NewOperator) -> Result<Operator, AppError>;
    async fn get_operator(&self, id: Uuid) -> Result<Option<Operator>, AppError>;
    async fn list_operators(&self) -> Result<Vec<Operator>, AppError>;
    async fn update_operator(&self, id: Uuid, update: &OperatorUpdate) -> Result<Option<Operator>, AppError>;
    /// Operador nunca é apagado: o histórico continua apontando para ele.
    async fn deactivate_operator(&self, id: Uuid) -> Result<Option<Operator>, AppError>;
}
