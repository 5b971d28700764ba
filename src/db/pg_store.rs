// src/db/pg_store.rs

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{is_check_violation, is_unique_violation},
        error::AppError,
    },
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

const MOVEMENT_COLUMNS: &str = "id, kind, product_id, quantity, source_location_id, \
     destination_location_id, actor, external_ref, occurred_at";

const BALANCE_NON_NEGATIVE: &str = "balances_quantity_non_negative";

// O store de produção. Recebe a pool pronta (nada de conexão global).
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ---
// Transação do livro-razão
// ---
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn product_exists(&mut self, product_id: Uuid) -> Result<bool, AppError> {
        // FOR SHARE: uma exclusão concorrente espera o nosso commit.
        let found = sqlx::query_scalar::<_, Uuid>("SELECT id FROM products WHERE id = $1 FOR SHARE")
            .bind(product_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(found.is_some())
    }

    async fn location_exists(&mut self, location_id: Uuid) -> Result<bool, AppError> {
        let found = sqlx::query_scalar::<_, Uuid>("SELECT id FROM locations WHERE id = $1 FOR SHARE")
            .bind(location_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(found.is_some())
    }

    async fn operator_active(&mut self, username: &str) -> Result<bool, AppError> {
        // FOR SHARE: uma desativação concorrente espera o nosso commit.
        let found = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM operators WHERE username = $1 AND active FOR SHARE",
        )
        .bind(username)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(found.is_some())
    }

    async fn lock_balance(&mut self, product_id: Uuid, location_id: Uuid) -> Result<Decimal, AppError> {
        let quantity = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT quantity FROM balances
            WHERE product_id = $1 AND location_id = $2
            FOR UPDATE
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(quantity.unwrap_or(Decimal::ZERO))
    }

    async fn apply_delta(
        &mut self,
        product_id: Uuid,
        location_id: Uuid,
        delta: Decimal,
    ) -> Result<Balance, AppError> {
        // "UPSERT": cria a linha na primeira entrada, soma nas seguintes.
        // Um delta negativo sem linha (ou que deixaria saldo < 0) bate no CHECK.
        sqlx::query_as::<_, Balance>(
            r#"
            INSERT INTO balances (product_id, location_id, quantity, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (product_id, location_id)
            DO UPDATE SET
                quantity = balances.quantity + EXCLUDED.quantity,
                updated_at = NOW()
            RETURNING product_id, location_id, quantity, updated_at
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .bind(delta)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_check_violation(&e, BALANCE_NON_NEGATIVE) {
                tracing::warn!(
                    "CHECK de saldo barrou delta {} em ({}, {})",
                    delta, product_id, location_id
                );
                return AppError::InsufficientStock {
                    product_id,
                    location_id,
                    requested: -delta,
                    available: None,
                };
            }
            e.into()
        })
    }

    async fn append_movement(&mut self, movement: &NewMovement) -> Result<Movement, AppError> {
        let sql = format!(
            r#"
            INSERT INTO movements (
                kind, product_id, quantity, source_location_id, destination_location_id,
                actor, external_ref, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, NOW()))
            RETURNING {MOVEMENT_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, Movement>(&sql)
            .bind(movement.parties.kind())
            .bind(movement.product_id)
            .bind(movement.quantity)
            .bind(movement.parties.source())
            .bind(movement.parties.destination())
            .bind(&movement.actor)
            .bind(movement.external_ref.as_deref())
            .bind(movement.occurred_at)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn balance(&self, product_id: Uuid, location_id: Uuid) -> Result<Decimal, AppError> {
        let quantity = sqlx::query_scalar::<_, Decimal>(
            "SELECT quantity FROM balances WHERE product_id = $1 AND location_id = $2",
        )
        .bind(product_id)
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(quantity.unwrap_or(Decimal::ZERO))
    }

    async fn balances_for_product(&self, product_id: Uuid) -> Result<Vec<LocationBalance>, AppError> {
        let rows = sqlx::query_as::<_, LocationBalance>(
            r#"
            SELECT
                b.location_id,
                l.code AS location_code,
                l.description,
                b.quantity,
                b.updated_at
            FROM balances b
            JOIN locations l ON l.id = b.location_id
            WHERE b.product_id = $1
            ORDER BY l.code ASC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn list_movements(&self, filter: &MovementFilter) -> Result<Vec<Movement>, AppError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {MOVEMENT_COLUMNS} FROM movements WHERE TRUE"));

        if let Some(kind) = filter.kind {
            qb.push(" AND kind = ").push_bind(kind);
        }
        if let Some(product_id) = filter.product_id {
            qb.push(" AND product_id = ").push_bind(product_id);
        }
        if let Some(location_id) = filter.location_id {
            qb.push(" AND (source_location_id = ")
                .push_bind(location_id)
                .push(" OR destination_location_id = ")
                .push_bind(location_id)
                .push(")");
        }
        // Keyset sobre (occurred_at, id): a data pode vir do cliente, então o id
        // sozinho não dá a ordem cronológica. Cursor inexistente não devolve nada.
        if let Some(cursor) = filter.cursor {
            qb.push(match filter.order {
                MovementOrder::Newest => " AND (occurred_at, id) < (",
                MovementOrder::Oldest => " AND (occurred_at, id) > (",
            });
            qb.push("SELECT c.occurred_at, c.id FROM movements c WHERE c.id = ")
                .push_bind(cursor)
                .push(")");
        }

        qb.push(match filter.order {
            MovementOrder::Newest => " ORDER BY occurred_at DESC, id DESC",
            MovementOrder::Oldest => " ORDER BY occurred_at ASC, id ASC",
        });
        qb.push(" LIMIT ").push_bind(i64::from(filter.effective_limit()));

        let rows = qb.build_query_as::<Movement>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn stock_snapshot(&self, window: Option<TimeWindow>) -> Result<StockSnapshot, AppError> {
        // Snapshot consistente: todas as leituras veem o mesmo estado.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let products = sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY name ASC")
            .fetch_all(&mut *tx)
            .await?;
        let locations = sqlx::query_as::<_, Location>("SELECT * FROM locations ORDER BY code ASC")
            .fetch_all(&mut *tx)
            .await?;
        let balances = sqlx::query_as::<_, Balance>(
            "SELECT product_id, location_id, quantity, updated_at FROM balances",
        )
        .fetch_all(&mut *tx)
        .await?;

        let movements_in_window = match window {
            Some((from, to)) => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM movements WHERE occurred_at >= $1 AND occurred_at < $2",
                )
                .bind(from)
                .bind(to)
                .fetch_one(&mut *tx)
                .await?
            }
            None => 0,
        };

        tx.commit().await?;

        Ok(StockSnapshot { products, locations, balances, movements_in_window })
    }
}

// ---
// Catálogo
// ---
fn map_product_write_error(e: sqlx::Error, barcode: Option<&str>) -> AppError {
    if is_unique_violation(&e, "barcode") {
        return AppError::DuplicateBarcode(barcode.unwrap_or_default().to_string());
    }
    e.into()
}

fn map_location_write_error(e: sqlx::Error, code: Option<&str>) -> AppError {
    if is_unique_violation(&e, "code") {
        return AppError::DuplicateLocationCode(code.unwrap_or_default().to_string());
    }
    e.into()
}

fn map_operator_write_error(e: sqlx::Error, username: &str) -> AppError {
    if is_unique_violation(&e, "username") {
        return AppError::DuplicateOperator(username.to_string());
    }
    e.into()
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn create_product(&self, new: &NewProduct) -> Result<Product, AppError> {
        sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (
                id, barcode, name, description, unit_of_measure, unit_value,
                category, supplier, min_stock, primary_location
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.barcode)
        .bind(&new.name)
        .bind(new.description.as_deref())
        .bind(&new.unit_of_measure)
        .bind(new.unit_value)
        .bind(new.category.as_deref())
        .bind(new.supplier.as_deref())
        .bind(new.min_stock)
        .bind(new.primary_location.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_product_write_error(e, Some(&new.barcode)))
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    async fn find_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE barcode = $1")
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        let products = sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    async fn update_product(&self, id: Uuid, update: &ProductUpdate) -> Result<Option<Product>, AppError> {
        // Colunas fixas: um campo ausente (NULL) mantém o valor atual.
        sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET
                barcode          = COALESCE($2, barcode),
                name             = COALESCE($3, name),
                description      = COALESCE($4, description),
                unit_of_measure  = COALESCE($5, unit_of_measure),
                unit_value       = COALESCE($6, unit_value),
                category         = COALESCE($7, category),
                supplier         = COALESCE($8, supplier),
                min_stock        = COALESCE($9, min_stock),
                primary_location = COALESCE($10, primary_location),
                updated_at       = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.barcode.as_deref())
        .bind(update.name.as_deref())
        .bind(update.description.as_deref())
        .bind(update.unit_of_measure.as_deref())
        .bind(update.unit_value)
        .bind(update.category.as_deref())
        .bind(update.supplier.as_deref())
        .bind(update.min_stock)
        .bind(update.primary_location.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_product_write_error(e, update.barcode.as_deref()))
    }

    async fn delete_product(&self, id: Uuid, cascade: bool) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM products WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::product_not_found(id));
        }

        if !cascade {
            let (stocked, movements): (i64, i64) = sqlx::query_as(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM balances WHERE product_id = $1 AND quantity <> 0),
                    (SELECT COUNT(*) FROM movements WHERE product_id = $1)
                "#,
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

            if stocked > 0 {
                return Err(AppError::InUse(format!("produto {id} ainda tem saldo em {stocked} local(is)")));
            }
            if movements > 0 {
                return Err(AppError::InUse(format!("produto {id} tem {movements} movimentação(ões)")));
            }
        }

        // Desmontagem administrativa: saldos e histórico saem juntos com o produto.
        sqlx::query("DELETE FROM balances WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM movements WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if removed > 0 {
            tracing::warn!("Produto {} excluído em cascata com {} movimentação(ões)", id, removed);
        }
        Ok(())
    }

    async fn create_location(&self, new: &NewLocation) -> Result<Location, AppError> {
        sqlx::query_as::<_, Location>(
            r#"
            INSERT INTO locations (id, code, description, kind, warehouse, level)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.code)
        .bind(new.description.as_deref())
        .bind(new.kind.as_deref())
        .bind(new.warehouse.as_deref())
        .bind(new.level.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_location_write_error(e, Some(&new.code)))
    }

    async fn get_location(&self, id: Uuid) -> Result<Option<Location>, AppError> {
        let location = sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(location)
    }

    async fn list_locations(&self) -> Result<Vec<Location>, AppError> {
        let locations = sqlx::query_as::<_, Location>("SELECT * FROM locations ORDER BY code ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(locations)
    }

    async fn update_location(&self, id: Uuid, update: &LocationUpdate) -> Result<Option<Location>, AppError> {
        sqlx::query_as::<_, Location>(
            r#"
            UPDATE locations SET
                code        = COALESCE($2, code),
                description = COALESCE($3, description),
                kind        = COALESCE($4, kind),
                warehouse   = COALESCE($5, warehouse),
                level       = COALESCE($6, level)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.code.as_deref())
        .bind(update.description.as_deref())
        .bind(update.kind.as_deref())
        .bind(update.warehouse.as_deref())
        .bind(update.level.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_location_write_error(e, update.code.as_deref()))
    }

    async fn delete_location(&self, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM locations WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::location_not_found(id));
        }

        let (stocked, movements): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM balances WHERE location_id = $1 AND quantity <> 0),
                (SELECT COUNT(*) FROM movements
                  WHERE source_location_id = $1 OR destination_location_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if stocked > 0 {
            return Err(AppError::InUse(format!("local {id} ainda tem saldo de {stocked} produto(s)")));
        }
        if movements > 0 {
            return Err(AppError::InUse(format!("local {id} tem {movements} movimentação(ões)")));
        }

        sqlx::query("DELETE FROM balances WHERE location_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM locations WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn create_operator(&self, new: &NewOperator) -> Result<Operator, AppError> {
        sqlx::query_as::<_, Operator>(
            r#"
            INSERT INTO operators (id, username, full_name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .bind(&new.full_name)
        .bind(new.role.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_operator_write_error(e, &new.username))
    }

    async fn get_operator(&self, id: Uuid) -> Result<Option<Operator>, AppError> {
        let operator = sqlx::query_as::<_, Operator>("SELECT * FROM operators WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(operator)
    }

    async fn list_operators(&self) -> Result<Vec<Operator>, AppError> {
        let operators = sqlx::query_as::<_, Operator>("SELECT * FROM operators ORDER BY username ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(operators)
    }

    async fn update_operator(&self, id: Uuid, update: &OperatorUpdate) -> Result<Option<Operator>, AppError> {
        let operator = sqlx::query_as::<_, Operator>(
            r#"
            UPDATE operators SET
                full_name = COALESCE($2, full_name),
                role      = COALESCE($3, role),
                active    = COALESCE($4, active)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.full_name.as_deref())
        .bind(update.role.as_deref())
        .bind(update.active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(operator)
    }

    async fn deactivate_operator(&self, id: Uuid) -> Result<Option<Operator>, AppError> {
        let operator = sqlx::query_as::<_, Operator>(
            "UPDATE operators SET active = FALSE WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(operator)
    }
}
