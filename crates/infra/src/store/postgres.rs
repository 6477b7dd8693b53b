//! Postgres-backed store.
//!
//! Each unit of work is one database transaction. Dropping a [`PostgresUnit`]
//! without committing rolls the transaction back.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Constraint` |
//! | Database (foreign key violation) | `23503` | `Constraint` |
//! | Database (check constraint violation) | `23514` | `Constraint` |
//! | Database (other) | Any other | `Query` |
//! | PoolClosed / PoolTimedOut / Io / Tls | N/A | `Unavailable` |
//! | ColumnDecode / Decode / ColumnNotFound | N/A | `Decode` |
//! | Other | N/A | `Query` |
//!
//! ## Stock decrement
//!
//! The floor check lives in the `UPDATE` itself
//! (`... WHERE id = $1 AND stock >= $2 - $3`), so two transactions racing for
//! the same row can never both pass it: the second blocks on the row lock and
//! then re-evaluates the predicate against the committed value. `$3` is the
//! same slack [`cafeops_inventory::stock::covers`] allows, and the new level is
//! clamped at zero so the `stock >= 0` check constraint holds.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{instrument, Span};

use cafeops_catalog::{MenuItem, Recipe};
use cafeops_core::{CustomerId, DomainError, IngredientId, MenuItemId, OrderId};
use cafeops_customers::CustomerName;
use cafeops_inventory::{DecrementOutcome, InventoryRecord, InventoryTransaction, tolerance_for};
use cafeops_orders::{NewOrder, Order, OrderLine};

use super::r#trait::{
    CatalogReader, CustomerDirectory, InventoryLedger, OrderLedger, StoreError, UnitOfWork,
    UnitProvider,
};

/// Postgres-backed relational store.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a connection pool against `url`.
    #[instrument(skip(url), err)]
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| StoreError::Query(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert or replace a menu item together with its recipe.
    #[instrument(skip(self, item), fields(menu_item_id = %item.id), err)]
    pub async fn upsert_menu_item(&self, item: &MenuItem) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO menu_items (id, name, price)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, price = EXCLUDED.price
            "#,
        )
        .bind(item.id.as_str())
        .bind(&item.name)
        .bind(item.price)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_menu_item", e))?;

        sqlx::query("DELETE FROM menu_item_ingredients WHERE menu_item_id = $1")
            .bind(item.id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("clear_recipe", e))?;

        for (ingredient_id, quantity) in item.recipe.iter() {
            sqlx::query(
                r#"
                INSERT INTO menu_item_ingredients (menu_item_id, ingredient_id, quantity)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(item.id.as_str())
            .bind(ingredient_id.as_str())
            .bind(quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_recipe_entry", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    /// Insert or replace an inventory row.
    #[instrument(skip(self, record), fields(ingredient_id = %record.ingredient_id), err)]
    pub async fn upsert_inventory(&self, record: &InventoryRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory (id, name, stock, unit, last_updated)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                stock = EXCLUDED.stock,
                unit = EXCLUDED.unit,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(record.ingredient_id.as_str())
        .bind(&record.name)
        .bind(record.stock)
        .bind(&record.unit)
        .bind(record.last_updated)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_inventory", e))?;
        Ok(())
    }
}

#[async_trait]
impl UnitProvider for PostgresStore {
    type Unit = PostgresUnit;

    async fn begin(&self) -> Result<Self::Unit, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PostgresUnit { tx })
    }
}

/// Unit of work backed by one Postgres transaction.
pub struct PostgresUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CatalogReader for PostgresUnit {
    #[instrument(
        skip(self),
        fields(menu_item_id = %id, recipe_entries = tracing::field::Empty),
        err
    )]
    async fn menu_item(&mut self, id: &MenuItemId) -> Result<Option<MenuItem>, StoreError> {
        let row = sqlx::query("SELECT id, name, price FROM menu_items WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_menu_item", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let name: String = row.try_get("name").map_err(|e| map_sqlx_error("load_menu_item", e))?;
        let price: f64 = row.try_get("price").map_err(|e| map_sqlx_error("load_menu_item", e))?;

        let entries = sqlx::query(
            r#"
            SELECT ingredient_id, quantity
            FROM menu_item_ingredients
            WHERE menu_item_id = $1
            ORDER BY ingredient_id ASC
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_recipe", e))?;

        let mut recipe = Recipe::new();
        for entry in &entries {
            let ingredient_id: String = entry
                .try_get("ingredient_id")
                .map_err(|e| map_sqlx_error("load_recipe", e))?;
            let quantity: f64 = entry
                .try_get("quantity")
                .map_err(|e| map_sqlx_error("load_recipe", e))?;
            recipe = recipe
                .with(IngredientId::parse(ingredient_id).map_err(decode_error)?, quantity)
                .map_err(decode_error)?;
        }

        Span::current().record("recipe_entries", entries.len());
        MenuItem::new(id.clone(), name, price, recipe)
            .map(Some)
            .map_err(decode_error)
    }
}

#[async_trait]
impl InventoryLedger for PostgresUnit {
    #[instrument(skip(self), fields(ingredient_id = %id), err)]
    async fn stock(&mut self, id: &IngredientId) -> Result<Option<f64>, StoreError> {
        let row = sqlx::query("SELECT stock FROM inventory WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_stock", e))?;

        row.map(|r| r.try_get::<f64, _>("stock"))
            .transpose()
            .map_err(|e| map_sqlx_error("load_stock", e))
    }

    #[instrument(skip(self), fields(ingredient_id = %id), err)]
    async fn decrement(
        &mut self,
        id: &IngredientId,
        amount: f64,
    ) -> Result<DecrementOutcome, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE inventory
            SET stock = GREATEST(stock - $2, 0), last_updated = NOW()
            WHERE id = $1 AND stock >= $2 - $3
            RETURNING stock
            "#,
        )
        .bind(id.as_str())
        .bind(amount)
        .bind(tolerance_for(amount))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("decrement_stock", e))?;

        if let Some(row) = row {
            let remaining: f64 = row
                .try_get("stock")
                .map_err(|e| map_sqlx_error("decrement_stock", e))?;
            return Ok(DecrementOutcome::Applied { remaining });
        }

        let available = self.stock(id).await?.unwrap_or(0.0);
        Ok(DecrementOutcome::Insufficient { available })
    }

    #[instrument(skip(self, entry), fields(ingredient_id = %entry.ingredient_id), err)]
    async fn record_transaction(&mut self, entry: &InventoryTransaction) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_transactions (inventory_id, change_amount, transaction_type)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(entry.ingredient_id.as_str())
        .bind(entry.change_amount)
        .bind(entry.transaction_type.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_inventory_transaction", e))?;
        Ok(())
    }
}

#[async_trait]
impl OrderLedger for PostgresUnit {
    #[instrument(skip(self, order), fields(customer_id = %order.customer_id), err)]
    async fn create_order(&mut self, order: &NewOrder) -> Result<OrderId, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders (customer_id, total_amount, status, payment_method)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(order.customer_id.get())
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(order.payment_method.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        let id: i64 = row.try_get("id").map_err(|e| map_sqlx_error("insert_order", e))?;
        Ok(OrderId::new(id))
    }

    #[instrument(skip(self, line), fields(order_id = %line.order_id, menu_item_id = %line.menu_item_id), err)]
    async fn add_line(&mut self, line: &OrderLine) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, menu_item_id, quantity, price_at_order)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(line.order_id.get())
        .bind(line.menu_item_id.as_str())
        .bind(line.quantity)
        .bind(line.price_at_order)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order_item", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, total_amount, status, payment_method, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_order", e))?;

        row.as_ref().map(order_from_row).transpose()
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn order_lines(&mut self, id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, menu_item_id, quantity, price_at_order
            FROM order_items
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(id.get())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_order_items", e))?;

        rows.iter().map(order_line_from_row).collect()
    }
}

#[async_trait]
impl CustomerDirectory for PostgresUnit {
    #[instrument(skip(self), fields(customer = %name), err)]
    async fn resolve_or_create(&mut self, name: &CustomerName) -> Result<CustomerId, StoreError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query(
            r#"
            INSERT INTO customers (name)
            VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(name.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_customer", e))?;

        let id: i64 = row.try_get("id").map_err(|e| map_sqlx_error("upsert_customer", e))?;
        Ok(CustomerId::new(id))
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnit {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let map = |e| map_sqlx_error("decode_order", e);
    let status: String = row.try_get("status").map_err(map)?;
    let payment_method: String = row.try_get("payment_method").map_err(map)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(map)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(map)?;

    Ok(Order {
        id: OrderId::new(row.try_get("id").map_err(map)?),
        customer_id: CustomerId::new(row.try_get("customer_id").map_err(map)?),
        total_amount: row.try_get("total_amount").map_err(map)?,
        status: status.parse().map_err(decode_error)?,
        payment_method: payment_method.parse().map_err(decode_error)?,
        created_at,
        updated_at,
    })
}

fn order_line_from_row(row: &PgRow) -> Result<OrderLine, StoreError> {
    let map = |e| map_sqlx_error("decode_order_item", e);
    let menu_item_id: String = row.try_get("menu_item_id").map_err(map)?;

    Ok(OrderLine {
        order_id: OrderId::new(row.try_get("order_id").map_err(map)?),
        menu_item_id: MenuItemId::parse(menu_item_id).map_err(decode_error)?,
        quantity: row.try_get("quantity").map_err(map)?,
        price_at_order: row.try_get("price_at_order").map_err(map)?,
    })
}

fn decode_error(err: DomainError) -> StoreError {
    StoreError::Decode(err.to_string())
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") | Some("23514") => StoreError::Constraint(msg),
                _ => StoreError::Query(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {}", operation))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {}: {}", operation, e)),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {}: {}", operation, e)),
        e @ (sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)) => {
            StoreError::Decode(format!("in {}: {}", operation, e))
        }
        _ => StoreError::Query(format!("sqlx error in {}: {}", operation, err)),
    }
}
