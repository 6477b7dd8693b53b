use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use cafeops_catalog::MenuItem;
use cafeops_core::{CustomerId, DomainError, DomainResult, IngredientId, MenuItemId, OrderId};
use cafeops_customers::{Customer, CustomerName};
use cafeops_inventory::{DecrementOutcome, InventoryRecord, InventoryTransaction};
use cafeops_orders::{NewOrder, Order, OrderLine};

use super::r#trait::{
    CatalogReader, CustomerDirectory, InventoryLedger, OrderLedger, StoreError, UnitOfWork,
    UnitProvider,
};

/// Operations that can be made to fail on purpose (tests/dev).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    ResolveCustomer,
    CreateOrder,
    AddLine,
    Decrement,
    RecordTransaction,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    menu_items: BTreeMap<MenuItemId, MenuItem>,
    inventory: BTreeMap<IngredientId, InventoryRecord>,
    customers: BTreeMap<CustomerName, CustomerId>,
    orders: BTreeMap<OrderId, Order>,
    order_lines: Vec<OrderLine>,
    transactions: Vec<InventoryTransaction>,
    last_customer_id: i64,
    last_order_id: i64,
}

/// In-memory relational store.
///
/// Intended for tests/dev. A unit of work holds the table lock for its whole
/// lifetime and writes to a private copy, so units are fully serialized and
/// an uncommitted unit is invisible to everyone else.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_points: RwLock<HashSet<FailPoint>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future occurrence of `point` fail until cleared.
    pub fn fail_on(&self, point: FailPoint) {
        if let Ok(mut points) = self.fail_points.write() {
            points.insert(point);
        }
    }

    pub fn clear_fail_points(&self) {
        if let Ok(mut points) = self.fail_points.write() {
            points.clear();
        }
    }

    pub async fn put_menu_item(&self, item: MenuItem) {
        let mut tables = self.tables.lock().await;
        tables.menu_items.insert(item.id.clone(), item);
    }

    pub async fn put_inventory(&self, record: InventoryRecord) {
        let mut tables = self.tables.lock().await;
        tables.inventory.insert(record.ingredient_id.clone(), record);
    }

    /// Change a menu item's catalog price (orders already placed keep theirs).
    pub async fn set_menu_price(&self, id: &MenuItemId, price: f64) -> DomainResult<()> {
        if !price.is_finite() || price <= 0.0 {
            return Err(DomainError::validation("price must be greater than 0"));
        }
        let mut tables = self.tables.lock().await;
        let item = tables.menu_items.get_mut(id).ok_or_else(DomainError::not_found)?;
        item.price = price;
        Ok(())
    }

    pub async fn stock_level(&self, id: &IngredientId) -> Option<f64> {
        let tables = self.tables.lock().await;
        tables.inventory.get(id).map(|r| r.stock)
    }

    pub async fn orders(&self) -> Vec<Order> {
        let tables = self.tables.lock().await;
        tables.orders.values().cloned().collect()
    }

    pub async fn all_order_lines(&self) -> Vec<OrderLine> {
        let tables = self.tables.lock().await;
        tables.order_lines.clone()
    }

    pub async fn transactions(&self) -> Vec<InventoryTransaction> {
        let tables = self.tables.lock().await;
        tables.transactions.clone()
    }

    pub async fn customers(&self) -> Vec<Customer> {
        let tables = self.tables.lock().await;
        tables
            .customers
            .iter()
            .map(|(name, id)| Customer {
                id: *id,
                name: name.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl UnitProvider for InMemoryStore {
    type Unit = InMemoryUnit;

    async fn begin(&self) -> Result<Self::Unit, StoreError> {
        let fail_points = self
            .fail_points
            .read()
            .map_err(|_| StoreError::Unavailable("fail-point lock poisoned".to_string()))?
            .clone();
        if fail_points.contains(&FailPoint::Begin) {
            return Err(StoreError::Unavailable("injected failure at Begin".to_string()));
        }

        let committed = self.tables.clone().lock_owned().await;
        let working = committed.clone();
        Ok(InMemoryUnit {
            committed,
            working,
            fail_points,
        })
    }
}

/// Unit of work over an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryUnit {
    committed: OwnedMutexGuard<Tables>,
    working: Tables,
    fail_points: HashSet<FailPoint>,
}

impl InMemoryUnit {
    fn trip(&self, point: FailPoint) -> Result<(), StoreError> {
        if self.fail_points.contains(&point) {
            return Err(StoreError::Query(format!("injected failure at {point:?}")));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogReader for InMemoryUnit {
    async fn menu_item(&mut self, id: &MenuItemId) -> Result<Option<MenuItem>, StoreError> {
        Ok(self.working.menu_items.get(id).cloned())
    }
}

#[async_trait]
impl InventoryLedger for InMemoryUnit {
    async fn stock(&mut self, id: &IngredientId) -> Result<Option<f64>, StoreError> {
        Ok(self.working.inventory.get(id).map(|r| r.stock))
    }

    async fn decrement(
        &mut self,
        id: &IngredientId,
        amount: f64,
    ) -> Result<DecrementOutcome, StoreError> {
        self.trip(FailPoint::Decrement)?;
        match self.working.inventory.get_mut(id) {
            Some(record) => Ok(record.decrement(amount, Utc::now())),
            None => Ok(DecrementOutcome::Insufficient { available: 0.0 }),
        }
    }

    async fn record_transaction(&mut self, entry: &InventoryTransaction) -> Result<(), StoreError> {
        self.trip(FailPoint::RecordTransaction)?;
        if !self.working.inventory.contains_key(&entry.ingredient_id) {
            return Err(StoreError::Constraint(format!(
                "inventory row '{}' does not exist",
                entry.ingredient_id
            )));
        }
        self.working.transactions.push(entry.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderLedger for InMemoryUnit {
    async fn create_order(&mut self, order: &NewOrder) -> Result<OrderId, StoreError> {
        self.trip(FailPoint::CreateOrder)?;
        if !self.working.customers.values().any(|id| *id == order.customer_id) {
            return Err(StoreError::Constraint(format!(
                "customer {} does not exist",
                order.customer_id
            )));
        }

        self.working.last_order_id += 1;
        let id = OrderId::new(self.working.last_order_id);
        let now = Utc::now();
        self.working.orders.insert(
            id,
            Order {
                id,
                customer_id: order.customer_id,
                total_amount: order.total_amount,
                status: order.status,
                payment_method: order.payment_method,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn add_line(&mut self, line: &OrderLine) -> Result<(), StoreError> {
        self.trip(FailPoint::AddLine)?;
        if !self.working.orders.contains_key(&line.order_id) {
            return Err(StoreError::Constraint(format!(
                "order {} does not exist",
                line.order_id
            )));
        }
        if !self.working.menu_items.contains_key(&line.menu_item_id) {
            return Err(StoreError::Constraint(format!(
                "menu item '{}' does not exist",
                line.menu_item_id
            )));
        }
        self.working.order_lines.push(line.clone());
        Ok(())
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn order_lines(&mut self, id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        Ok(self
            .working
            .order_lines
            .iter()
            .filter(|l| l.order_id == id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryUnit {
    async fn resolve_or_create(&mut self, name: &CustomerName) -> Result<CustomerId, StoreError> {
        self.trip(FailPoint::ResolveCustomer)?;
        if let Some(id) = self.working.customers.get(name) {
            return Ok(*id);
        }
        self.working.last_customer_id += 1;
        let id = CustomerId::new(self.working.last_customer_id);
        self.working.customers.insert(name.clone(), id);
        Ok(id)
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnit {
    async fn commit(self) -> Result<(), StoreError> {
        self.trip(FailPoint::Commit)?;
        let InMemoryUnit {
            mut committed,
            working,
            ..
        } = self;
        *committed = working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
