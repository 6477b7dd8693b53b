//! Infrastructure wiring: which store backs the batch coordinator.

use std::sync::Arc;

use tracing::info;

use cafeops_core::OrderId;
use cafeops_infra::fulfillment::{BatchCoordinator, BatchError, BatchReport, FulfillmentEngine};
use cafeops_infra::store::{InMemoryStore, PostgresStore, StoreError};
use cafeops_orders::{OrderReceipt, ProposedOrder};

use crate::config::AppConfig;

#[derive(Debug, Clone)]
pub enum AppServices {
    InMemory {
        coordinator: BatchCoordinator<Arc<InMemoryStore>>,
    },
    Postgres {
        coordinator: BatchCoordinator<Arc<PostgresStore>>,
    },
}

impl AppServices {
    /// Services over an existing in-memory store (dev/tests seed it directly).
    pub fn in_memory(store: Arc<InMemoryStore>, engine: FulfillmentEngine) -> Self {
        AppServices::InMemory {
            coordinator: BatchCoordinator::new(store, engine),
        }
    }

    pub fn postgres(store: Arc<PostgresStore>, engine: FulfillmentEngine) -> Self {
        AppServices::Postgres {
            coordinator: BatchCoordinator::new(store, engine),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            AppServices::InMemory { .. } => "in_memory",
            AppServices::Postgres { .. } => "postgres",
        }
    }

    pub async fn process_batch(&self, orders: Vec<ProposedOrder>) -> Result<BatchReport, BatchError> {
        match self {
            AppServices::InMemory { coordinator } => coordinator.process_batch(orders).await,
            AppServices::Postgres { coordinator } => coordinator.process_batch(orders).await,
        }
    }

    pub async fn order_receipt(&self, id: OrderId) -> Result<Option<OrderReceipt>, StoreError> {
        match self {
            AppServices::InMemory { coordinator } => coordinator.order_receipt(id).await,
            AppServices::Postgres { coordinator } => coordinator.order_receipt(id).await,
        }
    }
}

/// Build services from configuration: Postgres when a database URL is set,
/// otherwise an empty in-memory store.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    let engine = FulfillmentEngine::new(config.payment_method);

    let Some(url) = config.database_url.as_deref() else {
        info!("no database configured; using in-memory store");
        return Ok(AppServices::in_memory(Arc::new(InMemoryStore::new()), engine));
    };

    let store = PostgresStore::connect(url, config.db_max_connections).await?;
    if config.run_migrations {
        store.migrate().await?;
        info!("database migrations applied");
    }
    Ok(AppServices::postgres(Arc::new(store), engine))
}
