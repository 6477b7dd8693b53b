//! Integration tests for the full fulfillment pipeline.
//!
//! Tests: BatchCoordinator → FulfillmentEngine → unit of work → InMemoryStore
//!
//! Verifies:
//! - Accepted orders persist header, lines, stock decrements and log entries together
//! - Rejected orders leave no trace and do not affect later orders
//! - Injected write failures roll back everything the order had written
//! - Fatal storage failures abort the batch

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use proptest::prelude::*;

    use cafeops_catalog::{MenuItem, Recipe};
    use cafeops_core::{IngredientId, MenuItemId};
    use cafeops_inventory::{InventoryRecord, TransactionType};
    use cafeops_orders::{PaymentMethod, ProposedOrder};

    use crate::fulfillment::{
        BatchCoordinator, BatchError, BatchStatus, FulfillmentEngine, RejectionReason,
    };
    use crate::store::{FailPoint, InMemoryStore};

    fn ingredient(id: &str) -> IngredientId {
        IngredientId::parse(id).unwrap()
    }

    fn menu(id: &str) -> MenuItemId {
        MenuItemId::parse(id).unwrap()
    }

    /// Store with:
    /// - `espresso` (2.50): 1 beans
    /// - `latte` (4.00): 1 beans + 2 milk
    /// - `water` (1.00): no ingredients
    async fn seeded_store(beans: f64, milk: f64) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .put_inventory(InventoryRecord::new(ingredient("beans"), "Espresso beans", beans, "shot", Utc::now()).unwrap())
            .await;
        store
            .put_inventory(InventoryRecord::new(ingredient("milk"), "Milk", milk, "cup", Utc::now()).unwrap())
            .await;

        let espresso = Recipe::new().with(ingredient("beans"), 1.0).unwrap();
        let latte = Recipe::new()
            .with(ingredient("beans"), 1.0)
            .unwrap()
            .with(ingredient("milk"), 2.0)
            .unwrap();
        store
            .put_menu_item(MenuItem::new(menu("espresso"), "Espresso", 2.5, espresso).unwrap())
            .await;
        store
            .put_menu_item(MenuItem::new(menu("latte"), "Latte", 4.0, latte).unwrap())
            .await;
        store
            .put_menu_item(MenuItem::new(menu("water"), "Water", 1.0, Recipe::new()).unwrap())
            .await;
        store
    }

    fn coordinator(store: &Arc<InMemoryStore>) -> BatchCoordinator<Arc<InMemoryStore>> {
        BatchCoordinator::new(store.clone(), FulfillmentEngine::new(PaymentMethod::Cash))
    }

    #[tokio::test]
    async fn feasible_order_is_accepted_with_priced_total() {
        let store = seeded_store(10.0, 10.0).await;
        let report = coordinator(&store)
            .process_batch(vec![ProposedOrder::new("Ada")
                .line(menu("latte"), 2)
                .line(menu("espresso"), 1)])
            .await
            .unwrap();

        let result = &report.processed_orders[0];
        assert_eq!(result.status, BatchStatus::Accepted);
        assert_eq!(result.total, 2.0 * 4.0 + 2.5);
        assert!(result.order_id.is_some());

        assert_eq!(store.stock_level(&ingredient("beans")).await, Some(7.0));
        assert_eq!(store.stock_level(&ingredient("milk")).await, Some(6.0));

        let orders = store.orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].total_amount, 10.5);

        let log = store.transactions().await;
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|t| t.transaction_type == TransactionType::Sale));
        assert_eq!(log[0].ingredient_id, ingredient("beans"));
        assert_eq!(log[0].change_amount, -3.0);
        assert_eq!(log[1].change_amount, -4.0);
    }

    #[tokio::test]
    async fn infeasible_order_is_rejected_and_stock_is_untouched() {
        let store = seeded_store(1.0, 10.0).await;
        let coordinator = coordinator(&store);
        let batch = vec![ProposedOrder::new("Ada").line(menu("latte"), 2)];

        for _ in 0..2 {
            let report = coordinator.process_batch(batch.clone()).await.unwrap();
            let result = &report.processed_orders[0];
            assert_eq!(result.status, BatchStatus::Rejected);
            assert_eq!(result.reason, Some(RejectionReason::InsufficientInventory));
            assert_eq!(result.order_id, None);
            assert_eq!(result.total, 8.0);
            assert_eq!(report.summary.total_revenue, 0.0);

            assert_eq!(store.stock_level(&ingredient("beans")).await, Some(1.0));
            assert_eq!(store.stock_level(&ingredient("milk")).await, Some(10.0));
        }

        assert!(store.orders().await.is_empty());
        assert!(store.all_order_lines().await.is_empty());
        assert!(store.transactions().await.is_empty());
        assert!(store.customers().await.is_empty());
    }

    #[tokio::test]
    async fn failure_after_decrement_rolls_back_the_whole_order() {
        let store = seeded_store(10.0, 10.0).await;
        store.fail_on(FailPoint::RecordTransaction);

        let report = coordinator(&store)
            .process_batch(vec![ProposedOrder::new("Ada").line(menu("latte"), 1)])
            .await
            .unwrap();

        let result = &report.processed_orders[0];
        assert_eq!(result.status, BatchStatus::Rejected);
        assert_eq!(result.reason, Some(RejectionReason::FulfillmentWriteFailed));

        assert_eq!(store.stock_level(&ingredient("beans")).await, Some(10.0));
        assert_eq!(store.stock_level(&ingredient("milk")).await, Some(10.0));
        assert!(store.orders().await.is_empty());
        assert!(store.all_order_lines().await.is_empty());
        assert!(store.transactions().await.is_empty());
        assert!(store.customers().await.is_empty());
    }

    #[tokio::test]
    async fn every_write_step_failure_leaves_storage_unchanged() {
        for point in [
            FailPoint::ResolveCustomer,
            FailPoint::CreateOrder,
            FailPoint::AddLine,
            FailPoint::Decrement,
            FailPoint::RecordTransaction,
        ] {
            let store = seeded_store(10.0, 10.0).await;
            store.fail_on(point);

            let report = coordinator(&store)
                .process_batch(vec![ProposedOrder::new("Ada").line(menu("latte"), 1)])
                .await
                .unwrap();

            assert_eq!(report.summary.rejected, 1, "{point:?}");
            assert_eq!(store.stock_level(&ingredient("beans")).await, Some(10.0), "{point:?}");
            assert!(store.orders().await.is_empty(), "{point:?}");
            assert!(store.transactions().await.is_empty(), "{point:?}");
        }
    }

    #[tokio::test]
    async fn rejected_order_does_not_affect_its_neighbours() {
        let store = seeded_store(3.0, 10.0).await;
        let report = coordinator(&store)
            .process_batch(vec![
                ProposedOrder::new("Ada").line(menu("espresso"), 1),
                ProposedOrder::new("Bob").line(menu("ghost"), 1),
                ProposedOrder::new("Cy").line(menu("espresso"), 5),
                ProposedOrder::new("Dee").line(menu("latte"), 1),
            ])
            .await
            .unwrap();

        let statuses: Vec<_> = report.processed_orders.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                BatchStatus::Accepted,
                BatchStatus::Rejected,
                BatchStatus::Rejected,
                BatchStatus::Accepted,
            ]
        );
        assert_eq!(
            report.processed_orders[1].reason,
            Some(RejectionReason::UnknownMenuItem)
        );
        assert_eq!(report.summary.accepted, 2);
        assert_eq!(report.summary.rejected, 2);
        assert_eq!(report.summary.total_revenue, 2.5 + 4.0);

        let orders = store.orders().await;
        assert_eq!(orders.len(), 2);
        let accepted_ids: Vec<_> = report
            .processed_orders
            .iter()
            .filter_map(|r| r.order_id)
            .collect();
        assert_eq!(orders.iter().map(|o| o.id).collect::<Vec<_>>(), accepted_ids);
        assert_eq!(store.stock_level(&ingredient("beans")).await, Some(1.0));
    }

    #[tokio::test]
    async fn exact_stock_is_accepted_and_leaves_zero() {
        let store = seeded_store(4.0, 8.0).await;
        let report = coordinator(&store)
            .process_batch(vec![ProposedOrder::new("Ada").line(menu("latte"), 4)])
            .await
            .unwrap();

        assert_eq!(report.processed_orders[0].status, BatchStatus::Accepted);
        assert_eq!(store.stock_level(&ingredient("beans")).await, Some(0.0));
        assert_eq!(store.stock_level(&ingredient("milk")).await, Some(0.0));
    }

    #[tokio::test]
    async fn fractional_recipe_at_exact_stock_is_accepted() {
        let store = seeded_store(10.0, 10.0).await;
        store
            .put_inventory(InventoryRecord::new(ingredient("vanilla"), "Vanilla", 0.3, "shot", Utc::now()).unwrap())
            .await;
        let recipe = Recipe::new().with(ingredient("vanilla"), 0.1).unwrap();
        store
            .put_menu_item(MenuItem::new(menu("vanilla_shot"), "Vanilla shot", 0.5, recipe).unwrap())
            .await;

        let report = coordinator(&store)
            .process_batch(vec![ProposedOrder::new("Ada").line(menu("vanilla_shot"), 3)])
            .await
            .unwrap();

        let result = &report.processed_orders[0];
        assert_eq!(result.status, BatchStatus::Accepted, "{:?}", result.message);
        assert_eq!(store.stock_level(&ingredient("vanilla")).await, Some(0.0));
        assert_eq!(report.summary.inventory_updates[0].remaining_stock, 0.0);
    }

    #[tokio::test]
    async fn second_order_sees_stock_left_by_the_first() {
        let store = seeded_store(5.0, 10.0).await;
        let report = coordinator(&store)
            .process_batch(vec![
                ProposedOrder::new("A").line(menu("espresso"), 2),
                ProposedOrder::new("B").line(menu("espresso"), 4),
            ])
            .await
            .unwrap();

        assert_eq!(report.processed_orders[0].status, BatchStatus::Accepted);
        assert_eq!(report.processed_orders[1].status, BatchStatus::Rejected);
        assert_eq!(
            report.processed_orders[1].reason,
            Some(RejectionReason::InsufficientInventory)
        );
        assert_eq!(store.stock_level(&ingredient("beans")).await, Some(3.0));

        let summary = &report.summary;
        assert_eq!(summary.total_orders, 2);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.total_revenue, report.processed_orders[0].total);
        assert_eq!(summary.inventory_updates.len(), 1);
        assert_eq!(summary.inventory_updates[0].quantity_used, 2.0);
        assert_eq!(summary.inventory_updates[0].remaining_stock, 3.0);
    }

    #[tokio::test]
    async fn persisted_lines_keep_the_price_at_order() {
        let store = seeded_store(10.0, 10.0).await;
        let coordinator = coordinator(&store);
        let report = coordinator
            .process_batch(vec![ProposedOrder::new("Ada")
                .line(menu("latte"), 2)
                .line(menu("water"), 3)])
            .await
            .unwrap();
        let order_id = report.processed_orders[0].order_id.unwrap();

        store.set_menu_price(&menu("latte"), 9.0).await.unwrap();

        let receipt = coordinator.order_receipt(order_id).await.unwrap().unwrap();
        let lines: Vec<_> = receipt
            .lines
            .iter()
            .map(|l| (l.menu_item_id.as_str(), l.quantity, l.price_at_order))
            .collect();
        assert_eq!(lines, vec![("latte", 2, 4.0), ("water", 3, 1.0)]);
        assert_eq!(receipt.lines_total(), receipt.order.total_amount);
        assert_eq!(receipt.order.total_amount, 11.0);
    }

    #[tokio::test]
    async fn unknown_order_has_no_receipt() {
        let store = seeded_store(1.0, 1.0).await;
        let receipt = coordinator(&store)
            .order_receipt(cafeops_core::OrderId::new(42))
            .await
            .unwrap();
        assert!(receipt.is_none());
    }

    #[tokio::test]
    async fn same_customer_name_resolves_to_one_customer() {
        let store = seeded_store(10.0, 10.0).await;
        coordinator(&store)
            .process_batch(vec![
                ProposedOrder::new("Ada").line(menu("espresso"), 1),
                ProposedOrder::new("  Ada ").line(menu("espresso"), 1),
            ])
            .await
            .unwrap();

        let customers = store.customers().await;
        assert_eq!(customers.len(), 1);
        let orders = store.orders().await;
        assert_eq!(orders[0].customer_id, orders[1].customer_id);
    }

    #[tokio::test]
    async fn invalid_orders_are_screened_without_opening_a_unit() {
        let store = seeded_store(10.0, 10.0).await;
        // Reaching `begin` would surface as a fatal Storage error.
        store.fail_on(FailPoint::Begin);

        let report = coordinator(&store)
            .process_batch(vec![
                ProposedOrder::new("Bob").line(menu("espresso"), 0),
                ProposedOrder::new("   ").line(menu("espresso"), 1),
                ProposedOrder::new("Cy"),
            ])
            .await
            .unwrap();

        assert_eq!(report.processed_orders.len(), 3);
        for result in &report.processed_orders {
            assert_eq!(result.status, BatchStatus::Rejected);
            assert_eq!(result.reason, Some(RejectionReason::InvalidOrder));
            assert_eq!(result.total, 0.0);
        }
        assert!(report.processed_orders[0]
            .message
            .as_deref()
            .unwrap()
            .contains("quantity must be positive"));
        assert_eq!(report.summary.total_orders, 3);
        assert_eq!(report.summary.rejected, 3);
    }

    #[tokio::test]
    async fn invalid_order_does_not_hold_back_valid_ones() {
        let store = seeded_store(10.0, 10.0).await;

        let report = coordinator(&store)
            .process_batch(vec![
                ProposedOrder::new("Ada").line(menu("espresso"), 1),
                ProposedOrder::new("Bob").line(menu("espresso"), 0),
                ProposedOrder::new("Cy").line(menu("espresso"), 2),
            ])
            .await
            .unwrap();

        let statuses: Vec<_> = report.processed_orders.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![BatchStatus::Accepted, BatchStatus::Rejected, BatchStatus::Accepted]
        );
        assert_eq!(report.processed_orders[1].customer_name, "Bob");
        assert_eq!(report.summary.accepted, 2);
        assert_eq!(report.summary.total_revenue, 7.5);
        assert_eq!(store.orders().await.len(), 2);
        assert_eq!(store.stock_level(&ingredient("beans")).await, Some(7.0));
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_report() {
        let store = seeded_store(1.0, 1.0).await;
        let report = coordinator(&store).process_batch(vec![]).await.unwrap();
        assert!(report.processed_orders.is_empty());
        assert_eq!(report.summary.total_orders, 0);
        assert_eq!(report.summary.total_revenue, 0.0);
    }

    #[tokio::test]
    async fn begin_failure_is_fatal() {
        let store = seeded_store(10.0, 10.0).await;
        store.fail_on(FailPoint::Begin);

        let err = coordinator(&store)
            .process_batch(vec![ProposedOrder::new("Ada").line(menu("espresso"), 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::Storage(_)));
    }

    #[tokio::test]
    async fn commit_failure_is_fatal_and_discards_the_order() {
        let store = seeded_store(10.0, 10.0).await;
        store.fail_on(FailPoint::Commit);

        let err = coordinator(&store)
            .process_batch(vec![
                ProposedOrder::new("Ada").line(menu("espresso"), 1),
                ProposedOrder::new("Bob").line(menu("espresso"), 1),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::Storage(_)));
        assert!(store.orders().await.is_empty());
        assert_eq!(store.stock_level(&ingredient("beans")).await, Some(10.0));
    }

    #[tokio::test]
    async fn concurrent_batches_never_oversell() {
        let store = seeded_store(5.0, 0.0).await;
        let mut handles = Vec::new();
        for i in 0..8 {
            let coordinator = coordinator(&store);
            handles.push(tokio::spawn(async move {
                coordinator
                    .process_batch(vec![ProposedOrder::new(format!("c{i}")).line(menu("espresso"), 1)])
                    .await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            accepted += handle.await.unwrap().unwrap().summary.accepted;
        }

        assert_eq!(accepted, 5);
        assert_eq!(store.stock_level(&ingredient("beans")).await, Some(0.0));
        assert_eq!(store.orders().await.len(), 5);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: whatever mix of quantities is submitted, committed rows
        /// match the summary exactly and stock never goes negative.
        #[test]
        fn summary_matches_committed_rows(
            stock in 0u32..20,
            quantities in prop::collection::vec(1i64..6, 0..8),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = seeded_store(f64::from(stock), 0.0).await;
                let batch: Vec<_> = quantities
                    .iter()
                    .enumerate()
                    .map(|(i, q)| ProposedOrder::new(format!("c{i}")).line(menu("espresso"), *q))
                    .collect();
                let report = coordinator(&store).process_batch(batch).await.unwrap();

                let orders = store.orders().await;
                let revenue: f64 = orders.iter().map(|o| o.total_amount).sum();
                let used: i64 = report
                    .processed_orders
                    .iter()
                    .zip(&quantities)
                    .filter(|(r, _)| r.status == BatchStatus::Accepted)
                    .map(|(_, q)| *q)
                    .sum();
                let remaining = store.stock_level(&ingredient("beans")).await.unwrap();

                assert_eq!(report.processed_orders.len(), quantities.len());
                assert_eq!(orders.len(), report.summary.accepted);
                assert_eq!(revenue, report.summary.total_revenue);
                assert_eq!(remaining, f64::from(stock) - used as f64);
                assert!(remaining >= 0.0);
            });
        }
    }
}
