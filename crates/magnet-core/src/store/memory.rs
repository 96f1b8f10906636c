//! In-memory stores (for development and tests)

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AddressStore, Insertion, OrderStore, PendingCheckoutStore};
use crate::address::Address;
use crate::checkout::{CheckoutToken, PendingCheckout, PendingOrder};
use crate::error::{CoreError, Result};
use crate::order::{NewOrder, Order, OrderItem, OrderStatus, PaymentOutcome, PaymentTransaction, Transition};

#[derive(Default)]
struct OrderTables {
    orders: HashMap<Uuid, Order>,
    by_intent: HashMap<String, Uuid>,
    items: HashMap<Uuid, Vec<OrderItem>>,
    transactions: HashMap<String, PaymentTransaction>,
}

/// In-memory order store.
///
/// One lock guards every table so an order and its items, and the unique
/// intent index, always change together.
#[derive(Default)]
pub struct MemoryOrderStore {
    tables: RwLock<OrderTables>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert_order(&self, order: NewOrder) -> Result<Insertion> {
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables
            .by_intent
            .get(&order.payment_intent_id)
            .and_then(|id| tables.orders.get(id))
        {
            tracing::debug!(
                order_id = %existing.id,
                payment_intent_id = %order.payment_intent_id,
                "Order already exists for intent"
            );
            return Ok(Insertion::Existing(existing.clone()));
        }

        let (order, items) = order.into_records();
        tables.by_intent.insert(order.payment_intent_id.clone(), order.id);
        tables.items.insert(order.id, items);
        tables.orders.insert(order.id, order.clone());

        Ok(Insertion::Created(order))
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn find_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_intent
            .get(payment_intent_id)
            .and_then(|id| tables.orders.get(id))
            .cloned())
    }

    async fn order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
        let tables = self.tables.read().await;
        Ok(tables.items.get(&order_id).cloned().unwrap_or_default())
    }

    async fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|order| order.belongs_to(user_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn apply_payment_outcome(
        &self,
        payment_intent_id: &str,
        outcome: PaymentOutcome,
    ) -> Result<Option<(Order, Transition)>> {
        let mut tables = self.tables.write().await;

        let Some(id) = tables.by_intent.get(payment_intent_id).copied() else {
            return Ok(None);
        };
        let order = tables
            .orders
            .get_mut(&id)
            .ok_or_else(|| CoreError::Storage(format!("Intent index points at missing order {id}")))?;

        let transition = order.apply_payment_outcome(outcome);
        Ok(Some((order.clone(), transition)))
    }

    async fn set_status(&self, order_id: Uuid, status: OrderStatus) -> Result<(Order, Transition)> {
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .get_mut(&order_id)
            .ok_or(CoreError::OrderNotFound(order_id))?;

        let transition = order.transition_to(status)?;
        Ok((order.clone(), transition))
    }

    async fn upsert_transaction(&self, transaction: PaymentTransaction) -> Result<PaymentTransaction> {
        let mut tables = self.tables.write().await;

        let saved = match tables.transactions.get(&transaction.payment_intent_id) {
            Some(existing) => PaymentTransaction {
                id: existing.id,
                order_id: transaction.order_id.or(existing.order_id),
                ..transaction
            },
            None => transaction,
        };
        tables
            .transactions
            .insert(saved.payment_intent_id.clone(), saved.clone());
        Ok(saved)
    }

    async fn transaction_for_intent(&self, payment_intent_id: &str) -> Result<Option<PaymentTransaction>> {
        Ok(self
            .tables
            .read()
            .await
            .transactions
            .get(payment_intent_id)
            .cloned())
    }
}

/// In-memory address book
#[derive(Default)]
pub struct MemoryAddressStore {
    addresses: RwLock<HashMap<String, Address>>,
}

impl MemoryAddressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AddressStore for MemoryAddressStore {
    async fn add_address(&self, address: Address) -> Result<Address> {
        self.addresses
            .write()
            .await
            .insert(address.id.clone(), address.clone());
        Ok(address)
    }

    async fn get_address(&self, id: &str) -> Result<Option<Address>> {
        Ok(self.addresses.read().await.get(id).cloned())
    }

    async fn addresses_for_user(&self, user_id: &str) -> Result<Vec<Address>> {
        let addresses = self.addresses.read().await;
        let mut owned: Vec<Address> = addresses
            .values()
            .filter(|address| address.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(owned)
    }
}

/// In-memory pending checkout records
#[derive(Default)]
pub struct MemoryPendingCheckoutStore {
    records: RwLock<HashMap<CheckoutToken, PendingCheckout>>,
}

impl MemoryPendingCheckoutStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PendingCheckoutStore for MemoryPendingCheckoutStore {
    async fn put(&self, order: PendingOrder, ttl: Duration) -> Result<PendingCheckout> {
        let record = PendingCheckout::new(order, ttl);
        let mut records = self.records.write().await;
        records.retain(|_, existing| !existing.is_expired());
        records.insert(record.token.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, token: &CheckoutToken) -> Result<Option<PendingCheckout>> {
        Ok(self
            .records
            .read()
            .await
            .get(token)
            .filter(|record| !record.is_expired())
            .cloned())
    }

    async fn take(&self, token: &CheckoutToken) -> Result<Option<PendingCheckout>> {
        Ok(self
            .records
            .write()
            .await
            .remove(token)
            .filter(|record| !record.is_expired()))
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut records = self.records.write().await;
        let before = records.len();
        let now = Utc::now();
        records.retain(|_, record| record.expires_at > now);
        Ok(before - records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::LineItem;
    use crate::order::{IntentStatus, NewOrderItem, PaymentStatus};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn new_order(intent: &str) -> NewOrder {
        NewOrder {
            user_id: "user_1".into(),
            status: OrderStatus::PendingPayment,
            payment_status: PaymentStatus::Pending,
            shipping_address_id: "addr_1".into(),
            subtotal: dec!(19.98),
            shipping_cost: dec!(0),
            tax: dec!(0),
            total: dec!(19.98),
            currency: "GBP".into(),
            payment_intent_id: intent.into(),
            items: vec![NewOrderItem {
                product_ref: "magnet-square".into(),
                quantity: 2,
                price_per_unit: dec!(9.99),
                image_url: Some("uploads/a.jpg".into()),
                size: Some("5x5".into()),
            }],
        }
    }

    #[tokio::test]
    async fn test_insert_writes_order_and_items() {
        let store = MemoryOrderStore::new();
        let inserted = store.insert_order(new_order("pi_1")).await.unwrap();
        assert!(inserted.was_created());

        let items = store.order_items(inserted.order().id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].order_id, inserted.order().id);
    }

    #[tokio::test]
    async fn test_duplicate_intent_returns_existing_order() {
        let store = MemoryOrderStore::new();
        let first = store.insert_order(new_order("pi_1")).await.unwrap();
        let second = store.insert_order(new_order("pi_1")).await.unwrap();

        assert!(!second.was_created());
        assert_eq!(first.order().id, second.order().id);
        assert_eq!(store.order_count().await, 1);
        assert_eq!(store.order_items(first.order().id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_create_one_order() {
        let store = Arc::new(MemoryOrderStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.insert_order(new_order("pi_race")).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().was_created() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_payment_outcome_without_order() {
        let store = MemoryOrderStore::new();
        let result = store
            .apply_payment_outcome("pi_unknown", PaymentOutcome::Succeeded)
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_payment_outcome_applied() {
        let store = MemoryOrderStore::new();
        store.insert_order(new_order("pi_1")).await.unwrap();

        let (order, transition) = store
            .apply_payment_outcome("pi_1", PaymentOutcome::Succeeded)
            .await
            .unwrap()
            .unwrap();
        assert!(transition.is_applied());
        assert_eq!(order.status, OrderStatus::Processing);

        let stored = store.find_by_payment_intent("pi_1").await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_set_status_unknown_order() {
        let store = MemoryOrderStore::new();
        let err = store
            .set_status(Uuid::new_v4(), OrderStatus::Shipped)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn test_transaction_upsert_keeps_id_and_order() {
        let store = MemoryOrderStore::new();
        let order_id = Uuid::new_v4();
        let first = store
            .upsert_transaction(
                PaymentTransaction::new("pi_1", IntentStatus::Processing, 1998, "GBP")
                    .with_order(order_id),
            )
            .await
            .unwrap();
        let second = store
            .upsert_transaction(PaymentTransaction::new("pi_1", IntentStatus::Succeeded, 1998, "GBP"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.order_id, Some(order_id));
        assert_eq!(second.status, IntentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_orders_for_user_filters_owner() {
        let store = MemoryOrderStore::new();
        store.insert_order(new_order("pi_1")).await.unwrap();
        let mut other = new_order("pi_2");
        other.user_id = "user_2".into();
        store.insert_order(other).await.unwrap();

        let mine = store.orders_for_user("user_1").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].payment_intent_id, "pi_1");
    }

    fn snapshot() -> PendingOrder {
        PendingOrder {
            items: vec![LineItem::new("magnet-square", 2, dec!(9.99))],
            total: dec!(19.98),
            shipping_address_id: "addr_1".into(),
            user_id: "user_1".into(),
        }
    }

    #[tokio::test]
    async fn test_pending_checkout_take_consumes() {
        let store = MemoryPendingCheckoutStore::new();
        let record = store.put(snapshot(), Duration::minutes(30)).await.unwrap();

        assert!(store.get(&record.token).await.unwrap().is_some());
        let taken = store.take(&record.token).await.unwrap().unwrap();
        assert_eq!(taken.order, snapshot());
        assert!(store.get(&record.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_pending_checkout_hidden() {
        let store = MemoryPendingCheckoutStore::new();
        let record = store.put(snapshot(), Duration::seconds(-1)).await.unwrap();

        assert!(store.get(&record.token).await.unwrap().is_none());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
    }
}
