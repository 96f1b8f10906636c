use std::sync::Arc;

use async_trait::async_trait;
use magnet_client::{
    CheckoutClient, CheckoutOutcome, ClientError, GatewayConfirmer, LocalVault, MemoryVault,
    OrderApi, PendingOrderVault,
};
use magnet_core::{
    Address, AddressStore, Cart, LineItem, MemoryAddressStore, MemoryOrderStore, OrderStatus,
    OrderStore, PendingOrder,
};
use magnet_payments::{
    FinalizeRequest, FinalizedOrder, IntentIssuer, IntentRequest, IntentTicket, MockGateway,
    OrderFinalizer, PaymentGateway, TEST_CARD_DECLINED, TEST_CARD_REQUIRES_ACTION,
    TEST_CARD_SUCCEEDS,
};
use rust_decimal_macros::dec;

const USER: &str = "user_1";
const RETURN_URL: &str = "https://shop.test/checkout/confirmation";

/// Server-side services called in-process instead of over HTTP
#[derive(Clone)]
struct InProcessApi {
    user_id: String,
    issuer: Arc<IntentIssuer>,
    finalizer: Arc<OrderFinalizer>,
}

#[async_trait]
impl OrderApi for InProcessApi {
    async fn create_payment_intent(&self, request: &IntentRequest) -> magnet_client::Result<IntentTicket> {
        Ok(self.issuer.issue(request.clone(), &self.user_id).await?)
    }

    async fn create_order(
        &self,
        payment_intent_id: &str,
        order: &PendingOrder,
    ) -> magnet_client::Result<FinalizedOrder> {
        Ok(self
            .finalizer
            .finalize(
                FinalizeRequest {
                    order: order.clone(),
                    payment_intent_id: payment_intent_id.to_string(),
                },
                &self.user_id,
            )
            .await?)
    }
}

struct Shop {
    gateway: Arc<MockGateway>,
    orders: Arc<MemoryOrderStore>,
    api: InProcessApi,
}

impl Shop {
    async fn new() -> Self {
        let gateway = Arc::new(MockGateway::new());
        let orders = Arc::new(MemoryOrderStore::new());
        let addresses = Arc::new(MemoryAddressStore::new());
        addresses
            .add_address(Address {
                id: "addr_1".into(),
                user_id: USER.into(),
                full_name: "Ada Lovelace".into(),
                line1: "12 St James's Square".into(),
                line2: None,
                city: "London".into(),
                postal_code: "SW1Y 4JH".into(),
                country: "GB".into(),
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let api = InProcessApi {
            user_id: USER.into(),
            issuer: Arc::new(IntentIssuer::new(gateway.clone())),
            finalizer: Arc::new(OrderFinalizer::new(gateway.clone(), orders.clone(), addresses)),
        };
        Self {
            gateway,
            orders,
            api,
        }
    }

    fn client<V: PendingOrderVault>(&self, vault: V) -> CheckoutClient<InProcessApi, GatewayConfirmer, V> {
        CheckoutClient::new(
            self.api.clone(),
            GatewayConfirmer::new(self.gateway.clone()),
            vault,
        )
    }
}

fn cart() -> Vec<LineItem> {
    vec![LineItem::new("magnet-square", 2, dec!(9.99)).with_image("uploads/cat.jpg")]
}

fn snapshot(shipping_address_id: &str) -> PendingOrder {
    PendingOrder {
        items: cart(),
        total: dec!(19.98),
        shipping_address_id: shipping_address_id.into(),
        user_id: USER.into(),
    }
}

fn return_url(ticket: &IntentTicket, redirect_status: &str) -> String {
    format!(
        "{RETURN_URL}?payment_intent={}&payment_intent_client_secret={}&redirect_status={redirect_status}",
        ticket.payment_intent_id, ticket.client_secret
    )
}

#[tokio::test]
async fn test_inline_success_creates_single_order() {
    let shop = Shop::new().await;
    let client = shop.client(MemoryVault::new());

    let ticket = client.begin(Cart::new(cart()), "gbp").await.unwrap();
    let intent = shop.gateway.retrieve_intent(&ticket.payment_intent_id).await.unwrap();
    assert_eq!(intent.amount_minor, 1998);

    let outcome = client
        .submit(&ticket, snapshot("addr_1"), TEST_CARD_SUCCEEDS, RETURN_URL)
        .await
        .unwrap();
    let CheckoutOutcome::Completed { order_id } = outcome else {
        panic!("expected completed checkout, got {outcome:?}");
    };

    assert_eq!(shop.orders.order_count().await, 1);
    let order = shop.orders.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.total, dec!(19.98));
    assert_eq!(order.status, OrderStatus::Processing);
    let items = shop.orders.order_items(order_id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 2);

    assert!(client.vault().is_empty().await);
}

#[tokio::test]
async fn test_redirect_then_return_creates_same_single_order() {
    let shop = Shop::new().await;
    let client = shop.client(MemoryVault::new());

    let ticket = client.begin(Cart::new(cart()), "gbp").await.unwrap();
    let outcome = client
        .submit(&ticket, snapshot("addr_1"), TEST_CARD_REQUIRES_ACTION, RETURN_URL)
        .await
        .unwrap();
    assert!(matches!(outcome, CheckoutOutcome::Redirect { .. }));
    assert_eq!(shop.orders.order_count().await, 0);
    assert_eq!(client.vault().load(None).await.unwrap(), Some(snapshot("addr_1")));

    shop.gateway
        .complete_authentication(&ticket.payment_intent_id, true)
        .await
        .unwrap();

    let resumed = client
        .resume_after_redirect(&return_url(&ticket, "succeeded"))
        .await
        .unwrap();
    let CheckoutOutcome::Completed { order_id } = resumed else {
        panic!("expected completed checkout, got {resumed:?}");
    };
    assert_eq!(shop.orders.order_count().await, 1);
    assert!(client.vault().is_empty().await);

    // A second finalize for the same intent converges on the same order
    let again = client
        .api()
        .create_order(&ticket.payment_intent_id, &snapshot("addr_1"))
        .await
        .unwrap();
    assert_eq!(again.order_id, order_id);
    assert!(!again.created);
    assert_eq!(shop.orders.order_count().await, 1);
}

#[tokio::test]
async fn test_snapshot_survives_page_reload() {
    let shop = Shop::new().await;
    let dir = tempfile::tempdir().unwrap();

    let before = shop.client(LocalVault::new(dir.path()));
    let ticket = before.begin(Cart::new(cart()), "gbp").await.unwrap();
    before
        .submit(&ticket, snapshot("addr_1"), TEST_CARD_REQUIRES_ACTION, RETURN_URL)
        .await
        .unwrap();
    drop(before);

    shop.gateway
        .complete_authentication(&ticket.payment_intent_id, true)
        .await
        .unwrap();

    let after = shop.client(LocalVault::new(dir.path()));
    let outcome = after
        .resume_after_redirect(&return_url(&ticket, "succeeded"))
        .await
        .unwrap();
    assert!(matches!(outcome, CheckoutOutcome::Completed { .. }));
    assert_eq!(shop.orders.order_count().await, 1);
    assert_eq!(after.vault().load(None).await.unwrap(), None);
}

#[tokio::test]
async fn test_missing_address_has_no_side_effects() {
    let shop = Shop::new().await;
    let client = shop.client(MemoryVault::new());

    let ticket = client.begin(Cart::new(cart()), "gbp").await.unwrap();
    let err = client
        .submit(&ticket, snapshot(""), TEST_CARD_SUCCEEDS, RETURN_URL)
        .await
        .unwrap_err();

    assert_eq!(err, ClientError::MissingAddress);
    assert_eq!(err.user_message(), "Please select a shipping address.");
    assert!(client.vault().is_empty().await);
    let intent = shop.gateway.retrieve_intent(&ticket.payment_intent_id).await.unwrap();
    assert_eq!(intent.status, magnet_core::IntentStatus::RequiresPaymentMethod);
}

#[tokio::test]
async fn test_declined_card_creates_no_order() {
    let shop = Shop::new().await;
    let client = shop.client(MemoryVault::new());

    let ticket = client.begin(Cart::new(cart()), "gbp").await.unwrap();
    let err = client
        .submit(&ticket, snapshot("addr_1"), TEST_CARD_DECLINED, RETURN_URL)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Declined(_)));
    assert_eq!(shop.orders.order_count().await, 0);
}

#[tokio::test]
async fn test_failed_authentication_is_a_decline() {
    let shop = Shop::new().await;
    let client = shop.client(MemoryVault::new());

    let ticket = client.begin(Cart::new(cart()), "gbp").await.unwrap();
    client
        .submit(&ticket, snapshot("addr_1"), TEST_CARD_REQUIRES_ACTION, RETURN_URL)
        .await
        .unwrap();
    shop.gateway
        .complete_authentication(&ticket.payment_intent_id, false)
        .await
        .unwrap();

    let err = client
        .resume_after_redirect(&return_url(&ticket, "failed"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Declined(_)));
    assert_eq!(shop.orders.order_count().await, 0);
}

#[tokio::test]
async fn test_empty_cart_is_a_validation_error() {
    let shop = Shop::new().await;
    let client = shop.client(MemoryVault::new());

    let err = client.begin(Cart::default(), "gbp").await.unwrap_err();
    assert_eq!(err, ClientError::Validation("Your cart is empty.".into()));
    assert_eq!(shop.gateway.intent_count().await, 0);
}
