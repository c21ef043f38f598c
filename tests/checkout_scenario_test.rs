use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use storefront::application::coupon_ledger::CouponLedger;
use storefront::application::order_service::OrderService;
use storefront::application::reconciliation::{CancelOutcome, ReconciliationEngine};
use storefront::domain::coupon::NewCoupon;
use storefront::domain::money::Money;
use storefront::domain::order::{
    CartLine, Order, OrderId, OrderItem, OrderStatus, Resolution, UserId,
};
use storefront::domain::payment_code::{PaymentCode, TimestampedCodeGenerator};
use storefront::domain::ports::{InsertOutcome, OrderStore, OrderStoreRef};
use storefront::error::{Result, StorefrontError};
use storefront::infrastructure::in_memory::{InMemoryCouponStore, InMemoryOrderStore};
use storefront::interfaces::webhook::{InboundWebhook, WebhookIngester};
use uuid::Uuid;

const API_KEY: &str = "integration-key";

fn line(price: rust_decimal::Decimal) -> CartLine {
    CartLine {
        product_id: Uuid::new_v4(),
        unit_price: price,
    }
}

async fn sale10(ledger: &CouponLedger) {
    ledger
        .register(NewCoupon {
            code: "SALE10".to_string(),
            discount_percent: 10,
            usage_limit: 1,
            expires_at: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_coupon_checkout_webhook_and_late_cancel() {
    let orders: OrderStoreRef = Arc::new(InMemoryOrderStore::new());
    let ledger = CouponLedger::new(Arc::new(InMemoryCouponStore::new()));
    sale10(&ledger).await;
    let service = OrderService::new(
        orders.clone(),
        ledger.clone(),
        Arc::new(TimestampedCodeGenerator),
    );
    let engine = ReconciliationEngine::new(orders, ledger.clone());
    let ingester = WebhookIngester::new(engine.clone(), API_KEY);
    let buyer = Uuid::new_v4();

    // Checkout with the coupon.
    let placed = service
        .create_order(buyer, vec![line(dec!(50.00))], Some("SALE10"))
        .await
        .unwrap();
    assert_eq!(placed.total, Money::new(dec!(45.00)));
    assert_eq!(placed.status, OrderStatus::Pending);
    let rendered = placed.payment_code.to_string();
    assert!(rendered.starts_with("DH"));
    assert!(rendered[2..].bytes().all(|b| b.is_ascii_digit()));

    // The provider reports the transfer, then redelivers it.
    let body = serde_json::json!({
        "content": format!("IBFT {} thanh toan", placed.payment_code),
        "transferAmount": 45.00,
    })
    .to_string();
    let auth = format!("Apikey {API_KEY}");
    for _ in 0..2 {
        let response = ingester
            .handle(InboundWebhook {
                authorization: Some(&auth),
                body: body.as_bytes(),
            })
            .await;
        assert_eq!(response.status.as_u16(), 200);
        assert!(response.body.success);
        let order = service.get(placed.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
    }

    // Cancelling after payment changes nothing.
    assert_eq!(
        engine.cancel(placed.order_id, buyer).await.unwrap(),
        CancelOutcome::AlreadySettled
    );
    let order = service.get(placed.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.cancelled_at, None);
    assert_eq!(ledger.get("SALE10").await.unwrap().unwrap().used_count, 1);
}

/// Order store whose writes always fail.
struct BrokenOrderStore {
    inner: InMemoryOrderStore,
}

#[async_trait]
impl OrderStore for BrokenOrderStore {
    async fn insert(&self, _order: Order, _items: Vec<OrderItem>) -> Result<InsertOutcome> {
        Err(StorefrontError::internal("disk full"))
    }
    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        self.inner.get(id).await
    }
    async fn find_by_payment_code(&self, code: &PaymentCode) -> Result<Option<Order>> {
        self.inner.find_by_payment_code(code).await
    }
    async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>> {
        self.inner.items(id).await
    }
    async fn orders_for_owner(&self, owner: UserId) -> Result<Vec<Order>> {
        self.inner.orders_for_owner(owner).await
    }
    async fn get_all(&self) -> Result<Vec<Order>> {
        self.inner.get_all().await
    }
    async fn resolve(&self, id: OrderId, resolution: Resolution, at: DateTime<Utc>) -> Result<bool> {
        self.inner.resolve(id, resolution, at).await
    }
}

#[tokio::test]
async fn test_storage_failure_releases_coupon() {
    let ledger = CouponLedger::new(Arc::new(InMemoryCouponStore::new()));
    sale10(&ledger).await;
    let service = OrderService::new(
        Arc::new(BrokenOrderStore {
            inner: InMemoryOrderStore::new(),
        }),
        ledger.clone(),
        Arc::new(TimestampedCodeGenerator),
    );

    let result = service
        .create_order(Uuid::new_v4(), vec![line(dec!(50.00))], Some("SALE10"))
        .await;

    assert!(matches!(result, Err(StorefrontError::InternalError(_))));
    assert_eq!(ledger.get("SALE10").await.unwrap().unwrap().used_count, 0);
    assert!(service.all_orders().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_never_overredeem() {
    let orders: OrderStoreRef = Arc::new(InMemoryOrderStore::new());
    let ledger = CouponLedger::new(Arc::new(InMemoryCouponStore::new()));
    ledger
        .register(NewCoupon {
            code: "FLASH".to_string(),
            discount_percent: 50,
            usage_limit: 3,
            expires_at: None,
        })
        .await
        .unwrap();
    let service = OrderService::new(orders, ledger.clone(), Arc::new(TimestampedCodeGenerator));

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .create_order(Uuid::new_v4(), vec![line(dec!(10.00))], Some("flash"))
                    .await
            })
        })
        .collect();

    let mut placed = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            placed += 1;
        }
    }
    assert_eq!(placed, 3);
    assert_eq!(service.all_orders().await.unwrap().len(), 3);
    assert_eq!(ledger.get("FLASH").await.unwrap().unwrap().used_count, 3);
}
