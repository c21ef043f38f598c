use rust_decimal_macros::dec;
use std::sync::Arc;
use storefront::domain::coupon::{Coupon, CouponCode, NewCoupon, Reservation};
use storefront::domain::money::Money;
use storefront::domain::order::{Order, OrderItem, Resolution};
use storefront::domain::payment_code::PaymentCode;
use storefront::domain::ports::{CouponStoreRef, InsertOutcome, OrderStoreRef};
use storefront::infrastructure::in_memory::{InMemoryCouponStore, InMemoryOrderStore};
use chrono::Utc;
use uuid::Uuid;

#[tokio::test]
async fn test_stores_as_trait_objects() {
    let order_store: OrderStoreRef = Arc::new(InMemoryOrderStore::new());
    let coupon_store: CouponStoreRef = Arc::new(InMemoryCouponStore::new());

    let order = Order::pending(
        Uuid::new_v4(),
        Money::new(dec!(50.00)),
        Money::new(dec!(45.00)),
        PaymentCode::from_digits("424242").unwrap(),
        None,
    );
    let items = vec![OrderItem {
        order_id: order.id,
        product_id: Uuid::new_v4(),
        unit_price: Money::new(dec!(50.00)),
    }];
    let coupon = Coupon::new(NewCoupon {
        code: "sale10".to_string(),
        discount_percent: 10,
        usage_limit: 1,
        expires_at: None,
    })
    .unwrap();

    // Verify Send + Sync by spawning tasks
    let os_handle = tokio::spawn(async move {
        assert_eq!(
            order_store.insert(order.clone(), items).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert!(
            order_store
                .resolve(order.id, Resolution::Complete, Utc::now())
                .await
                .unwrap()
        );
        order_store
            .find_by_payment_code(&order.payment_code)
            .await
            .unwrap()
            .unwrap()
    });

    let cs_handle = tokio::spawn(async move {
        assert!(coupon_store.insert(coupon).await.unwrap());
        let code = CouponCode::parse("SALE10").unwrap();
        coupon_store.reserve(&code, Utc::now()).await.unwrap()
    });

    let stored = os_handle.await.unwrap();
    assert!(stored.completed_at.is_some());
    assert_eq!(stored.total_amount, Money::new(dec!(45.00)));

    assert_eq!(
        cs_handle.await.unwrap(),
        Reservation::Reserved {
            discount_percent: 10
        }
    );
}
