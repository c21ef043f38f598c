use crate::domain::coupon::{Coupon, CouponCode, CouponRejection, Reservation};
use crate::domain::order::{Order, OrderId, OrderItem, Resolution, UserId};
use crate::domain::payment_code::PaymentCode;
use crate::domain::ports::{CouponStore, InsertOutcome, OrderStore};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct OrderTable {
    orders: HashMap<OrderId, Order>,
    items: HashMap<OrderId, Vec<OrderItem>>,
    by_payment_code: HashMap<PaymentCode, OrderId>,
}

/// A thread-safe in-memory order table.
///
/// Orders, items and the payment-code index live behind one `RwLock`, so an
/// insert or a guarded transition is a single critical section: exactly the
/// atomicity a SQL `UPDATE ... WHERE status = 'pending'` gives.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    table: Arc<RwLock<OrderTable>>,
}

impl InMemoryOrderStore {
    /// Creates a new, empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order, items: Vec<OrderItem>) -> Result<InsertOutcome> {
        let mut table = self.table.write().await;
        if table.by_payment_code.contains_key(&order.payment_code) {
            return Ok(InsertOutcome::DuplicatePaymentCode);
        }
        table.by_payment_code.insert(order.payment_code.clone(), order.id);
        table.items.insert(order.id, items);
        table.orders.insert(order.id, order);
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let table = self.table.read().await;
        Ok(table.orders.get(&id).cloned())
    }

    async fn find_by_payment_code(&self, code: &PaymentCode) -> Result<Option<Order>> {
        let table = self.table.read().await;
        Ok(table
            .by_payment_code
            .get(code)
            .and_then(|id| table.orders.get(id))
            .cloned())
    }

    async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>> {
        let table = self.table.read().await;
        Ok(table.items.get(&id).cloned().unwrap_or_default())
    }

    async fn orders_for_owner(&self, owner: UserId) -> Result<Vec<Order>> {
        let table = self.table.read().await;
        Ok(table
            .orders
            .values()
            .filter(|o| o.owner_id == owner)
            .cloned()
            .collect())
    }

    async fn get_all(&self) -> Result<Vec<Order>> {
        let table = self.table.read().await;
        Ok(table.orders.values().cloned().collect())
    }

    async fn resolve(&self, id: OrderId, resolution: Resolution, at: DateTime<Utc>) -> Result<bool> {
        let mut table = self.table.write().await;
        Ok(table
            .orders
            .get_mut(&id)
            .is_some_and(|order| order.resolve(resolution, at)))
    }
}

/// A thread-safe in-memory coupon table keyed by normalized code.
#[derive(Default, Clone)]
pub struct InMemoryCouponStore {
    coupons: Arc<RwLock<HashMap<CouponCode, Coupon>>>,
}

impl InMemoryCouponStore {
    /// Creates a new, empty in-memory coupon store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CouponStore for InMemoryCouponStore {
    async fn insert(&self, coupon: Coupon) -> Result<bool> {
        let mut coupons = self.coupons.write().await;
        if coupons.contains_key(&coupon.code) {
            return Ok(false);
        }
        coupons.insert(coupon.code.clone(), coupon);
        Ok(true)
    }

    async fn get(&self, code: &CouponCode) -> Result<Option<Coupon>> {
        let coupons = self.coupons.read().await;
        Ok(coupons.get(code).cloned())
    }

    async fn reserve(&self, code: &CouponCode, now: DateTime<Utc>) -> Result<Reservation> {
        let mut coupons = self.coupons.write().await;
        let Some(coupon) = coupons.get_mut(code) else {
            return Ok(Reservation::Rejected(CouponRejection::Invalid));
        };
        Ok(match coupon.try_take_slot(now) {
            Ok(()) => Reservation::Reserved {
                discount_percent: coupon.discount_percent,
            },
            Err(rejection) => Reservation::Rejected(rejection),
        })
    }

    async fn release(&self, code: &CouponCode) -> Result<bool> {
        let mut coupons = self.coupons.write().await;
        Ok(coupons.get_mut(code).is_some_and(Coupon::return_slot))
    }
}
