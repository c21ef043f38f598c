use super::coupon::{Coupon, CouponCode, Reservation};
use super::order::{Order, OrderId, OrderItem, Resolution, UserId};
use super::payment_code::PaymentCode;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Outcome of inserting an order together with its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Another order already holds this payment code; nothing was written.
    DuplicatePaymentCode,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Writes the order and its items as one atomic unit, enforcing payment
    /// code uniqueness.
    async fn insert(&self, order: Order, items: Vec<OrderItem>) -> Result<InsertOutcome>;
    async fn get(&self, id: OrderId) -> Result<Option<Order>>;
    async fn find_by_payment_code(&self, code: &PaymentCode) -> Result<Option<Order>>;
    async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>>;
    async fn orders_for_owner(&self, owner: UserId) -> Result<Vec<Order>>;
    async fn get_all(&self) -> Result<Vec<Order>>;
    /// Guarded transition: applies `resolution` only if the order is still
    /// pending. Returns whether it applied.
    async fn resolve(&self, id: OrderId, resolution: Resolution, at: DateTime<Utc>) -> Result<bool>;
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Inserts a new coupon. Returns `false` if the code is already taken.
    async fn insert(&self, coupon: Coupon) -> Result<bool>;
    async fn get(&self, code: &CouponCode) -> Result<Option<Coupon>>;
    /// Atomic check-and-increment of `used_count`.
    async fn reserve(&self, code: &CouponCode, now: DateTime<Utc>) -> Result<Reservation>;
    /// Atomic decrement of `used_count`, floored at zero. Returns whether a
    /// slot was given back.
    async fn release(&self, code: &CouponCode) -> Result<bool>;
}

pub type OrderStoreRef = Arc<dyn OrderStore>;
pub type CouponStoreRef = Arc<dyn CouponStore>;
