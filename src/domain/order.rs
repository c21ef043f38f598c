use super::coupon::CouponCode;
use super::money::Money;
use super::payment_code::PaymentCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type OrderId = Uuid;
pub type UserId = Uuid;
pub type ProductId = Uuid;

/// Lifecycle of an order. `Completed` and `Cancelled` are terminal.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            OrderStatus::Pending => false,
            OrderStatus::Completed | OrderStatus::Cancelled => true,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two transitions out of `Pending`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Resolution {
    Complete,
    Cancel,
}

impl Resolution {
    pub fn target(&self) -> OrderStatus {
        match self {
            Resolution::Complete => OrderStatus::Completed,
            Resolution::Cancel => OrderStatus::Cancelled,
        }
    }
}

/// A product in the cart at checkout, with the price the buyer saw.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub unit_price: rust_decimal::Decimal,
}

/// Purchase line, frozen at order creation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub unit_price: Money,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: OrderId,
    pub owner_id: UserId,
    /// Sum of item prices before any coupon.
    pub subtotal: Money,
    /// Amount the buyer must transfer. Never changes after creation.
    pub total_amount: Money,
    pub payment_code: PaymentCode,
    /// Normalized code of the coupon slot this order reserved, if any.
    pub coupon_code: Option<CouponCode>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn pending(
        owner_id: UserId,
        subtotal: Money,
        total_amount: Money,
        payment_code: PaymentCode,
        coupon_code: Option<CouponCode>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            subtotal,
            total_amount,
            payment_code,
            coupon_code,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            cancelled_at: None,
        }
    }

    /// Applies a resolution if the order is still pending.
    ///
    /// Returns `false` and leaves the order untouched when it is already in a
    /// terminal state. Storage adapters call this inside their atomic section.
    pub fn resolve(&mut self, resolution: Resolution, at: DateTime<Utc>) -> bool {
        match self.status {
            OrderStatus::Pending => {}
            OrderStatus::Completed | OrderStatus::Cancelled => return false,
        }
        self.status = resolution.target();
        match resolution {
            Resolution::Complete => self.completed_at = Some(at),
            Resolution::Cancel => self.cancelled_at = Some(at),
        }
        true
    }

    /// When the order reached its terminal state, if it has.
    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            OrderStatus::Pending => None,
            OrderStatus::Completed => self.completed_at,
            OrderStatus::Cancelled => self.cancelled_at,
        }
    }
}
