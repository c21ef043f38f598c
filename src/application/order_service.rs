use super::coupon_ledger::{CouponLedger, ReservedCoupon};
use crate::domain::money::Money;
use crate::domain::order::{CartLine, Order, OrderId, OrderItem, OrderStatus, UserId};
use crate::domain::payment_code::{PaymentCode, PaymentCodeGenerator};
use crate::domain::ports::{InsertOutcome, OrderStoreRef};
use crate::error::{Result, StorefrontError};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// How many fresh payment codes to try before giving up on a checkout.
pub const MAX_PAYMENT_CODE_ATTEMPTS: usize = 5;

/// What the checkout caller gets back: enough to show a payment instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub payment_code: PaymentCode,
    pub subtotal: Money,
    pub total: Money,
    pub status: OrderStatus,
}

impl From<&Order> for PlacedOrder {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            payment_code: order.payment_code.clone(),
            subtotal: order.subtotal,
            total: order.total_amount,
            status: order.status,
        }
    }
}

/// Turns a cart snapshot into a durable pending order.
#[derive(Clone)]
pub struct OrderService {
    orders: OrderStoreRef,
    ledger: CouponLedger,
    codes: Arc<dyn PaymentCodeGenerator>,
}

impl OrderService {
    pub fn new(
        orders: OrderStoreRef,
        ledger: CouponLedger,
        codes: Arc<dyn PaymentCodeGenerator>,
    ) -> Self {
        Self {
            orders,
            ledger,
            codes,
        }
    }

    /// Creates a pending order for `owner`.
    ///
    /// A coupon, when given, is reserved first; any failure after that point
    /// gives the slot back before the error is returned, so a failed checkout
    /// never consumes coupon usage.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn create_order(
        &self,
        owner: UserId,
        items: Vec<CartLine>,
        coupon_code: Option<&str>,
    ) -> Result<PlacedOrder> {
        if items.is_empty() {
            return Err(StorefrontError::ValidationError(
                "Order must contain at least one item".to_string(),
            ));
        }
        let prices = items
            .iter()
            .map(|line| Money::positive(line.unit_price))
            .collect::<Result<Vec<_>>>()?;
        let subtotal = Money::total(prices.iter().copied())?;

        let reserved = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(self.ledger.validate_and_reserve(code).await?),
            None => None,
        };

        match self.persist(owner, &items, &prices, subtotal, reserved.as_ref()).await {
            Ok(order) => {
                info!(
                    order_id = %order.id,
                    payment_code = %order.payment_code,
                    total = %order.total_amount,
                    "order created"
                );
                Ok(PlacedOrder::from(&order))
            }
            Err(e) => {
                if let Some(reserved) = &reserved {
                    if let Err(release_err) = self.ledger.release(&reserved.code).await {
                        error!(code = %reserved.code, error = %release_err, "failed to release coupon after checkout failure");
                    }
                }
                Err(e)
            }
        }
    }

    async fn persist(
        &self,
        owner: UserId,
        lines: &[CartLine],
        prices: &[Money],
        subtotal: Money,
        reserved: Option<&ReservedCoupon>,
    ) -> Result<Order> {
        let total = match reserved {
            Some(coupon) => subtotal.discounted(coupon.discount_percent)?,
            None => subtotal,
        };

        for attempt in 1..=MAX_PAYMENT_CODE_ATTEMPTS {
            let order = Order::pending(
                owner,
                subtotal,
                total,
                self.codes.generate(),
                reserved.map(|c| c.code.clone()),
            );
            let items = lines
                .iter()
                .zip(prices)
                .map(|(line, price)| OrderItem {
                    order_id: order.id,
                    product_id: line.product_id,
                    unit_price: *price,
                })
                .collect();

            match self.orders.insert(order.clone(), items).await? {
                InsertOutcome::Inserted => return Ok(order),
                InsertOutcome::DuplicatePaymentCode => {
                    warn!(attempt, payment_code = %order.payment_code, "payment code collision, regenerating");
                }
            }
        }
        Err(StorefrontError::PaymentCodeExhausted(MAX_PAYMENT_CODE_ATTEMPTS))
    }

    pub async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        self.orders.get(id).await
    }

    pub async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>> {
        self.orders.items(id).await
    }

    /// The owner's orders, newest first.
    pub async fn orders_for_owner(&self, owner: UserId) -> Result<Vec<Order>> {
        let mut orders = self.orders.orders_for_owner(owner).await?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    /// Every order, oldest first.
    pub async fn all_orders(&self) -> Result<Vec<Order>> {
        let mut orders = self.orders.get_all().await?;
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }
}
