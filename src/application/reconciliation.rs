use super::coupon_ledger::CouponLedger;
use crate::domain::money::matches_exactly;
use crate::domain::order::{OrderId, OrderStatus, Resolution, UserId};
use crate::domain::payment_code::PaymentCode;
use crate::domain::ports::OrderStoreRef;
use crate::error::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use tracing::{info, instrument, warn};

/// Result of applying a payment notification to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmOutcome {
    /// This call moved the order from pending to completed.
    Matched,
    /// The order was already completed; the notification is a redelivery.
    AlreadySettled,
    /// The order was cancelled before the payment arrived.
    SettledDifferently,
    NotFound,
    AmountMismatch,
}

impl ConfirmOutcome {
    /// Whether the provider should treat the delivery as accepted.
    pub fn is_success(&self) -> bool {
        match self {
            ConfirmOutcome::Matched | ConfirmOutcome::AlreadySettled => true,
            ConfirmOutcome::SettledDifferently
            | ConfirmOutcome::NotFound
            | ConfirmOutcome::AmountMismatch => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmOutcome::Matched => "matched",
            ConfirmOutcome::AlreadySettled => "already_settled",
            ConfirmOutcome::SettledDifferently => "settled_differently",
            ConfirmOutcome::NotFound => "not_found",
            ConfirmOutcome::AmountMismatch => "amount_mismatch",
        }
    }
}

impl fmt::Display for ConfirmOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a buyer's cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    Cancelled,
    /// The order already reached a terminal state.
    AlreadySettled,
    /// The requester does not own the order, or there is no such order.
    Forbidden,
}

impl CancelOutcome {
    /// Human-readable reason for an unsuccessful cancellation.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            CancelOutcome::Cancelled => None,
            CancelOutcome::AlreadySettled => Some("Order is no longer pending"),
            CancelOutcome::Forbidden => Some("Order not found"),
        }
    }
}

/// The only component allowed to move an order out of `Pending`.
///
/// `confirm` and `cancel` race through the store's guarded transition. The
/// first to apply wins; the other sees zero rows affected and reports a
/// conflict. Neither ever retries or forces the transition.
#[derive(Clone)]
pub struct ReconciliationEngine {
    orders: OrderStoreRef,
    ledger: CouponLedger,
}

impl ReconciliationEngine {
    pub fn new(orders: OrderStoreRef, ledger: CouponLedger) -> Self {
        Self { orders, ledger }
    }

    /// Applies a reported transfer of `amount` for `reference`.
    ///
    /// Safe to call any number of times for the same transfer.
    #[instrument(skip(self, reference), fields(reference = %reference))]
    pub async fn confirm(&self, reference: &PaymentCode, amount: Decimal) -> Result<ConfirmOutcome> {
        let Some(order) = self.orders.find_by_payment_code(reference).await? else {
            warn!("no order for payment reference");
            return Ok(ConfirmOutcome::NotFound);
        };

        match order.status {
            OrderStatus::Completed => {
                info!(order_id = %order.id, "payment redelivered for completed order");
                return Ok(ConfirmOutcome::AlreadySettled);
            }
            OrderStatus::Cancelled => {
                warn!(order_id = %order.id, "payment received for cancelled order");
                return Ok(ConfirmOutcome::SettledDifferently);
            }
            OrderStatus::Pending => {}
        }

        if !matches_exactly(amount, order.total_amount) {
            warn!(order_id = %order.id, expected = %order.total_amount, %amount, "payment amount mismatch");
            return Ok(ConfirmOutcome::AmountMismatch);
        }

        if self
            .orders
            .resolve(order.id, Resolution::Complete, Utc::now())
            .await?
        {
            info!(order_id = %order.id, "order completed");
            return Ok(ConfirmOutcome::Matched);
        }

        // Lost the race: someone else resolved the order between our read and
        // our guarded write. Report what actually won.
        let outcome = match self.orders.get(order.id).await?.map(|o| o.status) {
            Some(OrderStatus::Completed) => ConfirmOutcome::AlreadySettled,
            Some(OrderStatus::Cancelled) => ConfirmOutcome::SettledDifferently,
            Some(OrderStatus::Pending) | None => ConfirmOutcome::NotFound,
        };
        warn!(order_id = %order.id, %outcome, "confirmation lost race to a concurrent transition");
        Ok(outcome)
    }

    /// Cancels a pending order on behalf of its owner and gives back any
    /// coupon slot it held.
    #[instrument(skip(self))]
    pub async fn cancel(&self, order_id: OrderId, requester: UserId) -> Result<CancelOutcome> {
        let order = match self.orders.get(order_id).await? {
            Some(order) if order.owner_id == requester => order,
            Some(_) | None => {
                warn!("cancellation refused: not the owner or no such order");
                return Ok(CancelOutcome::Forbidden);
            }
        };

        match order.status {
            OrderStatus::Pending => {}
            OrderStatus::Completed | OrderStatus::Cancelled => {
                return Ok(CancelOutcome::AlreadySettled);
            }
        }

        if !self
            .orders
            .resolve(order_id, Resolution::Cancel, Utc::now())
            .await?
        {
            warn!("cancellation lost race to a concurrent transition");
            return Ok(CancelOutcome::AlreadySettled);
        }

        info!("order cancelled");
        if let Some(code) = &order.coupon_code {
            self.ledger.release(code).await?;
        }
        Ok(CancelOutcome::Cancelled)
    }
}
