//! Application layer orchestrating checkout and settlement.
//!
//! [`order_service::OrderService`] creates pending orders,
//! [`coupon_ledger::CouponLedger`] accounts for coupon usage, and
//! [`reconciliation::ReconciliationEngine`] is the single authority that moves
//! an order out of `Pending`. All three talk to storage only through the
//! ports in [`crate::domain::ports`].

pub mod coupon_ledger;
pub mod order_service;
pub mod reconciliation;
