//! Order lifecycle and bank-transfer reconciliation core for a digital-goods
//! storefront.
//!
//! Checkout turns a cart into a pending order carrying a payment code. The
//! buyer puts that code in a bank transfer memo; the payment provider's
//! webhook then reports the transfer, and [`application::reconciliation`]
//! settles the order, racing safely against the buyer cancelling it.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod telemetry;
