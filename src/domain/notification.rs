use super::payment_code::PaymentCode;
use rust_decimal::Decimal;

/// A bank transfer reported by the payment provider, reduced to what
/// reconciliation needs. Never persisted; the same transfer may be reported
/// any number of times.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentNotification {
    pub reference: PaymentCode,
    pub amount: Decimal,
    pub provider_timestamp: Option<String>,
}
