//! Inbound bank-transfer notifications.
//!
//! The provider posts `{"content": <memo>, "transferAmount": <amount>}` with an
//! `Authorization: Apikey <key>` header and retries any delivery that does not
//! get a 2xx, so every path here must be safe to run repeatedly.

use crate::application::reconciliation::{ConfirmOutcome, ReconciliationEngine};
use crate::domain::money::parse_reported_amount;
use crate::domain::notification::PaymentNotification;
use crate::domain::payment_code::PaymentCode;
use actix_web::http::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

pub const AUTH_SCHEME: &str = "Apikey";

const MSG_UNAUTHORIZED: &str = "Unauthorized";
const MSG_INVALID_PAYLOAD: &str = "Invalid webhook data";
const MSG_NO_REFERENCE: &str = "No order reference found in transfer content";
const MSG_CONFIRMED: &str = "Payment confirmed";
const MSG_NOT_FOUND: &str = "Order not found or amount mismatch";
const MSG_INTERNAL: &str = "Internal server error";

/// The parts of an HTTP request the ingester looks at.
#[derive(Debug, Clone, Copy)]
pub struct InboundWebhook<'a> {
    pub authorization: Option<&'a str>,
    pub body: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookReply {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: StatusCode,
    pub body: WebhookReply,
}

impl WebhookResponse {
    fn new(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            body: WebhookReply {
                success: status.is_success(),
                message: message.to_string(),
            },
        }
    }
}

/// Why a delivery was refused before reaching reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadRejection {
    Invalid,
    NoReference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderPayload {
    content: Option<String>,
    transfer_amount: Option<Value>,
    transaction_date: Option<String>,
}

#[derive(Clone)]
pub struct WebhookIngester {
    engine: ReconciliationEngine,
    api_key: Arc<str>,
}

impl WebhookIngester {
    pub fn new(engine: ReconciliationEngine, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            engine,
            api_key: api_key.into(),
        }
    }

    /// Authenticates, parses and reconciles one delivery. Never fails: every
    /// outcome, storage faults included, becomes a status and a reply body.
    #[instrument(skip_all, fields(body_len = request.body.len()))]
    pub async fn handle(&self, request: InboundWebhook<'_>) -> WebhookResponse {
        if !self.authenticate(request.authorization) {
            warn!("webhook rejected: bad credentials");
            return WebhookResponse::new(StatusCode::UNAUTHORIZED, MSG_UNAUTHORIZED);
        }

        let notification = match parse_notification(request.body) {
            Ok(notification) => notification,
            Err(PayloadRejection::Invalid) => {
                warn!("webhook rejected: malformed payload");
                return WebhookResponse::new(StatusCode::BAD_REQUEST, MSG_INVALID_PAYLOAD);
            }
            Err(PayloadRejection::NoReference) => {
                warn!("webhook rejected: no payment reference in memo");
                return WebhookResponse::new(StatusCode::BAD_REQUEST, MSG_NO_REFERENCE);
            }
        };

        match self
            .engine
            .confirm(&notification.reference, notification.amount)
            .await
        {
            Ok(outcome) => {
                info!(
                    reference = %notification.reference,
                    amount = %notification.amount,
                    provider_timestamp = ?notification.provider_timestamp,
                    %outcome,
                    "webhook reconciled"
                );
                reply_for(outcome)
            }
            Err(e) => {
                error!(reference = %notification.reference, error = %e, "webhook reconciliation failed");
                WebhookResponse::new(StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL)
            }
        }
    }

    fn authenticate(&self, header: Option<&str>) -> bool {
        let Some((scheme, key)) = header.and_then(|h| h.trim().split_once(' ')) else {
            return false;
        };
        scheme.eq_ignore_ascii_case(AUTH_SCHEME)
            && constant_time_eq(key.trim().as_bytes(), self.api_key.as_bytes())
    }
}

fn reply_for(outcome: ConfirmOutcome) -> WebhookResponse {
    match outcome {
        ConfirmOutcome::Matched | ConfirmOutcome::AlreadySettled => {
            WebhookResponse::new(StatusCode::OK, MSG_CONFIRMED)
        }
        ConfirmOutcome::NotFound
        | ConfirmOutcome::AmountMismatch
        | ConfirmOutcome::SettledDifferently => {
            WebhookResponse::new(StatusCode::NOT_FOUND, MSG_NOT_FOUND)
        }
    }
}

/// Extracts the payment reference and amount from a provider payload.
pub fn parse_notification(body: &[u8]) -> Result<PaymentNotification, PayloadRejection> {
    let payload: ProviderPayload =
        serde_json::from_slice(body).map_err(|_| PayloadRejection::Invalid)?;

    let content = payload
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or(PayloadRejection::Invalid)?;
    let amount = payload
        .transfer_amount
        .as_ref()
        .and_then(parse_amount)
        .ok_or(PayloadRejection::Invalid)?;
    let reference = PaymentCode::find_in(&content).ok_or(PayloadRejection::NoReference)?;

    Ok(PaymentNotification {
        reference,
        amount,
        provider_timestamp: payload.transaction_date,
    })
}

/// Accepts a JSON number or a numeric string; the amount must be positive.
fn parse_amount(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_reported_amount(&n.to_string()),
        Value::String(s) => parse_reported_amount(s),
        _ => None,
    }
}

/// Compares without short-circuiting on the first differing byte or on a
/// length mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let mut diff = a.len() ^ b.len();
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= usize::from(x ^ y);
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::coupon_ledger::CouponLedger;
    use crate::application::order_service::{OrderService, PlacedOrder};
    use crate::domain::order::{CartLine, OrderStatus};
    use crate::domain::payment_code::TimestampedCodeGenerator;
    use crate::domain::ports::OrderStoreRef;
    use crate::infrastructure::in_memory::{InMemoryCouponStore, InMemoryOrderStore};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use uuid::Uuid;

    const KEY: &str = "test-key";

    async fn setup() -> (WebhookIngester, OrderService, PlacedOrder) {
        let orders: OrderStoreRef = Arc::new(InMemoryOrderStore::new());
        let ledger = CouponLedger::new(Arc::new(InMemoryCouponStore::new()));
        let service = OrderService::new(
            orders.clone(),
            ledger.clone(),
            Arc::new(TimestampedCodeGenerator),
        );
        let placed = service
            .create_order(
                Uuid::new_v4(),
                vec![CartLine {
                    product_id: Uuid::new_v4(),
                    unit_price: dec!(45.00),
                }],
                None,
            )
            .await
            .unwrap();
        let ingester = WebhookIngester::new(ReconciliationEngine::new(orders, ledger), KEY);
        (ingester, service, placed)
    }

    async fn deliver(ingester: &WebhookIngester, auth: Option<&str>, body: Value) -> WebhookResponse {
        let body = body.to_string();
        ingester
            .handle(InboundWebhook {
                authorization: auth,
                body: body.as_bytes(),
            })
            .await
    }

    #[tokio::test]
    async fn test_confirms_and_tolerates_redelivery() {
        let (ingester, service, placed) = setup().await;
        let payload = json!({
            "content": format!("MBVCB.123 {} chuyen khoan", placed.payment_code),
            "transferAmount": 45,
        });

        let first = deliver(&ingester, Some("Apikey test-key"), payload.clone()).await;
        let second = deliver(&ingester, Some("Apikey test-key"), payload).await;

        assert_eq!(first.status, StatusCode::OK);
        assert_eq!(second.status, StatusCode::OK);
        assert!(second.body.success);
        assert_eq!(second.body.message, MSG_CONFIRMED);
        let order = service.get(placed.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_rejects_bad_credentials_uniformly() {
        let (ingester, service, placed) = setup().await;
        let payload = json!({
            "content": placed.payment_code.to_string(),
            "transferAmount": "45.00",
        });

        for auth in [
            None,
            Some(""),
            Some("test-key"),
            Some("Bearer test-key"),
            Some("Apikey wrong-key"),
            Some("Apikey test-key-longer"),
        ] {
            let response = deliver(&ingester, auth, payload.clone()).await;
            assert_eq!(response.status, StatusCode::UNAUTHORIZED, "auth: {auth:?}");
            assert_eq!(response.body.message, MSG_UNAUTHORIZED);
        }
        let order = service.get(placed.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_rejects_malformed_payloads() {
        let (ingester, _, placed) = setup().await;
        let code = placed.payment_code.to_string();

        for payload in [
            json!([]),
            json!({ "transferAmount": 45 }),
            json!({ "content": &code, "transferAmount": "forty-five" }),
            json!({ "content": &code, "transferAmount": -45 }),
            json!({ "content": &code }),
        ] {
            let response = deliver(&ingester, Some("Apikey test-key"), payload).await;
            assert_eq!(response.status, StatusCode::BAD_REQUEST);
            assert_eq!(response.body.message, MSG_INVALID_PAYLOAD);
        }

        let response = deliver(
            &ingester,
            Some("Apikey test-key"),
            json!({ "content": "thanks for the goods", "transferAmount": 45 }),
        )
        .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body.message, MSG_NO_REFERENCE);
    }

    #[tokio::test]
    async fn test_mismatch_and_unknown_are_indistinguishable() {
        let (ingester, service, placed) = setup().await;

        let mismatch = deliver(
            &ingester,
            Some("Apikey test-key"),
            json!({ "content": placed.payment_code.to_string(), "transferAmount": 44.99 }),
        )
        .await;
        let unknown = deliver(
            &ingester,
            Some("Apikey test-key"),
            json!({ "content": "DH1", "transferAmount": 45 }),
        )
        .await;

        let oversized = deliver(
            &ingester,
            Some("Apikey test-key"),
            json!({
                "content": placed.payment_code.to_string(),
                "transferAmount": "79000000000000000000000000000",
            }),
        )
        .await;

        assert_eq!(mismatch, unknown);
        assert_eq!(oversized, unknown);
        assert_eq!(mismatch.status, StatusCode::NOT_FOUND);
        assert!(!mismatch.body.success);

        // A cancelled order looks the same even when the amount is right.
        let owner = service.get(placed.order_id).await.unwrap().unwrap().owner_id;
        ingester.engine.cancel(placed.order_id, owner).await.unwrap();
        let cancelled = deliver(
            &ingester,
            Some("Apikey test-key"),
            json!({ "content": placed.payment_code.to_string(), "transferAmount": 45 }),
        )
        .await;
        assert_eq!(cancelled, unknown);
        let order = service.get(placed.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_parse_notification_fields() {
        let body = json!({
            "content": "ck dh000123456 ft",
            "transferAmount": "120000",
            "transactionDate": "2024-05-01 10:00:00",
        })
        .to_string();
        let notification = parse_notification(body.as_bytes()).unwrap();
        assert_eq!(notification.reference.to_string(), "DH000123456");
        assert_eq!(notification.amount, dec!(120000));
        assert_eq!(
            notification.provider_timestamp.as_deref(),
            Some("2024-05-01 10:00:00")
        );

        let body = json!({ "content": "DH7", "transferAmount": "4.5e1" }).to_string();
        assert_eq!(parse_notification(body.as_bytes()).unwrap().amount, dec!(45));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abc\0"));
        assert!(!constant_time_eq(b"", b"a"));
        assert!(constant_time_eq(b"", b""));
    }
}
