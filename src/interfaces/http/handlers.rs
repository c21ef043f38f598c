use super::extractors::AuthenticatedUser;
use super::state::AppState;
use crate::application::order_service::PlacedOrder;
use crate::application::reconciliation::CancelOutcome;
use crate::config::BankAccount;
use crate::domain::coupon::CouponCode;
use crate::domain::money::Money;
use crate::domain::order::{CartLine, Order, OrderId, OrderItem, OrderStatus, ProductId};
use crate::domain::payment_code::PaymentCode;
use crate::error::StorefrontError;
use crate::interfaces::webhook::InboundWebhook;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<CartLine>,
    pub coupon_code: Option<String>,
}

/// What the buyer needs to make the bank transfer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInstruction {
    pub amount: Money,
    /// Text the buyer must put in the transfer memo.
    pub memo: PaymentCode,
    #[serde(flatten)]
    pub bank: BankAccount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: OrderId,
    pub payment_code: PaymentCode,
    pub subtotal: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub payment_instruction: PaymentInstruction,
}

impl CreateOrderResponse {
    fn new(placed: PlacedOrder, bank: &BankAccount) -> Self {
        Self {
            payment_instruction: PaymentInstruction {
                amount: placed.total,
                memo: placed.payment_code.clone(),
                bank: bank.clone(),
            },
            order_id: placed.order_id,
            payment_code: placed.payment_code,
            subtotal: placed.subtotal,
            total: placed.total,
            status: placed.status,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order_id: OrderId,
    pub payment_code: PaymentCode,
    pub subtotal: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub coupon_code: Option<CouponCode>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            payment_code: order.payment_code,
            subtotal: order.subtotal,
            total: order.total_amount,
            status: order.status,
            coupon_code: order.coupon_code,
            created_at: order.created_at,
            completed_at: order.completed_at,
            cancelled_at: order.cancelled_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub product_id: ProductId,
    pub unit_price: Money,
}

impl From<OrderItem> for ItemView {
    fn from(item: OrderItem) -> Self {
        Self {
            product_id: item.product_id,
            unit_price: item.unit_price,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderView,
    pub items: Vec<ItemView>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

#[instrument(
    name = "handler::create_order",
    skip(state, payload, user),
    fields(user_id = %user.user_id)
)]
pub async fn create_order(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    payload: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, StorefrontError> {
    let CreateOrderRequest { items, coupon_code } = payload.into_inner();
    let placed = state
        .orders
        .create_order(user.user_id, items, coupon_code.as_deref())
        .await?;
    Ok(HttpResponse::Created().json(CreateOrderResponse::new(placed, &state.bank)))
}

#[instrument(
    name = "handler::cancel_order",
    skip(state, user),
    fields(user_id = %user.user_id)
)]
pub async fn cancel_order(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    order_id: web::Path<OrderId>,
) -> Result<HttpResponse, StorefrontError> {
    let outcome = state.engine.cancel(order_id.into_inner(), user.user_id).await?;
    info!(?outcome, "cancellation handled");

    let body = CancelResponse {
        success: outcome == CancelOutcome::Cancelled,
        error: outcome.reason(),
    };
    let response = match outcome {
        CancelOutcome::Cancelled => HttpResponse::Ok().json(body),
        CancelOutcome::AlreadySettled => HttpResponse::Conflict().json(body),
        CancelOutcome::Forbidden => HttpResponse::NotFound().json(body),
    };
    Ok(response)
}

pub async fn list_orders(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, StorefrontError> {
    let orders: Vec<OrderView> = state
        .orders
        .orders_for_owner(user.user_id)
        .await?
        .into_iter()
        .map(OrderView::from)
        .collect();
    Ok(HttpResponse::Ok().json(orders))
}

pub async fn get_order(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    order_id: web::Path<OrderId>,
) -> Result<HttpResponse, StorefrontError> {
    let order_id = order_id.into_inner();
    let order = match state.orders.get(order_id).await? {
        Some(order) if order.owner_id == user.user_id => order,
        Some(_) | None => {
            return Ok(HttpResponse::NotFound().json(json!({ "error": "Order not found" })));
        }
    };
    let items = state
        .orders
        .items(order_id)
        .await?
        .into_iter()
        .map(ItemView::from)
        .collect();
    Ok(HttpResponse::Ok().json(OrderDetail {
        order: order.into(),
        items,
    }))
}

pub async fn payment_webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let response = state
        .ingester
        .handle(InboundWebhook {
            authorization,
            body: &body,
        })
        .await;
    HttpResponse::build(response.status).json(response.body)
}
