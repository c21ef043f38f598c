use crate::application::coupon_ledger::CouponLedger;
use crate::application::order_service::OrderService;
use crate::application::reconciliation::ReconciliationEngine;
use crate::config::BankAccount;
use crate::domain::payment_code::TimestampedCodeGenerator;
use crate::domain::ports::{CouponStoreRef, OrderStoreRef};
use crate::interfaces::webhook::WebhookIngester;
use std::sync::Arc;

/// Shared handles for request handlers. Cloned into every worker.
#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    pub engine: ReconciliationEngine,
    pub ingester: WebhookIngester,
    pub bank: Arc<BankAccount>,
}

impl AppState {
    /// Wires the services over the given stores.
    pub fn new(
        order_store: OrderStoreRef,
        coupon_store: CouponStoreRef,
        webhook_api_key: &str,
        bank: BankAccount,
    ) -> Self {
        let ledger = CouponLedger::new(coupon_store);
        let engine = ReconciliationEngine::new(order_store.clone(), ledger.clone());
        Self {
            orders: OrderService::new(order_store, ledger, Arc::new(TimestampedCodeGenerator)),
            ingester: WebhookIngester::new(engine.clone(), webhook_api_key),
            engine,
            bank: Arc::new(bank),
        }
    }
}
