use crate::domain::coupon::{Coupon, CouponCode, NewCoupon, Reservation};
use crate::domain::ports::CouponStoreRef;
use crate::error::{Result, StorefrontError};
use chrono::Utc;
use tracing::{info, instrument, warn};

/// A coupon slot taken for one checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservedCoupon {
    pub code: CouponCode,
    pub discount_percent: u8,
}

/// Validates coupons and accounts for their usage.
///
/// All counting happens in the store's atomic reserve/release operations;
/// the ledger never reads a count and writes it back.
#[derive(Clone)]
pub struct CouponLedger {
    store: CouponStoreRef,
}

impl CouponLedger {
    pub fn new(store: CouponStoreRef) -> Self {
        Self { store }
    }

    /// Registers a new coupon. Duplicate codes (after normalization) are rejected.
    #[instrument(skip(self, new), fields(code = %new.code))]
    pub async fn register(&self, new: NewCoupon) -> Result<Coupon> {
        let coupon = Coupon::new(new)?;
        if !self.store.insert(coupon.clone()).await? {
            return Err(StorefrontError::ValidationError(format!(
                "Coupon {} already exists",
                coupon.code
            )));
        }
        info!(code = %coupon.code, percent = coupon.discount_percent, limit = coupon.usage_limit, "coupon registered");
        Ok(coupon)
    }

    pub async fn get(&self, code: &str) -> Result<Option<Coupon>> {
        let code = CouponCode::parse(code)?;
        self.store.get(&code).await
    }

    /// Takes one usage slot of `code` or reports why it cannot.
    #[instrument(skip(self))]
    pub async fn validate_and_reserve(&self, code: &str) -> Result<ReservedCoupon> {
        let code = CouponCode::parse(code)?;
        match self.store.reserve(&code, Utc::now()).await? {
            Reservation::Reserved { discount_percent } => {
                info!(code = %code, discount_percent, "coupon slot reserved");
                Ok(ReservedCoupon {
                    code,
                    discount_percent,
                })
            }
            Reservation::Rejected(rejection) => {
                warn!(code = %code, %rejection, "coupon rejected");
                Err(StorefrontError::CouponRejected(rejection))
            }
        }
    }

    /// Gives back a slot taken by [`Self::validate_and_reserve`].
    #[instrument(skip(self))]
    pub async fn release(&self, code: &CouponCode) -> Result<()> {
        if self.store.release(code).await? {
            info!(code = %code, "coupon slot released");
        } else {
            warn!(code = %code, "coupon release found nothing to give back");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::coupon::CouponRejection;
    use crate::infrastructure::in_memory::InMemoryCouponStore;
    use chrono::Duration;
    use std::sync::Arc;

    fn ledger() -> CouponLedger {
        CouponLedger::new(Arc::new(InMemoryCouponStore::new()))
    }

    fn sale(limit: u32) -> NewCoupon {
        NewCoupon {
            code: "SALE10".to_string(),
            discount_percent: 10,
            usage_limit: limit,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_reserve_is_case_insensitive() {
        let ledger = ledger();
        ledger.register(sale(0)).await.unwrap();

        let reserved = ledger.validate_and_reserve("sale10").await.unwrap();
        assert_eq!(reserved.discount_percent, 10);
        assert_eq!(reserved.code.as_str(), "SALE10");
    }

    #[tokio::test]
    async fn test_rejections() {
        let ledger = ledger();
        ledger.register(sale(1)).await.unwrap();
        ledger
            .register(NewCoupon {
                code: "OLD".to_string(),
                discount_percent: 5,
                usage_limit: 0,
                expires_at: Some(Utc::now() - Duration::days(1)),
            })
            .await
            .unwrap();

        assert!(matches!(
            ledger.validate_and_reserve("MISSING").await,
            Err(StorefrontError::CouponRejected(CouponRejection::Invalid))
        ));
        assert!(matches!(
            ledger.validate_and_reserve("old").await,
            Err(StorefrontError::CouponRejected(CouponRejection::Expired))
        ));
        ledger.validate_and_reserve("SALE10").await.unwrap();
        assert!(matches!(
            ledger.validate_and_reserve("SALE10").await,
            Err(StorefrontError::CouponRejected(CouponRejection::LimitReached))
        ));
    }

    #[tokio::test]
    async fn test_release_frees_a_slot() {
        let ledger = ledger();
        ledger.register(sale(1)).await.unwrap();

        let reserved = ledger.validate_and_reserve("SALE10").await.unwrap();
        ledger.release(&reserved.code).await.unwrap();
        assert!(ledger.validate_and_reserve("SALE10").await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let ledger = ledger();
        ledger.register(sale(1)).await.unwrap();
        let mut lower = sale(3);
        lower.code = "sale10".to_string();
        assert!(matches!(
            ledger.register(lower).await,
            Err(StorefrontError::ValidationError(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_respect_limit() {
        let ledger = ledger();
        ledger.register(sale(5)).await.unwrap();

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.validate_and_reserve("SALE10").await })
            })
            .collect();

        let mut reserved = 0;
        let mut limited = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => reserved += 1,
                Err(StorefrontError::CouponRejected(CouponRejection::LimitReached)) => limited += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(reserved, 5);
        assert_eq!(limited, 59);
        assert_eq!(ledger.get("SALE10").await.unwrap().unwrap().used_count, 5);
    }
}
