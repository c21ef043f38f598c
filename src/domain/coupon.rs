use crate::error::{Result, StorefrontError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coupon code, trimmed and upper-cased so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    pub fn parse(raw: &str) -> Result<Self> {
        let code = raw.trim().to_uppercase();
        if code.is_empty() {
            return Err(StorefrontError::ValidationError(
                "Coupon code must not be empty".to_string(),
            ));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CouponCode {
    type Error = StorefrontError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self {
        code.0
    }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a coupon could not be reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponRejection {
    Invalid,
    Expired,
    LimitReached,
}

impl fmt::Display for CouponRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CouponRejection::Invalid => f.write_str("invalid coupon code"),
            CouponRejection::Expired => f.write_str("coupon has expired"),
            CouponRejection::LimitReached => f.write_str("coupon has reached its usage limit"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Coupon {
    pub code: CouponCode,
    /// Percentage off the subtotal, 1 to 100.
    pub discount_percent: u8,
    /// Maximum redemptions; 0 means unlimited.
    pub usage_limit: u32,
    pub used_count: u32,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Input for registering a coupon.
#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub code: String,
    pub discount_percent: u8,
    pub usage_limit: u32,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Coupon {
    pub fn new(new: NewCoupon) -> Result<Self> {
        if !(1..=100).contains(&new.discount_percent) {
            return Err(StorefrontError::ValidationError(format!(
                "Discount percent must be between 1 and 100, got {}",
                new.discount_percent
            )));
        }
        Ok(Self {
            code: CouponCode::parse(&new.code)?,
            discount_percent: new.discount_percent,
            usage_limit: new.usage_limit,
            used_count: 0,
            expires_at: new.expires_at,
        })
    }

    /// Takes one slot if the coupon is live and has room.
    ///
    /// This is the guard half of the storage layer's atomic increment: adapters
    /// invoke it while holding exclusive access to the coupon row and persist
    /// the coupon only when it returns `Ok`.
    pub fn try_take_slot(&mut self, now: DateTime<Utc>) -> std::result::Result<(), CouponRejection> {
        if self.expires_at.is_some_and(|expiry| expiry <= now) {
            return Err(CouponRejection::Expired);
        }
        if self.usage_limit != 0 && self.used_count >= self.usage_limit {
            return Err(CouponRejection::LimitReached);
        }
        self.used_count += 1;
        Ok(())
    }

    /// Gives a slot back. Returns `false` when there was nothing to release.
    pub fn return_slot(&mut self) -> bool {
        if self.used_count == 0 {
            return false;
        }
        self.used_count -= 1;
        true
    }
}

/// Result of the storage layer's guarded increment.
#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    Reserved { discount_percent: u8 },
    Rejected(CouponRejection),
}
