//! Payment references embedded in bank transfer memos.
//!
//! A code is the fixed prefix [`PAYMENT_CODE_PREFIX`] followed by decimal
//! digits. The digits are the lookup key; the prefix only makes the code easy
//! to spot in free text the payer's bank app may wrap around it.

use crate::error::{Result, StorefrontError};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PAYMENT_CODE_PREFIX: &str = "DH";

const TIME_DIGITS: u32 = 6;
const RANDOM_DIGITS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PaymentCode {
    digits: String,
}

impl PaymentCode {
    pub fn from_digits(digits: &str) -> Result<Self> {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(StorefrontError::ValidationError(format!(
                "Payment code digits must be non-empty decimal, got '{digits}'"
            )));
        }
        Ok(Self {
            digits: digits.to_string(),
        })
    }

    /// Parses a complete code such as `DH123456789` (prefix is case-insensitive).
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let prefix_len = PAYMENT_CODE_PREFIX.len();
        match raw.get(..prefix_len) {
            Some(prefix) if prefix.eq_ignore_ascii_case(PAYMENT_CODE_PREFIX) => {
                Self::from_digits(&raw[prefix_len..])
            }
            _ => Err(StorefrontError::ValidationError(format!(
                "Payment code must start with {PAYMENT_CODE_PREFIX}"
            ))),
        }
    }

    /// Finds the first prefix-plus-digits run anywhere in a transfer memo.
    ///
    /// The prefix matches case-insensitively and the digit run is taken
    /// greedily, so `"ck dh123456789 ft"` yields `DH123456789`.
    pub fn find_in(memo: &str) -> Option<Self> {
        let bytes = memo.as_bytes();
        let prefix = PAYMENT_CODE_PREFIX.as_bytes();
        let mut start = 0;
        while start + prefix.len() < bytes.len() {
            let candidate = &bytes[start..start + prefix.len()];
            if candidate.eq_ignore_ascii_case(prefix) {
                let digits_start = start + prefix.len();
                let digits_len = bytes[digits_start..]
                    .iter()
                    .take_while(|b| b.is_ascii_digit())
                    .count();
                if digits_len > 0 {
                    // Prefix and digits are ASCII, so these are char boundaries.
                    let digits = &memo[digits_start..digits_start + digits_len];
                    return Some(Self {
                        digits: digits.to_string(),
                    });
                }
            }
            start += 1;
        }
        None
    }

    pub fn digits(&self) -> &str {
        &self.digits
    }
}

impl fmt::Display for PaymentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PAYMENT_CODE_PREFIX, self.digits)
    }
}

impl TryFrom<String> for PaymentCode {
    type Error = StorefrontError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PaymentCode> for String {
    fn from(code: PaymentCode) -> Self {
        code.to_string()
    }
}

/// Source of fresh payment codes.
pub trait PaymentCodeGenerator: Send + Sync {
    fn generate(&self) -> PaymentCode;
}

/// Default generator: the last six digits of the Unix time in milliseconds
/// followed by three random digits.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimestampedCodeGenerator;

impl PaymentCodeGenerator for TimestampedCodeGenerator {
    fn generate(&self) -> PaymentCode {
        let millis = Utc::now().timestamp_millis().unsigned_abs();
        let time_part = millis % 10_u64.pow(TIME_DIGITS);
        let random_part = rand::thread_rng().gen_range(0..10_u64.pow(RANDOM_DIGITS));
        PaymentCode {
            digits: format!(
                "{:0tw$}{:0rw$}",
                time_part,
                random_part,
                tw = TIME_DIGITS as usize,
                rw = RANDOM_DIGITS as usize
            ),
        }
    }
}
