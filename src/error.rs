use crate::domain::coupon::CouponRejection;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum StorefrontError {
    #[error("Validation error: {0}")]
    #[diagnostic(code(storefront::validation))]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    #[diagnostic(code(storefront::unauthorized))]
    Unauthorized(String),

    #[error("Coupon rejected: {0}")]
    #[diagnostic(code(storefront::coupon))]
    CouponRejected(CouponRejection),

    #[error("Could not allocate a unique payment code after {0} attempts")]
    #[diagnostic(
        code(storefront::payment_code),
        help("the code generator keeps colliding with existing orders")
    )]
    PaymentCodeExhausted(usize),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(storefront::config))]
    ConfigError(String),

    #[error("Storage error: {0}")]
    #[diagnostic(code(storefront::storage))]
    InternalError(Box<dyn std::error::Error + Send + Sync>),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(storefront::serde))]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    #[diagnostic(code(storefront::csv))]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(storefront::io))]
    IoError(#[from] std::io::Error),
}

impl StorefrontError {
    /// Wraps a storage-layer fault.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(Box::new(std::io::Error::other(message.into())))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for StorefrontError {
    fn from(e: rocksdb::Error) -> Self {
        StorefrontError::InternalError(Box::new(e))
    }
}

impl ResponseError for StorefrontError {
    fn status_code(&self) -> StatusCode {
        match self {
            StorefrontError::ValidationError(_) => StatusCode::BAD_REQUEST,
            StorefrontError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            StorefrontError::CouponRejected(CouponRejection::LimitReached) => StatusCode::CONFLICT,
            StorefrontError::CouponRejected(CouponRejection::Invalid | CouponRejection::Expired) => {
                StatusCode::BAD_REQUEST
            }
            StorefrontError::PaymentCodeExhausted(_)
            | StorefrontError::ConfigError(_)
            | StorefrontError::InternalError(_)
            | StorefrontError::SerializationError(_)
            | StorefrontError::CsvError(_)
            | StorefrontError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            StorefrontError::ValidationError(message) | StorefrontError::Unauthorized(message) => {
                json!({ "error": message })
            }
            StorefrontError::CouponRejected(rejection) => json!({
                "error": format!("Coupon rejected: {rejection}"),
                "reason": rejection,
            }),
            _ => {
                tracing::error!(error = %self, "request failed");
                json!({ "error": "An internal error occurred" })
            }
        };
        HttpResponse::build(status).json(body)
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
