use crate::error::{Result, StorefrontError};
use serde::Serialize;
use std::env;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = StorefrontError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(StorefrontError::ConfigError(format!(
                "Invalid LOG_FORMAT '{other}', expected 'text' or 'json'"
            ))),
        }
    }
}

/// The receiving bank account shown to payers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
}

#[derive(Clone, Default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub webhook_api_key: Option<String>,
    pub bank: BankAccount,
    pub log_format: LogFormat,
}

// Hand-written so the webhook key never reaches a log line.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "webhook_api_key",
                &self.webhook_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("bank", &self.bank)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = get("STOREFRONT_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get("STOREFRONT_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                StorefrontError::ConfigError(format!("Invalid STOREFRONT_PORT '{raw}': {e}"))
            })?,
            None => DEFAULT_PORT,
        };
        let log_format = match get("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            host,
            port,
            webhook_api_key: get("WEBHOOK_API_KEY"),
            bank: BankAccount {
                bank_name: get("BANK_NAME"),
                account_number: get("BANK_ACCOUNT_NUMBER"),
                account_name: get("BANK_ACCOUNT_NAME"),
            },
            log_format,
        })
    }

    /// The webhook key, which must be configured before serving.
    pub fn require_webhook_key(&self) -> Result<&str> {
        self.webhook_api_key.as_deref().ok_or_else(|| {
            StorefrontError::ConfigError("WEBHOOK_API_KEY must be set to serve".to_string())
        })
    }

    /// Address to listen on; command-line overrides win over the environment.
    pub fn bind_address(&self, host: Option<String>, port: Option<u16>) -> (String, u16) {
        (
            host.unwrap_or_else(|| self.host.clone()),
            port.unwrap_or(self.port),
        )
    }
}
