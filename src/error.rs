/// Centralized error types for the scanner
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    // Network Errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Network timeout: {0}")]
    NetworkTimeout(String),

    // Data Errors
    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Invalid candle data: {0}")]
    InvalidCandleData(String),

    #[error("Deserialization failed: {0}")]
    DeserializationError(#[from] serde_json::Error),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // Broker Errors
    #[error("Broker API error: {code} - {message}")]
    BrokerApiError { code: String, message: String },

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    // Universe Errors
    #[error("Empty instrument universe: {0}")]
    EmptyUniverse(String),

    #[error("No expiry available: {0}")]
    NoExpiry(String),

    #[error("Empty strike ring: {0}")]
    EmptyStrikeRing(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

impl ScanError {
    /// Check if a retry of the same request may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ScanError::HttpError(_)
                | ScanError::NetworkTimeout(_)
                | ScanError::RateLimitExceeded(_)
                | ScanError::BrokerApiError { .. }
        )
    }

    /// Get error code for logging/monitoring
    pub fn error_code(&self) -> &str {
        match self {
            ScanError::HttpError(_) => "NET_001",
            ScanError::NetworkTimeout(_) => "NET_004",
            ScanError::MissingData(_) => "DATA_003",
            ScanError::InvalidCandleData(_) => "DATA_002",
            ScanError::DeserializationError(_) => "DATA_004",
            ScanError::ConfigError(_) => "CFG_001",
            ScanError::InvalidParameter(_) => "CFG_002",
            ScanError::BrokerApiError { .. } => "BROKER_001",
            ScanError::RateLimitExceeded(_) => "BROKER_002",
            ScanError::EmptyUniverse(_) => "UNIV_001",
            ScanError::NoExpiry(_) => "UNIV_002",
            ScanError::EmptyStrikeRing(_) => "UNIV_003",
        }
    }
}

/// Why a single option symbol was dropped from a scan
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CandidateSkip {
    #[error("{0}: no quote returned")]
    NoQuote(String),

    #[error("{0}: no last traded price")]
    NoLastPrice(String),

    #[error("{symbol}: non-positive premium {premium}")]
    NonPositivePremium { symbol: String, premium: f64 },

    #[error("{0}: no spot reference for underlying")]
    NoSpotReference(String),
}
