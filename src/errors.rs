//! Error types for the x402 server core.
//!
//! This module defines the error taxonomy used across token detection,
//! payment-requirements construction, and the `process()` pipeline. Each
//! stage gets its own enum so callers can match on *why* something failed
//! without parsing strings, while [`X402Error`] remains the catch-all root
//! error for anything that crosses module boundaries.

use thiserror::Error;

/// Root error type for x402 operations that don't belong to one pipeline stage.
#[derive(Error, Debug)]
pub enum X402Error {
    /// Error during HTTP request/response handling.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Error during JSON serialization/deserialization.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error during Base64 encoding/decoding.
    #[error("Base64 error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    /// Error during blockchain RPC operations.
    #[error("RPC error: {0}")]
    RpcError(#[from] RpcError),

    /// Invalid address format.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid amount.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error parsing a URL.
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// Generic error with a custom message.
    #[error("{0}")]
    Other(String),
}

impl From<ethers::core::types::SignatureError> for X402Error {
    fn from(err: ethers::core::types::SignatureError) -> Self {
        X402Error::Other(format!("signature error: {err}"))
    }
}

/// Errors surfaced by an [`crate::rpc::RpcClient`] implementation.
///
/// Every probe in the Token Detector swallows these into "capability
/// absent"; only `detect()`'s top-level `name()` read propagates one.
#[derive(Error, Debug, Clone)]
pub enum RpcError {
    /// The RPC transport itself failed (timeout, connection refused, etc).
    #[error("transport error: {0}")]
    Transport(String),

    /// The node returned malformed or undecodable data for a contract read.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Errors from the Token Detector.
#[derive(Error, Debug, Clone)]
pub enum DetectorError {
    /// `name()` could not be read from the token, after both the direct and
    /// (if applicable) proxy-resolved implementation address were tried.
    #[error("could not read name() for token {address}: {source}")]
    NameUnreadable {
        /// The token address that failed.
        address: String,
        /// The underlying RPC failure.
        #[source]
        source: RpcError,
    },
}

/// Errors from the Requirements Builder (`src/requirements.rs`).
///
/// Distinguished from [`X402Error`] so the Gate Middleware can tell a
/// schema/config mistake (HTTP 400) apart from an unexpected failure
/// (HTTP 500).
#[derive(Error, Debug, Clone)]
pub enum RequirementsError {
    /// `asset` did not match `^0x[0-9a-fA-F]{40}$`.
    #[error("invalid asset address: {0}")]
    InvalidAsset(String),

    /// `maxAmountRequired` did not parse as a non-negative integer.
    #[error("invalid maxAmountRequired: {0}")]
    InvalidAmount(String),

    /// `autoDetect` was `false` but no explicit, non-"auto" `paymentType` was given.
    #[error("Must specify paymentType when autoDetect is false")]
    PaymentTypeRequired,

    /// Auto-detection ran but the token supports none of the known authorization types.
    #[error("token does not support advanced payment methods")]
    NoRecommendedMethod,

    /// The facilitator's `supported()` response does not contain a matching
    /// `(network, asset, paymentType)` entry.
    #[error(
        "Facilitator does not support {payment_type} for {asset} on {network}; supported combinations: {supported:?}"
    )]
    UnsupportedByFacilitator {
        /// Requested payment type.
        payment_type: String,
        /// Requested asset address.
        asset: String,
        /// Requested network.
        network: String,
        /// The facilitator's full declared support matrix, for the error body.
        supported: Vec<String>,
    },

    /// Token-detector failure while auto-detecting.
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),

    /// Facilitator transport failure while cross-checking support (non-fatal
    /// in the permissive paths, but surfaced where the caller needs it).
    #[error("facilitator error: {0}")]
    Facilitator(#[from] FacilitatorError),
}

impl RequirementsError {
    /// Whether this is a client-correctable request-shape mistake (HTTP 400)
    /// rather than an unexpected server/dependency failure (HTTP 500).
    ///
    /// The Gate Middleware uses this to distinguish schema-validation errors
    /// from unexpected errors per the 402 spec's middleware contract: a
    /// malformed `asset`/`maxAmountRequired` or a missing `paymentType` is
    /// the caller's mistake, while a detector/facilitator failure or a
    /// genuine unsupported-combination config error is the server's.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            RequirementsError::InvalidAsset(_)
                | RequirementsError::InvalidAmount(_)
                | RequirementsError::PaymentTypeRequired
        )
    }
}

/// Errors from the [`crate::facilitator::Facilitator`] HTTP client.
#[derive(Error, Debug, Clone)]
pub enum FacilitatorError {
    /// The HTTP transport itself failed.
    #[error("facilitator transport error: {0}")]
    Transport(String),

    /// The facilitator returned a non-2xx status.
    #[error("facilitator returned status {status}: {body}")]
    Status {
        /// HTTP status code returned.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The facilitator's response body didn't deserialize as expected.
    #[error("failed to parse facilitator response: {0}")]
    Decode(String),
}

/// Per-stage failure from the `process()` pipeline.
///
/// Each variant maps to exactly one `errorStage` and HTTP status, assigned
/// in `src/process.rs` rather than inferred from the error text.
#[derive(Error, Debug, Clone)]
pub enum StageError {
    /// The `X-PAYMENT` header was absent.
    #[error("missing_payment_header")]
    MissingHeader,

    /// The header was present but failed to decode, parse, or validate.
    #[error("invalid_payment_header: {0}")]
    InvalidHeader(String),

    /// The facilitator rejected the payment during verification.
    #[error("{0}")]
    VerifyFailed(String),

    /// The facilitator rejected the payment during settlement.
    #[error("{0}")]
    SettleFailed(String),
}

/// Result type alias for fallible operations outside a specific pipeline stage.
pub type Result<T> = std::result::Result<T, X402Error>;
