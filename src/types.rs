//! Core wire types for the x402 protocol.
//!
//! These are the structures exchanged between client, resource server, and
//! facilitator: [`PaymentRequirements`] (server -> client), [`PaymentPayload`]
//! (client -> server via the `X-PAYMENT` header), [`Response402`] (the 402
//! body), and the facilitator's own request/response shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::errors::X402Error;

/// Version of the x402 protocol.
pub const X402_VERSION: u32 = 1;

/// One of the three EIP-712 authorization flavors a token contract may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentType {
    /// EIP-2612 `permit`.
    Permit,
    /// EIP-3009 `transferWithAuthorization`.
    Eip3009,
    /// Uniswap Permit2.
    Permit2,
}

impl PaymentType {
    /// The facilitator's `primaryType` name for this payment type, used
    /// when cross-checking `supported()` against a facilitator's declared
    /// support matrix.
    pub fn primary_type(&self) -> &'static str {
        match self {
            PaymentType::Permit => "Permit",
            PaymentType::Eip3009 => "TransferWithAuthorization",
            PaymentType::Permit2 => "Permit2",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentType::Permit => "permit",
            PaymentType::Eip3009 => "eip3009",
            PaymentType::Permit2 => "permit2",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PaymentType {
    type Err = X402Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permit" => Ok(PaymentType::Permit),
            "eip3009" => Ok(PaymentType::Eip3009),
            "permit2" => Ok(PaymentType::Permit2),
            other => Err(X402Error::Other(format!("unknown payment type: {other}"))),
        }
    }
}

/// One capability a token contract may support, as detected from bytecode.
///
/// `Permit2Witness` is a distinct on-chain capability from plain `Permit2`,
/// but folds into `Permit2` wherever a single `PaymentType` is needed (e.g.
/// `get_recommended_method`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SupportedMethod {
    /// EIP-3009.
    Eip3009,
    /// EIP-2612 permit.
    Permit,
    /// Permit2.
    Permit2,
    /// Permit2 with a witness extension.
    Permit2Witness,
}

/// Describes the payment terms the server will accept for a resource.
///
/// Sent server -> client, either standalone or inside [`Response402`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequirements {
    /// Payment scheme; always `"exact"` in this implementation.
    pub scheme: String,

    /// Network identifier (e.g. `"bsc"`, `"base"`).
    pub network: String,

    /// Amount required, in base units of the token, as a decimal-digit string.
    #[serde(rename = "maxAmountRequired")]
    pub max_amount_required: String,

    /// 20-byte hex address of the merchant's receiving contract.
    #[serde(rename = "payTo")]
    pub pay_to: String,

    /// 20-byte hex address of the ERC-20 token.
    pub asset: String,

    /// Which EIP-712 authorization flavor is required.
    #[serde(rename = "paymentType")]
    pub payment_type: PaymentType,

    /// Maximum time, in seconds, the payment authorization is valid for.
    #[serde(rename = "maxTimeoutSeconds")]
    pub max_timeout_seconds: u64,

    /// The resource URL this payment unlocks.
    pub resource: String,

    /// Human-readable description of what the payment is for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// MIME type of the resource.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Opaque schema describing the resource's response shape.
    #[serde(rename = "outputSchema", skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,

    /// Free-form extra data; the detector injects `name`/`version` here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl PaymentRequirements {
    /// Parses [`PaymentRequirements::max_amount_required`] as an arbitrary-precision
    /// non-negative integer, returning `true` iff it is well-formed.
    ///
    /// Implemented as a digit check rather than parsing into a fixed-width
    /// integer because the amount may exceed 64-bit range.
    pub fn max_amount_is_valid(&self) -> bool {
        !self.max_amount_required.is_empty()
            && self.max_amount_required.chars().all(|c| c.is_ascii_digit())
    }
}

/// The discriminated authorization payload carried inside [`PaymentPayload`].
///
/// Tagged by `authorizationType` so a single wire payload type can carry any
/// of the three authorization flavors without a parallel struct per scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "authorizationType", rename_all = "camelCase")]
pub enum AuthorizationPayload {
    /// EIP-2612 permit authorization.
    Permit {
        /// Token owner.
        owner: String,
        /// Approved spender.
        spender: String,
        /// Approved value.
        value: String,
        /// Permit deadline (unix seconds).
        deadline: String,
        /// Signature `v`.
        v: u8,
        /// Signature `r`.
        r: String,
        /// Signature `s`.
        s: String,
    },
    /// EIP-3009 `transferWithAuthorization` authorization.
    Eip3009 {
        /// Authorizing sender.
        from: String,
        /// Recipient.
        to: String,
        /// Transfer value.
        value: String,
        /// Not valid before this unix timestamp.
        valid_after: String,
        /// Not valid at/after this unix timestamp.
        valid_before: String,
        /// 32-byte nonce, hex-encoded.
        nonce: String,
        /// EIP-712 signature, hex-encoded.
        signature: String,
    },
    /// Permit2-based authorization.
    Permit2 {
        /// Token owner.
        owner: String,
        /// Token being transferred.
        token: String,
        /// Transfer amount.
        amount: String,
        /// Permit2 nonce.
        nonce: String,
        /// Permit2 deadline.
        deadline: String,
        /// EIP-712 signature, hex-encoded.
        signature: String,
        /// Optional witness data for permit2-witness tokens.
        #[serde(skip_serializing_if = "Option::is_none")]
        witness: Option<Value>,
    },
}

/// Payment payload sent by the client in the `X-PAYMENT` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPayload {
    /// Protocol version.
    #[serde(rename = "x402Version")]
    pub x402_version: u32,

    /// Payment scheme used; always `"exact"`.
    pub scheme: String,

    /// Network identifier.
    pub network: String,

    /// The scheme-specific, discriminated authorization data.
    pub payload: AuthorizationPayload,
}

/// Body returned with HTTP 402/500 when payment is required or failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response402 {
    /// Protocol version; always 1.
    #[serde(rename = "x402Version")]
    pub x402_version: u32,

    /// The requirements the client may satisfy to retry the request.
    pub accepts: Vec<PaymentRequirements>,

    /// Human-readable error description, when this is a rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Which pipeline stage produced the rejection.
    #[serde(rename = "errorStage", skip_serializing_if = "Option::is_none")]
    pub error_stage: Option<ErrorStage>,
}

/// Which `process()` stage produced a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStage {
    /// Header parsing/decoding/schema validation failed.
    Parse,
    /// The facilitator rejected the payment during verification.
    Verify,
    /// The facilitator rejected the payment during settlement.
    Settle,
}

/// The capabilities a token contract was found to support.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenCapabilities {
    /// All authorization methods detected as supported.
    pub supported_methods: HashSet<SupportedMethod>,
    /// Convenience flag: `supported_methods` contains `Eip3009`.
    pub has_eip3009: bool,
    /// Convenience flag: `supported_methods` contains `Permit`.
    pub has_permit: bool,
    /// Convenience flag: `supported_methods` contains `Permit2` or `Permit2Witness`.
    pub has_permit2: bool,
    /// Token's `name()`, if it could be read.
    pub name: Option<String>,
    /// Token's EIP-712 domain `version`, defaulting to `"1"`.
    pub version: String,
}

impl TokenCapabilities {
    /// Picks the recommended authorization method by priority
    /// `eip3009 > permit > permit2`.
    pub fn recommended_method(&self) -> Option<PaymentType> {
        if self.has_eip3009 {
            Some(PaymentType::Eip3009)
        } else if self.has_permit {
            Some(PaymentType::Permit)
        } else if self.has_permit2 {
            Some(PaymentType::Permit2)
        } else {
            None
        }
    }
}

/// Result of probing a merchant's receiving contract for settlement support
/// via ERC-165 (`detectSettleMethods`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettleMethodSupport {
    /// Contract answers `true` for the `settleWithPermit` interface id.
    pub supports_settle_with_permit: bool,
    /// Contract answers `true` for the `settleWithERC3009` interface id.
    pub supports_settle_with_erc3009: bool,
    /// Contract answers `true` for the `settleWithPermit2` interface id.
    pub supports_settle_with_permit2: bool,
}

/// Cache maintenance counters for the Token Detector (`getCacheStats`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of cached `(chainId, address)` entries.
    pub entries: usize,
    /// Insertion time of the oldest live entry, if any.
    pub oldest_entry: Option<DateTime<Utc>>,
}

/// A single supported-combination entry from the facilitator's `/supported` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedKind {
    /// Protocol version the facilitator speaks for this kind.
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    /// Scheme (always `"exact"` for this core).
    pub scheme: String,
    /// Network identifier.
    pub network: String,
    /// Extra data, including the asset/eip712 matrix used for cross-checking.
    pub extra: SupportedKindExtra,
}

/// The `extra` object of a [`SupportedKind`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedKindExtra {
    /// Assets (tokens) supported under this scheme/network combination.
    pub assets: Vec<SupportedAsset>,
}

/// One asset entry within [`SupportedKindExtra`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedAsset {
    /// Token contract address.
    pub address: String,
    /// EIP-712 domain metadata for this asset.
    pub eip712: SupportedAssetEip712,
}

/// EIP-712 domain metadata declared by the facilitator for an asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedAssetEip712 {
    /// Domain name.
    pub name: String,
    /// Domain version.
    pub version: String,
    /// The facilitator's `primaryType` for this asset's authorization.
    #[serde(rename = "primaryType")]
    pub primary_type: String,
}

/// Response body of the facilitator's `/supported` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedResponse {
    /// Declared support matrix.
    pub kinds: Vec<SupportedKind>,
}

/// Request body for the facilitator's `POST /verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// Protocol version.
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    /// The client's decoded payment payload.
    pub payment_payload: PaymentPayload,
    /// The server's expected requirements.
    pub payment_requirements: PaymentRequirements,
}

/// Response body from the facilitator's `POST /verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// Whether the payload verified successfully.
    pub success: bool,
    /// Recovered payer address, present iff `success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Machine-readable error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable error message.
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// How long the facilitator should wait before confirming settlement.
///
/// Only `"confirmed"` is ever sent by this crate; `"simulated"` and
/// `"submitted"` are reserved future wire values the type still accepts.
pub type WaitUntil = String;

/// Request body for the facilitator's `POST /settle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleRequest {
    /// Protocol version.
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    /// The client's decoded payment payload.
    pub payment_payload: PaymentPayload,
    /// The server's expected requirements.
    pub payment_requirements: PaymentRequirements,
    /// Desired settlement confirmation depth.
    pub wait_until: WaitUntil,
}

/// Response body from the facilitator's `POST /settle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleResponse {
    /// Whether settlement succeeded.
    pub success: bool,
    /// Settlement transaction hash, present iff `success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    /// Network the settlement transaction was submitted to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// Opaque settlement receipt data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Value>,
    /// Machine-readable error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable error message.
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}
