//! Encoding and decoding of the `X-PAYMENT` header.
//!
//! The header carries a base64-encoded JSON [`PaymentPayload`], optionally
//! wrapped in a `data:application/json;base64,` URI prefix.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::errors::StageError;
use crate::types::PaymentPayload;

const DATA_URI_PREFIX: &str = "data:application/json;base64,";

/// Encodes a [`PaymentPayload`] as the base64 JSON string sent in `X-PAYMENT`.
///
/// # Examples
///
/// ```
/// use x402_core::codec::{encode_payment_header, decode_payment_header};
/// use x402_core::types::{AuthorizationPayload, PaymentPayload};
///
/// let payload = PaymentPayload {
///     x402_version: 1,
///     scheme: "exact".to_string(),
///     network: "bsc".to_string(),
///     payload: AuthorizationPayload::Eip3009 {
///         from: "0xfrom".to_string(),
///         to: "0xto".to_string(),
///         value: "1000".to_string(),
///         valid_after: "0".to_string(),
///         valid_before: "9999999999".to_string(),
///         nonce: "0x01".to_string(),
///         signature: "0xsig".to_string(),
///     },
/// };
///
/// let encoded = encode_payment_header(&payload).unwrap();
/// let decoded = decode_payment_header(&encoded).unwrap();
/// assert_eq!(decoded.network, "bsc");
/// ```
pub fn encode_payment_header(payload: &PaymentPayload) -> Result<String, StageError> {
    let json = serde_json::to_string(payload)
        .map_err(|e| StageError::InvalidHeader(format!("failed to serialize payload: {e}")))?;
    Ok(BASE64.encode(json.as_bytes()))
}

/// Decodes an `X-PAYMENT` header value into a [`PaymentPayload`].
///
/// Strips a leading `data:application/json;base64,` prefix if present, then
/// base64-decodes and parses the JSON. Any failure at either step is folded
/// into [`StageError::InvalidHeader`], since both conditions drive the same
/// 402/parse response.
pub fn decode_payment_header(header: &str) -> Result<PaymentPayload, StageError> {
    let trimmed = header.strip_prefix(DATA_URI_PREFIX).unwrap_or(header);

    let decoded = BASE64
        .decode(trimmed.as_bytes())
        .map_err(|e| StageError::InvalidHeader(format!("invalid base64: {e}")))?;

    let json_str = String::from_utf8(decoded)
        .map_err(|e| StageError::InvalidHeader(format!("invalid utf-8: {e}")))?;

    serde_json::from_str(&json_str)
        .map_err(|e| StageError::InvalidHeader(format!("invalid payment payload: {e}")))
}
