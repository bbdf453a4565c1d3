//! Small helper functions shared across the detector, requirements builder,
//! and process pipeline.

use crate::errors::{Result, X402Error};
use ethers::types::{Address, U256};
use std::str::FromStr;

/// Converts a string representation of a uint256 to an `ethers` `U256`.
///
/// Accepts plain decimal digits or a `0x`-prefixed hex literal.
///
/// # Examples
///
/// ```
/// use x402_core::utils::string_to_u256;
///
/// let value = string_to_u256("1000000").unwrap();
/// assert_eq!(value, 1000000u64.into());
///
/// let hex_value = string_to_u256("0x0f4240").unwrap();
/// assert_eq!(hex_value, 1000000u64.into());
/// ```
pub fn string_to_u256(s: &str) -> Result<U256> {
    if let Ok(value) = U256::from_dec_str(s) {
        return Ok(value);
    }

    if s.starts_with("0x") || s.starts_with("0X") {
        if let Ok(value) = U256::from_str(s) {
            return Ok(value);
        }
    }

    Err(X402Error::InvalidAmount(format!("cannot parse '{s}' as U256")))
}

/// Converts a `U256` to its decimal string representation.
pub fn u256_to_string(value: U256) -> String {
    value.to_string()
}

/// Validates and parses an Ethereum address, with or without the `0x` prefix.
///
/// # Examples
///
/// ```
/// use x402_core::utils::parse_address;
///
/// let addr = parse_address("0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb").unwrap();
/// assert!(format!("{:?}", addr).len() > 0);
/// ```
pub fn parse_address(addr: &str) -> Result<Address> {
    Address::from_str(addr).map_err(|e| X402Error::InvalidAddress(format!("{addr}: {e}")))
}

/// Gets the current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Lowercases a hex address for use as a cache key, leaving the `0x` prefix intact.
pub fn normalize_address(addr: &str) -> String {
    addr.to_lowercase()
}
