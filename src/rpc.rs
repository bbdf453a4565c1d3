//! The blockchain read interface the Token Detector depends on.
//!
//! [`RpcClient`] is deliberately narrow: raw `eth_getCode`/`eth_getStorageAt`
//! reads plus a single generic contract-call method, rather than a bound
//! `abigen!` contract per function. The detector probes functions
//! (`name()`, `version()`, `eip712Domain()`, `implementation()`,
//! `supportsInterface(bytes4)`) whose presence it cannot assume at compile
//! time, so selectors are computed at runtime from their signatures.

use async_trait::async_trait;
use ethers::abi::{ParamType, Token};
use ethers::core::utils::keccak256;
use ethers::types::{Address, Bytes, H256, U256};

use crate::errors::RpcError;

/// Read-only access to an EVM-compatible chain.
///
/// Implementations typically wrap an `ethers::providers::Provider<Http>`.
/// Every method here is infallible-at-the-type-level in the sense that the
/// detector treats any [`RpcError`] as "capability absent" rather than a
/// hard failure, except for the top-level `name()` read used to populate
/// [`crate::types::TokenCapabilities::name`].
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Chain id this client is connected to.
    async fn get_chain_id(&self) -> Result<u64, RpcError>;

    /// Raw deployed bytecode at `address`, empty for an EOA or nonexistent account.
    async fn get_code(&self, address: Address) -> Result<Bytes, RpcError>;

    /// Raw storage slot value at `address`/`slot`.
    async fn get_storage_at(&self, address: Address, slot: H256) -> Result<H256, RpcError>;

    /// Calls a read-only function on `address` identified by its Solidity
    /// signature (e.g. `"name()"`, `"supportsInterface(bytes4)"`), with ABI-encoded
    /// `args`, decoding the return data against `return_types`.
    ///
    /// Returns [`RpcError::Decode`] if the call reverts or the return data
    /// doesn't match `return_types` — both cases the detector treats as "this
    /// contract doesn't implement this function".
    async fn read_contract(
        &self,
        address: Address,
        signature: &str,
        args: &[Token],
        return_types: &[ParamType],
    ) -> Result<Vec<Token>, RpcError>;
}

/// Computes the 4-byte Solidity function selector for a signature like
/// `"name()"` or `"supportsInterface(bytes4)"`.
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Builds ABI-encoded calldata: selector followed by ABI-encoded `args`.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = function_selector(signature).to_vec();
    data.extend(ethers::abi::encode(args));
    data
}

/// Decodes an ERC-20 `U256` amount from 32 bytes of return data, used for
/// reads like `decimals()` when a detector implementation chooses to probe it.
pub fn decode_u256(data: &[u8]) -> Result<U256, RpcError> {
    if data.len() < 32 {
        return Err(RpcError::Decode("return data shorter than 32 bytes".to_string()));
    }
    Ok(U256::from_big_endian(&data[0..32]))
}
