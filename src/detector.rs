//! Token Detector: classifies which EIP-712 authorization flavors an ERC-20
//! token supports, by scanning its (possibly proxied) deployed bytecode, and
//! extracts its EIP-712 domain name/version.
//!
//! Results are cached for the lifetime of the process, keyed by
//! `"{chainId}:{lowercased address}"`. This is the only piece of shared
//! mutable state in the crate; see the module-level lock discipline notes on
//! [`TokenDetector`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ethers::abi::{ParamType, Token};
use ethers::types::{Address, H256};
use tokio::sync::RwLock;

use crate::errors::{DetectorError, RpcError};
use crate::network::Network;
use crate::presets;
use crate::rpc::RpcClient;
use crate::types::{CacheStats, PaymentType, SettleMethodSupport, SupportedMethod, TokenCapabilities};

/// Universal Permit2 deployment address, identical across every chain it's deployed on.
pub const PERMIT2_ADDRESS: &str = "0x000000000022D473030F116dDEE9F6B43aC78BA3";

/// EIP-3009 `transferWithAuthorization`/`receiveWithAuthorization` selectors; either match suffices.
const EIP3009_SELECTORS: [&str; 2] = ["e3ee160e", "cf092995"];

/// EIP-2612 `permit` selector.
const PERMIT_SELECTOR: &str = "d505accf";

/// EIP-1967 implementation storage slot.
const EIP1967_SLOT: &str = "360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc";

/// EIP-1822 (UUPS) implementation storage slot.
const EIP1822_SLOT: &str = "7050c9e0f4ca769c69bd3a8ef740bc37934f8e2c036e5a723fd8ee048ed3f8c3";

/// ERC-165 interface id for `settleWithPermit`.
const IFACE_SETTLE_WITH_PERMIT: [u8; 4] = [0x02, 0xcc, 0xc2, 0x3e];
/// ERC-165 interface id for `settleWithERC3009`.
const IFACE_SETTLE_WITH_ERC3009: [u8; 4] = [0x1f, 0xe2, 0x00, 0xd9];
/// ERC-165 interface id for `settleWithPermit2`.
const IFACE_SETTLE_WITH_PERMIT2: [u8; 4] = [0xa7, 0xfc, 0xaf, 0xbb];

#[derive(Clone)]
struct CacheEntry {
    capabilities: TokenCapabilities,
    inserted_at: DateTime<Utc>,
}

/// Inspects ERC-20 token contracts for supported payment-authorization methods.
///
/// Generic over the [`RpcClient`] implementation so tests can substitute an
/// in-memory fake without standing up a real chain.
pub struct TokenDetector<R: RpcClient> {
    rpc: Arc<R>,
    chain_id: u64,
    network: Network,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl<R: RpcClient> TokenDetector<R> {
    /// Builds a detector bound to `rpc`'s chain. `chain_id` is read once at
    /// construction time via [`RpcClient::get_chain_id`].
    pub async fn new(rpc: Arc<R>) -> Result<Self, RpcError> {
        let chain_id = rpc.get_chain_id().await?;
        Ok(Self {
            rpc,
            chain_id,
            network: Network::from_chain_id(chain_id),
            cache: RwLock::new(HashMap::new()),
        })
    }

    fn cache_key(&self, address: &str) -> String {
        format!("{}:{}", self.chain_id, address.to_lowercase())
    }

    /// Detects the full [`TokenCapabilities`] for `address`, using the cache
    /// when available.
    ///
    /// Fails only if `name()` cannot be read after both the direct and (if
    /// applicable) proxy-resolved contract are tried; every other probe
    /// degrades to "capability absent" rather than propagating an error.
    pub async fn detect(&self, address: Address) -> Result<TokenCapabilities, DetectorError> {
        let addr_str = format!("{address:?}");
        let key = self.cache_key(&addr_str);

        if let Some(entry) = self.cache.read().await.get(&key) {
            return Ok(entry.capabilities.clone());
        }

        match presets::lookup(&self.network, &addr_str) {
            presets::PresetLookup::Supported(caps) => {
                self.store(&key, caps.clone()).await;
                return Ok(caps);
            }
            presets::PresetLookup::UnsupportedNetwork => {
                let empty = TokenCapabilities {
                    version: "1".to_string(),
                    ..Default::default()
                };
                self.store(&key, empty.clone()).await;
                return Ok(empty);
            }
            presets::PresetLookup::NotPreset => {}
        }

        let capabilities = self.detect_uncached(address, &addr_str).await?;
        self.store(&key, capabilities.clone()).await;
        Ok(capabilities)
    }

    async fn store(&self, key: &str, capabilities: TokenCapabilities) {
        self.cache.write().await.insert(
            key.to_string(),
            CacheEntry {
                capabilities,
                inserted_at: Utc::now(),
            },
        );
    }

    async fn detect_uncached(
        &self,
        address: Address,
        addr_str: &str,
    ) -> Result<TokenCapabilities, DetectorError> {
        let code = self.rpc.get_code(address).await.unwrap_or_default();
        if code.0.is_empty() {
            let name = self.try_read_name(address).await.ok_or_else(|| DetectorError::NameUnreadable {
                address: addr_str.to_string(),
                source: RpcError::Decode("name() unreadable".to_string()),
            })?;
            return Ok(TokenCapabilities {
                name: Some(name),
                version: "1".to_string(),
                ..Default::default()
            });
        }

        let bytecode_hex = hex::encode(&code.0);

        let (has_eip3009, has_permit, has_permit2) = tokio::join!(
            self.probe_selector_with_proxy(address, &bytecode_hex, &EIP3009_SELECTORS),
            self.probe_selector_with_proxy(address, &bytecode_hex, &[PERMIT_SELECTOR]),
            self.probe_permit2(),
        );

        let mut supported_methods = std::collections::HashSet::new();
        if has_eip3009 {
            supported_methods.insert(SupportedMethod::Eip3009);
        }
        if has_permit {
            supported_methods.insert(SupportedMethod::Permit);
        }
        if has_permit2 {
            supported_methods.insert(SupportedMethod::Permit2);
        }

        let name = self.try_read_name(address).await.ok_or_else(|| DetectorError::NameUnreadable {
            address: addr_str.to_string(),
            source: RpcError::Decode("name() unreadable".to_string()),
        })?;
        let name = Some(name);
        let version = self.read_version(address).await;

        Ok(TokenCapabilities {
            has_eip3009,
            has_permit,
            has_permit2,
            supported_methods,
            name,
            version,
        })
    }

    /// Searches for `selectors` directly in `bytecode_hex`; on miss, resolves
    /// the proxy implementation (if any) and re-scans its bytecode once.
    async fn probe_selector_with_proxy(&self, address: Address, bytecode_hex: &str, selectors: &[&str]) -> bool {
        if selectors.iter().any(|s| bytecode_hex.contains(s)) {
            return true;
        }

        if let Some(implementation) = self.resolve_proxy(address).await {
            if let Ok(impl_code) = self.rpc.get_code(implementation).await {
                let impl_hex = hex::encode(&impl_code.0);
                return selectors.iter().any(|s| impl_hex.contains(s));
            }
        }

        false
    }

    /// Permit2 support is a chain property: the universal Permit2 contract
    /// has non-empty bytecode on the current chain.
    async fn probe_permit2(&self) -> bool {
        let permit2: Address = match PERMIT2_ADDRESS.parse() {
            Ok(a) => a,
            Err(_) => return false,
        };
        self.rpc
            .get_code(permit2)
            .await
            .map(|code| !code.0.is_empty())
            .unwrap_or(false)
    }

    /// Resolves a proxy's implementation address via, in order: EIP-1967
    /// slot, EIP-1822 slot, `implementation()`. Any strategy failure (or a
    /// zero result) falls through to the next; all three failing means "not
    /// a proxy".
    async fn resolve_proxy(&self, address: Address) -> Option<Address> {
        if let Some(addr) = self.read_slot_as_address(address, EIP1967_SLOT).await {
            return Some(addr);
        }
        if let Some(addr) = self.read_slot_as_address(address, EIP1822_SLOT).await {
            return Some(addr);
        }
        self.call_implementation(address).await
    }

    async fn read_slot_as_address(&self, address: Address, slot_hex: &str) -> Option<Address> {
        let slot: H256 = slot_hex.parse().ok()?;
        let value = self.rpc.get_storage_at(address, slot).await.ok()?;
        let bytes = value.as_bytes();
        if bytes[0..12].iter().all(|b| *b == 0) && bytes[12..].iter().any(|b| *b != 0) {
            Some(Address::from_slice(&bytes[12..]))
        } else {
            None
        }
    }

    async fn call_implementation(&self, address: Address) -> Option<Address> {
        let result = self
            .rpc
            .read_contract(address, "implementation()", &[], &[ParamType::Address])
            .await
            .ok()?;
        match result.first() {
            Some(Token::Address(addr)) if *addr != Address::zero() => Some(*addr),
            _ => None,
        }
    }

    async fn try_read_name(&self, address: Address) -> Option<String> {
        let result = self
            .rpc
            .read_contract(address, "name()", &[], &[ParamType::String])
            .await
            .ok()?;
        match result.first() {
            Some(Token::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// EIP-5267 `eip712Domain()`'s third field first, then `version()`,
    /// defaulting to `"1"` on either "function absent" or "read errored" —
    /// these two cases are intentionally not distinguished in the returned
    /// value, only in the debug log emitted here.
    async fn read_version(&self, address: Address) -> String {
        let domain = self
            .rpc
            .read_contract(
                address,
                "eip712Domain()",
                &[],
                &[
                    ParamType::FixedBytes(1),
                    ParamType::String,
                    ParamType::String,
                    ParamType::Uint(256),
                    ParamType::Address,
                    ParamType::FixedBytes(32),
                    ParamType::Array(Box::new(ParamType::Uint(256))),
                ],
            )
            .await;

        if let Ok(tokens) = domain {
            if let Some(Token::String(version)) = tokens.get(2) {
                return version.clone();
            }
        }

        let version = self
            .rpc
            .read_contract(address, "version()", &[], &[ParamType::String])
            .await;

        match version {
            Ok(tokens) => match tokens.first() {
                Some(Token::String(v)) => v.clone(),
                _ => {
                    tracing::debug!(?address, "version() returned no string, defaulting to \"1\"");
                    "1".to_string()
                }
            },
            Err(err) => {
                tracing::debug!(?address, %err, "version() read failed, defaulting to \"1\"");
                "1".to_string()
            }
        }
    }

    /// Priority: `eip3009 > permit > permit2`.
    pub async fn get_recommended_method(&self, address: Address) -> Result<Option<PaymentType>, DetectorError> {
        Ok(self.detect(address).await?.recommended_method())
    }

    /// Probes `recipient` for ERC-165 support of the three fixed settlement
    /// interface ids. Not cached: this targets the merchant's own contract,
    /// not a token, and is expected to be called far less often.
    pub async fn detect_settle_methods(&self, recipient: Address) -> SettleMethodSupport {
        let (permit, erc3009, permit2) = tokio::join!(
            self.supports_interface(recipient, IFACE_SETTLE_WITH_PERMIT),
            self.supports_interface(recipient, IFACE_SETTLE_WITH_ERC3009),
            self.supports_interface(recipient, IFACE_SETTLE_WITH_PERMIT2),
        );
        SettleMethodSupport {
            supports_settle_with_permit: permit,
            supports_settle_with_erc3009: erc3009,
            supports_settle_with_permit2: permit2,
        }
    }

    async fn supports_interface(&self, address: Address, interface_id: [u8; 4]) -> bool {
        let result = self
            .rpc
            .read_contract(
                address,
                "supportsInterface(bytes4)",
                &[Token::FixedBytes(interface_id.to_vec())],
                &[ParamType::Bool],
            )
            .await;
        matches!(result.ok().and_then(|t| t.into_iter().next()), Some(Token::Bool(true)))
    }

    /// Warms the cache for `addresses` in parallel; per-address failures are
    /// logged and do not abort the batch.
    pub async fn initialize(&self, addresses: &[Address]) {
        let futures = addresses.iter().map(|addr| async move {
            if let Err(err) = self.detect(*addr).await {
                tracing::warn!(address = ?addr, %err, "token detector warm-up failed");
            }
        });
        futures_util::future::join_all(futures).await;
    }

    /// Clears the entire cache, or just `address` on the current chain if given.
    pub async fn clear_cache(&self, address: Option<Address>) {
        match address {
            Some(addr) => {
                let key = self.cache_key(&format!("{addr:?}"));
                self.cache.write().await.remove(&key);
            }
            None => self.cache.write().await.clear(),
        }
    }

    /// Returns maintenance counters for the cache.
    pub async fn get_cache_stats(&self) -> CacheStats {
        let cache = self.cache.read().await;
        CacheStats {
            entries: cache.len(),
            oldest_entry: cache.values().map(|e| e.inserted_at).min(),
        }
    }

    /// The chain id this detector is bound to.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// The network this detector is bound to.
    pub fn network(&self) -> &Network {
        &self.network
    }
}
