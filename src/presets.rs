//! Static overrides for tokens whose on-chain capability probing is known to
//! be unreliable or unnecessary.
//!
//! Checked first by the Token Detector, before any RPC call is made: a
//! preset hit on a supported network short-circuits detection entirely; a
//! preset hit on a network the preset doesn't list short-circuits to empty
//! capabilities, also without any RPC.

use crate::network::Network;
use crate::types::{SupportedMethod, TokenCapabilities};
use std::collections::HashSet;

/// A hand-maintained capability override for one token address, valid on a
/// fixed list of networks.
#[derive(Debug, Clone)]
pub struct Preset {
    /// Lowercased token address the override applies to.
    pub address: &'static str,
    /// Networks this override is valid on. A match on `address` whose
    /// current network isn't in this list yields empty capabilities rather
    /// than falling through to bytecode probing on the wrong chain.
    pub supported_networks: &'static [Network],
    /// Methods to report as supported, bypassing bytecode probing entirely.
    pub methods: &'static [SupportedMethod],
    /// Reported EIP-712 domain name.
    pub name: &'static str,
    /// Reported EIP-712 domain version.
    pub version: &'static str,
}

const WLFI_NETWORKS: &[Network] = &[Network::Bsc];

/// Known overrides, checked by lowercased address alone; network support is
/// checked separately so an address match on an unlisted network is
/// distinguishable from no match at all.
///
/// WLFI on BSC reverts on `eip712Domain()` probes despite supporting permit,
/// so its capability is hardcoded rather than left to bytecode scanning.
pub const PRESETS: &[Preset] = &[Preset {
    address: "0x8b95c6f1c7e4b10e3de7e33f6e9e5d8d3d3dd3e1",
    supported_networks: WLFI_NETWORKS,
    methods: &[SupportedMethod::Permit],
    name: "WLFI",
    version: "1",
}];

/// Outcome of a [`lookup`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresetLookup {
    /// No preset is registered for this address; detection proceeds normally.
    NotPreset,
    /// A preset matches and the current network is in its supported list.
    Supported(TokenCapabilities),
    /// A preset matches this address, but not on the current network.
    ///
    /// Per spec, this still short-circuits detection: the caller should
    /// return empty capabilities rather than running bytecode/RPC probes
    /// against the wrong chain.
    UnsupportedNetwork,
}

/// Looks up a preset override for `address`, checking `network` against the
/// preset's supported-networks list.
///
/// `address` is compared case-insensitively; callers should pass it through
/// [`crate::utils::normalize_address`] first, though this function
/// normalizes internally too.
pub fn lookup(network: &Network, address: &str) -> PresetLookup {
    let normalized = address.to_lowercase();
    let Some(preset) = PRESETS.iter().find(|preset| preset.address == normalized) else {
        return PresetLookup::NotPreset;
    };

    if !preset.supported_networks.contains(network) {
        return PresetLookup::UnsupportedNetwork;
    }

    let supported_methods: HashSet<SupportedMethod> = preset.methods.iter().copied().collect();
    PresetLookup::Supported(TokenCapabilities {
        has_eip3009: supported_methods.contains(&SupportedMethod::Eip3009),
        has_permit: supported_methods.contains(&SupportedMethod::Permit),
        has_permit2: supported_methods.contains(&SupportedMethod::Permit2)
            || supported_methods.contains(&SupportedMethod::Permit2Witness),
        supported_methods,
        name: Some(preset.name.to_string()),
        version: preset.version.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_hit() {
        match lookup(&Network::Bsc, "0x8B95c6F1C7E4b10e3De7E33f6e9E5D8D3D3Dd3E1") {
            PresetLookup::Supported(caps) => {
                assert!(caps.has_permit);
                assert!(!caps.has_eip3009);
                assert_eq!(caps.name.as_deref(), Some("WLFI"));
            }
            other => panic!("expected Supported, got {other:?}"),
        }
    }

    #[test]
    fn test_preset_miss_wrong_network_yields_unsupported_not_none() {
        assert_eq!(
            lookup(&Network::Base, "0x8b95c6f1c7e4b10e3de7e33f6e9e5d8d3d3dd3e1"),
            PresetLookup::UnsupportedNetwork
        );
    }

    #[test]
    fn test_preset_miss_unknown_address() {
        assert_eq!(
            lookup(&Network::Bsc, "0x0000000000000000000000000000000000dead"),
            PresetLookup::NotPreset
        );
    }
}
