//! Network identifiers and the chain-id lookup table.
//!
//! The closed set of networks this core knows about, plus the
//! `chainId -> Network` mapping used by the Requirements Builder when a
//! caller doesn't pin a `network` explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A supported blockchain network identifier.
///
/// Serializes to and from the exact wire strings used in
/// `PaymentRequirements.network` and `PaymentPayload.network`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Network {
    /// Base mainnet.
    Base,
    /// Base Sepolia testnet.
    BaseSepolia,
    /// Avalanche C-Chain mainnet.
    Avalanche,
    /// Avalanche Fuji testnet.
    AvalancheFuji,
    /// IoTeX mainnet.
    Iotex,
    /// Sei mainnet.
    Sei,
    /// Sei testnet.
    SeiTestnet,
    /// Polygon PoS mainnet.
    Polygon,
    /// Polygon Amoy testnet.
    PolygonAmoy,
    /// peaq mainnet.
    Peaq,
    /// BNB Smart Chain mainnet.
    Bsc,
    /// BNB Smart Chain testnet.
    BscTestnet,
    /// Solana mainnet.
    Solana,
    /// Solana devnet.
    SolanaDevnet,
    /// A chain id outside the known set; wire form is `chain-<id>`.
    Unknown(u64),
}

impl Network {
    /// Maps an EVM `chainId` to its `Network`, falling back to
    /// `Network::Unknown(chain_id)` for anything not in the known set.
    pub fn from_chain_id(chain_id: u64) -> Self {
        match chain_id {
            8453 => Network::Base,
            84531 => Network::BaseSepolia,
            43114 => Network::Avalanche,
            43113 => Network::AvalancheFuji,
            4689 => Network::Iotex,
            1329 => Network::Sei,
            1328 => Network::SeiTestnet,
            137 => Network::Polygon,
            80001 => Network::PolygonAmoy,
            3338 => Network::Peaq,
            56 => Network::Bsc,
            97 => Network::BscTestnet,
            other => Network::Unknown(other),
        }
    }

    /// The wire string for this network (`"bsc"`, `"chain-999"`, ...).
    pub fn as_wire_str(&self) -> String {
        match self {
            Network::Base => "base".to_string(),
            Network::BaseSepolia => "base-sepolia".to_string(),
            Network::Avalanche => "avalanche".to_string(),
            Network::AvalancheFuji => "avalanche-fuji".to_string(),
            Network::Iotex => "iotex".to_string(),
            Network::Sei => "sei".to_string(),
            Network::SeiTestnet => "sei-testnet".to_string(),
            Network::Polygon => "polygon".to_string(),
            Network::PolygonAmoy => "polygon-amoy".to_string(),
            Network::Peaq => "peaq".to_string(),
            Network::Bsc => "bsc".to_string(),
            Network::BscTestnet => "bsc-testnet".to_string(),
            Network::Solana => "solana".to_string(),
            Network::SolanaDevnet => "solana-devnet".to_string(),
            Network::Unknown(id) => format!("chain-{id}"),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

impl From<Network> for String {
    fn from(network: Network) -> Self {
        network.as_wire_str()
    }
}

impl TryFrom<String> for Network {
    type Error = std::convert::Infallible;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(match value.as_str() {
            "base" => Network::Base,
            "base-sepolia" => Network::BaseSepolia,
            "avalanche" => Network::Avalanche,
            "avalanche-fuji" => Network::AvalancheFuji,
            "iotex" => Network::Iotex,
            "sei" => Network::Sei,
            "sei-testnet" => Network::SeiTestnet,
            "polygon" => Network::Polygon,
            "polygon-amoy" => Network::PolygonAmoy,
            "peaq" => Network::Peaq,
            "bsc" => Network::Bsc,
            "bsc-testnet" => Network::BscTestnet,
            "solana" => Network::Solana,
            "solana-devnet" => Network::SolanaDevnet,
            other => other
                .strip_prefix("chain-")
                .and_then(|id| id.parse::<u64>().ok())
                .map(Network::Unknown)
                .unwrap_or(Network::Unknown(0)),
        })
    }
}
