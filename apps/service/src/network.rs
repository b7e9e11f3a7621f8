use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// RPC dialect spoken by a node. Selects the height probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Evm,
    Solana,
    Aptos,
    Starknet,
}

/// Chain a node belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    Ethereum,
    ArbitrumOne,
    Optimism,
    Base,
    Polygon,
    Bsc,
    Avalanche,
    Linea,
    Zksync,
    Scroll,
    Solana,
    Aptos,
    Starknet,
}

impl Network {
    pub const ALL: [Network; 13] = [
        Network::Ethereum,
        Network::ArbitrumOne,
        Network::Optimism,
        Network::Base,
        Network::Polygon,
        Network::Bsc,
        Network::Avalanche,
        Network::Linea,
        Network::Zksync,
        Network::Scroll,
        Network::Solana,
        Network::Aptos,
        Network::Starknet,
    ];

    pub fn network_type(self) -> NetworkType {
        match self {
            Network::Solana => NetworkType::Solana,
            Network::Aptos => NetworkType::Aptos,
            Network::Starknet => NetworkType::Starknet,
            _ => NetworkType::Evm,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Ethereum => "ethereum",
            Network::ArbitrumOne => "arbitrum-one",
            Network::Optimism => "optimism",
            Network::Base => "base",
            Network::Polygon => "polygon",
            Network::Bsc => "bsc",
            Network::Avalanche => "avalanche",
            Network::Linea => "linea",
            Network::Zksync => "zksync",
            Network::Scroll => "scroll",
            Network::Solana => "solana",
            Network::Aptos => "aptos",
            Network::Starknet => "starknet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::ALL
            .into_iter()
            .find(|network| network.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown network: {}", s))
    }
}
