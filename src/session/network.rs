//! Network id → human label table.

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

pub const UNKNOWN_NETWORK: &str = "Unknown network";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter)]
pub enum Network {
    Mainnet,
    Goerli,
    Polygon,
    Arbitrum,
    #[strum(serialize = "zkEVM")]
    ZkEvm,
    Avalanche,
}

impl Network {
    pub fn id(self) -> u64 {
        match self {
            Network::Mainnet => 1,
            Network::Goerli => 5,
            Network::Polygon => 137,
            Network::Arbitrum => 42161,
            Network::ZkEvm => 1101,
            Network::Avalanche => 43114,
        }
    }

    pub fn from_id(id: u64) -> Option<Self> {
        Network::iter().find(|n| n.id() == id)
    }

    /// Accepts what `net_version` returns (decimal) and what `chainChanged`
    /// carries (`0x`-prefixed hex).
    pub fn from_reported(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let id = match raw.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16).ok()?,
            None => raw.parse().ok()?,
        };
        Self::from_id(id)
    }
}

/// Total mapping: anything outside the table is [`UNKNOWN_NETWORK`].
pub fn network_label(raw: &str) -> String {
    Network::from_reported(raw)
        .map(|n| n.to_string())
        .unwrap_or_else(|| UNKNOWN_NETWORK.to_string())
}
