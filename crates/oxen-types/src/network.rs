//! Network selection.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Which chain this daemon is participating in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkType {
    Mainnet,
    Testnet,
    Devnet,
    /// Local integration-test chain. No governance accruals are recorded and
    /// all timing constants are shortened.
    Fakechain,
}

impl NetworkType {
    /// Address prefix byte embedded in every rendered account address.
    pub fn address_prefix(&self) -> u8 {
        match self {
            NetworkType::Mainnet => 114,
            NetworkType::Testnet => 156,
            NetworkType::Devnet => 24,
            NetworkType::Fakechain => 118,
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NetworkType::Mainnet => "mainnet",
            NetworkType::Testnet => "testnet",
            NetworkType::Devnet => "devnet",
            NetworkType::Fakechain => "fakechain",
        };
        write!(f, "{s}")
    }
}

impl FromStr for NetworkType {
    type Err = crate::TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(NetworkType::Mainnet),
            "testnet" => Ok(NetworkType::Testnet),
            "devnet" => Ok(NetworkType::Devnet),
            "fakechain" => Ok(NetworkType::Fakechain),
            other => Err(crate::TypeError::UnknownNetwork(other.to_string())),
        }
    }
}
