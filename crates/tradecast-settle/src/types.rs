//! Ledger-facing types.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A play session's on-ledger identifier: 256 random bits minted by the
/// gateway, `0x…` hex on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaySessionId(pub U256);

impl fmt::Display for PlaySessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FromStr for PlaySessionId {
    type Err = <U256 as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_str(s).map(Self)
    }
}

impl Serialize for PlaySessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PlaySessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// What the contract records per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaySession {
    pub owner: Address,
    pub ended: bool,
}

/// A submitted transaction's hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxRef(pub B256);

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// =========================================================================
// Tests
// =========================================================================
