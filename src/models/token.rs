use std::fmt;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::{SwapError, SwapResult};

/// A token as the user wrote it. Decided once at the boundary and never re-inferred.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenRef {
    /// Symbol alias looked up in the token directory, stored upper-cased.
    Alias(String),
    /// Raw contract address, not yet validated.
    Address(String),
}

impl TokenRef {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.starts_with("0x") || input.starts_with("0X") {
            TokenRef::Address(input.to_string())
        } else {
            TokenRef::Alias(input.to_uppercase())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TokenRef::Alias(s) | TokenRef::Address(s) => s,
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, TokenRef::Alias(_))
    }
}

impl From<&str> for TokenRef {
    fn from(input: &str) -> Self {
        TokenRef::parse(input)
    }
}

impl fmt::Display for TokenRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved token identity and metadata. Immutable for the rest of an operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenInfo {
    pub canonical_id: Address,
    pub symbol: String,
    pub decimals: u8,
    pub is_native: bool,
}

impl TokenInfo {
    pub fn new(canonical_id: Address, symbol: &str, decimals: u8) -> Self {
        Self {
            canonical_id,
            symbol: symbol.to_string(),
            decimals,
            is_native: false,
        }
    }

    pub fn native(canonical_id: Address, symbol: &str) -> Self {
        Self {
            canonical_id,
            symbol: symbol.to_string(),
            decimals: crate::models::NATIVE_DECIMALS,
            is_native: true,
        }
    }

    pub fn checksum(&self) -> String {
        self.canonical_id.to_checksum(None)
    }
}

impl fmt::Display for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {} ({} decimals)", self.symbol, self.checksum(), self.decimals)
    }
}

/// Parse a hex address. All-lowercase and all-uppercase input is accepted as is;
/// mixed case must carry a valid EIP-55 checksum.
pub fn parse_address(input: &str) -> SwapResult<Address> {
    let invalid = || SwapError::InvalidAddress {
        input: input.to_string(),
    };
    let hex_part = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .ok_or_else(invalid)?;
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        let normalized = format!("0x{}", hex_part);
        Address::parse_checksummed(&normalized, None).map_err(|_| invalid())
    } else {
        hex_part.parse::<Address>().map_err(|_| invalid())
    }
}
