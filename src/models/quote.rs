use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::error::SwapError;
use crate::models::TokenInfo;

/// Default concentrated-liquidity fee tier: 3000 = 0.30%.
pub const DEFAULT_FEE_TIER: u32 = 3000;

/// Default slippage tolerance for pool trades, in basis points.
pub const DEFAULT_SLIPPAGE_BPS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    PoolV2,
    PoolV3,
    Aggregator,
}

impl BackendKind {
    /// Pool version number used in deployment tables, `None` for the aggregator.
    pub fn pool_version(&self) -> Option<u8> {
        match self {
            BackendKind::PoolV2 => Some(2),
            BackendKind::PoolV3 => Some(3),
            BackendKind::Aggregator => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::PoolV2 => "pool-v2",
            BackendKind::PoolV3 => "pool-v3",
            BackendKind::Aggregator => "aggregator",
        };
        f.write_str(name)
    }
}

impl FromStr for BackendKind {
    type Err = SwapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "2" | "v2" | "pool-v2" | "pool_v2" => Ok(BackendKind::PoolV2),
            "3" | "v3" | "pool-v3" | "pool_v3" => Ok(BackendKind::PoolV3),
            "0x" | "aggregator" => Ok(BackendKind::Aggregator),
            other => Err(SwapError::config(format!("unknown backend: {}", other))),
        }
    }
}

/// Which backend to quote against and how to trade through it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendOptions {
    pub backend: BackendKind,
    /// DEX deployment name for pool backends (`uniswap`, `sushiswap`, ...).
    pub dex: String,
    /// v3 only; `DEFAULT_FEE_TIER` when unset.
    pub fee_tier: Option<u32>,
    pub slippage_bps: u32,
    /// v2 only: use the `SupportingFeeOnTransferTokens` router functions.
    pub fee_on_transfer: bool,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            backend: BackendKind::PoolV2,
            dex: "uniswap".to_string(),
            fee_tier: None,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            fee_on_transfer: false,
        }
    }
}

impl BackendOptions {
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    pub fn with_dex(mut self, dex: &str) -> Self {
        self.dex = dex.to_string();
        self
    }

    pub fn with_fee_tier(mut self, fee_tier: u32) -> Self {
        self.fee_tier = Some(fee_tier);
        self
    }

    pub fn effective_fee_tier(&self) -> u32 {
        self.fee_tier.unwrap_or(DEFAULT_FEE_TIER)
    }
}

/// Ready-to-send swap returned by an aggregator alongside its price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorTrade {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_price: Option<U256>,
    pub gas: Option<u64>,
    /// Contract that must be approved to spend the sell token.
    pub allowance_target: Option<Address>,
}

/// A fresh price. Never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub amount_in_raw: U256,
    pub amount_out_raw: U256,
    pub amount_out_human: f64,
    pub backend_used: BackendKind,
    /// v3 pools only: the tier that was priced.
    pub fee_tier: Option<u32>,
    /// Aggregator only.
    pub trade: Option<AggregatorTrade>,
}

impl Quote {
    /// Minimum acceptable output after applying `slippage_bps`.
    pub fn min_amount_out(&self, slippage_bps: u32) -> U256 {
        let keep = U256::from(10_000u32.saturating_sub(slippage_bps.min(10_000)));
        self.amount_out_raw * keep / U256::from(10_000u32)
    }
}

/// A fully resolved request to trade `raw_qty` of `sell` for `buy`.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapIntent {
    pub sell: TokenInfo,
    pub buy: TokenInfo,
    pub raw_qty: U256,
    /// Account paying for the trade.
    pub sender: Address,
    /// Account receiving the bought tokens.
    pub recipient: Address,
    pub no_prompt: bool,
    pub options: BackendOptions,
}
