use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::{SwapError, SwapResult};

/// Caller's quantity input. At most one of the two fields may be non-zero;
/// both zero means "sell the whole balance".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantitySpec {
    pub human: f64,
    pub raw: U256,
}

/// The authoritative quantity after precedence has been applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quantity {
    Raw(U256),
    Human(f64),
    FullBalance,
}

impl QuantitySpec {
    pub fn human(amount: f64) -> Self {
        Self {
            human: amount,
            raw: U256::ZERO,
        }
    }

    pub fn raw(amount: U256) -> Self {
        Self {
            human: 0.0,
            raw: amount,
        }
    }

    pub fn full_balance() -> Self {
        Self::default()
    }

    /// Apply raw > human > full-balance precedence. Ambiguous or nonsensical
    /// input is rejected before anything touches the network.
    pub fn select(&self) -> SwapResult<Quantity> {
        if !self.human.is_finite() || self.human < 0.0 {
            return Err(SwapError::config(format!(
                "quantity must be a non-negative number, got {}",
                self.human
            )));
        }
        match (self.raw > U256::ZERO, self.human > 0.0) {
            (true, true) => Err(SwapError::config(
                "specify either a floating point quantity or a raw integer quantity, not both",
            )),
            (true, false) => Ok(Quantity::Raw(self.raw)),
            (false, true) => Ok(Quantity::Human(self.human)),
            (false, false) => Ok(Quantity::FullBalance),
        }
    }
}

fn scale(decimals: u8) -> f64 {
    10_f64.powi(decimals as i32)
}

/// `raw / 10^decimals`.
pub fn to_human(raw: U256, decimals: u8) -> f64 {
    let raw: f64 = raw.to_string().parse().unwrap_or(f64::INFINITY);
    raw / scale(decimals)
}

/// `human * 10^decimals`, truncated toward zero to whole base units.
pub fn to_raw(human: f64, decimals: u8) -> SwapResult<U256> {
    let scaled = human * scale(decimals);
    if !scaled.is_finite() || scaled < 0.0 {
        return Err(SwapError::config(format!(
            "cannot convert {} to base units with {} decimals",
            human, decimals
        )));
    }
    U256::from_str_radix(&format!("{:.0}", scaled.trunc()), 10)
        .map_err(|e| SwapError::config(format!("quantity {} out of range: {}", human, e)))
}
