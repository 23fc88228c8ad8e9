use alloy_primitives::{B256, U256};
use thiserror::Error;

use crate::gateway::GatewayError;

pub type SwapResult<T> = Result<T, SwapError>;

/// Failure of a resolve, quote, approve or swap operation.
///
/// A declined confirmation and a receipt that never showed up are not errors;
/// see `SwapOutcome::Canceled` and `ReceiptOutcome::TimedOut`.
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("invalid address: {input}")]
    InvalidAddress { input: String },

    #[error("unknown token `{alias}`: not an address and not a known alias on {network}")]
    UnknownToken { alias: String, network: String },

    #[error("contract call {call} on {address} failed: {source}")]
    ContractCallFailed {
        address: String,
        call: &'static str,
        #[source]
        source: GatewayError,
    },

    #[error("quote reverted on {backend}: {reason}")]
    QuoteReverted { backend: String, reason: String },

    #[error("{backend} unavailable (status {status:?}): {body}")]
    BackendUnavailable {
        backend: String,
        status: Option<u16>,
        body: String,
    },

    #[error("{backend} rejected the quote, is {token} approved for spending? response: {body}")]
    TokenNotApproved {
        backend: String,
        token: String,
        body: String,
    },

    #[error("insufficient {symbol} balance: need {needed}, have {available}")]
    InsufficientBalance {
        symbol: String,
        needed: U256,
        available: U256,
    },

    #[error("broadcast failed: {0}")]
    BroadcastFailed(#[source] GatewayError),

    #[error("transaction {tx_hash} was broadcast but polling failed: {source}")]
    PollFailed {
        tx_hash: B256,
        #[source]
        source: GatewayError,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("token directory error: {0}")]
    Directory(#[from] anyhow::Error),

    #[error("ledger gateway error: {0}")]
    Gateway(#[source] GatewayError),
}

impl SwapError {
    pub fn config(msg: impl Into<String>) -> Self {
        SwapError::Configuration(msg.into())
    }

    /// The transaction id, if one exists. Set only once a trade has left this process.
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            SwapError::PollFailed { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }
}
