use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// An unsigned transaction handed to the ledger gateway for signing and broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub nonce: u64,
    pub chain_id: u64,
    /// Left to the gateway's estimate when unset.
    pub gas: Option<u64>,
    pub gas_price: Option<U256>,
}

/// The parts of a mined transaction receipt this crate looks at, plus the raw payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    /// `false` when the transaction was mined but reverted.
    pub success: bool,
    pub gas_used: Option<u64>,
    pub raw: serde_json::Value,
}

/// Terminal result of waiting for a receipt.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiptOutcome {
    Confirmed { receipt: TxReceipt, elapsed: Duration },
    /// Retry budget or deadline exhausted. The transaction may still confirm later.
    TimedOut { elapsed: Duration },
    /// Caller abandoned the wait. The broadcast itself is unaffected.
    Canceled { elapsed: Duration },
}

impl ReceiptOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ReceiptOutcome::Confirmed { .. })
    }

    pub fn receipt(&self) -> Option<&TxReceipt> {
        match self {
            ReceiptOutcome::Confirmed { receipt, .. } => Some(receipt),
            _ => None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            ReceiptOutcome::Confirmed { elapsed, .. }
            | ReceiptOutcome::TimedOut { elapsed }
            | ReceiptOutcome::Canceled { elapsed } => *elapsed,
        }
    }
}
