use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use thiserror::Error;

use crate::models::{TransactionRequest, TxReceipt};

pub mod abi;
pub mod rpc;

pub use rpc::JsonRpcGateway;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Blockchain read/write access consumed by the swap core.
///
/// Implementations own the chain client and the signing credential; the core
/// never signs anything itself.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Native balance when `token` is `None`, else the token's `balanceOf(owner)`.
    async fn get_balance(&self, owner: Address, token: Option<Address>) -> Result<U256, GatewayError>;

    async fn get_symbol(&self, token: Address) -> Result<String, GatewayError>;

    async fn get_decimals(&self, token: Address) -> Result<u8, GatewayError>;

    async fn get_transaction_count(&self, owner: Address) -> Result<u64, GatewayError>;

    /// Read-only contract call (`eth_call`). A revert is `GatewayError::Reverted`.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, GatewayError>;

    /// Sign and submit exactly once. Callers must not retry on error.
    async fn sign_and_broadcast(&self, tx: &TransactionRequest) -> Result<B256, GatewayError>;

    /// `Ok(None)` while the transaction is still pending.
    async fn get_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, GatewayError>;
}
