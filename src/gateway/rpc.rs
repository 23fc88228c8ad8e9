use alloy::network::TransactionBuilder;
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::json_rpc::ErrorPayload;
use alloy::rpc::types::{TransactionReceipt, TransactionRequest as RpcTransactionRequest};
use alloy::transports::http::{Client, Http};
use alloy::transports::{RpcError, TransportError};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use tracing::debug;

use super::abi::{self, IERC20};
use super::{GatewayError, LedgerGateway};
use crate::models::{TransactionRequest, TxReceipt};
use crate::utils::{remove_trailing_slash, retry};

const READ_RETRIES: u32 = 3;
const READ_BASE_DELAY_MS: u64 = 500;

type HttpProvider = RootProvider<Http<Client>>;

/// Ledger gateway over an alloy HTTP provider.
///
/// The provider carries no wallet, so transactions go out through
/// `eth_sendTransaction` and the node (or the external signer behind it)
/// holds the key for `from`.
pub struct JsonRpcGateway {
    api_url: String,
    provider: HttpProvider,
}

impl JsonRpcGateway {
    pub fn new(api_url: &str) -> anyhow::Result<Self> {
        let api_url = remove_trailing_slash(api_url);
        let provider = ProviderBuilder::new().on_http(api_url.parse()?);
        Ok(Self { api_url, provider })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn call_erc20<C: SolCall>(&self, token: Address, call: C) -> Result<C::Return, GatewayError> {
        let out = self.call(token, abi::encode(call)).await?;
        C::abi_decode_returns(&out, true).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

fn is_transport(err: &GatewayError) -> bool {
    matches!(err, GatewayError::Transport(_))
}

/// Classify a provider failure. Code 3 (or a message mentioning a revert) is
/// a contract revert; its `Error(string)` reason is decoded when present.
fn gateway_error(err: TransportError) -> GatewayError {
    match err {
        RpcError::ErrorResp(payload) => {
            let message = payload.message.to_string();
            if payload.code == 3 || message.contains("revert") {
                let reason = revert_data(&payload)
                    .as_deref()
                    .and_then(|data| abi::revert_reason(data))
                    .unwrap_or(message);
                GatewayError::Reverted(reason)
            } else {
                GatewayError::Rpc {
                    code: payload.code,
                    message,
                }
            }
        }
        RpcError::Transport(kind) => GatewayError::Transport(kind.to_string()),
        other => GatewayError::InvalidResponse(other.to_string()),
    }
}

fn revert_data(payload: &ErrorPayload) -> Option<Bytes> {
    payload
        .data
        .as_ref()
        .and_then(|raw| serde_json::from_str(raw.get()).ok())
}

fn rpc_request(tx: &TransactionRequest) -> RpcTransactionRequest {
    let mut request = RpcTransactionRequest::default()
        .with_from(tx.from)
        .with_to(tx.to)
        .with_input(tx.data.clone())
        .with_value(tx.value)
        .with_nonce(tx.nonce)
        .with_chain_id(tx.chain_id);
    if let Some(gas) = tx.gas {
        request = request.with_gas_limit(gas.into());
    }
    if let Some(gas_price) = tx.gas_price {
        request = request.with_gas_price(gas_price.saturating_to());
    }
    request
}

fn receipt(receipt: TransactionReceipt) -> Result<TxReceipt, GatewayError> {
    let raw = serde_json::to_value(&receipt).map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
    Ok(TxReceipt {
        transaction_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        success: receipt.status(),
        gas_used: u64::try_from(receipt.gas_used).ok(),
        raw,
    })
}

#[async_trait]
impl LedgerGateway for JsonRpcGateway {
    async fn get_balance(&self, owner: Address, token: Option<Address>) -> Result<U256, GatewayError> {
        match token {
            None => {
                let provider = &self.provider;
                retry(READ_RETRIES, READ_BASE_DELAY_MS, is_transport, move || async move {
                    provider.get_balance(owner).await.map_err(gateway_error)
                })
                .await
            }
            Some(token) => Ok(self.call_erc20(token, IERC20::balanceOfCall { owner }).await?._0),
        }
    }

    async fn get_symbol(&self, token: Address) -> Result<String, GatewayError> {
        let out = self.call(token, abi::encode(IERC20::symbolCall {})).await?;
        abi::decode_symbol(&out).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }

    async fn get_decimals(&self, token: Address) -> Result<u8, GatewayError> {
        Ok(self.call_erc20(token, IERC20::decimalsCall {}).await?._0)
    }

    async fn get_transaction_count(&self, owner: Address) -> Result<u64, GatewayError> {
        let provider = &self.provider;
        retry(READ_RETRIES, READ_BASE_DELAY_MS, is_transport, move || async move {
            provider
                .get_transaction_count(owner)
                .pending()
                .await
                .map_err(gateway_error)
        })
        .await
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, GatewayError> {
        let provider = &self.provider;
        let request = RpcTransactionRequest::default().with_to(to).with_input(data);
        let request = &request;
        retry(READ_RETRIES, READ_BASE_DELAY_MS, is_transport, move || async move {
            provider.call(request).await.map_err(gateway_error)
        })
        .await
    }

    async fn sign_and_broadcast(&self, tx: &TransactionRequest) -> Result<B256, GatewayError> {
        debug!(to = %tx.to, nonce = tx.nonce, "eth_sendTransaction");
        let pending = self
            .provider
            .send_transaction(rpc_request(tx))
            .await
            .map_err(gateway_error)?;
        Ok(*pending.tx_hash())
    }

    async fn get_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, GatewayError> {
        let provider = &self.provider;
        let found = retry(READ_RETRIES, READ_BASE_DELAY_MS, is_transport, move || async move {
            provider.get_transaction_receipt(tx_hash).await.map_err(gateway_error)
        })
        .await?;
        found.map(receipt).transpose()
    }
}
