//! Scripted ledger gateway and fixtures shared by the unit tests.
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{address, Address, Bytes, B256, U256};
use alloy_sol_types::SolValue;
use async_trait::async_trait;
use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::config::NativeAsset;
use crate::gateway::{GatewayError, LedgerGateway};
use crate::models::{TransactionRequest, TxReceipt};

pub const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
pub const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
pub const SENDER: Address = address!("1111111111111111111111111111111111111111");

pub fn native_weth() -> NativeAsset {
    NativeAsset {
        symbol: "WETH".to_string(),
        marker: WETH.parse().unwrap(),
        aggregator_token: "ETH".to_string(),
    }
}

pub fn tx_hash(n: u8) -> B256 {
    B256::repeat_byte(n)
}

pub fn receipt(hash: B256) -> TxReceipt {
    TxReceipt {
        transaction_hash: hash,
        block_number: Some(19_000_000),
        success: true,
        gas_used: Some(120_000),
        raw: serde_json::json!({ "status": "0x1" }),
    }
}

/// Encoded `uint256[]` return value of a v2 router's `getAmountsOut`.
pub fn amounts_out(amounts: &[u128]) -> Bytes {
    let amounts: Vec<U256> = amounts.iter().map(|a| U256::from(*a)).collect();
    Bytes::from(amounts.abi_encode())
}

pub fn v2_router() -> Address {
    address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D")
}

/// Query parameters and `0x-api-key` header of each request a fixture API saw.
pub type SeenRequests = Arc<Mutex<Vec<(HashMap<String, String>, Option<String>)>>>;

/// Local 0x-style `/swap/v1/quote` endpoint answering every request with
/// `status` and `body`. Returns its base URL.
pub async fn serve_zero_ex(status: u16, body: serde_json::Value) -> (String, SeenRequests) {
    let seen = SeenRequests::default();
    let recorder = Arc::clone(&seen);
    let handler = move |headers: HeaderMap, Query(query): Query<HashMap<String, String>>| {
        let recorder = Arc::clone(&recorder);
        let body = body.clone();
        async move {
            let api_key = headers
                .get("0x-api-key")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            recorder.lock().unwrap().push((query, api_key));
            (StatusCode::from_u16(status).unwrap(), Json(body))
        }
    };
    let app = axum::Router::new().route("/swap/v1/quote", axum::routing::get(handler));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), seen)
}

#[derive(Default)]
struct State {
    tokens: HashMap<Address, Result<(String, u8), GatewayError>>,
    balances: HashMap<Option<Address>, U256>,
    call_responses: HashMap<Address, Result<Bytes, GatewayError>>,
    receipts: VecDeque<Result<Option<TxReceipt>, GatewayError>>,
    broadcast_result: Option<Result<B256, GatewayError>>,
    calls: Vec<(Address, Bytes)>,
    broadcasts: Vec<TransactionRequest>,
    receipt_delay: Option<Duration>,
    receipt_queries: usize,
    balance_queries: usize,
    total_calls: usize,
}

/// In-memory `LedgerGateway` that answers from a script and records every request.
#[derive(Default)]
pub struct MockGateway {
    state: Mutex<State>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, token: &str, symbol: &str, decimals: u8) -> Self {
        self.state
            .lock()
            .unwrap()
            .tokens
            .insert(token.parse().unwrap(), Ok((symbol.to_string(), decimals)));
        self
    }

    pub fn with_failing_token(self, token: &str, error: GatewayError) -> Self {
        self.state.lock().unwrap().tokens.insert(token.parse().unwrap(), Err(error));
        self
    }

    /// `None` is the native balance.
    pub fn with_balance(self, token: Option<&str>, balance: U256) -> Self {
        let key = token.map(|t| t.parse().unwrap());
        self.state.lock().unwrap().balances.insert(key, balance);
        self
    }

    pub fn with_call_response(self, to: Address, response: Result<Bytes, GatewayError>) -> Self {
        self.state.lock().unwrap().call_responses.insert(to, response);
        self
    }

    pub fn with_broadcast_result(self, result: Result<B256, GatewayError>) -> Self {
        self.state.lock().unwrap().broadcast_result = Some(result);
        self
    }

    /// Receipt lookups answer from this queue in order, then keep reporting pending.
    pub fn with_receipts(self, receipts: Vec<Result<Option<TxReceipt>, GatewayError>>) -> Self {
        self.state.lock().unwrap().receipts = receipts.into();
        self
    }

    /// Every receipt lookup hangs this long before answering.
    pub fn with_receipt_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().receipt_delay = Some(delay);
        self
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().total_calls
    }

    pub fn calls(&self) -> Vec<(Address, Bytes)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn broadcasts(&self) -> Vec<TransactionRequest> {
        self.state.lock().unwrap().broadcasts.clone()
    }

    pub fn receipt_queries(&self) -> usize {
        self.state.lock().unwrap().receipt_queries
    }

    pub fn balance_queries(&self) -> usize {
        self.state.lock().unwrap().balance_queries
    }

    fn token(&self, token: Address) -> Result<(String, u8), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.total_calls += 1;
        state
            .tokens
            .get(&token)
            .cloned()
            .unwrap_or_else(|| Err(GatewayError::Reverted(format!("no token at {}", token))))
    }
}

#[async_trait]
impl LedgerGateway for MockGateway {
    async fn get_balance(&self, _owner: Address, token: Option<Address>) -> Result<U256, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.total_calls += 1;
        state.balance_queries += 1;
        Ok(state.balances.get(&token).copied().unwrap_or(U256::ZERO))
    }

    // Token lookups yield once so concurrent resolutions interleave like real RPC calls.
    async fn get_symbol(&self, token: Address) -> Result<String, GatewayError> {
        tokio::task::yield_now().await;
        self.token(token).map(|(symbol, _)| symbol)
    }

    async fn get_decimals(&self, token: Address) -> Result<u8, GatewayError> {
        tokio::task::yield_now().await;
        self.token(token).map(|(_, decimals)| decimals)
    }

    async fn get_transaction_count(&self, _owner: Address) -> Result<u64, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.total_calls += 1;
        Ok(state.broadcasts.len() as u64)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.total_calls += 1;
        state.calls.push((to, data));
        state
            .call_responses
            .get(&to)
            .cloned()
            .unwrap_or_else(|| Err(GatewayError::Reverted(format!("no contract at {}", to))))
    }

    async fn sign_and_broadcast(&self, tx: &TransactionRequest) -> Result<B256, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.total_calls += 1;
        state.broadcasts.push(tx.clone());
        state.broadcast_result.clone().unwrap_or(Ok(tx_hash(0xab)))
    }

    async fn get_receipt(&self, _tx_hash: B256) -> Result<Option<TxReceipt>, GatewayError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.total_calls += 1;
            state.receipt_queries += 1;
            state.receipt_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state.lock().unwrap().receipts.pop_front().unwrap_or(Ok(None))
    }
}
