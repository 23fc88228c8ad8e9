use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{Config, NetworkConfig, RouterTable};
use crate::error::{SwapError, SwapResult};
use crate::gateway::{GatewayError, LedgerGateway};
use crate::models::{to_human, AggregatorTrade, BackendKind, BackendOptions, Quote, SwapIntent, TokenInfo};

pub mod aggregator;
pub mod pool_v2;
pub mod pool_v3;

pub use aggregator::{AggregatorBackend, ZeroExApi};
pub use pool_v2::PoolV2;
pub use pool_v3::PoolV3;

/// Raw price from a backend, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub amount_out_raw: U256,
    pub trade: Option<AggregatorTrade>,
}

impl PriceQuote {
    pub fn amount(amount_out_raw: U256) -> Self {
        Self {
            amount_out_raw,
            trade: None,
        }
    }
}

/// Call that executes a trade, minus nonce and chain id.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas: Option<u64>,
    pub gas_price: Option<U256>,
}

#[async_trait]
pub trait QuoteBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Human-readable name used in errors and logs, e.g. `uniswap-v3`.
    fn identifier(&self) -> String;

    /// Contract that must be allowed to spend the sell token.
    fn spender(&self) -> Address;

    /// Expected output for selling exactly `raw_qty` of `sell`.
    async fn price_for_exact_input(
        &self,
        sell: &TokenInfo,
        buy: &TokenInfo,
        raw_qty: U256,
        fee_tier: Option<u32>,
    ) -> SwapResult<PriceQuote>;

    /// Router or aggregator calldata for `intent` at `quote`.
    async fn build_trade(&self, intent: &SwapIntent, quote: &Quote) -> SwapResult<TradeCall>;
}

/// Map a gateway failure during on-chain pricing. Reverts are reported with
/// their reason and never retried.
pub(crate) fn pricing_error(backend: String, err: GatewayError) -> SwapError {
    match err {
        GatewayError::Reverted(reason) => SwapError::QuoteReverted { backend, reason },
        other => SwapError::BackendUnavailable {
            backend,
            status: None,
            body: other.to_string(),
        },
    }
}

pub(crate) fn ensure_distinct(sell: &TokenInfo, buy: &TokenInfo) -> SwapResult<()> {
    if sell.canonical_id == buy.canonical_id {
        return Err(SwapError::config(format!(
            "sell and buy token are the same: {}",
            sell.checksum()
        )));
    }
    Ok(())
}

/// Seconds since the epoch plus `ttl_secs`, used as a router deadline.
pub(crate) fn deadline(ttl_secs: u64) -> U256 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    U256::from(now + ttl_secs)
}

/// Builds the backend for a request and normalizes its answer.
pub struct QuoteEngine {
    gateway: Arc<dyn LedgerGateway>,
    network: String,
    network_config: NetworkConfig,
    routers: RouterTable,
    http: reqwest::Client,
}

impl QuoteEngine {
    pub fn new(gateway: Arc<dyn LedgerGateway>, config: &Config, network: &str) -> SwapResult<Self> {
        let network_config = config.network(network)?.clone();
        Ok(Self {
            gateway,
            network: network.to_string(),
            network_config,
            routers: RouterTable::from_config(config),
            http: reqwest::Client::new(),
        })
    }

    /// Instantiate the backend `opts` asks for. `taker` is only used by the
    /// aggregator, which returns executable calldata when it is set.
    pub fn backend(&self, opts: &BackendOptions, taker: Option<Address>) -> SwapResult<Box<dyn QuoteBackend>> {
        match opts.backend {
            BackendKind::PoolV2 => {
                let deployment = self.routers.lookup(&opts.dex, 2, &self.network)?;
                Ok(Box::new(PoolV2::new(
                    Arc::clone(&self.gateway),
                    &opts.dex,
                    deployment.clone(),
                )))
            }
            BackendKind::PoolV3 => {
                let deployment = self.routers.lookup(&opts.dex, 3, &self.network)?;
                Ok(Box::new(PoolV3::new(
                    Arc::clone(&self.gateway),
                    &opts.dex,
                    deployment.clone(),
                )?))
            }
            BackendKind::Aggregator => {
                let aggregator = self.network_config.aggregator(&self.network)?;
                let api = ZeroExApi::with_client(
                    &aggregator.endpoint,
                    aggregator.api_key.clone(),
                    self.http.clone(),
                );
                Ok(Box::new(AggregatorBackend::new(
                    api,
                    aggregator.exchange_proxy,
                    self.network_config.native.aggregator_token.clone(),
                    taker,
                )))
            }
        }
    }

    /// Price `raw_qty` of `sell` in `buy`. Never touches the token directory.
    pub async fn quote(
        &self,
        sell: &TokenInfo,
        buy: &TokenInfo,
        raw_qty: U256,
        opts: &BackendOptions,
        taker: Option<Address>,
    ) -> SwapResult<Quote> {
        let backend = self.backend(opts, taker)?;
        self.quote_with(backend.as_ref(), sell, buy, raw_qty, opts.fee_tier).await
    }

    pub async fn quote_with(
        &self,
        backend: &dyn QuoteBackend,
        sell: &TokenInfo,
        buy: &TokenInfo,
        raw_qty: U256,
        fee_tier: Option<u32>,
    ) -> SwapResult<Quote> {
        debug!(
            backend = %backend.identifier(),
            sell = %sell,
            buy = %buy,
            raw_qty = %raw_qty,
            "requesting quote"
        );
        let price = backend.price_for_exact_input(sell, buy, raw_qty, fee_tier).await?;
        let quote = Quote {
            amount_in_raw: raw_qty,
            amount_out_raw: price.amount_out_raw,
            amount_out_human: to_human(price.amount_out_raw, buy.decimals),
            backend_used: backend.kind(),
            fee_tier: match backend.kind() {
                BackendKind::PoolV3 => Some(fee_tier.unwrap_or(crate::models::DEFAULT_FEE_TIER)),
                _ => None,
            },
            trade: price.trade,
        };
        info!(
            backend = %backend.identifier(),
            amount = quote.amount_out_human,
            raw = %quote.amount_out_raw,
            symbol = %buy.symbol,
            "quote"
        );
        Ok(quote)
    }
}
