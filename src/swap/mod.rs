//! The swap state machine: resolve, size, quote, confirm, broadcast, poll.
//!
//! At most one transaction leaves `swap` or `approve` per call, and a failed
//! broadcast is reported, never retried.
use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, NetworkConfig};
use crate::error::{SwapError, SwapResult};
use crate::gateway::abi::{self, IERC20};
use crate::gateway::LedgerGateway;
use crate::models::{
    to_human, to_raw, BackendKind, BackendOptions, Quantity, QuantitySpec, Quote, ReceiptOutcome, SwapIntent,
    TokenInfo, TokenRef, TransactionRequest,
};
use crate::quote::{QuoteBackend, QuoteEngine, TradeCall};
use crate::tokens::{JsonFileStore, TokenDirectory, TokenResolver};

pub mod confirm;
pub mod poller;

pub use confirm::{Confirmer, ScriptedConfirmer, StdinConfirmer};
pub use poller::ReceiptPoller;

/// Everything a caller asks of `Swapper::swap`.
#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub sell: TokenRef,
    pub buy: TokenRef,
    pub quantity: QuantitySpec,
    /// Defaults to the sender.
    pub recipient: Option<Address>,
    pub no_prompt: bool,
    pub options: BackendOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwapOutcome {
    /// Broadcast happened. The receipt outcome may be `TimedOut`, which means
    /// unknown, not failed.
    Executed { tx_hash: B256, receipt: ReceiptOutcome },
    /// The operator declined. Nothing was broadcast.
    Canceled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    pub token: TokenInfo,
    pub raw: U256,
    pub human: f64,
}

/// One network, at most one sending account. Built once and shared by
/// reference. Without a sender only quotes that need no balance work.
pub struct Swapper {
    network: String,
    network_config: NetworkConfig,
    gateway: Arc<dyn LedgerGateway>,
    resolver: TokenResolver,
    engine: QuoteEngine,
    sender: Option<Address>,
    confirmer: Arc<dyn Confirmer>,
    poller: ReceiptPoller,
}

impl Swapper {
    pub fn new(
        config: &Config,
        network: &str,
        gateway: Arc<dyn LedgerGateway>,
        directory: Arc<TokenDirectory>,
        sender: Option<Address>,
    ) -> SwapResult<Self> {
        let network_config = config.network(network)?.clone();
        let resolver = TokenResolver::new(Arc::clone(&gateway), directory, network_config.native.clone());
        let engine = QuoteEngine::new(Arc::clone(&gateway), config, network)?;
        Ok(Self {
            network: network.to_string(),
            network_config,
            poller: ReceiptPoller::new(Arc::clone(&gateway)),
            gateway,
            resolver,
            engine,
            sender,
            confirmer: Arc::new(StdinConfirmer),
        })
    }

    /// Like `new`, with the directory file from `config.data_dir`.
    pub fn open(
        config: &Config,
        network: &str,
        gateway: Arc<dyn LedgerGateway>,
        sender: Option<Address>,
    ) -> SwapResult<Self> {
        let store = Arc::new(JsonFileStore::new(config.directory_path(network)));
        let directory = Arc::new(TokenDirectory::open(network, store)?);
        Self::new(config, network, gateway, directory, sender)
    }

    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = confirmer;
        self
    }

    pub fn with_poller(mut self, poller: ReceiptPoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn sender(&self) -> Option<Address> {
        self.sender
    }

    fn require_sender(&self) -> SwapResult<Address> {
        self.sender
            .ok_or_else(|| SwapError::config("no sending account configured"))
    }

    pub async fn resolve(&self, token: &TokenRef) -> SwapResult<TokenInfo> {
        self.resolver.resolve(token).await
    }

    async fn resolve_pair(&self, sell: &TokenRef, buy: &TokenRef) -> SwapResult<(TokenInfo, TokenInfo)> {
        tokio::try_join!(self.resolver.resolve(sell), self.resolver.resolve(buy))
    }

    async fn balance_of(&self, token: &TokenInfo) -> SwapResult<U256> {
        let owner = self.require_sender()?;
        let contract = if token.is_native { None } else { Some(token.canonical_id) };
        self.gateway
            .get_balance(owner, contract)
            .await
            .map_err(|source| SwapError::ContractCallFailed {
                address: token.checksum(),
                call: "balanceOf(address)",
                source,
            })
    }

    pub async fn balance(&self, token: &TokenRef) -> SwapResult<Balance> {
        let token = self.resolve(token).await?;
        let raw = self.balance_of(&token).await?;
        Ok(Balance {
            human: to_human(raw, token.decimals),
            token,
            raw,
        })
    }

    /// Base units to sell, plus the balance when it had to be read for a
    /// full-balance request.
    async fn raw_quantity(&self, quantity: Quantity, sell: &TokenInfo) -> SwapResult<(U256, Option<U256>)> {
        let (raw, balance) = match quantity {
            Quantity::Raw(raw) => (raw, None),
            Quantity::Human(human) => (to_raw(human, sell.decimals)?, None),
            Quantity::FullBalance => {
                let balance = self.balance_of(sell).await?;
                (balance, Some(balance))
            }
        };
        if raw.is_zero() {
            return Err(SwapError::config(format!("nothing to sell: {} quantity is zero", sell.symbol)));
        }
        Ok((raw, balance))
    }

    /// Price a trade without executing it. The aggregator is asked for a
    /// price only, with no taker. A full-balance quote needs a sender.
    pub async fn quote(
        &self,
        sell: &TokenRef,
        buy: &TokenRef,
        quantity: QuantitySpec,
        options: &BackendOptions,
    ) -> SwapResult<Quote> {
        let quantity = quantity.select()?;
        if matches!(quantity, Quantity::FullBalance) {
            self.require_sender()?;
        }
        let (sell, buy) = self.resolve_pair(sell, buy).await?;
        let (raw_qty, _) = self.raw_quantity(quantity, &sell).await?;
        self.engine.quote(&sell, &buy, raw_qty, options, None).await
    }

    pub async fn swap(&self, request: &SwapRequest, cancel: &CancellationToken) -> SwapResult<SwapOutcome> {
        let quantity = request.quantity.select()?;
        let sender = self.require_sender()?;
        let recipient = request.recipient.unwrap_or(sender);
        if request.options.backend == BackendKind::Aggregator && recipient != sender {
            return Err(SwapError::config("the aggregator pays out to the sender only"));
        }

        let (sell, buy) = self.resolve_pair(&request.sell, &request.buy).await?;
        debug!(state = "resolved", sell = %sell, buy = %buy);

        let (raw_qty, balance) = self.raw_quantity(quantity, &sell).await?;
        let available = match balance {
            Some(balance) => balance,
            None => self.balance_of(&sell).await?,
        };
        if raw_qty > available {
            return Err(SwapError::InsufficientBalance {
                symbol: sell.symbol.clone(),
                needed: raw_qty,
                available,
            });
        }
        debug!(state = "quantity_computed", raw_qty = %raw_qty);

        let backend = self.engine.backend(&request.options, Some(sender))?;
        let quote = self
            .engine
            .quote_with(backend.as_ref(), &sell, &buy, raw_qty, request.options.fee_tier)
            .await?;

        let intent = SwapIntent {
            sell,
            buy,
            raw_qty,
            sender,
            recipient,
            no_prompt: request.no_prompt,
            options: request.options.clone(),
        };

        if intent.no_prompt {
            info!(state = "auto_confirmed", "{}", summary(&intent, &quote));
        } else if !self.confirmer.confirm(&summary(&intent, &quote)).await {
            info!("swap canceled by user");
            return Ok(SwapOutcome::Canceled);
        }

        let call = backend.build_trade(&intent, &quote).await?;
        self.execute(sender, call, cancel).await
    }

    /// Allow the backend's spender to move `token`; unlimited when `amount` is unset.
    pub async fn approve(
        &self,
        token: &TokenRef,
        options: &BackendOptions,
        amount: Option<U256>,
        cancel: &CancellationToken,
    ) -> SwapResult<SwapOutcome> {
        let sender = self.require_sender()?;
        let token = self.resolve(token).await?;
        if token.is_native {
            return Err(SwapError::config(format!("{} is the native asset and needs no approval", token.symbol)));
        }
        let spender = self.engine.backend(options, None)?.spender();
        let amount = amount.unwrap_or(U256::MAX);
        info!(token = %token, spender = %spender, amount = %amount, "approving");

        let call = TradeCall {
            to: token.canonical_id,
            data: abi::encode(IERC20::approveCall { spender, amount }),
            value: U256::ZERO,
            gas: None,
            gas_price: None,
        };
        self.execute(sender, call, cancel).await
    }

    /// Broadcast once, then wait for the receipt.
    async fn execute(&self, sender: Address, call: TradeCall, cancel: &CancellationToken) -> SwapResult<SwapOutcome> {
        let nonce = self
            .gateway
            .get_transaction_count(sender)
            .await
            .map_err(SwapError::Gateway)?;
        let tx = TransactionRequest {
            from: sender,
            to: call.to,
            data: call.data,
            value: call.value,
            nonce,
            chain_id: self.network_config.chain_id,
            gas: call.gas,
            gas_price: call.gas_price,
        };

        let tx_hash = self.gateway.sign_and_broadcast(&tx).await.map_err(|e| {
            warn!(error = %e, "broadcast failed, not retrying");
            SwapError::BroadcastFailed(e)
        })?;
        info!(state = "executed", %tx_hash, nonce, network = %self.network, "transaction broadcast");

        let receipt = self
            .poller
            .poll(tx_hash, cancel)
            .await
            .map_err(|source| SwapError::PollFailed { tx_hash, source })?;
        Ok(SwapOutcome::Executed { tx_hash, receipt })
    }
}

fn summary(intent: &SwapIntent, quote: &Quote) -> String {
    format!(
        "Swap {} {} ({}, {} decimals)\n  for ~{} {} ({}, {} decimals)\n  via {}, recipient {}",
        to_human(intent.raw_qty, intent.sell.decimals),
        intent.sell.symbol,
        intent.sell.checksum(),
        intent.sell.decimals,
        quote.amount_out_human,
        intent.buy.symbol,
        intent.buy.checksum(),
        intent.buy.decimals,
        quote.backend_used,
        intent.recipient,
    )
}
