use std::sync::Arc;

use alloy_primitives::aliases::{U160, U24};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use tracing::debug;

use super::pool_v2::DEADLINE_SECS;
use super::{deadline, ensure_distinct, pricing_error, PriceQuote, QuoteBackend, TradeCall};
use crate::config::Deployment;
use crate::error::{SwapError, SwapResult};
use crate::gateway::abi::{self, IQuoter, ISwapRouter};
use crate::gateway::LedgerGateway;
use crate::models::{BackendKind, Quote, SwapIntent, TokenInfo, DEFAULT_FEE_TIER};

/// Concentrated-liquidity pools. Quotes come from the deployment's quoter
/// contract, trades go through its swap router, one pool per trade.
pub struct PoolV3 {
    gateway: Arc<dyn LedgerGateway>,
    dex: String,
    deployment: Deployment,
    quoter: Address,
}

impl PoolV3 {
    pub fn new(gateway: Arc<dyn LedgerGateway>, dex: &str, deployment: Deployment) -> SwapResult<Self> {
        let quoter = deployment
            .quoter
            .ok_or_else(|| SwapError::config(format!("{} v3 has no quoter configured", dex)))?;
        Ok(Self {
            gateway,
            dex: dex.to_lowercase(),
            deployment,
            quoter,
        })
    }

    fn fee(&self, fee: u32) -> SwapResult<U24> {
        U24::try_from(fee).map_err(|_| {
            SwapError::config(format!("{}: fee tier {} does not fit uint24", self.identifier(), fee))
        })
    }
}

#[async_trait]
impl QuoteBackend for PoolV3 {
    fn kind(&self) -> BackendKind {
        BackendKind::PoolV3
    }

    fn identifier(&self) -> String {
        format!("{}-v3", self.dex)
    }

    fn spender(&self) -> Address {
        self.deployment.router
    }

    /// The fee tier is passed to the quoter as given. A tier with no pool
    /// for this pair surfaces as a revert.
    async fn price_for_exact_input(
        &self,
        sell: &TokenInfo,
        buy: &TokenInfo,
        raw_qty: U256,
        fee_tier: Option<u32>,
    ) -> SwapResult<PriceQuote> {
        ensure_distinct(sell, buy)?;
        let fee = fee_tier.unwrap_or(DEFAULT_FEE_TIER);
        debug!(backend = %self.identifier(), fee, "quoting single pool");
        let data = abi::encode(IQuoter::quoteExactInputSingleCall {
            tokenIn: sell.canonical_id,
            tokenOut: buy.canonical_id,
            fee: self.fee(fee)?,
            amountIn: raw_qty,
            sqrtPriceLimitX96: U160::ZERO,
        });
        let out = self
            .gateway
            .call(self.quoter, data)
            .await
            .map_err(|e| pricing_error(self.identifier(), e))?;
        let amount_out = IQuoter::quoteExactInputSingleCall::abi_decode_returns(&out, true)
            .map_err(|e| SwapError::BackendUnavailable {
                backend: self.identifier(),
                status: None,
                body: e.to_string(),
            })?
            .amountOut;
        Ok(PriceQuote::amount(amount_out))
    }

    async fn build_trade(&self, intent: &SwapIntent, quote: &Quote) -> SwapResult<TradeCall> {
        ensure_distinct(&intent.sell, &intent.buy)?;
        if intent.buy.is_native {
            return Err(SwapError::config(format!(
                "{} cannot pay out native {}; use a v2 pool or the aggregator",
                self.identifier(),
                intent.buy.symbol
            )));
        }

        let fee = quote
            .fee_tier
            .unwrap_or_else(|| intent.options.effective_fee_tier());
        let data = abi::encode(ISwapRouter::exactInputSingleCall {
            params: ISwapRouter::ExactInputSingleParams {
                tokenIn: intent.sell.canonical_id,
                tokenOut: intent.buy.canonical_id,
                fee: self.fee(fee)?,
                recipient: intent.recipient,
                deadline: deadline(DEADLINE_SECS),
                amountIn: intent.raw_qty,
                amountOutMinimum: quote.min_amount_out(intent.options.slippage_bps),
                sqrtPriceLimitX96: U160::ZERO,
            },
        });
        let value = if intent.sell.is_native { intent.raw_qty } else { U256::ZERO };

        Ok(TradeCall {
            to: self.deployment.router,
            data,
            value,
            gas: None,
            gas_price: None,
        })
    }
}
