use std::sync::Arc;

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;

use super::{deadline, ensure_distinct, pricing_error, PriceQuote, QuoteBackend, TradeCall};
use crate::config::Deployment;
use crate::error::{SwapError, SwapResult};
use crate::gateway::abi::{self, IUniswapV2Router02 as Router};
use crate::gateway::LedgerGateway;
use crate::models::{BackendKind, Quote, SwapIntent, TokenInfo};

/// Router deadline for pool trades, in seconds from now.
pub const DEADLINE_SECS: u64 = 600;

/// Constant-product pools behind a Uniswap-v2 style router. Trades go
/// directly from `sell` to `buy` without intermediate hops.
pub struct PoolV2 {
    gateway: Arc<dyn LedgerGateway>,
    dex: String,
    deployment: Deployment,
}

impl PoolV2 {
    pub fn new(gateway: Arc<dyn LedgerGateway>, dex: &str, deployment: Deployment) -> Self {
        Self {
            gateway,
            dex: dex.to_lowercase(),
            deployment,
        }
    }

    fn path(sell: &TokenInfo, buy: &TokenInfo) -> Vec<Address> {
        vec![sell.canonical_id, buy.canonical_id]
    }
}

#[async_trait]
impl QuoteBackend for PoolV2 {
    fn kind(&self) -> BackendKind {
        BackendKind::PoolV2
    }

    fn identifier(&self) -> String {
        format!("{}-v2", self.dex)
    }

    fn spender(&self) -> Address {
        self.deployment.router
    }

    async fn price_for_exact_input(
        &self,
        sell: &TokenInfo,
        buy: &TokenInfo,
        raw_qty: U256,
        _fee_tier: Option<u32>,
    ) -> SwapResult<PriceQuote> {
        ensure_distinct(sell, buy)?;
        let data = abi::encode(Router::getAmountsOutCall {
            amountIn: raw_qty,
            path: Self::path(sell, buy),
        });
        let out = self
            .gateway
            .call(self.deployment.router, data)
            .await
            .map_err(|e| pricing_error(self.identifier(), e))?;

        let amounts = Router::getAmountsOutCall::abi_decode_returns(&out, true)
            .map_err(|e| SwapError::BackendUnavailable {
                backend: self.identifier(),
                status: None,
                body: e.to_string(),
            })?
            .amounts;
        let amount_out = amounts.last().copied().ok_or_else(|| SwapError::BackendUnavailable {
            backend: self.identifier(),
            status: None,
            body: "getAmountsOut returned no amounts".to_string(),
        })?;
        Ok(PriceQuote::amount(amount_out))
    }

    async fn build_trade(&self, intent: &SwapIntent, quote: &Quote) -> SwapResult<TradeCall> {
        ensure_distinct(&intent.sell, &intent.buy)?;
        let min_out = quote.min_amount_out(intent.options.slippage_bps);
        let path = Self::path(&intent.sell, &intent.buy);
        let to = intent.recipient;
        let expires = deadline(DEADLINE_SECS);
        let amount_in = intent.raw_qty;
        let fot = intent.options.fee_on_transfer;

        let data = match (intent.sell.is_native, intent.buy.is_native, fot) {
            (true, _, false) => abi::encode(Router::swapExactETHForTokensCall {
                amountOutMin: min_out,
                path,
                to,
                deadline: expires,
            }),
            (true, _, true) => abi::encode(Router::swapExactETHForTokensSupportingFeeOnTransferTokensCall {
                amountOutMin: min_out,
                path,
                to,
                deadline: expires,
            }),
            (false, true, false) => abi::encode(Router::swapExactTokensForETHCall {
                amountIn: amount_in,
                amountOutMin: min_out,
                path,
                to,
                deadline: expires,
            }),
            (false, true, true) => abi::encode(Router::swapExactTokensForETHSupportingFeeOnTransferTokensCall {
                amountIn: amount_in,
                amountOutMin: min_out,
                path,
                to,
                deadline: expires,
            }),
            (false, false, false) => abi::encode(Router::swapExactTokensForTokensCall {
                amountIn: amount_in,
                amountOutMin: min_out,
                path,
                to,
                deadline: expires,
            }),
            (false, false, true) => abi::encode(Router::swapExactTokensForTokensSupportingFeeOnTransferTokensCall {
                amountIn: amount_in,
                amountOutMin: min_out,
                path,
                to,
                deadline: expires,
            }),
        };
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
