use std::str::FromStr;

use alloy_primitives::{Address, Bytes, U256};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ensure_distinct, PriceQuote, QuoteBackend, TradeCall};
use crate::error::{SwapError, SwapResult};
use crate::models::{AggregatorTrade, BackendKind, Quote, SwapIntent, TokenInfo};
use crate::utils::{parse_u256_any, remove_trailing_slash, retry};

const BACKEND: &str = "0x";
const QUOTE_RETRIES: u32 = 2;
const QUOTE_BASE_DELAY_MS: u64 = 1000;

/// Query for `GET /swap/v1/quote`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteParams {
    pub sell_token: String,
    pub buy_token: String,
    pub sell_amount: U256,
    /// Omitted for a price-only request.
    pub taker: Option<Address>,
}

/// HTTP client for a 0x-compatible swap API.
pub struct ZeroExApi {
    api_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ZeroExApi {
    pub fn new(api_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self::with_client(api_url, api_key, client))
    }

    pub fn with_client(api_url: &str, api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            api_url: remove_trailing_slash(api_url),
            api_key,
            client,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn build_quote_url(&self, params: &QuoteParams) -> String {
        let mut url = format!(
            "{}/swap/v1/quote?sellToken={}&buyToken={}&sellAmount={}",
            self.api_url, params.sell_token, params.buy_token, params.sell_amount
        );
        if let Some(taker) = params.taker {
            url.push_str(&format!("&takerAddress={}", taker.to_checksum(None)));
        }
        url
    }

    async fn fetch_quote(&self, url: &str, params: &QuoteParams) -> SwapResult<serde_json::Value> {
        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("0x-api-key", key);
        }
        let response = request.send().await.map_err(|e| unavailable(None, e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| unavailable(Some(status), e.to_string()))?;
        classify_response(status, body, params)
    }

    /// Fetch a quote. Only transport failures, where no HTTP status came
    /// back, are retried. Any answer from the API is final.
    pub async fn quote(&self, params: &QuoteParams) -> SwapResult<serde_json::Value> {
        let url = self.build_quote_url(params);
        debug!(url = %url, "requesting aggregator quote");
        retry(
            QUOTE_RETRIES,
            QUOTE_BASE_DELAY_MS,
            |e: &SwapError| matches!(e, SwapError::BackendUnavailable { status: None, .. }),
            || self.fetch_quote(&url, params),
        )
        .await
    }
}

fn unavailable(status: Option<u16>, body: String) -> SwapError {
    SwapError::BackendUnavailable {
        backend: BACKEND.to_string(),
        status,
        body,
    }
}

/// Map an HTTP answer to a quote document or an error. A 400 on a request
/// with a taker almost always means the sell token lacks an allowance.
pub fn classify_response(status: u16, body: String, params: &QuoteParams) -> SwapResult<serde_json::Value> {
    match status {
        200..=299 => serde_json::from_str(&body).map_err(|e| unavailable(Some(status), format!("{}: {}", e, body))),
        400 if params.taker.is_some() => Err(SwapError::TokenNotApproved {
            backend: BACKEND.to_string(),
            token: params.sell_token.clone(),
            body,
        }),
        _ => Err(unavailable(Some(status), body)),
    }
}

fn field<'a>(value: &'a serde_json::Value, name: &str) -> Option<&'a str> {
    value.get(name).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

fn optional_u256(value: &serde_json::Value, name: &str) -> Result<Option<U256>> {
    field(value, name).map(parse_u256_any).transpose()
}

/// Extract the price and, when `with_trade`, the executable call.
pub fn parse_quote(value: &serde_json::Value, with_trade: bool) -> Result<PriceQuote> {
    let amount_out_raw = optional_u256(value, "buyAmount")?.ok_or_else(|| anyhow!("quote has no buyAmount"))?;
    if !with_trade {
        return Ok(PriceQuote::amount(amount_out_raw));
    }

    let to = field(value, "to")
        .ok_or_else(|| anyhow!("quote has no `to`"))
        .and_then(|s| Address::from_str(s).map_err(|e| anyhow!("invalid `to` {}: {}", s, e)))?;
    let data = field(value, "data")
        .ok_or_else(|| anyhow!("quote has no `data`"))
        .and_then(|s| Bytes::from_str(s).map_err(|e| anyhow!("invalid `data`: {}", e)))?;
    let gas = optional_u256(value, "gas")?
        .or(optional_u256(value, "estimatedGas")?)
        .map(|g| u64::try_from(g).map_err(|_| anyhow!("gas out of range: {}", g)))
        .transpose()?;
    let allowance_target = field(value, "allowanceTarget")
        .and_then(|s| Address::from_str(s).ok())
        .filter(|a| !a.is_zero());

    Ok(PriceQuote {
        amount_out_raw,
        trade: Some(AggregatorTrade {
            to,
            data,
            value: optional_u256(value, "value")?.unwrap_or_default(),
            gas_price: optional_u256(value, "gasPrice")?,
            gas,
            allowance_target,
        }),
    })
}

/// Off-chain routing through a swap API. With a taker the quote carries a
/// ready-to-send transaction; without one it is price-only.
pub struct AggregatorBackend {
    api: ZeroExApi,
    exchange_proxy: Address,
    native_token: String,
    taker: Option<Address>,
}

impl AggregatorBackend {
    pub fn new(api: ZeroExApi, exchange_proxy: Address, native_token: String, taker: Option<Address>) -> Self {
        Self {
            api,
            exchange_proxy,
            native_token,
            taker,
        }
    }

    fn api_token(&self, token: &TokenInfo) -> String {
        if token.is_native {
            self.native_token.clone()
        } else {
            token.checksum()
        }
    }

    pub fn params(&self, sell: &TokenInfo, buy: &TokenInfo, raw_qty: U256) -> QuoteParams {
        QuoteParams {
            sell_token: self.api_token(sell),
            buy_token: self.api_token(buy),
            sell_amount: raw_qty,
            taker: self.taker,
        }
    }
}

#[async_trait]
impl QuoteBackend for AggregatorBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Aggregator
    }

    fn identifier(&self) -> String {
        BACKEND.to_string()
    }

    fn spender(&self) -> Address {
        self.exchange_proxy
    }

    async fn price_for_exact_input(
        &self,
        sell: &TokenInfo,
        buy: &TokenInfo,
        raw_qty: U256,
        _fee_tier: Option<u32>,
    ) -> SwapResult<PriceQuote> {
        ensure_distinct(sell, buy)?;
        let params = self.params(sell, buy, raw_qty);
        let value = self.api.quote(&params).await?;
        let price = parse_quote(&value, self.taker.is_some()).map_err(|e| unavailable(Some(200), e.to_string()))?;
        if let Some(target) = price.trade.as_ref().and_then(|t| t.allowance_target) {
            if target != self.exchange_proxy {
                warn!(allowance_target = %target, exchange_proxy = %self.exchange_proxy, "aggregator asks for a different spender");
            }
        }
        Ok(price)
    }

    async fn build_trade(&self, _intent: &SwapIntent, quote: &Quote) -> SwapResult<TradeCall> {
        let trade = quote
            .trade
            .as_ref()
            .ok_or_else(|| SwapError::config("aggregator quote has no transaction; quote again with a taker address"))?;
        Ok(TradeCall {
            to: trade.to,
            data: trade.data.clone(),
            value: trade.value,
            gas: trade.gas,
            gas_price: trade.gas_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BackendOptions;
    use crate::testing::{serve_zero_ex, SENDER, USDC, WETH};
    use serde_json::json;

    fn backend(taker: Option<Address>) -> AggregatorBackend {
        AggregatorBackend::new(
            ZeroExApi::with_client("https://api.0x.org/", None, reqwest::Client::new()),
            "0xDef1C0ded9bec7F1a1670819833240f027b25EfF".parse().unwrap(),
            "ETH".to_string(),
            taker,
        )
    }

    fn weth() -> TokenInfo {
        TokenInfo::native(WETH.parse().unwrap(), "WETH")
    }

    fn usdc() -> TokenInfo {
        TokenInfo::new(USDC.parse().unwrap(), "USDC", 6)
    }

    fn fixture() -> serde_json::Value {
        json!({
            "price": "3250.5",
            "to": "0xdef1c0ded9bec7f1a1670819833240f027b25eff",
            "data": "0xd9627aa4000000",
            "value": "1000000000000000000",
            "gas": "136000",
            "gasPrice": "21000000000",
            "buyAmount": "3250500000",
            "sellAmount": "1000000000000000000",
            "allowanceTarget": "0x0000000000000000000000000000000000000000"
        })
    }

    #[test]
    fn test_quote_url_names_native_and_omits_missing_taker() {
        let b = backend(None);
        let url = b.api.build_quote_url(&b.params(&weth(), &usdc(), U256::from(5u64)));
        assert_eq!(
            url,
            format!("https://api.0x.org/swap/v1/quote?sellToken=ETH&buyToken={}&sellAmount=5", USDC)
        );

        let b = backend(Some(SENDER));
        let url = b.api.build_quote_url(&b.params(&usdc(), &weth(), U256::from(5u64)));
        assert!(url.ends_with("&takerAddress=0x1111111111111111111111111111111111111111"));
        assert!(url.contains("buyToken=ETH"));
    }

    #[test]
    fn test_bad_request_with_taker_means_unapproved_token() {
        let b = backend(Some(SENDER));
        let params = b.params(&usdc(), &weth(), U256::from(5u64));
        let err = classify_response(400, "{\"reason\":\"Validation Failed\"}".into(), &params).unwrap_err();
        match err {
            SwapError::TokenNotApproved { token, body, .. } => {
                assert_eq!(token, USDC);
                assert!(body.contains("Validation Failed"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = classify_response(503, "down".into(), &params).unwrap_err();
        assert!(matches!(err, SwapError::BackendUnavailable { status: Some(503), .. }));
    }

    #[test]
    fn test_bad_request_without_taker_is_unavailable() {
        let b = backend(None);
        let params = b.params(&usdc(), &weth(), U256::from(5u64));
        let err = classify_response(400, "nope".into(), &params).unwrap_err();
        assert!(matches!(err, SwapError::BackendUnavailable { status: Some(400), .. }));
        assert!(classify_response(200, "{}".into(), &params).is_ok());
        assert!(classify_response(200, "<html>".into(), &params).is_err());
    }

    #[test]
    fn test_parse_quote() {
        let price = parse_quote(&fixture(), false).unwrap();
        assert_eq!(price.amount_out_raw, U256::from(3_250_500_000u64));
        assert!(price.trade.is_none());

        let price = parse_quote(&fixture(), true).unwrap();
        let trade = price.trade.unwrap();
        assert_eq!(trade.value, U256::from(1_000_000_000_000_000_000u64));
        assert_eq!(trade.gas, Some(136_000));
        assert_eq!(trade.gas_price, Some(U256::from(21_000_000_000u64)));
        assert_eq!(trade.allowance_target, None);
        assert_eq!(trade.data.len(), 7);

        assert!(parse_quote(&json!({"price": "1"}), false).is_err());
    }

    #[tokio::test]
    async fn test_build_trade_uses_quoted_calldata() {
        let b = backend(Some(SENDER));
        let price = parse_quote(&fixture(), true).unwrap();
        let quote = Quote {
            amount_in_raw: U256::from(1_000_000_000_000_000_000u64),
            amount_out_raw: price.amount_out_raw,
            amount_out_human: 3250.5,
            backend_used: BackendKind::Aggregator,
            fee_tier: None,
            trade: price.trade,
        };
        let intent = SwapIntent {
            sell: weth(),
            buy: usdc(),
            raw_qty: quote.amount_in_raw,
            sender: SENDER,
            recipient: SENDER,
            no_prompt: true,
            options: BackendOptions::new(BackendKind::Aggregator),
        };
        let call = b.build_trade(&intent, &quote).await.unwrap();
        assert_eq!(call.to, b.spender());
        assert_eq!(call.gas, Some(136_000));

        let price_only = Quote { trade: None, ..quote };
        assert!(matches!(
            b.build_trade(&intent, &price_only).await,
            Err(SwapError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_taker_quote_from_api() {
        let (url, seen) = serve_zero_ex(200, fixture()).await;
        let api = ZeroExApi::new(&url, Some("test-key".to_string())).unwrap();
        let proxy: Address = "0xDef1C0ded9bec7F1a1670819833240f027b25EfF".parse().unwrap();
        let b = AggregatorBackend::new(api, proxy, "ETH".to_string(), Some(SENDER));

        let price = b
            .price_for_exact_input(&weth(), &usdc(), U256::from(1_000_000_000_000_000_000u64), None)
            .await
            .unwrap();
        assert_eq!(price.amount_out_raw, U256::from(3_250_500_000u64));
        let trade = price.trade.unwrap();
        assert_eq!(trade.to, proxy);
        assert_eq!(trade.value, U256::from(1_000_000_000_000_000_000u64));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (query, api_key) = &seen[0];
        assert_eq!(query.get("sellToken").map(String::as_str), Some("ETH"));
        assert_eq!(query.get("buyToken").map(String::as_str), Some(USDC));
        assert_eq!(query.get("sellAmount").map(String::as_str), Some("1000000000000000000"));
        assert_eq!(query.get("takerAddress"), Some(&SENDER.to_checksum(None)));
        assert_eq!(api_key.as_deref(), Some("test-key"));
    }

    #[tokio::test]
    async fn test_price_only_request_sends_no_taker() {
        let (url, seen) = serve_zero_ex(200, fixture()).await;
        let b = AggregatorBackend::new(
            ZeroExApi::new(&url, None).unwrap(),
            "0xDef1C0ded9bec7F1a1670819833240f027b25EfF".parse().unwrap(),
            "ETH".to_string(),
            None,
        );
        let price = b.price_for_exact_input(&weth(), &usdc(), U256::from(5u64), None).await.unwrap();
        assert!(price.trade.is_none());

        let seen = seen.lock().unwrap();
        assert!(seen[0].0.get("takerAddress").is_none());
        assert_eq!(seen[0].1, None);
    }

    #[tokio::test]
    async fn test_api_answers_are_not_retried() {
        let params = |url: &str| {
            let query = backend(Some(SENDER)).params(&usdc(), &weth(), U256::from(5u64));
            (ZeroExApi::new(url, None).unwrap(), query)
        };

        let (url, seen) = serve_zero_ex(429, json!({"reason": "Too Many Requests"})).await;
        let (api, query) = params(&url);
        let err = api.quote(&query).await.unwrap_err();
        assert!(matches!(err, SwapError::BackendUnavailable { status: Some(429), .. }));
        assert_eq!(seen.lock().unwrap().len(), 1);

        let (url, seen) = serve_zero_ex(400, json!({"reason": "Validation Failed"})).await;
        let (api, query) = params(&url);
        let err = api.quote(&query).await.unwrap_err();
        assert!(matches!(err, SwapError::TokenNotApproved { .. }));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
