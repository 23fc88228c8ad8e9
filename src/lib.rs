//! # evm-swapper
//!
//! A Rust library for quoting and executing token swaps on EVM chains.
//! Prices come from Uniswap-style v2 and v3 pools or from a 0x-compatible
//! aggregator; trades are signed by the node behind a JSON-RPC endpoint,
//! reached through an alloy provider.
//!
//! ## Backends
//!
//! | Backend | Pricing | Trade | Native in/out |
//! |---------|---------|-------|---------------|
//! | PoolV2 | `getAmountsOut` on the router | `swapExact*` router functions | yes / yes |
//! | PoolV3 | quoter `quoteExactInputSingle` | `exactInputSingle` | yes / no |
//! | Aggregator | `GET /swap/v1/quote` | quoted calldata | yes / yes |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use evm_swapper::{BackendOptions, Config, JsonRpcGateway, QuantitySpec, Swapper, TokenRef};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::builtin()?;
//!     let gateway = Arc::new(JsonRpcGateway::new("http://localhost:8545")?);
//!     let sender = "0x1111111111111111111111111111111111111111".parse()?;
//!     let swapper = Swapper::open(&config, "ethereum", gateway, Some(sender))?;
//!
//!     let quote = swapper
//!         .quote(
//!             &TokenRef::parse("WETH"),
//!             &TokenRef::parse("USDC"),
//!             QuantitySpec::human(1.0),
//!             &BackendOptions::default(),
//!         )
//!         .await?;
//!     println!("1 WETH = {} USDC", quote.amount_out_human);
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Price 1 WETH in USDC on the default v2 pool
//! cargo run --release -- quote WETH USDC -q 1
//!
//! # Sell the whole USDC balance through a 0.05% v3 pool, no prompt
//! cargo run --release -- swap USDC WETH --backend v3 --fee-tier 500 -n --from 0x...
//!
//! # Let the aggregator spend USDC
//! cargo run --release -- approve USDC --backend 0x --from 0x...
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod json_file;
pub mod models;
pub mod quote;
pub mod swap;
pub mod tokens;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, Deployment, NativeAsset, NetworkConfig, RouterTable};
pub use error::{SwapError, SwapResult};
pub use gateway::{GatewayError, JsonRpcGateway, LedgerGateway};
pub use json_file::{load_from_file, save_to_file};
pub use models::{
    BackendKind, BackendOptions, Quote, QuantitySpec, ReceiptOutcome, SwapIntent, TokenInfo, TokenRef,
    TransactionRequest, TxReceipt,
};
pub use quote::{QuoteBackend, QuoteEngine};
pub use swap::{Balance, Confirmer, ReceiptPoller, SwapOutcome, SwapRequest, Swapper};
pub use tokens::{TokenDirectory, TokenResolver};
