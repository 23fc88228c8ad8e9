use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use evm_swapper::models::parse_address;
use evm_swapper::utils::parse_u256_any;
use evm_swapper::{
    load_from_file, BackendKind, BackendOptions, Config, JsonRpcGateway, QuantitySpec, ReceiptOutcome, ReceiptPoller,
    SwapOutcome, SwapRequest, Swapper, TokenRef,
};

#[derive(Parser, Debug)]
#[command(name = "evm-swapper")]
#[command(about = "Quote and execute token swaps on EVM DEX routers and aggregators")]
struct Cli {
    /// Network name from the config (ethereum, polygon, arbitrum)
    #[arg(long, default_value = "ethereum", global = true)]
    network: String,

    /// Network config file (default: built-in networks)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Price a trade without executing it
    Quote {
        sell: String,
        buy: String,
        #[command(flatten)]
        quantity: QuantityArgs,
        #[command(flatten)]
        backend: BackendArgs,
        // only needed to price a full balance
        #[command(flatten)]
        account: AccountArgs,
    },
    /// Quote, confirm and execute a trade
    Swap {
        sell: String,
        buy: String,
        #[command(flatten)]
        quantity: QuantityArgs,
        #[command(flatten)]
        backend: BackendArgs,
        #[command(flatten)]
        account: AccountArgs,
        /// Recipient of the bought tokens (default: sender)
        #[arg(short = 'r', long)]
        recipient: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short = 'n', long)]
        no_prompt: bool,
        /// Stop waiting for the receipt after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Allow a backend's router or exchange proxy to spend a token
    Approve {
        token: String,
        #[command(flatten)]
        backend: BackendArgs,
        #[command(flatten)]
        account: AccountArgs,
        /// Raw allowance (default: unlimited)
        #[arg(long)]
        amount: Option<String>,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Show the sender's balance of a token
    Balance {
        token: String,
        #[command(flatten)]
        account: AccountArgs,
    },
}

#[derive(Args, Debug)]
struct QuantityArgs {
    /// Amount in token units, e.g. 1.5
    #[arg(short = 'q', long, default_value_t = 0.0)]
    quantity: f64,
    /// Amount in base units; cannot be combined with --quantity
    #[arg(short = 'R', long, default_value = "0")]
    raw_quantity: String,
}

impl QuantityArgs {
    fn spec(&self) -> Result<QuantitySpec> {
        Ok(QuantitySpec {
            human: self.quantity,
            raw: parse_u256_any(&self.raw_quantity)?,
        })
    }
}

#[derive(Args, Debug)]
struct BackendArgs {
    /// v2, v3 or 0x
    #[arg(long, default_value = "v2")]
    backend: String,
    /// Pool deployment name (uniswap, sushiswap)
    #[arg(long, default_value = "uniswap")]
    dex: String,
    /// v3 pool fee in hundredths of a bip (500, 3000, 10000)
    #[arg(long)]
    fee_tier: Option<u32>,
    #[arg(long, default_value_t = evm_swapper::models::DEFAULT_SLIPPAGE_BPS)]
    slippage_bps: u32,
    /// Use the fee-on-transfer router functions (v2 only)
    #[arg(long)]
    transfer_fee: bool,
}

impl BackendArgs {
    fn options(&self) -> Result<BackendOptions> {
        let backend: BackendKind = self.backend.parse()?;
        Ok(BackendOptions {
            backend,
            dex: self.dex.clone(),
            fee_tier: self.fee_tier,
            slippage_bps: self.slippage_bps,
            fee_on_transfer: self.transfer_fee,
        })
    }
}

#[derive(Args, Debug)]
struct AccountArgs {
    /// Sending account; the node must be able to sign for it
    #[arg(long)]
    from: Option<String>,
    /// JSON wallet file with `{"wallet": {"address": ...}}`
    #[arg(long, default_value = "wallet.json")]
    wallet: PathBuf,
}

#[derive(Deserialize)]
struct WalletFile {
    wallet: WalletEntry,
}

#[derive(Deserialize)]
struct WalletEntry {
    address: String,
}

impl AccountArgs {
    /// `--from`, else the wallet file if there is one.
    fn optional_sender(&self) -> Result<Option<Address>> {
        if self.from.is_none() && !self.wallet.exists() {
            return Ok(None);
        }
        self.sender().map(Some)
    }

    fn sender(&self) -> Result<Address> {
        let address = match &self.from {
            Some(from) => from.clone(),
            None => {
                let file: WalletFile = load_from_file(&self.wallet)
                    .with_context(|| format!("no --from given and {} is unreadable", self.wallet.display()))?;
                file.wallet.address
            }
        };
        Ok(parse_address(&address)?)
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(path)?,
        None => Config::builtin()?,
    };
    config.apply_env_overrides();
    Ok(config)
}

/// Cancelled on Ctrl-C so an in-flight receipt wait stops cleanly.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, no longer waiting for the network");
            trigger.cancel();
        }
    });
    token
}

fn print_outcome(outcome: &SwapOutcome) -> Result<()> {
    match outcome {
        SwapOutcome::Canceled => println!("Canceled by user"),
        SwapOutcome::Executed { tx_hash, receipt } => {
            println!("Transaction: {}", tx_hash);
            match receipt {
                ReceiptOutcome::Confirmed { receipt, elapsed } => {
                    println!("Confirmed in {:.0?}", elapsed);
                    println!("{}", serde_json::to_string_pretty(&receipt.raw)?);
                    if !receipt.success {
                        return Err(anyhow!("transaction {} reverted on chain", tx_hash));
                    }
                }
                ReceiptOutcome::TimedOut { elapsed } | ReceiptOutcome::Canceled { elapsed } => {
                    println!(
                        "No receipt after {:.0?}. The transaction may still confirm; check {} before retrying.",
                        elapsed, tx_hash
                    );
                }
            }
        }
    }
    Ok(())
}

fn build_swapper(
    config: &Config,
    network: &str,
    sender: Option<Address>,
    timeout_secs: Option<u64>,
) -> Result<Swapper> {
    let endpoint = config.network(network)?.rpc_endpoint(network)?;
    let gateway = Arc::new(JsonRpcGateway::new(endpoint)?);
    let poller = ReceiptPoller::new(gateway.clone()).with_timeout(timeout_secs.map(Duration::from_secs));
    Ok(Swapper::open(config, network, gateway, sender)?.with_poller(poller))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = load_config(cli.config.as_ref())?;
    let network = cli.network.as_str();

    match &cli.command {
        Command::Quote {
            sell,
            buy,
            quantity,
            backend,
            account,
        } => {
            let swapper = build_swapper(&config, network, account.optional_sender()?, None)?;
            let quote = swapper
                .quote(&TokenRef::parse(sell), &TokenRef::parse(buy), quantity.spec()?, &backend.options()?)
                .await?;
            println!(
                "{} {} for {} raw {} via {}",
                quote.amount_out_human, buy, quote.amount_in_raw, sell, quote.backend_used
            );
        }
        Command::Swap {
            sell,
            buy,
            quantity,
            backend,
            account,
            recipient,
            no_prompt,
            timeout_secs,
        } => {
            let swapper = build_swapper(&config, network, Some(account.sender()?), *timeout_secs)?;
            let request = SwapRequest {
                sell: TokenRef::parse(sell),
                buy: TokenRef::parse(buy),
                quantity: quantity.spec()?,
                recipient: recipient.as_deref().map(parse_address).transpose()?,
                no_prompt: *no_prompt,
                options: backend.options()?,
            };
            let outcome = swapper.swap(&request, &shutdown_token()).await?;
            print_outcome(&outcome)?;
        }
        Command::Approve {
            token,
            backend,
            account,
            amount,
            timeout_secs,
        } => {
            let swapper = build_swapper(&config, network, Some(account.sender()?), *timeout_secs)?;
            let amount: Option<U256> = amount.as_deref().map(parse_u256_any).transpose()?;
            let outcome = swapper
                .approve(&TokenRef::parse(token), &backend.options()?, amount, &shutdown_token())
                .await?;
            print_outcome(&outcome)?;
        }
        Command::Balance { token, account } => {
            let sender = account.sender()?;
            let swapper = build_swapper(&config, network, Some(sender), None)?;
            let balance = swapper.balance(&TokenRef::parse(token)).await?;
            println!(
                "{} {} ({} raw) at {}",
                balance.human, balance.token.symbol, balance.raw, sender
            );
        }
    }

    Ok(())
}
