//! Network, DEX deployment and aggregator configuration.
//!
//! Loaded once and handed to the swapper by reference; nothing here is global.
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use alloy_primitives::Address;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::error::{SwapError, SwapResult};
use crate::json_file::load_from_file;

const BUILTIN_NETWORKS: &str = include_str!("../data/networks.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where `tokens_<network>.json` directory files live.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    pub networks: BTreeMap<String, NetworkConfig>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    #[serde(default)]
    pub rpc_endpoint: Option<String>,
    pub native: NativeAsset,
    #[serde(default)]
    pub aggregator: Option<AggregatorConfig>,
    #[serde(default)]
    pub deployments: Vec<Deployment>,
}

/// The chain's native coin. Pool paths refer to it by its wrapped contract
/// (`marker`); resolving the marker never touches the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeAsset {
    pub symbol: String,
    pub marker: Address,
    /// How the aggregator API names the native coin (`ETH`, `MATIC`).
    pub aggregator_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    pub endpoint: String,
    /// Spender to approve for aggregator trades.
    pub exchange_proxy: Address,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub dex: String,
    pub version: u8,
    pub router: Address,
    pub factory: Address,
    /// Off-chain pricing helper, required for v3 quotes.
    #[serde(default)]
    pub quoter: Option<Address>,
}

impl Config {
    /// The networks shipped with the crate.
    pub fn builtin() -> Result<Self> {
        serde_json::from_str(BUILTIN_NETWORKS).map_err(|e| anyhow!("Failed to parse builtin networks: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self> {
        load_from_file(path)
    }

    /// Override RPC endpoints from `<network>_http_endpoint` environment variables.
    pub fn apply_env_overrides(&mut self) {
        for (name, network) in self.networks.iter_mut() {
            if let Ok(endpoint) = std::env::var(format!("{}_http_endpoint", name)) {
                network.rpc_endpoint = Some(endpoint);
            }
        }
    }

    pub fn network(&self, name: &str) -> SwapResult<&NetworkConfig> {
        self.networks
            .get(name)
            .ok_or_else(|| SwapError::config(format!("network {} is not configured", name)))
    }

    pub fn directory_path(&self, network: &str) -> PathBuf {
        self.data_dir.join(format!("tokens_{}.json", network))
    }
}

impl NetworkConfig {
    pub fn rpc_endpoint(&self, network: &str) -> SwapResult<&str> {
        self.rpc_endpoint.as_deref().ok_or_else(|| {
            SwapError::config(format!("please configure {}_http_endpoint in your .env", network))
        })
    }

    pub fn aggregator(&self, network: &str) -> SwapResult<&AggregatorConfig> {
        self.aggregator
            .as_ref()
            .ok_or_else(|| SwapError::config(format!("no aggregator configured for {}", network)))
    }
}

/// `(dex, version, network) -> deployment`, built once from `Config`.
#[derive(Debug, Clone, Default)]
pub struct RouterTable {
    entries: HashMap<(String, u8, String), Deployment>,
}

impl RouterTable {
    pub fn from_config(config: &Config) -> Self {
        let mut entries = HashMap::new();
        for (network, net) in &config.networks {
            for deployment in &net.deployments {
                entries.insert(
                    (deployment.dex.to_lowercase(), deployment.version, network.clone()),
                    deployment.clone(),
                );
            }
        }
        Self { entries }
    }

    pub fn lookup(&self, dex: &str, version: u8, network: &str) -> SwapResult<&Deployment> {
        self.entries
            .get(&(dex.to_lowercase(), version, network.to_string()))
            .ok_or_else(|| {
                SwapError::config(format!(
                    "{} v{} is not configured on {}",
                    dex, version, network
                ))
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
