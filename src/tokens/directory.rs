//! Per-network alias table (`{"known_contracts": {alias: address}}`).
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use alloy_primitives::Address;
use anyhow::Result;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::json_file::{load_from_file, save_to_file};
use crate::models::parse_address;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnownContracts {
    #[serde(default)]
    pub known_contracts: BTreeMap<String, String>,
}

/// Durable storage behind a `TokenDirectory`. Every save rewrites the whole document.
pub trait DirectoryStore: Send + Sync {
    fn load(&self) -> Result<KnownContracts>;

    fn save(&self, doc: &KnownContracts) -> Result<()>;

    /// Identifies the underlying document; writers sharing a key are serialized.
    fn lock_key(&self) -> String;
}

/// `tokens_<network>.json` on disk. A missing file reads as an empty table.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DirectoryStore for JsonFileStore {
    fn load(&self) -> Result<KnownContracts> {
        if !self.path.exists() {
            return Ok(KnownContracts::default());
        }
        load_from_file(&self.path)
    }

    fn save(&self, doc: &KnownContracts) -> Result<()> {
        save_to_file(doc, &self.path)
    }

    fn lock_key(&self) -> String {
        // The file may not exist yet, so canonicalize the directory it lives in.
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .and_then(|p| p.canonicalize().ok());
        match (parent, self.path.file_name()) {
            (Some(dir), Some(name)) => format!("file:{}", dir.join(name).display()),
            _ => format!("file:{}", self.path.display()),
        }
    }
}

/// In-process store, for embedding and tests.
#[derive(Default)]
pub struct MemoryStore {
    doc: Mutex<KnownContracts>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        let known_contracts = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            doc: Mutex::new(KnownContracts { known_contracts }),
            saves: Mutex::new(0),
        }
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> KnownContracts {
        self.doc.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl DirectoryStore for MemoryStore {
    fn load(&self) -> Result<KnownContracts> {
        Ok(self.snapshot())
    }

    fn save(&self, doc: &KnownContracts) -> Result<()> {
        *self.doc.lock().unwrap_or_else(PoisonError::into_inner) = doc.clone();
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }

    fn lock_key(&self) -> String {
        format!("memory:{:p}", self)
    }
}

// One async lock per underlying document, shared by every directory in the process.
// Writers in other processes are not covered.
static WRITE_LOCKS: Lazy<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn write_lock(key: String) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = WRITE_LOCKS.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(key).or_default())
}

pub struct TokenDirectory {
    network: String,
    store: Arc<dyn DirectoryStore>,
    entries: RwLock<BTreeMap<String, String>>,
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl TokenDirectory {
    /// Load the table once; later reads are served from memory.
    pub fn open(network: &str, store: Arc<dyn DirectoryStore>) -> Result<Self> {
        let doc = store.load()?;
        debug!(network, aliases = doc.known_contracts.len(), "loaded token directory");
        let write_lock = write_lock(store.lock_key());
        Ok(Self {
            network: network.to_string(),
            store,
            entries: RwLock::new(doc.known_contracts),
            write_lock,
        })
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Address string for `alias`. Exact match first, then ASCII case-insensitive.
    pub fn lookup(&self, alias: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(address) = entries.get(alias) {
            return Some(address.clone());
        }
        entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(alias))
            .map(|(_, v)| v.clone())
    }

    /// Whether `address` already appears on either side of the table.
    pub fn contains_address(&self, address: &Address) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        mentions(&entries, address)
    }

    /// Write-through `alias -> address`. Last write wins; returns the address
    /// the alias pointed at before, if any.
    pub async fn record(&self, alias: &str, address: &Address) -> Result<Option<String>> {
        let _guard = self.write_lock.lock().await;
        // Re-read under the lock so concurrent writers' entries survive.
        let doc = self.store.load()?;
        self.insert_locked(doc, alias, address)
    }

    /// Record a token discovered on the ledger unless the stored document
    /// already mentions its address. Returns whether anything was written.
    pub async fn record_if_absent(&self, alias: &str, address: &Address) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let doc = self.store.load()?;
        if mentions(&doc.known_contracts, address) {
            debug!(network = %self.network, alias, address = %address, "already in token directory");
            *self.entries.write().unwrap_or_else(PoisonError::into_inner) = doc.known_contracts;
            return Ok(false);
        }
        self.insert_locked(doc, alias, address)?;
        Ok(true)
    }

    /// Caller holds `write_lock` and loaded `doc` under it.
    fn insert_locked(&self, mut doc: KnownContracts, alias: &str, address: &Address) -> Result<Option<String>> {
        let checksum = address.to_checksum(None);
        let previous = doc.known_contracts.insert(alias.to_string(), checksum.clone());
        self.store.save(&doc)?;

        match &previous {
            Some(old) if !old.eq_ignore_ascii_case(&checksum) => warn!(
                network = %self.network,
                alias,
                old = %old,
                new = %checksum,
                "alias collision, overwriting previous address"
            ),
            _ => info!(network = %self.network, alias, address = %checksum, "added contract address to token directory"),
        }

        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = doc.known_contracts;
        Ok(previous)
    }

    pub fn aliases(&self) -> BTreeMap<String, String> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

fn mentions(entries: &BTreeMap<String, String>, address: &Address) -> bool {
    let checksum = address.to_checksum(None);
    entries.iter().any(|(k, v)| {
        k.eq_ignore_ascii_case(&checksum) || parse_address(v).map(|a| a == *address).unwrap_or(false)
    })
}
