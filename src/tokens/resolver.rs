use std::sync::Arc;

use tracing::debug;

use super::TokenDirectory;
use crate::config::NativeAsset;
use crate::error::{SwapError, SwapResult};
use crate::gateway::{GatewayError, LedgerGateway};
use crate::models::{parse_address, TokenInfo, TokenRef};

/// Turns a user's token reference into canonical identity and metadata.
pub struct TokenResolver {
    gateway: Arc<dyn LedgerGateway>,
    directory: Arc<TokenDirectory>,
    native: NativeAsset,
}

impl TokenResolver {
    pub fn new(gateway: Arc<dyn LedgerGateway>, directory: Arc<TokenDirectory>, native: NativeAsset) -> Self {
        Self {
            gateway,
            directory,
            native,
        }
    }

    pub fn directory(&self) -> &TokenDirectory {
        &self.directory
    }

    fn candidate(&self, token: &TokenRef) -> SwapResult<String> {
        match token {
            TokenRef::Address(address) => Ok(address.clone()),
            TokenRef::Alias(alias) => {
                if let Some(address) = self.directory.lookup(alias) {
                    return Ok(address);
                }
                if alias.eq_ignore_ascii_case(&self.native.symbol) {
                    return Ok(self.native.marker.to_checksum(None));
                }
                Err(SwapError::UnknownToken {
                    alias: alias.clone(),
                    network: self.directory.network().to_string(),
                })
            }
        }
    }

    /// Resolve `token`. Unknown addresses are looked up on the ledger and
    /// recorded in the directory under their on-chain symbol.
    pub async fn resolve(&self, token: &TokenRef) -> SwapResult<TokenInfo> {
        let candidate = self.candidate(token)?;
        let address = parse_address(&candidate)?;

        if address == self.native.marker {
            debug!(token = %token, "resolved native asset");
            return Ok(TokenInfo::native(address, &self.native.symbol));
        }

        let checksum = address.to_checksum(None);
        let contract_call = |call: &'static str| {
            let address = checksum.clone();
            move |source: GatewayError| SwapError::ContractCallFailed {
                address,
                call,
                source,
            }
        };
        let (symbol, decimals) = tokio::try_join!(
            async { self.gateway.get_symbol(address).await.map_err(contract_call("symbol()")) },
            async { self.gateway.get_decimals(address).await.map_err(contract_call("decimals()")) },
        )?;

        if !self.directory.contains_address(&address) {
            self.directory.record_if_absent(&symbol, &address).await?;
        }

        let info = TokenInfo::new(address, &symbol, decimals);
        debug!(token = %token, resolved = %info, "resolved token");
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{native_weth, MockGateway, USDC, WETH};
    use crate::tokens::MemoryStore;
    use alloy_primitives::address;

    fn resolver(gateway: Arc<MockGateway>, store: Arc<MemoryStore>) -> TokenResolver {
        let directory = Arc::new(TokenDirectory::open("ethereum", store).unwrap());
        TokenResolver::new(gateway, directory, native_weth())
    }

    #[tokio::test]
    async fn test_known_native_alias_needs_no_ledger_call() {
        let gateway = Arc::new(MockGateway::new());
        let store = Arc::new(MemoryStore::new(&[("WETH", WETH)]));
        let resolver = resolver(gateway.clone(), store.clone());

        let info = resolver.resolve(&TokenRef::parse("WETH")).await.unwrap();
        assert_eq!(info.symbol, "WETH");
        assert_eq!(info.decimals, 18);
        assert_eq!(info.checksum(), WETH);
        assert!(info.is_native);
        assert_eq!(gateway.total_calls(), 0);
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let gateway = Arc::new(MockGateway::new().with_token(USDC, "USDC", 6));
        let store = Arc::new(MemoryStore::new(&[("WETH", WETH), ("USDC", USDC)]));
        let resolver = resolver(gateway, store.clone());

        let first = resolver.resolve(&TokenRef::parse("usdc")).await.unwrap();
        let second = resolver.resolve(&TokenRef::parse("USDC")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.checksum(), USDC);
        assert_eq!(first.decimals, 6);
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn test_unknown_address_is_recorded_once() {
        let uni = "0x1f9840a85d5aF5bf1D1762F925BDADdC4201F984";
        let gateway = Arc::new(MockGateway::new().with_token(uni, "UNI", 18));
        let store = Arc::new(MemoryStore::new(&[("WETH", WETH)]));
        let resolver = resolver(gateway, store.clone());

        resolver.resolve(&TokenRef::parse(uni)).await.unwrap();
        resolver.resolve(&TokenRef::parse(uni)).await.unwrap();
        resolver.resolve(&TokenRef::parse("uni")).await.unwrap();

        assert_eq!(store.saves(), 1);
        assert_eq!(
            store.snapshot().known_contracts.get("UNI").map(String::as_str),
            Some(uni)
        );
    }

    #[tokio::test]
    async fn test_concurrent_resolutions_write_once() {
        let uni = "0x1f9840a85d5aF5bf1D1762F925BDADdC4201F984";
        let gateway = Arc::new(MockGateway::new().with_token(uni, "UNI", 18));
        let store = Arc::new(MemoryStore::new(&[("WETH", WETH)]));
        let resolver = resolver(gateway, store.clone());

        let token = TokenRef::parse(uni);
        let (a, b) = tokio::join!(resolver.resolve(&token), resolver.resolve(&token));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(store.saves(), 1);
    }

    #[tokio::test]
    async fn test_unknown_alias() {
        let resolver = resolver(Arc::new(MockGateway::new()), Arc::new(MemoryStore::new(&[])));
        let err = resolver.resolve(&TokenRef::parse("PEPE")).await.unwrap_err();
        assert!(matches!(err, SwapError::UnknownToken { .. }));
    }

    #[tokio::test]
    async fn test_native_symbol_resolves_without_directory_entry() {
        let gateway = Arc::new(MockGateway::new());
        let resolver = resolver(gateway.clone(), Arc::new(MemoryStore::new(&[])));
        let info = resolver.resolve(&TokenRef::parse("weth")).await.unwrap();
        assert!(info.is_native);
        assert_eq!(gateway.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_address_vs_failed_call() {
        let broken = "0x00000000000000000000000000000000deadbeef";
        let gateway = Arc::new(MockGateway::new().with_failing_token(
            broken,
            GatewayError::Reverted("not a token".to_string()),
        ));
        let resolver = resolver(gateway, Arc::new(MemoryStore::new(&[("BAD", "0x1234")])));

        let err = resolver.resolve(&TokenRef::parse("BAD")).await.unwrap_err();
        assert!(matches!(err, SwapError::InvalidAddress { .. }));

        let err = resolver.resolve(&TokenRef::parse(broken)).await.unwrap_err();
        assert!(matches!(err, SwapError::ContractCallFailed { .. }));
    }

    #[tokio::test]
    async fn test_discovered_symbol_overwrites_existing_alias() {
        let impostor = address!("00000000000000000000000000000000000000aa");
        let gateway = Arc::new(MockGateway::new().with_token(&impostor.to_checksum(None), "USDC", 6));
        let store = Arc::new(MemoryStore::new(&[("USDC", USDC)]));
        let resolver = resolver(gateway, store.clone());

        resolver
            .resolve(&TokenRef::Address(impostor.to_checksum(None)))
            .await
            .unwrap();
        assert_eq!(
            store.snapshot().known_contracts.get("USDC"),
            Some(&impostor.to_checksum(None))
        );
    }
}
