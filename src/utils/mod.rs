use std::str::FromStr;

use alloy_primitives::U256;
use anyhow::{anyhow, Result};
use tracing::warn;

pub fn remove_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url[..url.len() - 1].to_string()
    } else {
        url.to_string()
    }
}

/// Decimal or `0x` hex, as aggregator APIs mix both.
pub fn parse_u256_any(value: &str) -> Result<U256> {
    U256::from_str(value).map_err(|e| anyhow!("invalid integer {}: {}", value, e))
}

/// Retry `f` with exponential backoff while `is_transient` says the error is worth retrying.
///
/// Only for read-only calls. Anything that moves funds goes out exactly once.
pub async fn retry<T, E, F, Fut, P>(mut retries: u32, base_delay_ms: u64, is_transient: P, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Debug,
{
    let mut attempt = 0u32;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if retries == 0 || !is_transient(&e) => return Err(e),
            Err(e) => {
                // base_delay * 2^attempt, capped at 30s
                let delay = (base_delay_ms * (1u64 << attempt.min(5))).min(30_000);
                warn!(attempt = attempt + 1, error = ?e, delay_ms = delay, "read failed, retrying");
                tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
                retries -= 1;
                attempt += 1;
            }
        }
    }
}
