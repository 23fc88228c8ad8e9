use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::B256;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::gateway::{GatewayError, LedgerGateway};
use crate::models::ReceiptOutcome;

pub const DEFAULT_ATTEMPTS: u32 = 100;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Waits for a broadcast transaction to land. The transaction is never
/// touched; giving up only stops this process from watching it.
pub struct ReceiptPoller {
    gateway: Arc<dyn LedgerGateway>,
    attempts: u32,
    interval: Duration,
    timeout: Option<Duration>,
}

impl ReceiptPoller {
    pub fn new(gateway: Arc<dyn LedgerGateway>) -> Self {
        Self {
            gateway,
            attempts: DEFAULT_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
            timeout: None,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Overall deadline; polling stops with `TimedOut` once it passes.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Poll until a receipt shows up, the attempts run out, the deadline
    /// passes or `cancel` fires. Cancellation and the deadline also interrupt
    /// a receipt query that is still in flight. A pending transaction is not
    /// an error; any gateway failure is.
    pub async fn poll(&self, tx_hash: B256, cancel: &CancellationToken) -> Result<ReceiptOutcome, GatewayError> {
        let start = Instant::now();
        let deadline = self.timeout.map(|t| start + t);

        for attempt in 1..=self.attempts {
            let found = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(canceled(tx_hash, start)),
                _ = sleep_until(deadline) => break,
                result = self.gateway.get_receipt(tx_hash) => result?,
            };
            if let Some(receipt) = found {
                let elapsed = start.elapsed();
                info!(%tx_hash, block = ?receipt.block_number, success = receipt.success, ?elapsed, "transaction confirmed");
                return Ok(ReceiptOutcome::Confirmed { receipt, elapsed });
            }
            debug!(%tx_hash, attempt, "receipt not found yet");

            let wake = match deadline {
                Some(deadline) if Instant::now() + self.interval > deadline => deadline,
                _ => Instant::now() + self.interval,
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(canceled(tx_hash, start)),
                _ = tokio::time::sleep_until(wake) => {}
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
        }

        let elapsed = start.elapsed();
        warn!(%tx_hash, ?elapsed, "no receipt yet, the transaction may still confirm");
        Ok(ReceiptOutcome::TimedOut { elapsed })
    }
}

fn canceled(tx_hash: B256, start: Instant) -> ReceiptOutcome {
    info!(%tx_hash, "stopped waiting for receipt");
    ReceiptOutcome::Canceled { elapsed: start.elapsed() }
}

/// Resolves at `deadline`, never when there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{receipt, tx_hash, MockGateway};

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_hundred_attempts() {
        let gateway = Arc::new(MockGateway::new());
        let poller = ReceiptPoller::new(gateway.clone());

        let outcome = poller.poll(tx_hash(1), &CancellationToken::new()).await.unwrap();
        match outcome {
            ReceiptOutcome::TimedOut { elapsed } => {
                assert!(elapsed >= Duration::from_secs(99));
                assert!(elapsed <= Duration::from_secs(101));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(gateway.receipt_queries(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirms_as_soon_as_receipt_appears() {
        let hash = tx_hash(2);
        let gateway = Arc::new(MockGateway::new().with_receipts(vec![Ok(None), Ok(None), Ok(Some(receipt(hash)))]));
        let outcome = ReceiptPoller::new(gateway.clone())
            .poll(hash, &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.is_confirmed());
        assert_eq!(outcome.receipt().unwrap().transaction_hash, hash);
        assert_eq!(outcome.elapsed(), Duration::from_secs(2));
        assert_eq!(gateway.receipt_queries(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gateway_failure_aborts() {
        let gateway = Arc::new(MockGateway::new().with_receipts(vec![
            Ok(None),
            Err(GatewayError::Transport("connection refused".into())),
        ]));
        let err = ReceiptPoller::new(gateway.clone())
            .poll(tx_hash(3), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
        assert_eq!(gateway.receipt_queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_polling() {
        let gateway = Arc::new(MockGateway::new());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(4_500)).await;
            trigger.cancel();
        });

        let outcome = ReceiptPoller::new(gateway.clone()).poll(tx_hash(4), &cancel).await.unwrap();
        assert!(matches!(outcome, ReceiptOutcome::Canceled { .. }));
        assert_eq!(outcome.elapsed(), Duration::from_millis(4_500));
        assert_eq!(gateway.receipt_queries(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cuts_polling_short() {
        let gateway = Arc::new(MockGateway::new());
        let outcome = ReceiptPoller::new(gateway.clone())
            .with_timeout(Some(Duration::from_secs(10)))
            .poll(tx_hash(5), &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, ReceiptOutcome::TimedOut { .. }));
        assert_eq!(outcome.elapsed(), Duration::from_secs(10));
        assert_eq!(gateway.receipt_queries(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_hanging_receipt_query() {
        let gateway = Arc::new(MockGateway::new().with_receipt_delay(Duration::from_secs(3600)));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let outcome = ReceiptPoller::new(gateway.clone())
            .with_timeout(Some(Duration::from_secs(10)))
            .poll(tx_hash(6), &cancel)
            .await
            .unwrap();
        assert!(matches!(outcome, ReceiptOutcome::Canceled { .. }));
        assert_eq!(outcome.elapsed(), Duration::from_secs(1));
        assert_eq!(gateway.receipt_queries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_hanging_receipt_query() {
        let gateway = Arc::new(MockGateway::new().with_receipt_delay(Duration::from_secs(3600)));
        let outcome = ReceiptPoller::new(gateway.clone())
            .with_timeout(Some(Duration::from_secs(10)))
            .poll(tx_hash(7), &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, ReceiptOutcome::TimedOut { .. }));
        assert_eq!(outcome.elapsed(), Duration::from_secs(10));
        assert_eq!(gateway.receipt_queries(), 1);
    }
}
