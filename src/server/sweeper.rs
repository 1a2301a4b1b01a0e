use crate::application_impl::RefreshTokenLedger;
use crate::application_port::AuthError;
use crate::infra_memory::MemoryRevocationStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const MAX_BATCHES_PER_TICK: usize = 16;

/// Periodically deletes refresh records past their expiry. Expired records
/// are already unusable; this only keeps the ledger from growing forever.
pub struct LedgerSweeper {
    ledger: Arc<RefreshTokenLedger>,
    memory_revocations: Option<Arc<MemoryRevocationStore>>,
    interval: Duration,
    batch: u32,
    cancellation_token: CancellationToken,
}

impl LedgerSweeper {
    pub fn new(
        ledger: Arc<RefreshTokenLedger>,
        memory_revocations: Option<Arc<MemoryRevocationStore>>,
        interval: Duration,
        batch: u32,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            ledger,
            memory_revocations,
            interval,
            batch,
            cancellation_token,
        }
    }

    pub async fn tick_once(&self) -> Result<u64, AuthError> {
        if let Some(store) = &self.memory_revocations {
            store.evict_expired();
        }

        let mut purged = 0;
        for _ in 0..MAX_BATCHES_PER_TICK {
            let n = self.ledger.purge_expired(self.batch).await?;
            purged += n;
            if n < u64::from(self.batch) {
                break;
            }
        }
        Ok(purged)
    }

    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("ledger sweeper shutting down...");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick_once().await {
                        Ok(0) => {}
                        Ok(purged) => tracing::info!(purged, "expired refresh records purged"),
                        Err(e) => tracing::error!(error = %e, "ledger sweep failed"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_port::RefreshToken;
    use crate::domain_model::{RefreshRecordId, UserId};
    use crate::domain_port::Clock;
    use crate::infra_memory::{ManualClock, MemoryRefreshTokenRepo};
    use chrono::Utc;

    #[tokio::test]
    async fn purges_in_batches_until_nothing_is_left() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let repo = Arc::new(MemoryRefreshTokenRepo::new());
        let ledger = Arc::new(RefreshTokenLedger::new(
            repo.clone(),
            clock.clone(),
            Duration::from_secs(1),
        ));
        let owner = UserId::new();
        let now = clock.now();
        for i in 0..5 {
            ledger
                .create_record(
                    RefreshRecordId::new(),
                    owner,
                    &RefreshToken(format!("t{i}")),
                    now,
                    now + chrono::Duration::hours(1),
                )
                .await
                .unwrap();
        }
        clock.advance(chrono::Duration::hours(2));

        let sweeper = LedgerSweeper::new(
            ledger,
            None,
            Duration::from_secs(60),
            2,
            CancellationToken::new(),
        );
        assert_eq!(sweeper.tick_once().await.unwrap(), 5);
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn run_returns_once_cancelled() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let ledger = Arc::new(RefreshTokenLedger::new(
            Arc::new(MemoryRefreshTokenRepo::new()),
            clock,
            Duration::from_secs(1),
        ));
        let cancel = CancellationToken::new();
        let sweeper = LedgerSweeper::new(ledger, None, Duration::from_millis(10), 100, cancel.clone());

        let handle = tokio::spawn(async move { sweeper.run().await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
