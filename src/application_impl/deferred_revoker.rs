use super::RefreshTokenLedger;
use crate::domain_model::RefreshRecordId;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;

/// Revokes rotated-out refresh records once their grace window has passed.
///
/// Best effort only: a lost task leaves the record to the lazy grace check in
/// [`crate::domain_model::RefreshTokenRecord::state`].
pub struct DeferredRevoker {
    ledger: Arc<RefreshTokenLedger>,
    tracker: TaskTracker,
}

impl DeferredRevoker {
    pub fn new(ledger: Arc<RefreshTokenLedger>) -> Self {
        DeferredRevoker {
            ledger,
            tracker: TaskTracker::new(),
        }
    }

    pub fn schedule(&self, record_id: RefreshRecordId, replaced_by: RefreshRecordId, delay: Duration) {
        let ledger = self.ledger.clone();
        self.tracker.spawn(async move {
            tokio::time::sleep(delay).await;
            match ledger.revoke(record_id, Some(replaced_by)).await {
                Ok(Some(_)) => {
                    tracing::debug!(%record_id, "deferred revocation applied");
                }
                Ok(None) => {
                    tracing::debug!(%record_id, "deferred revocation: record already gone");
                }
                Err(e) => {
                    tracing::warn!(%record_id, error = %e, "deferred revocation failed");
                }
            }
        });
    }

    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Stops accepting work and waits up to `limit` for scheduled revocations.
    pub async fn drain(&self, limit: Duration) -> bool {
        self.tracker.close();
        tokio::time::timeout(limit, self.tracker.wait()).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_port::RefreshToken;
    use crate::domain_model::{RecordState, UserId};
    use crate::domain_port::Clock;
    use crate::infra_memory::{ManualClock, MemoryRefreshTokenRepo};
    use chrono::Utc;

    #[tokio::test]
    async fn revokes_after_the_delay_and_tolerates_missing_records() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let repo = Arc::new(MemoryRefreshTokenRepo::new());
        let ledger = Arc::new(RefreshTokenLedger::new(repo, clock.clone(), Duration::from_secs(1)));
        let now = clock.now();
        let record = ledger
            .create_record(
                RefreshRecordId::new(),
                UserId::new(),
                &RefreshToken("old".into()),
                now,
                now + chrono::Duration::days(1),
            )
            .await
            .unwrap();
        let next = RefreshRecordId::new();

        let revoker = DeferredRevoker::new(ledger.clone());
        revoker.schedule(record.id, next, Duration::from_millis(20));
        revoker.schedule(RefreshRecordId::new(), next, Duration::from_millis(20));
        assert_eq!(revoker.pending(), 2);

        let stored = ledger.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored.state(now), RecordState::Active);

        assert!(revoker.drain(Duration::from_secs(2)).await);
        let stored = ledger.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored.state(now), RecordState::Revoked);
        assert_eq!(stored.replaced_by, Some(next));
    }
}
