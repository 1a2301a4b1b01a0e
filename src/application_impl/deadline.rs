use crate::application_port::AuthError;
use std::future::Future;
use std::time::Duration;

/// Runs a call to an external collaborator under a caller-side deadline.
pub async fn bounded<T, F>(limit: Duration, what: &'static str, fut: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, AuthError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AuthError::Timeout(what)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_results() {
        let ok = bounded(Duration::from_secs(1), "noop", async { Ok::<_, AuthError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);
        let err = bounded(Duration::from_secs(1), "noop", async {
            Err::<(), _>(AuthError::TokenInvalid)
        })
        .await;
        assert!(matches!(err, Err(AuthError::TokenInvalid)));
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, AuthError>(())
        };
        let err = bounded(Duration::from_millis(10), "store.get", slow).await;
        assert!(matches!(err, Err(AuthError::Timeout("store.get"))));
    }
}
