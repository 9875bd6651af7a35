//! Tag-retry under concurrency (spec.md §4.2): exponential backoff starting
//! at 50 ms, doubling, capped at 500 ms, max 3 retries.

use std::time::Duration;

use crate::error::OciError;

pub const INITIAL_BACKOFF: Duration = Duration::from_millis(50);
pub const MAX_BACKOFF: Duration = Duration::from_millis(500);
pub const MAX_RETRIES: u32 = 3;

pub async fn retry_tag<F, Fut>(mut attempt: F) -> Result<(), OciError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(), OciError>>,
{
    let mut backoff = INITIAL_BACKOFF;
    let mut tries = 0;
    loop {
        match attempt().await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && tries < MAX_RETRIES => {
                tries += 1;
                tracing::warn!(attempt = tries, backoff_ms = backoff.as_millis() as u64, "tag retry");
                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn s6_tag_retry_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let result = retry_tag(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(OciError::TransientNetwork("not yet consistent".into()))
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_stops_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result = retry_tag(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(OciError::TransientNetwork("still failing".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_RETRIES + 1);
    }
}
