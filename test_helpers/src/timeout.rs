//! Asserts a future resolves within a bound, so a deadlocked retry loop
//! fails a test instead of hanging CI.

use std::future::Future;
use std::time::Duration;

/// Awaits `fut`, panicking if it does not complete within `timeout`.
pub async fn timeout<F: Future>(timeout: Duration, fut: F) -> F::Output {
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or_else(|_| panic!("future did not complete within {timeout:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_future_completes() {
        let v = timeout(Duration::from_millis(50), async { 1 + 1 }).await;
        assert_eq!(v, 2);
    }

    #[tokio::test]
    #[should_panic(expected = "did not complete")]
    async fn pending_future_panics() {
        timeout(Duration::from_millis(10), std::future::pending::<()>()).await;
    }
}
