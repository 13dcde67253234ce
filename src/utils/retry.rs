// Retry with exponential backoff

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Run `operation`, retrying up to `max_retries` times while `should_retry` accepts the error.
///
/// The delay doubles after each failed attempt, starting from `base_delay` (capped at 32x).
pub async fn with_retry<F, Fut, T, E, R>(
    mut operation: F,
    max_retries: u32,
    base_delay: Duration,
    should_retry: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if attempt >= max_retries || !should_retry(&error) {
                    return Err(error);
                }
                attempt += 1;

                let delay = base_delay * 2u32.pow((attempt - 1).min(5));
                warn!(attempt, max_retries, delay_ms = delay.as_millis() as u64, error = %error, "Retrying after failure");
                sleep(delay).await;
            }
        }
    }
}
