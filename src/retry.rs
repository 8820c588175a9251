//! Retry with exponential backoff and jitter for transient I/O.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// Run `op` up to `max_attempts` times, backing off exponentially with
/// a little jitter between attempts. Only errors the caller classifies
/// as transient are retried.
pub(crate) async fn with_backoff<T, E, Fut>(
    label: &str,
    max_attempts: u32,
    base_delay: Duration,
    is_transient: impl Fn(&E) -> bool,
    mut op: impl FnMut() -> Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && is_transient(&e) => {
                let backoff = base_delay * 2u32.saturating_pow(attempt - 1);
                let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..100));
                warn!(
                    op = label,
                    attempt,
                    error = %e,
                    backoff_ms = (backoff + jitter).as_millis() as u64,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(backoff + jitter).await;
            }
            Err(e) => return Err(e),
        }
    }
}
