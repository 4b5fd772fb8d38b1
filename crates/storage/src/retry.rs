//! Fixed-delay retry for connection establishment

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Keep calling `attempt` until it succeeds, sleeping `delay` after every
/// failure.
///
/// There is no attempt cap and the delay never grows.
pub async fn retry_forever<T, E, F, Fut>(delay: Duration, target: &str, mut attempt: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempts: u64 = 0;
    loop {
        attempts += 1;
        info!("Connecting to {} (attempt {})", target, attempts);

        match attempt().await {
            Ok(value) => {
                info!("{} connection successful", target);
                return value;
            }
            Err(e) => {
                warn!(
                    "{} connection failed: {}. Retrying in {}s",
                    target,
                    e,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
