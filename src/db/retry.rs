use std::{fmt::Display, future::Future, time::Duration};

use tokio::time;
use tracing::{error, info};

/// Decides how long to wait before the next attempt. Policies never give up;
/// callers that need a cap wrap the whole retry in a timeout.
pub trait RetryPolicy {
    /// `attempt` is the 1-based number of the attempt that just failed.
    fn next_delay(&mut self, attempt: u32) -> Duration;
}

/// Constant wait between attempts, no growth and no cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedInterval {
    delay: Duration,
}

impl FixedInterval {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl RetryPolicy for FixedInterval {
    fn next_delay(&mut self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Runs `attempt_fn` until it succeeds, logging every failure and sleeping for
/// whatever `policy` says in between. Only returns on success.
pub async fn retry<T, E, F, Fut>(
    policy: &mut impl RetryPolicy,
    target: &str,
    mut attempt_fn: F,
) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        match attempt_fn().await {
            Ok(value) => return value,
            Err(e) => {
                error!(attempt, error = %e, "Could not connect to {target}");
                let delay = policy.next_delay(attempt);
                info!(delay_secs = delay.as_secs_f64(), "Retrying in {} seconds...", delay.as_secs());
                time::sleep(delay).await;
            }
        }
    }
}
