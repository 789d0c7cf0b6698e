//! Readiness polling with bounded backoff.

use std::time::{Duration, Instant};

use crate::error::{CompatError, Result};

use super::client::{ConnectionTarget, Database};

/// How long and how often to poll a service that is starting up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Give up after this long.
    pub timeout: Duration,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Policy with a different overall timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay before attempt `attempt + 1` (zero-based), doubling up to the cap.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Call `probe` until it succeeds or the policy's timeout elapses.
///
/// The last probe error is logged at debug level; the returned error is
/// always [`CompatError::ReadinessTimeout`].
pub fn wait_until<T, F>(service: &str, policy: &RetryPolicy, mut probe: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        match probe() {
            Ok(value) => {
                tracing::debug!(
                    "{} ready after {} attempt(s) in {:?}",
                    service,
                    attempt + 1,
                    start.elapsed()
                );
                return Ok(value);
            }
            Err(e) => {
                tracing::debug!("{} not ready (attempt {}): {}", service, attempt + 1, e);
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            return Err(CompatError::ReadinessTimeout {
                service: service.to_string(),
                waited_secs: elapsed.as_secs(),
            });
        }

        let remaining = policy.timeout - elapsed;
        std::thread::sleep(policy.delay_for(attempt).min(remaining));
        attempt += 1;
    }
}

/// Wait until a PostgreSQL (or pgBouncer) endpoint accepts a connection.
pub fn wait_for_postgres(
    db: &dyn Database,
    target: &ConnectionTarget,
    policy: &RetryPolicy,
) -> Result<()> {
    wait_until(&format!("PostgreSQL at {}", target.endpoint()), policy, || {
        db.ping(target)
    })
}

/// Wait until an HTTP endpoint answers with a success status.
pub fn wait_for_http(url: &str, policy: &RetryPolicy) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    wait_until(url, policy, || {
        let response = client.get(url).send()?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(CompatError::Other(anyhow::anyhow!(
                "{} answered {}",
                url,
                response.status()
            )))
        }
    })
}
