//! Exponential backoff for opening the event stream
//!
//! Every failed attempt waits `initial_backoff * multiplier^attempt` before
//! the next one, with the attempt counter starting at 0. There is no jitter:
//! a single daemon talks to a single Icinga2 endpoint.

use crate::{Icinga2RtError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for connect retries
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Maximum number of connection attempts (including the first)
    pub max_attempts: u32,

    /// Wait after the first failed attempt
    pub initial_backoff: Duration,

    /// Backoff multiplier (2.0 doubles the wait after every failure)
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    /// Default schedule with a different attempt budget
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Calculate backoff duration for a given (zero-based) failed attempt
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(secs)
    }
}

/// Run `operation` until it succeeds or the attempt budget is spent
///
/// # Returns
/// The first successful result, or [`Icinga2RtError::Connection`] carrying
/// the number of attempts and the last error
pub async fn with_backoff<F, Fut, T>(
    config: &BackoffConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = String::from("no connection attempt made");

    for attempt in 0..config.max_attempts {
        debug!(
            operation = operation_name,
            attempt = attempt + 1,
            max_attempts = config.max_attempts,
            "Connecting"
        );

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                last_error = e.to_string();

                if attempt + 1 >= config.max_attempts {
                    break;
                }

                let backoff = config.backoff_duration(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    backoff_secs = backoff.as_secs_f64(),
                    "Connection failed, retrying: {}",
                    e
                );
                sleep(backoff).await;
            }
        }
    }

    warn!(
        operation = operation_name,
        attempts = config.max_attempts,
        "Giving up: {}",
        last_error
    );

    Err(Icinga2RtError::Connection {
        attempts: config.max_attempts,
        last_error,
    })
}
