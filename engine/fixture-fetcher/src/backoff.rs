//! Bounded retry for rate-limited requests.
//!
//! The retry loop is an explicit state machine so the number of attempts and
//! the waits between them can be checked in tests without sleeping for real.

use crate::config::RetryConfig;
use std::time::Duration;

/// How long and how often to retry after a 429
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl From<&RetryConfig> for BackoffPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_secs(config.initial_delay_secs),
            max_delay: Duration::from_secs(config.max_delay_secs),
            multiplier: config.backoff_multiplier,
        }
    }
}

impl BackoffPolicy {
    /// Exponential wait after the given failed attempt (1-based), capped
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Server-advised wait when present, exponential otherwise; never above the ceiling
    pub fn delay_for(&self, attempt: u32, advised: Option<Duration>) -> Duration {
        match advised {
            Some(advised) => advised.min(self.max_delay),
            None => self.exponential_delay(attempt),
        }
    }
}

/// State of one request's retry loop
#[derive(Debug, Clone, PartialEq)]
pub enum RetryState<T> {
    /// About to send attempt `n` (1-based)
    Attempting(u32),
    /// Attempt `attempt` was rate limited; wait `delay` before the next one
    Waiting { attempt: u32, delay: Duration },
    /// Gave up; the request yields no data
    Failed,
    Succeeded(T),
}

/// What a single attempt produced
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome<T> {
    Success(T),
    /// HTTP 429, with the server-advised wait if one was sent
    RateLimited(Option<Duration>),
    /// Any other failure; not retried
    Failure(String),
}

impl<T> RetryState<T> {
    /// Initial state
    pub fn start() -> Self {
        RetryState::Attempting(1)
    }

    /// Transition after an attempt finished
    pub fn on_outcome(attempt: u32, outcome: AttemptOutcome<T>, policy: &BackoffPolicy) -> Self {
        match outcome {
            AttemptOutcome::Success(value) => RetryState::Succeeded(value),
            AttemptOutcome::Failure(_) => RetryState::Failed,
            AttemptOutcome::RateLimited(_) if attempt >= policy.max_attempts => RetryState::Failed,
            AttemptOutcome::RateLimited(advised) => RetryState::Waiting {
                attempt,
                delay: policy.delay_for(attempt, advised),
            },
        }
    }

    /// Transition after the wait elapsed
    pub fn after_wait(self) -> Self {
        match self {
            RetryState::Waiting { attempt, .. } => RetryState::Attempting(attempt + 1),
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Failed | RetryState::Succeeded(_))
    }
}

/// Sleep abstraction so tests can observe waits instead of performing them
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Drive the retry state machine until it reaches a terminal state.
///
/// `attempt` performs one try. Terminates after at most `policy.max_attempts`
/// calls to `attempt`.
pub async fn run_with_backoff<T, F, Fut>(
    policy: &BackoffPolicy,
    sleeper: &dyn Sleeper,
    mut attempt: F,
) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = AttemptOutcome<T>>,
{
    let mut state = RetryState::start();
    loop {
        state = match state {
            RetryState::Attempting(n) => {
                let outcome = attempt(n).await;
                if let AttemptOutcome::Failure(reason) = &outcome {
                    tracing::debug!("Attempt {} failed without retry: {}", n, reason);
                }
                RetryState::on_outcome(n, outcome, policy)
            }
            RetryState::Waiting { attempt: n, delay } => {
                tracing::warn!("Rate limited on attempt {}, retrying in {:?}", n, delay);
                sleeper.sleep(delay).await;
                RetryState::Waiting { attempt: n, delay }.after_wait()
            }
            RetryState::Succeeded(value) => return Some(value),
            RetryState::Failed => return None,
        };
    }
}
