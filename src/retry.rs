//! Retry with exponential backoff and jitter
//!
//! Every platform call goes through [`with_retry`]. Failures are classified by
//! a predicate (default [`is_retryable_error`]); retryable ones are retried
//! after a delay of `min(initial * 2^attempt, max)` perturbed by up to
//! `±delay * jitter`.

use crate::error::{Error, Result};
use rand::Rng;
use regex::Regex;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Predicate deciding whether an error is worth another attempt
pub type RetryPredicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Observer called before each retry with (attempt number, error, delay)
pub type RetryObserver = Arc<dyn Fn(u32, &Error, Duration) + Send + Sync>;

/// Source of uniform random numbers in `[0, 1)`
pub type RandomSource = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Retry configuration
#[derive(Clone)]
pub struct RetryOptions {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap on the un-jittered delay
    pub max_delay: Duration,
    /// Jitter fraction (0.1 = ±10%)
    pub jitter: f64,
    /// Deadline around the whole retry loop
    pub deadline: Option<Duration>,
    /// Retryability predicate
    pub should_retry: RetryPredicate,
    /// Per-retry observer
    pub on_retry: Option<RetryObserver>,
    /// Random source for jitter
    pub random: RandomSource,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            jitter: 0.1,
            deadline: None,
            should_retry: Arc::new(is_retryable_error),
            on_retry: None,
            random: Arc::new(|| rand::thread_rng().r#gen::<f64>()),
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl RetryOptions {
    /// Options that never retry
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Replace the random source (tests use a fixed value)
    #[must_use]
    pub fn with_random(mut self, random: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        self.random = Arc::new(random);
        self
    }

    /// Replace the retryability predicate
    #[must_use]
    pub fn with_predicate(mut self, predicate: impl Fn(&Error) -> bool + Send + Sync + 'static) -> Self {
        self.should_retry = Arc::new(predicate);
        self
    }

    /// Install a per-retry observer
    #[must_use]
    pub fn with_observer(
        mut self,
        observer: impl Fn(u32, &Error, Duration) + Send + Sync + 'static,
    ) -> Self {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    /// Delay before retry number `attempt + 1`
    pub fn backoff(&self, attempt: u32) -> Duration {
        calculate_backoff(
            attempt,
            self.initial_delay,
            self.max_delay,
            self.jitter,
            (self.random)(),
        )
    }
}

/// Compute the backoff delay for a zero-based `attempt`
///
/// `random` must lie in `[0, 1)`; 0.5 yields the un-jittered delay.
pub fn calculate_backoff(
    attempt: u32,
    initial_delay: Duration,
    max_delay: Duration,
    jitter: f64,
    random: f64,
) -> Duration {
    let initial_ms = initial_delay.as_millis() as f64;
    let max_ms = max_delay.as_millis() as f64;
    let exponential = initial_ms * 2f64.powi(attempt.min(62).try_into().unwrap_or(i32::MAX));
    let delay = exponential.min(max_ms);

    let jitter_range = delay * jitter;
    let jittered = random.mul_add(jitter_range * 2.0, delay - jitter_range);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Duration::from_millis(jittered.max(0.0).round() as u64)
}

static NETWORK_MARKERS: &[&str] = &[
    "econnreset",
    "econnrefused",
    "etimedout",
    "enotfound",
    "eai_again",
    "socket hang up",
    "connection reset",
    "connection refused",
    "timed out",
    "timeout",
    "dns error",
];

static STATUS_IN_MESSAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{3})\b").expect("hardcoded status regex is valid"));

const fn is_retryable_status(status: u16) -> bool {
    status == 429 || (status >= 500 && status <= 599)
}

/// Default retryability predicate
///
/// - network-class errors are always retryable
/// - errors with a status are retryable only on 5xx or 429
/// - otherwise an HTTP error status found in the message decides
/// - failing that, network wording in the message makes it retryable
pub fn is_retryable_error(error: &Error) -> bool {
    if error.is_network() {
        return true;
    }
    if let Some(status) = error.status() {
        return is_retryable_status(status);
    }

    let message = error.to_string().to_ascii_lowercase();
    let status = STATUS_IN_MESSAGE
        .captures_iter(&message)
        .filter_map(|c| c.get(1)?.as_str().parse::<u16>().ok())
        .find(|status| (400..=599).contains(status));
    match status {
        Some(status) => is_retryable_status(status),
        None => NETWORK_MARKERS.iter().any(|m| message.contains(m)),
    }
}

/// Run `operation` until it succeeds, fails fatally, or retries run out
///
/// The last error is returned unchanged. With a deadline set the whole loop
/// is bounded and expiry yields [`Error::Timeout`].
pub async fn with_retry<T, F, Fut>(options: &RetryOptions, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match options.deadline {
        Some(deadline) => tokio::time::timeout(deadline, retry_loop(options, operation))
            .await
            .map_err(|_| Error::Timeout(deadline))?,
        None => retry_loop(options, operation).await,
    }
}

async fn retry_loop<T, F, Fut>(options: &RetryOptions, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < options.max_retries && (options.should_retry)(&e) => {
                let delay = options.backoff(attempt);
                attempt += 1;
                warn!(attempt, delay_ms = delay.as_millis(), error = %e, "retrying");
                if let Some(observer) = &options.on_retry {
                    observer(attempt, &e, delay);
                }
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                debug!(attempt, error = %e, "giving up");
                return Err(e);
            }
        }
    }
}
