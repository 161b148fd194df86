//! Waypoint Query Queues
//! Copyright (c) 2026 Mamy Ratsimbazafy
//! Licensed and distributed under either of
//!   * MIT license (license terms at the root of the package or at http://opensource.org/licenses/MIT).
//!   * Apache v2 license (license terms at the root of the package or at http://www.apache.org/licenses/LICENSE-2.0).
//! at your option. This file may not be copied, modified, or distributed except according to those terms.

//! waypoint-internals/query-queues
//! A small work queue for rate limiting external API calls, with a
//! configurable retry policy (bounded retries, exponential backoff, jitter).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::sync::{Mutex, Notify};
use tokio::time::{self, Instant};

/// Errors surfaced by the work queue
#[derive(Debug, Error)]
pub enum QueryQueueError {
    #[error("gave up after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
    #[error("queue is closed")]
    QueueClosed,
}

impl QueryQueueError {
    /// The error returned by the last attempt, if any attempt was made.
    pub fn last_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::RetriesExhausted { source, .. } => Some(source),
            Self::QueueClosed => None,
        }
    }

    pub fn into_last_error(self) -> anyhow::Error {
        match self {
            Self::RetriesExhausted { source, .. } => source,
            Self::QueueClosed => anyhow::anyhow!("queue is closed"),
        }
    }
}

/// How failed calls are retried.
///
/// The delay before retry `n` (0-based) is `initial_delay * 2^n` capped at
/// `max_delay` when `exponential` is set, plus up to `jitter_factor` of that
/// delay drawn at random.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
    pub exponential: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(30000),
            jitter_factor: 0.5,
            exponential: true,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, errors are surfaced immediately.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Exponential backoff without jitter.
    pub fn exponential(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            jitter_factor: 0.0,
            exponential: true,
        }
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.max(0.0);
        self
    }

    /// Total number of calls made before giving up.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before retry `retry_index` (0-based), before jitter.
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        if !self.exponential {
            return self.initial_delay.min(self.max_delay);
        }
        let factor = 2u32.saturating_pow(retry_index);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor == 0.0 {
            return delay;
        }

        let jitter_ms = (delay.as_millis() as f64 * self.jitter_factor) as u64;
        let rand_jitter = rand::thread_rng().gen_range(0..=jitter_ms);

        delay + Duration::from_millis(rand_jitter)
    }
}

/// Rate limiting mode
#[derive(Clone, Debug, Default)]
enum RateLimit {
    #[default]
    ConcurrencyOnly,
    Qps {
        limit: u64,
        tokens: Arc<AtomicU64>,
        last_refill: Arc<Mutex<Instant>>,
        refill_interval: Duration,
        notify: Arc<Notify>,
    },
}

/// Limits concurrent (and optionally per-second) calls to an external
/// service and retries failures according to a [`RetryPolicy`].
///
/// ```ignore
/// let airports = QueryQueue::with_qps_limit(2).with_retry_policy(RetryPolicy::none());
/// let flights = QueryQueue::with_qps_limit(2).with_retry_policy(RetryPolicy::exponential(
///     2,
///     Duration::from_secs(1),
///     Duration::from_secs(10),
/// ));
/// ```
#[derive(Clone, Debug)]
pub struct QueryQueue {
    semaphore: Arc<Semaphore>,
    retry: RetryPolicy,
    rate_limit: RateLimit,
}

impl Default for QueryQueue {
    fn default() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(4)),
            retry: RetryPolicy::default(),
            rate_limit: RateLimit::ConcurrencyOnly,
        }
    }
}

impl QueryQueue {
    /// Create a new work queue with max concurrent requests
    pub fn with_concurrency_limit(max_concurrent: u64) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent as usize)),
            ..Default::default()
        }
    }

    /// Create a new work queue with QPS limit
    pub fn with_qps_limit(qps_limit: u64) -> Self {
        let qps_limit = qps_limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(qps_limit as usize)),
            rate_limit: RateLimit::Qps {
                limit: qps_limit,
                tokens: Arc::new(AtomicU64::new(qps_limit)),
                last_refill: Arc::new(Mutex::new(Instant::now())),
                refill_interval: Duration::from_secs(1),
                notify: Arc::new(Notify::new()),
            },
            ..Default::default()
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    async fn refill_tokens(&self) {
        if let RateLimit::Qps {
            limit,
            tokens,
            last_refill,
            refill_interval,
            notify,
        } = &self.rate_limit
        {
            let mut last = last_refill.lock().await;
            let now = Instant::now();
            let elapsed = now.duration_since(*last);
            if elapsed >= *refill_interval {
                let new_tokens = (elapsed.as_secs_f64() * *limit as f64) as u64;
                if new_tokens > 0 {
                    let _ = tokens.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
                        Some(cur.saturating_add(new_tokens).min(*limit))
                    });
                    notify.notify_waiters();
                }
                *last = now;
            }
        }
    }

    async fn acquire_token(&self) {
        if let RateLimit::Qps { tokens, notify, .. } = &self.rate_limit {
            loop {
                self.refill_tokens().await;
                let available = tokens.load(Ordering::SeqCst);
                if available > 0 {
                    if tokens
                        .compare_exchange(
                            available,
                            available - 1,
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        )
                        .is_ok()
                    {
                        return;
                    }
                } else {
                    let _ = time::timeout(Duration::from_millis(100), notify.notified()).await;
                }
            }
        }
    }

    /// Run `f` under the queue's limits, retrying failures per the policy.
    ///
    /// Every attempt consumes a rate-limit token. The concurrency permit is
    /// held for the whole retry sequence.
    pub async fn with_retry<T, F, Fut>(&self, mut f: F) -> Result<T, QueryQueueError>
    where
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, anyhow::Error>> + Send,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| QueryQueueError::QueueClosed)?;

        let mut attempts = 0;
        loop {
            self.acquire_token().await;
            attempts += 1;

            match f().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempts > self.retry.max_retries {
                        return Err(QueryQueueError::RetriesExhausted {
                            attempts,
                            source: e,
                        });
                    }

                    let delay = self.retry.apply_jitter(self.retry.delay_for(attempts - 1));
                    tracing::warn!(
                        "attempt {}/{} failed ({:#}), retrying in {:?}",
                        attempts,
                        self.retry.max_attempts(),
                        e,
                        delay
                    );
                    time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_delay_schedule_doubles_and_caps() {
        let policy =
            RetryPolicy::exponential(5, Duration::from_millis(1000), Duration::from_secs(10));
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(8000));
        assert_eq!(policy.delay_for(4), Duration::from_secs(10));
        assert_eq!(policy.delay_for(40), Duration::from_secs(10));
        assert_eq!(policy.max_attempts(), 6);
    }

    #[test]
    fn test_linear_policy_keeps_initial_delay() {
        let policy = RetryPolicy {
            exponential: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(0), policy.delay_for(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let queue = QueryQueue::with_concurrency_limit(1).with_retry_policy(
            RetryPolicy::exponential(2, Duration::from_millis(1000), Duration::from_secs(10)),
        );
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result = queue
            .with_retry(move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        anyhow::bail!("transient failure {n}");
                    }
                    Ok(n)
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let queue = QueryQueue::with_concurrency_limit(1).with_retry_policy(
            RetryPolicy::exponential(2, Duration::from_millis(1000), Duration::from_secs(10)),
        );
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let err = queue
            .with_retry(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(anyhow::anyhow!("upstream down"))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match &err {
            QueryQueueError::RetriesExhausted { attempts, .. } => assert_eq!(*attempts, 3),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("upstream down"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_policy_makes_single_attempt() {
        let queue = QueryQueue::with_qps_limit(2).with_retry_policy(RetryPolicy::none());
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let started = Instant::now();
        let err = queue
            .with_retry(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(anyhow::anyhow!("bad gateway"))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(err.into_last_error().to_string(), "bad gateway");
    }

    #[tokio::test(start_paused = true)]
    async fn test_qps_limit_spreads_calls() {
        let queue = QueryQueue::with_qps_limit(1).with_retry_policy(RetryPolicy::none());
        let started = Instant::now();
        for _ in 0..3 {
            queue.with_retry(|| async { Ok(()) }).await.unwrap();
        }
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
