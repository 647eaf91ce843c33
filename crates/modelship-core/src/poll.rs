//! Fixed-interval status polling.
//!
//! The remote platform runs jobs and endpoint rollouts asynchronously; callers
//! observe progress by describing the resource until it reaches a terminal
//! state. [`poll_until`] drives that loop for any probe:
//!
//! ```ignore
//! let polled = poll_until(&PollPolicy::default(), "describe_job", || async {
//!     let job = api.describe(&name).await?;
//!     Ok::<_, Error>(if job.done { Probe::Ready(job) } else { Probe::Pending(job.state) })
//! })
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::DEFAULT_POLL_INTERVAL_SECS;

/// How often to probe, and for how long.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between consecutive probes.
    pub interval: Duration,
    /// Give up once this much time has passed (None = poll forever).
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            deadline: None,
        }
    }
}

impl PollPolicy {
    /// Poll forever at the given interval.
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    /// Deadline derived from a remote runtime budget plus a local margin.
    pub fn for_budget(interval: Duration, budget: Duration, margin: Duration) -> Self {
        Self {
            interval,
            deadline: Some(budget.saturating_add(margin)),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T> {
    /// Not terminal yet; the label is the remote state, for logging.
    Pending(String),
    /// Terminal; stop polling.
    Ready(T),
}

/// A terminal value and how long it took to observe.
#[derive(Debug, Clone, PartialEq)]
pub struct Polled<T> {
    pub value: T,
    pub polls: u32,
    pub waited: Duration,
}

#[derive(Error, Debug)]
pub enum PollError<E> {
    /// The probe itself failed; not retried.
    #[error("{0}")]
    Probe(E),

    #[error("gave up after {polls} polls ({waited:?})")]
    TimedOut { polls: u32, waited: Duration },
}

/// Probe until a terminal value is observed or the deadline passes.
///
/// Probes once immediately, then once per `policy.interval`. Returns on the
/// first `Probe::Ready` without sleeping again. A probe error ends the loop.
pub async fn poll_until<T, E, F, Fut>(
    policy: &PollPolicy,
    operation_name: &str,
    mut probe: F,
) -> Result<Polled<T>, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>, E>>,
{
    let started = Instant::now();
    let mut polls = 0u32;

    loop {
        polls += 1;

        let state = match probe().await.map_err(PollError::Probe)? {
            Probe::Ready(value) => {
                let waited = started.elapsed();
                debug!(
                    operation = %operation_name,
                    polls = polls,
                    waited_secs = waited.as_secs(),
                    "Reached terminal state"
                );
                return Ok(Polled {
                    value,
                    polls,
                    waited,
                });
            }
            Probe::Pending(state) => state,
        };

        let waited = started.elapsed();
        if let Some(deadline) = policy.deadline {
            if waited >= deadline {
                warn!(
                    operation = %operation_name,
                    polls = polls,
                    waited_secs = waited.as_secs(),
                    state = %state,
                    "Local deadline passed before a terminal state"
                );
                return Err(PollError::TimedOut { polls, waited });
            }
        }

        debug!(
            operation = %operation_name,
            poll = polls,
            state = %state,
            next_in_secs = policy.interval.as_secs(),
            "Still waiting"
        );

        tokio::time::sleep(policy.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn every_30s() -> PollPolicy {
        PollPolicy::unbounded(Duration::from_secs(30))
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_immediately_never_sleeps() {
        let started = Instant::now();
        let polled = poll_until(&every_30s(), "op", || async {
            Ok::<_, String>(Probe::Ready(7))
        })
        .await
        .unwrap();

        assert_eq!(polled.value, 7);
        assert_eq!(polled.polls, 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_pending() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let started = Instant::now();

        let polled = poll_until(&every_30s(), "op", move || {
            let n = c.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Ok::<_, String>(Probe::Pending("INPROGRESS".into()))
                } else {
                    Ok(Probe::Ready("done"))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(polled.value, "done");
        assert_eq!(polled.polls, 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        // Two sleeps between three probes, none after the terminal one.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(60) && elapsed < Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_stops_loop() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result: Result<Polled<()>, _> = poll_until(&every_30s(), "op", move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<Probe<()>, _>("connection reset") }
        })
        .await;

        assert!(matches!(result, Err(PollError::Probe("connection reset"))));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_times_out() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let policy = every_30s().with_deadline(Duration::from_secs(60));

        let result: Result<Polled<()>, PollError<String>> = poll_until(&policy, "op", move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok(Probe::Pending("INPROGRESS".into())) }
        })
        .await;

        match result {
            Err(PollError::TimedOut { polls, waited }) => {
                assert_eq!(polls, 3);
                assert!(waited >= Duration::from_secs(60));
            }
            other => panic!("expected timeout, got {:?}", other.map(|p| p.polls)),
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_policy_for_budget() {
        let policy = PollPolicy::for_budget(
            Duration::from_secs(30),
            Duration::from_secs(900),
            Duration::from_secs(300),
        );
        assert_eq!(policy.deadline, Some(Duration::from_secs(1200)));
        assert_eq!(PollPolicy::default().deadline, None);
    }

    #[test]
    fn test_policy_for_huge_budget_saturates() {
        let policy = PollPolicy::for_budget(Duration::from_secs(30), Duration::MAX, Duration::from_secs(300));
        assert_eq!(policy.deadline, Some(Duration::MAX));
    }
}
