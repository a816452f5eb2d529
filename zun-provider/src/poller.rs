//! State convergence poller.
//!
//! After a create, attach or detach request the remote resource needs time to
//! settle. [`StateChangeConf::wait_for_state`] drives a [`Refresh`] strategy on
//! an exponential backoff schedule until it reports a target status, reports
//! something unexpected, fails, or the deadline passes.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::status::Convergence;

/// Spacing before the first backoff step doubles it.
const INITIAL_WAIT: Duration = Duration::from_millis(100);

/// Upper bound on backoff spacing (ignored when `min_timeout` is larger).
const MAX_WAIT: Duration = Duration::from_secs(10);

/// Stand-in for deadlines too far out to represent as an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Consecutive snapshot-less pending refreshes tolerated by default.
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// Outcome of one refresh call.
#[derive(Debug, Clone, PartialEq)]
pub struct Refreshed<T, S> {
    /// Latest view of the resource, if one could be fetched.
    pub snapshot: Option<T>,
    pub status: S,
}

impl<T, S> Refreshed<T, S> {
    pub fn new(snapshot: T, status: S) -> Self {
        Self {
            snapshot: Some(snapshot),
            status,
        }
    }

    pub fn without_snapshot(status: S) -> Self {
        Self {
            snapshot: None,
            status,
        }
    }
}

/// A check-and-advance step that reports the current status of a resource.
///
/// Implementations may have side effects (the detach flow re-issues the detach
/// request on every call) but must be safe to call repeatedly.
#[async_trait]
pub trait Refresh: Send {
    type Snapshot: Send;
    type Status: Clone + PartialEq + fmt::Display + Send + Sync;

    /// Description of the watched resource, used in timeout errors.
    fn resource(&self) -> String;

    async fn refresh(&mut self) -> Result<Refreshed<Self::Snapshot, Self::Status>>;
}

/// Parameters of one poll session.
#[derive(Debug, Clone)]
pub struct StateChangeConf<S> {
    /// Statuses that mean "keep waiting".
    pub pending: Vec<S>,
    /// Statuses that mean "done".
    pub target: Vec<S>,
    /// Overall deadline, counted from the start of the session.
    pub timeout: Duration,
    /// Wait before the first refresh.
    pub delay: Duration,
    /// Floor on the spacing between refreshes.
    pub min_timeout: Duration,
    /// Fixed spacing between refreshes, replacing the backoff.
    pub poll_interval: Option<Duration>,
    /// Pending refreshes without a snapshot allowed in a row.
    pub not_found_checks: u32,
}

impl<S> StateChangeConf<S>
where
    S: Clone + PartialEq + fmt::Display + Send + Sync,
{
    pub fn new(convergence: Convergence<S>, timeout: Duration) -> Self {
        Self {
            pending: convergence.pending,
            target: convergence.target,
            timeout,
            delay: Duration::ZERO,
            min_timeout: Duration::ZERO,
            poll_interval: None,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Option<Duration>) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Poll `refresh` until it reports a target status.
    ///
    /// Returns the snapshot from the refresh that reached the target. Refresh
    /// errors abort immediately; there is no retry beyond the poll loop.
    pub async fn wait_for_state<R>(&self, refresh: &mut R) -> Result<Option<R::Snapshot>>
    where
        R: Refresh<Status = S>,
    {
        let started = Instant::now();
        let deadline = instant_after(started, self.timeout);
        let resource = refresh.resource();
        let mut last_state = String::new();
        let mut wait = INITIAL_WAIT;
        let mut not_found = 0u32;
        let mut attempts = 0u32;

        debug!(
            resource = %resource,
            target = %self.target_names(),
            timeout_secs = self.timeout.as_secs(),
            "Waiting for state"
        );

        let first_poll = instant_after(started, self.delay);
        if !self.delay.is_zero() && !sleep_before(first_poll, deadline).await {
            return Err(self.timeout_error(&resource, &last_state));
        }

        loop {
            attempts += 1;
            let refreshed = match timeout_at(deadline, refresh.refresh()).await {
                Ok(result) => result?,
                Err(_) => return Err(self.timeout_error(&resource, &last_state)),
            };
            last_state = refreshed.status.to_string();
            trace!(resource = %resource, attempt = attempts, state = %last_state, "Refreshed");

            if self.target.contains(&refreshed.status) {
                debug!(
                    resource = %resource,
                    state = %last_state,
                    attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Reached target state"
                );
                return Ok(refreshed.snapshot);
            }

            if !self.pending.contains(&refreshed.status) {
                return Err(Error::UnexpectedState {
                    state: last_state,
                    target: self.target_names(),
                });
            }

            if refreshed.snapshot.is_none() {
                not_found += 1;
                if not_found > self.not_found_checks {
                    return Err(Error::NotFound(format!(
                        "couldn't find {} ({} retries)",
                        resource, self.not_found_checks
                    )));
                }
            } else {
                not_found = 0;
            }

            wait = self.next_wait(wait);
            trace!(resource = %resource, wait_ms = wait.as_millis() as u64, "Still pending");
            if !sleep_before(instant_after(Instant::now(), wait), deadline).await {
                return Err(self.timeout_error(&resource, &last_state));
            }
        }
    }

    fn next_wait(&self, wait: Duration) -> Duration {
        if let Some(interval) = self.poll_interval {
            return interval;
        }
        let doubled = wait.saturating_mul(2);
        if doubled < self.min_timeout {
            self.min_timeout
        } else if doubled > MAX_WAIT {
            MAX_WAIT.max(self.min_timeout)
        } else {
            doubled
        }
    }

    fn target_names(&self) -> String {
        self.target
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn timeout_error(&self, resource: &str, last_state: &str) -> Error {
        Error::Timeout {
            resource: resource.to_string(),
            last_state: last_state.to_string(),
            target: self.target_names(),
            timeout: self.timeout,
        }
    }
}

fn instant_after(base: Instant, wait: Duration) -> Instant {
    base.checked_add(wait).unwrap_or_else(|| base + FAR_FUTURE)
}

/// Sleep until `until`, or until `deadline` if that comes first.
/// Returns false when the deadline was hit.
async fn sleep_before(until: Instant, deadline: Instant) -> bool {
    if until >= deadline {
        sleep_until(deadline).await;
        return false;
    }
    sleep_until(until).await;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_data::{ResourceData, TimeoutKind, Timeouts};
    use crate::status::{ContainerOp, ContainerStatus};

    #[derive(Clone)]
    enum Step {
        Pending,
        PendingGone,
        Target,
        Other(&'static str),
        Fail,
    }

    /// Replays a fixed sequence of steps; the last step repeats forever.
    struct Script {
        steps: Vec<Step>,
        calls: usize,
        seen_at: Vec<Instant>,
    }

    impl Script {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps,
                calls: 0,
                seen_at: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Refresh for Script {
        type Snapshot = usize;
        type Status = ContainerStatus;

        fn resource(&self) -> String {
            "container test".to_string()
        }

        async fn refresh(&mut self) -> Result<Refreshed<usize, ContainerStatus>> {
            let step = self.steps[self.calls.min(self.steps.len() - 1)].clone();
            self.calls += 1;
            self.seen_at.push(Instant::now());
            match step {
                Step::Pending => Ok(Refreshed::new(self.calls, ContainerStatus::Creating)),
                Step::PendingGone => Ok(Refreshed::without_snapshot(ContainerStatus::Creating)),
                Step::Target => Ok(Refreshed::new(self.calls, ContainerStatus::Created)),
                Step::Other(s) => Ok(Refreshed::new(self.calls, ContainerStatus::from(s))),
                Step::Fail => Err(Error::Api {
                    status: 500,
                    message: "boom".to_string(),
                }),
            }
        }
    }

    fn conf(timeout: Duration) -> StateChangeConf<ContainerStatus> {
        StateChangeConf::new(ContainerOp::Create.convergence(), timeout)
            .with_min_timeout(Duration::from_secs(3))
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_then_target_calls_refresh_n_plus_one_times() {
        for n in 0..5 {
            let mut steps = vec![Step::Pending; n];
            steps.push(Step::Target);
            let mut script = Script::new(steps);

            let snapshot = conf(Duration::from_secs(600))
                .wait_for_state(&mut script)
                .await
                .unwrap();

            assert_eq!(script.calls, n + 1);
            assert_eq!(snapshot, Some(n + 1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_pending_times_out() {
        let mut script = Script::new(vec![Step::Pending]);

        let err = conf(Duration::from_secs(30))
            .wait_for_state(&mut script)
            .await
            .unwrap_err();

        match err {
            Error::Timeout {
                last_state,
                resource,
                ..
            } => {
                assert_eq!(last_state, "Creating");
                assert_eq!(resource, "container test");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(script.calls > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_state_stops_immediately() {
        let mut script = Script::new(vec![Step::Pending, Step::Other("Error"), Step::Target]);

        let err = conf(Duration::from_secs(600))
            .wait_for_state(&mut script)
            .await
            .unwrap_err();

        match err {
            Error::UnexpectedState { state, target } => {
                assert_eq!(state, "Error");
                assert_eq!(target, "Created");
            }
            other => panic!("expected unexpected state, got {other:?}"),
        }
        assert_eq!(script.calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_error_is_not_retried() {
        let mut script = Script::new(vec![Step::Fail, Step::Target]);

        let err = conf(Duration::from_secs(600))
            .wait_for_state(&mut script)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Api { status: 500, .. }));
        assert_eq!(script.calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_and_min_timeout_are_respected() {
        let mut script = Script::new(vec![Step::Pending, Step::Pending, Step::Pending, Step::Target]);
        let start = Instant::now();

        conf(Duration::from_secs(600))
            .with_delay(Duration::from_secs(10))
            .wait_for_state(&mut script)
            .await
            .unwrap();

        assert!(script.seen_at[0] - start >= Duration::from_secs(10));
        for pair in script.seen_at.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(3));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_capped() {
        let mut script = Script::new(vec![Step::Pending; 12].into_iter().chain([Step::Target]).collect());

        StateChangeConf::new(ContainerOp::Create.convergence(), Duration::from_secs(600))
            .wait_for_state(&mut script)
            .await
            .unwrap();

        for pair in script.seen_at.windows(2) {
            assert!(pair[1] - pair[0] <= MAX_WAIT);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_interval_overrides_backoff() {
        let mut script = Script::new(vec![Step::Pending, Step::Pending, Step::Target]);

        StateChangeConf::new(ContainerOp::Create.convergence(), Duration::from_secs(600))
            .with_poll_interval(Some(Duration::from_secs(1)))
            .wait_for_state(&mut script)
            .await
            .unwrap();

        for pair in script.seen_at.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_checks_exhausted() {
        let mut script = Script::new(vec![Step::PendingGone]);

        let err = conf(Duration::from_secs(3600))
            .with_not_found_checks(3)
            .wait_for_state(&mut script)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(script.calls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_longer_than_timeout() {
        let mut script = Script::new(vec![Step::Target]);

        let err = conf(Duration::from_secs(5))
            .with_delay(Duration::from_secs(10))
            .wait_for_state(&mut script)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(script.calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_still_converges() {
        let mut d = ResourceData::new();
        d.set_timeouts(Timeouts {
            create: Some(u64::MAX),
            delete: None,
        });
        let mut script = Script::new(vec![Step::Pending, Step::Target]);

        let conf = StateChangeConf::new(
            ContainerOp::Create.convergence(),
            d.timeout(TimeoutKind::Create),
        );
        let snapshot = conf
            .wait_for_state(&mut script)
            .await
            .unwrap();

        assert_eq!(snapshot, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_poll_settings_do_not_overflow() {
        let mut script = Script::new(vec![Step::Pending, Step::Target]);

        let err = StateChangeConf::new(ContainerOp::Create.convergence(), Duration::from_secs(60))
            .with_min_timeout(Duration::MAX)
            .wait_for_state(&mut script)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(script.calls, 1);

        let mut script = Script::new(vec![Step::Pending, Step::Target]);
        let err = StateChangeConf::new(ContainerOp::Create.convergence(), Duration::from_secs(60))
            .with_poll_interval(Some(Duration::MAX))
            .wait_for_state(&mut script)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[test]
    fn test_backoff_saturates() {
        let conf = StateChangeConf::new(ContainerOp::Create.convergence(), Duration::from_secs(60))
            .with_min_timeout(Duration::MAX);
        assert_eq!(conf.next_wait(Duration::MAX), Duration::MAX);
    }
}
