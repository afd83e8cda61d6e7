//! Completion waiter for asynchronous operations.
//!
//! Actions such as start, stop and clone are accepted by the service before
//! they take effect. [`wait_for`] observes a resource repeatedly until a
//! target predicate holds, the caller's deadline passes, or an observation
//! fails.
//!
//! The deadline is enforced cooperatively. A [`TimeoutWatcher`] task flips a
//! flag once the timeout elapses and the flag is only consulted after each
//! observation completes, so an observation that is already in flight is never
//! interrupted. Each observation is a full round-trip to the service; that
//! latency is the polling cadence, optionally stretched by
//! [`WaitOptions::poll_interval`].

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Deadline and cadence of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaitOptions {
    /// Deadline; zero waits unboundedly
    pub timeout: Duration,
    /// Extra delay between observations
    pub poll_interval: Duration,
}

impl WaitOptions {
    /// Options with the given deadline and no extra delay.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: Duration::ZERO,
        }
    }

    /// Options without a deadline.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Set the extra delay between observations.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// True when no deadline applies.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.timeout.is_zero()
    }
}

/// Something whose current state can be fetched again.
#[async_trait]
pub trait Observe: Send {
    /// State produced by one observation.
    type State: Send;

    /// Fetch the current state, updating any local snapshot.
    async fn observe(&mut self) -> Result<Self::State>;
}

/// Adapter turning an async closure into an [`Observe`] implementation.
pub struct FnObserver<F> {
    f: F,
}

/// Wrap a closure returning a future as an observer.
pub fn from_fn<F, Fut, S>(f: F) -> FnObserver<F>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<S>> + Send,
    S: Send,
{
    FnObserver { f }
}

#[async_trait]
impl<F, Fut, S> Observe for FnObserver<F>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<S>> + Send,
    S: Send,
{
    type State = S;

    async fn observe(&mut self) -> Result<S> {
        (self.f)().await
    }
}

/// Background deadline flag for one wait.
///
/// The watcher task sleeps for the timeout and then sets the flag. Dropping
/// the watcher sends the cancellation signal, so the task exits promptly even
/// when the wait finishes early.
#[derive(Debug)]
pub struct TimeoutWatcher {
    expired: Arc<AtomicBool>,
    cancel: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TimeoutWatcher {
    /// Arm a watcher; returns `None` for a zero timeout.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn arm(timeout: Duration) -> Option<Self> {
        if timeout.is_zero() {
            return None;
        }

        let expired = Arc::new(AtomicBool::new(false));
        let (cancel, cancelled) = oneshot::channel::<()>();
        let flag = Arc::clone(&expired);
        let handle = tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(timeout) => flag.store(true, Ordering::SeqCst),
                _ = cancelled => {}
            }
        });

        Some(Self {
            expired,
            cancel: Some(cancel),
            handle: Some(handle),
        })
    }

    /// True once the deadline has passed.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    /// True once the watcher task has exited, by deadline or cancellation.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel the watcher task.
    pub fn disarm(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            // The task may already have finished on its own.
            let _ = cancel.send(());
        }
    }
}

impl Drop for TimeoutWatcher {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Observe until `is_target` holds, the deadline passes, or an observation fails.
///
/// A failed observation aborts the wait immediately; nothing is retried.
///
/// # Errors
///
/// Returns the observation error unchanged, or [`Error::OperationTimeout`]
/// when the deadline passes before the target state is seen.
pub async fn wait_for<O, P>(observer: &mut O, is_target: P, options: WaitOptions) -> Result<O::State>
where
    O: Observe + ?Sized,
    P: Fn(&O::State) -> bool + Send,
{
    let started = Instant::now();
    let mut watcher = TimeoutWatcher::arm(options.timeout);
    let mut polls: u32 = 0;

    loop {
        let state = observer.observe().await?;
        polls += 1;

        if is_target(&state) {
            debug!(polls, elapsed = ?started.elapsed(), "wait reached target state");
            if let Some(watcher) = watcher.as_mut() {
                watcher.disarm();
            }
            return Ok(state);
        }

        if watcher.as_ref().is_some_and(TimeoutWatcher::expired) {
            warn!(polls, timeout = ?options.timeout, "wait timed out");
            return Err(Error::OperationTimeout(format!(
                "target state not reached within {:?} ({polls} polls)",
                options.timeout
            )));
        }

        if options.poll_interval.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(options.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, Request, Response, Transport};
    use reqwest::StatusCode;
    use std::sync::atomic::AtomicU32;

    struct Counter {
        polls: u32,
        delay: Duration,
    }

    #[async_trait]
    impl Observe for Counter {
        type State = u32;

        async fn observe(&mut self) -> Result<u32> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.polls += 1;
            Ok(self.polls)
        }
    }

    fn counter(delay: Duration) -> Counter {
        Counter { polls: 0, delay }
    }

    #[tokio::test]
    async fn returns_first_target_state() {
        let mut observer = counter(Duration::ZERO);
        let state = wait_for(&mut observer, |n| *n == 5, WaitOptions::new(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(state, 5);
        assert_eq!(observer.polls, 5);
    }

    #[tokio::test]
    async fn unbounded_wait_keeps_polling() {
        let mut observer = counter(Duration::from_millis(2));
        let state = wait_for(&mut observer, |n| *n == 20, WaitOptions::unbounded())
            .await
            .unwrap();
        assert_eq!(state, 20);
    }

    #[tokio::test]
    async fn observation_error_aborts_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let mut observer = from_fn(move || {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(Error::Transport("connection reset".into()))
            }
        });

        let err = wait_for(&mut observer, |_| false, WaitOptions::new(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert_eq!(err, Error::Transport("connection reset".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn times_out_within_bounded_margin() {
        let mut observer = counter(Duration::from_millis(10));
        let started = Instant::now();
        let err = tokio_test::assert_err!(
            wait_for(&mut observer, |_| false, WaitOptions::new(Duration::from_millis(100))).await
        );
        let elapsed = started.elapsed();

        assert!(err.is_timeout());
        assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(400), "{elapsed:?}");
    }

    #[tokio::test]
    async fn in_flight_observation_is_not_interrupted() {
        // The deadline passes while the only observation is still running;
        // its result is still inspected.
        let mut observer = counter(Duration::from_millis(150));
        let state = wait_for(&mut observer, |n| *n == 1, WaitOptions::new(Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(state, 1);
    }

    #[tokio::test]
    async fn wait_stays_pending_during_observation() {
        let mut observer = counter(Duration::from_millis(40));
        let mut wait = tokio_test::task::spawn(wait_for(
            &mut observer,
            |n| *n == 1,
            WaitOptions::unbounded(),
        ));
        tokio_test::assert_pending!(wait.poll());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(wait.is_woken());
        let state = tokio_test::assert_ready_ok!(wait.poll());
        assert_eq!(state, 1);
    }

    #[tokio::test]
    async fn poll_interval_spaces_observations() {
        let mut observer = counter(Duration::ZERO);
        let options = WaitOptions::new(Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(30));
        let started = Instant::now();
        wait_for(&mut observer, |n| *n == 3, options).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn watcher_sets_flag_after_timeout() {
        let watcher = TimeoutWatcher::arm(Duration::from_millis(20)).unwrap();
        assert!(!watcher.expired());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(watcher.expired());
    }

    #[tokio::test]
    async fn disarmed_watcher_task_exits_early() {
        let mut watcher = TimeoutWatcher::arm(Duration::from_secs(60)).unwrap();
        assert!(!watcher.is_finished());
        watcher.disarm();

        let exited = tokio::time::timeout(Duration::from_millis(200), async {
            while !watcher.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(exited.is_ok(), "watcher task still pending after cancel");
        assert!(!watcher.expired());
    }

    #[tokio::test]
    async fn dropped_watcher_task_exits_early() {
        let mut watcher = TimeoutWatcher::arm(Duration::from_secs(60)).unwrap();
        let handle = watcher.handle.take().unwrap();
        drop(watcher);

        let joined = tokio::time::timeout(Duration::from_millis(200), handle).await;
        assert!(joined.is_ok(), "watcher task still pending after cancel");
    }

    #[test]
    fn zero_timeout_arms_nothing() {
        assert!(TimeoutWatcher::arm(Duration::ZERO).is_none());
        assert!(WaitOptions::unbounded().is_unbounded());
    }

    #[tokio::test]
    async fn observes_through_transport() {
        let mut transport = MockTransport::new();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        transport.expect_send().times(3).returning(move |_| {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            let status = if n < 2 { "starting" } else { "running" };
            Ok(Response::new(
                StatusCode::OK,
                format!(r#"{{"uuid":"u1","status":"{status}"}}"#),
            ))
        });

        let transport = Arc::new(transport);
        let mut observer = from_fn(move || {
            let transport = Arc::clone(&transport);
            async move {
                let response = transport.send(Request::get("servers/u1/")).await?;
                let value: serde_json::Value = response.json()?;
                Ok(value["status"].as_str().unwrap_or_default().to_string())
            }
        });

        let status = wait_for(
            &mut observer,
            |s: &String| s == "running",
            WaitOptions::new(Duration::from_secs(1)),
        )
        .await
        .unwrap();
        assert_eq!(status, "running");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
