//! Periodic background search
//!
//! One spawned task per owner, driven by a `tokio::time::Interval`. The task
//! only holds a weak reference to its owner, so dropping the owner ends the
//! loop at the next tick.

use std::ops::ControlFlow;
use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Work run on every tick
#[async_trait]
pub(crate) trait SearchTask: Send + Sync + 'static {
    /// Run one iteration; `Break` ends the loop
    async fn run_iteration(&self) -> ControlFlow<()>;
}

pub(crate) struct RetryScheduler {
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RetryScheduler {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: Mutex::new(None),
        }
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the loop, first tick after `initial_delay`.
    ///
    /// Returns false without spawning if a loop is already running.
    pub(crate) fn start<T: SearchTask>(&self, owner: Weak<T>, initial_delay: Duration) -> bool {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::warn!("retry loop already running, refusing to start a second one");
            return false;
        }

        let period = self.interval;
        tracing::debug!(
            interval_ms = period.as_millis() as u64,
            initial_delay_ms = initial_delay.as_millis() as u64,
            "starting retry loop"
        );

        let first_tick = Instant::now() + initial_delay;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(owner) = owner.upgrade() else {
                    tracing::debug!("retry loop owner dropped");
                    break;
                };
                if owner.run_iteration().await.is_break() {
                    break;
                }
            }
        }));
        true
    }

    /// Forget the running task without aborting it.
    ///
    /// Called from inside the loop right before it ends, so a new loop can
    /// be started while the old one unwinds.
    pub(crate) fn detach(&self) {
        self.task.lock().take();
    }

    /// Abort the running loop, if any
    pub(crate) fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for RetryScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingTask {
        scheduler: RetryScheduler,
        ticks: AtomicU32,
        stop_after: u32,
        seen_at: parking_lot::Mutex<Vec<Instant>>,
    }

    impl CountingTask {
        fn new(interval_ms: u64, stop_after: u32) -> Arc<Self> {
            Arc::new(Self {
                scheduler: RetryScheduler::new(Duration::from_millis(interval_ms)),
                ticks: AtomicU32::new(0),
                stop_after,
                seen_at: parking_lot::Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SearchTask for CountingTask {
        async fn run_iteration(&self) -> ControlFlow<()> {
            self.seen_at.lock().push(Instant::now());
            let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
            if tick >= self.stop_after {
                self.scheduler.detach();
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_cadence() {
        let task = CountingTask::new(250, 4);
        let started = Instant::now();

        assert!(task.scheduler.start(Arc::downgrade(&task), Duration::ZERO));
        sleep_ms(2_000).await;

        let offsets: Vec<u128> = task
            .seen_at
            .lock()
            .iter()
            .map(|at| (*at - started).as_millis())
            .collect();
        assert_eq!(offsets, vec![0, 250, 500, 750]);
        assert!(!task.scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_delay() {
        let task = CountingTask::new(100, 1);
        task.scheduler
            .start(Arc::downgrade(&task), Duration::from_millis(300));

        sleep_ms(250).await;
        assert_eq!(task.ticks.load(Ordering::SeqCst), 0);

        sleep_ms(100).await;
        assert_eq!(task.ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refuses_second_loop() {
        let task = CountingTask::new(250, u32::MAX);

        assert!(task.scheduler.start(Arc::downgrade(&task), Duration::ZERO));
        assert!(!task.scheduler.start(Arc::downgrade(&task), Duration::ZERO));
        assert!(task.scheduler.is_running());

        task.scheduler.stop();
        tokio::task::yield_now().await;
        assert!(!task.scheduler.is_running());
        assert!(task.scheduler.start(Arc::downgrade(&task), Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_ticks() {
        let task = CountingTask::new(250, u32::MAX);
        task.scheduler.start(Arc::downgrade(&task), Duration::ZERO);
        sleep_ms(600).await;
        let before = task.ticks.load(Ordering::SeqCst);

        task.scheduler.stop();
        sleep_ms(2_000).await;

        assert_eq!(task.ticks.load(Ordering::SeqCst), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_ends_when_owner_dropped() {
        let scheduler = RetryScheduler::new(Duration::from_millis(50));
        let task = CountingTask::new(50, u32::MAX);
        assert!(scheduler.start(Arc::downgrade(&task), Duration::ZERO));
        sleep_ms(10).await;

        drop(task);
        sleep_ms(100).await;
        sleep_ms(100).await;

        assert!(!scheduler.is_running());
    }
}
