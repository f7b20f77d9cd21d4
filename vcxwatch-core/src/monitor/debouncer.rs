//! Debouncing of relevant events into a single reconciliation trigger
//!
//! Every qualifying event re-arms one shared timer. Only the timer armed by
//! the last event in a burst fires; earlier timers are aborted, and a timer
//! that already woke up but lost the race against a re-arm sees a newer
//! generation and stays silent.

use super::classifier::Relevance;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace};

/// What the coalescer schedules
pub trait RunTrigger: Send + Sync + 'static {
    /// A run is in progress; events arriving now are its own side effects
    fn is_running(&self) -> bool;

    fn fire(&self);
}

#[derive(Debug, Clone)]
pub struct DebouncerConfig {
    /// Quiet period after a source event
    pub interval: Duration,
    /// Quiet period after a descriptor change
    pub trigger_interval: Duration,
}

impl Default for DebouncerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1500),
            trigger_interval: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalescerState {
    Idle,
    Pending { deadline: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduling {
    /// A run was in progress; nothing scheduled
    Swallowed,
    /// Timer armed; `rearmed` if it replaced a pending one
    Armed { deadline: Instant, rearmed: bool },
}

struct Pending {
    deadline: Instant,
    timer: AbortHandle,
}

#[derive(Default)]
struct Inner {
    generation: u64,
    pending: Option<Pending>,
}

pub struct Debouncer<T: RunTrigger> {
    config: DebouncerConfig,
    trigger: Arc<T>,
    inner: Arc<Mutex<Inner>>,
}

impl<T: RunTrigger> Debouncer<T> {
    pub fn new(config: DebouncerConfig, trigger: Arc<T>) -> Self {
        Self { config, trigger, inner: Arc::new(Mutex::new(Inner::default())) }
    }

    pub fn trigger(&self) -> &Arc<T> {
        &self.trigger
    }

    /// Handle a relevant, non-duplicate event. Must be called inside a tokio runtime.
    pub fn on_event(&self, relevance: Relevance) -> Scheduling {
        if self.trigger.is_running() {
            debug!("Reconciliation in progress, event swallowed");
            return Scheduling::Swallowed;
        }

        let delay = match relevance {
            Relevance::Trigger => self.config.trigger_interval,
            Relevance::Source => self.config.interval,
        };
        let deadline = Instant::now() + delay;

        // Held until the new timer is stored so it cannot observe a half-updated state
        let mut inner = lock(&self.inner);
        inner.generation += 1;
        let generation = inner.generation;

        let rearmed = match inner.pending.take() {
            Some(previous) => {
                previous.timer.abort();
                true
            }
            None => false,
        };

        let shared = self.inner.clone();
        let trigger = self.trigger.clone();
        let timer = tokio::spawn(async move {
            sleep_until(deadline).await;
            let current = {
                let mut inner = lock(&shared);
                let current = inner.generation == generation;
                if current {
                    inner.pending = None;
                }
                current
            };
            if current {
                debug!("Debounce window elapsed, triggering reconciliation");
                trigger.fire();
            } else {
                trace!("Stale debounce timer {} ignored", generation);
            }
        });
        inner.pending = Some(Pending { deadline, timer: timer.abort_handle() });

        trace!("Debounce armed for {:?} (rearmed: {})", delay, rearmed);
        Scheduling::Armed { deadline, rearmed }
    }

    pub fn state(&self) -> CoalescerState {
        match &lock(&self.inner).pending {
            Some(pending) => CoalescerState::Pending { deadline: pending.deadline },
            None => CoalescerState::Idle,
        }
    }

    /// Drop any pending trigger
    pub fn cancel(&self) {
        let mut inner = lock(&self.inner);
        inner.generation += 1;
        if let Some(pending) = inner.pending.take() {
            pending.timer.abort();
            debug!("Pending reconciliation cancelled");
        }
    }
}

impl<T: RunTrigger> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::time::sleep;

    #[derive(Default)]
    struct CountingTrigger {
        running: AtomicBool,
        fired: AtomicUsize,
    }

    impl RunTrigger for CountingTrigger {
        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn fire(&self) {
            self.fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn debouncer(interval_ms: u64, trigger_ms: u64) -> Debouncer<CountingTrigger> {
        let config = DebouncerConfig {
            interval: Duration::from_millis(interval_ms),
            trigger_interval: Duration::from_millis(trigger_ms),
        };
        Debouncer::new(config, Arc::new(CountingTrigger::default()))
    }

    fn fired(d: &Debouncer<CountingTrigger>) -> usize {
        d.trigger().fired.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_burst_fires_exactly_once() {
        let d = debouncer(100, 20);

        assert!(matches!(d.on_event(Relevance::Source), Scheduling::Armed { rearmed: false, .. }));
        for _ in 0..4 {
            sleep(Duration::from_millis(10)).await;
            assert!(matches!(
                d.on_event(Relevance::Source),
                Scheduling::Armed { rearmed: true, .. }
            ));
        }
        assert!(matches!(d.state(), CoalescerState::Pending { .. }));

        sleep(Duration::from_millis(250)).await;
        assert_eq!(fired(&d), 1);
        assert_eq!(d.state(), CoalescerState::Idle);
    }

    #[tokio::test]
    async fn test_rearm_postpones_the_trigger() {
        let d = debouncer(100, 20);

        d.on_event(Relevance::Source);
        sleep(Duration::from_millis(70)).await;
        d.on_event(Relevance::Source);
        sleep(Duration::from_millis(70)).await;
        assert_eq!(fired(&d), 0);

        sleep(Duration::from_millis(120)).await;
        assert_eq!(fired(&d), 1);
    }

    #[tokio::test]
    async fn test_events_during_run_are_swallowed() {
        let d = debouncer(30, 10);
        d.trigger().running.store(true, Ordering::SeqCst);

        assert_eq!(d.on_event(Relevance::Trigger), Scheduling::Swallowed);
        assert_eq!(d.state(), CoalescerState::Idle);

        sleep(Duration::from_millis(80)).await;
        assert_eq!(fired(&d), 0);
    }

    #[tokio::test]
    async fn test_trigger_paths_use_short_interval() {
        let d = debouncer(1000, 30);

        d.on_event(Relevance::Trigger);
        sleep(Duration::from_millis(120)).await;
        assert_eq!(fired(&d), 1);
    }

    #[tokio::test]
    async fn test_separate_bursts_fire_separately() {
        let d = debouncer(40, 10);

        d.on_event(Relevance::Source);
        sleep(Duration::from_millis(120)).await;
        d.on_event(Relevance::Source);
        sleep(Duration::from_millis(120)).await;

        assert_eq!(fired(&d), 2);
    }

    #[tokio::test]
    async fn test_cancel_drops_pending_trigger() {
        let d = debouncer(40, 10);

        d.on_event(Relevance::Source);
        d.cancel();
        assert_eq!(d.state(), CoalescerState::Idle);

        sleep(Duration::from_millis(100)).await;
        assert_eq!(fired(&d), 0);
    }
}
