//! Time sources for the [`crate::RateLimiter`].
//!
//! The limiter needs exactly two things from its host: the current time and a
//! one-shot timer. [`SystemClock`] provides both on top of tokio, while
//! [`ManualClock`] lets tests and simulations move time forward explicitly.

use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Callback run once when a scheduled timer fires
pub type TimerCallback = Box<dyn FnOnce() + Send>;

/// Source of time and one-shot timers
pub trait Clock: Send + Sync + Debug {
    /// Current time
    fn now(&self) -> Instant;

    /// Run `callback` once, `after` from now
    fn schedule(&self, after: Duration, callback: TimerCallback);
}

/// Wall clock with timers running on the current tokio runtime.
///
/// Outside of a runtime, timers fall back to a detached thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn schedule(&self, after: Duration, callback: TimerCallback) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                tokio::time::sleep(after).await;
                callback();
            });
        } else {
            log::trace!("No tokio runtime, scheduling timer on a thread");
            std::thread::spawn(move || {
                std::thread::sleep(after);
                callback();
            });
        }
    }
}

struct PendingTimer {
    deadline: Instant,
    seq: u64,
    callback: TimerCallback,
}

impl Debug for PendingTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTimer")
            .field("deadline", &self.deadline)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct ManualState {
    now: Instant,
    next_seq: u64,
    timers: Vec<PendingTimer>,
}

/// A clock that only moves when told to.
///
/// Timers fire during [`ManualClock::advance`], in deadline order, and each
/// observes [`Clock::now`] equal to its own deadline. All clones share the
/// same time and timers.
///
/// ```
/// use fetchtower::{Clock, ManualClock};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&fired);
/// clock.schedule(Duration::from_secs(1), Box::new(move || flag.store(true, Ordering::SeqCst)));
///
/// clock.advance(Duration::from_millis(999));
/// assert!(!fired.load(Ordering::SeqCst));
/// clock.advance(Duration::from_millis(1));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    /// Create a clock starting at the current instant
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now: Instant::now(),
                next_seq: 0,
                timers: Vec::new(),
            })),
        }
    }

    /// Move time forward by `by`, firing every timer that becomes due
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now + by;
        // Callbacks run without the lock held, they may schedule new timers.
        while let Some(callback) = self.pop_due(target) {
            callback();
        }
        let mut state = self.lock();
        state.now = state.now.max(target);
    }

    /// Number of timers that have not fired yet
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.lock().timers.len()
    }

    fn pop_due(&self, target: Instant) -> Option<TimerCallback> {
        let mut state = self.lock();
        let index = state
            .timers
            .iter()
            .enumerate()
            .filter(|(_, timer)| timer.deadline <= target)
            .min_by_key(|(_, timer)| (timer.deadline, timer.seq))
            .map(|(index, _)| index)?;
        let timer = state.timers.swap_remove(index);
        state.now = state.now.max(timer.deadline);
        Some(timer.callback)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.lock().now
    }

    fn schedule(&self, after: Duration, callback: TimerCallback) {
        let mut state = self.lock();
        let timer = PendingTimer {
            deadline: state.now + after,
            seq: state.next_seq,
            callback,
        };
        state.next_seq += 1;
        state.timers.push(timer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        let start = clock.now();

        clock.advance(Duration::from_secs(10));
        assert_eq!(clock.now(), start + Duration::from_secs(10));
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let clock = ManualClock::new();
        let start = clock.now();
        let fired = Arc::new(Mutex::new(Vec::new()));

        for (name, millis) in [("late", 300), ("early", 100), ("middle", 200)] {
            let fired = Arc::clone(&fired);
            let observer = clock.clone();
            clock.schedule(
                Duration::from_millis(millis),
                Box::new(move || fired.lock().unwrap().push((name, observer.now() - start))),
            );
        }

        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.pending_timers(), 1);
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.pending_timers(), 0);

        assert_eq!(
            *fired.lock().unwrap(),
            vec![
                ("early", Duration::from_millis(100)),
                ("middle", Duration::from_millis(200)),
                ("late", Duration::from_millis(300)),
            ]
        );
        assert_eq!(clock.now(), start + Duration::from_millis(500));
    }

    #[test]
    fn test_timer_scheduled_from_callback() {
        let clock = ManualClock::new();
        let fired = Arc::new(AtomicBool::new(false));

        let inner_clock = clock.clone();
        let inner_fired = Arc::clone(&fired);
        clock.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                inner_clock.schedule(
                    Duration::from_millis(10),
                    Box::new(move || inner_fired.store(true, Ordering::SeqCst)),
                );
            }),
        );

        clock.advance(Duration::from_millis(20));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_system_clock_timer() {
        let (send, recv) = tokio::sync::oneshot::channel();
        SystemClock.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                let _ = send.send(());
            }),
        );
        tokio::time::timeout(Duration::from_secs(1), recv)
            .await
            .expect("timer did not fire")
            .unwrap();
    }
}
