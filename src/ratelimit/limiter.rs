use std::fmt::Debug;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use futures::future::{self, BoxFuture, FutureExt};

use super::{Clock, RateLimitConfig, SystemClock, Throttled};

/// Phase of a [`RateLimiter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The next call will be admitted
    Idle,
    /// A call was admitted in the current window; further calls are suppressed
    CoolingDown,
}

#[derive(Debug)]
struct State {
    phase: Phase,
    window_start: Instant,
    /// Identifies the current window, so that timers and failures belonging
    /// to an earlier window cannot end a later one.
    generation: u64,
}

type SuppressedCallback = Arc<dyn Fn(Duration) + Send + Sync>;

/// Single-flight-per-window limiter.
///
/// The first call in a window runs and starts a cooldown of
/// [`RateLimitConfig::window`]. Calls made while cooling down do not run at
/// all and resolve to [`Throttled::Suppressed`] with the remaining time.
/// Excess calls are dropped, never queued.
///
/// Clones share the same window.
///
/// ```
/// use fetchtower::{ManualClock, RateLimitConfig, RateLimiter, Throttled};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() {
/// let clock = ManualClock::new();
/// let limiter = RateLimiter::with_clock(
///     RateLimitConfig::new(Duration::from_secs(60)),
///     Arc::new(clock.clone()),
/// );
///
/// let first = limiter.invoke(|| async { Ok::<_, ()>(42) }).await;
/// assert_eq!(first, Ok(Throttled::Admitted(42)));
///
/// clock.advance(Duration::from_secs(1));
/// let second = limiter.invoke(|| async { Ok::<_, ()>(43) }).await;
/// assert_eq!(second, Ok(Throttled::Suppressed { remaining: Duration::from_secs(59) }));
/// # }
/// ```
#[derive(Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<State>>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    on_suppressed: Option<SuppressedCallback>,
}

impl RateLimiter {
    /// Create a limiter on the [`SystemClock`]
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a limiter on the given clock
    #[must_use]
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let window_start = clock.now();
        Self {
            state: Arc::new(Mutex::new(State {
                phase: Phase::Idle,
                window_start,
                generation: 0,
            })),
            config,
            clock,
            on_suppressed: None,
        }
    }

    /// Call `callback` with the remaining cooldown whenever a call is suppressed
    #[must_use]
    pub fn on_suppressed(mut self, callback: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.on_suppressed = Some(Arc::new(callback));
        self
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        lock(&self.state).phase
    }

    /// The limiter's configuration
    #[must_use]
    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Attempt to run `op`.
    ///
    /// Admission is decided right here, before the returned future is polled:
    /// of two back-to-back calls only the first can be admitted. `op` itself is
    /// only called when admitted.
    ///
    /// The admitted caller receives `op`'s outcome unchanged, errors included.
    /// With [`RateLimitConfig::reset_on_success_only`], a failed outcome also
    /// ends the window immediately.
    pub fn invoke<F, Fut, T, E>(&self, op: F) -> BoxFuture<'static, Result<Throttled<T>, E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let generation = match self.try_acquire() {
            Ok(generation) => generation,
            Err(remaining) => {
                log::debug!("Call suppressed, {}ms of cooldown remaining", remaining.as_millis());
                if let Some(callback) = &self.on_suppressed {
                    callback(remaining);
                }
                return future::ready(Ok(Throttled::Suppressed { remaining })).boxed();
            }
        };

        let call = op();
        if !self.config.reset_on_success_only {
            return call.map(|result| result.map(Throttled::Admitted)).boxed();
        }

        let state = Arc::clone(&self.state);
        async move {
            let result = call.await;
            if result.is_err() && release(&state, generation) {
                log::debug!("Admitted call failed, cooldown ended early");
            }
            result.map(Throttled::Admitted)
        }
        .boxed()
    }

    /// Enter [`Phase::CoolingDown`] and arm the timer, returning the window's
    /// generation, or the remaining cooldown if a window is already running.
    fn try_acquire(&self) -> Result<u64, Duration> {
        let now = self.clock.now();
        let generation = {
            let mut state = lock(&self.state);
            if state.phase == Phase::CoolingDown {
                let elapsed = now.saturating_duration_since(state.window_start);
                return Err(self.config.window.saturating_sub(elapsed));
            }
            state.phase = Phase::CoolingDown;
            state.window_start = now;
            state.generation += 1;
            state.generation
        };

        let state: Weak<Mutex<State>> = Arc::downgrade(&self.state);
        self.clock.schedule(
            self.config.window,
            Box::new(move || {
                if let Some(state) = state.upgrade() {
                    release(&state, generation);
                }
            }),
        );
        Ok(generation)
    }
}

impl Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

/// Return to [`Phase::Idle`] if `generation` is still the current window
fn release(state: &Mutex<State>, generation: u64) -> bool {
    let mut state = lock(state);
    if state.phase == Phase::CoolingDown && state.generation == generation {
        state.phase = Phase::Idle;
        true
    } else {
        false
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
