#![forbid(unsafe_code)]

//! Animation scheduler: a repeating timer driving the program's
//! `animation()` hook.
//!
//! # How it works
//!
//! Enabling the scheduler spawns one timer thread. The thread sleeps on a
//! condition variable until the next tick is due, then invokes the callback.
//! Changing the delay notifies the thread, which recomputes the due time from
//! its last firing, so a new period applies immediately.
//!
//! # Invariants
//!
//! 1. A timer exists iff the scheduler is enabled.
//! 2. Redundant enable/disable calls are no-ops.
//! 3. The callback never runs concurrently with itself: a gate shared by
//!    every timer this scheduler ever starts is held while it runs.
//! 4. Ticks that fall due while the callback is still running are skipped and
//!    counted, never queued.
//! 5. Enable, disable and delay changes serialize on one state lock.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use stagehand_core::error::{ProgramError, panic_message};

/// Frame delay used until configured otherwise (50 frames per second).
pub const DEFAULT_DELAY_MS: u64 = 20;

/// Callback invoked on every tick.
pub type AnimationCallback = Arc<dyn Fn() + Send + Sync>;

/// Delay in milliseconds that produces `fps` frames per second.
///
/// `fps` must be positive; the result is never below 1.
#[inline]
pub fn delay_for_fps(fps: u32) -> u64 {
    (1000 / u64::from(fps.max(1))).max(1)
}

/// Counters describing the scheduler's activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnimationStats {
    /// Callback invocations.
    pub fired: u64,
    /// Ticks dropped because the callback was still running.
    pub skipped: u64,
    /// Timer threads started over the scheduler's lifetime.
    pub timers_started: u64,
}

#[derive(Default)]
struct Counters {
    fired: AtomicU64,
    skipped: AtomicU64,
    timers_started: AtomicU64,
}

struct TimerState {
    stopped: bool,
    period: Duration,
}

struct TimerControl {
    state: Mutex<TimerState>,
    cvar: Condvar,
}

impl TimerControl {
    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop(&self) {
        let mut state = self.lock();
        state.stopped = true;
        self.cvar.notify_all();
    }

    fn set_period(&self, period: Duration) {
        let mut state = self.lock();
        state.period = period;
        self.cvar.notify_all();
    }
}

/// A running timer thread.
struct TimerHandle {
    control: Arc<TimerControl>,
    thread: Option<JoinHandle<()>>,
}

impl TimerHandle {
    fn spawn(
        name: &str,
        period: Duration,
        callback: AnimationCallback,
        gate: Arc<Mutex<()>>,
        counters: Arc<Counters>,
    ) -> Result<Self, ProgramError> {
        let control = Arc::new(TimerControl {
            state: Mutex::new(TimerState {
                stopped: false,
                period,
            }),
            cvar: Condvar::new(),
        });
        let thread_control = Arc::clone(&control);
        let thread = thread::Builder::new()
            .name(format!("{name}-timer"))
            .spawn(move || timer_loop(&thread_control, &callback, &gate, &counters))
            .map_err(|err| ProgramError::WorkerLaunch {
                message: format!("animation timer: {err}"),
            })?;
        Ok(Self {
            control,
            thread: Some(thread),
        })
    }

    /// Stop the timer and wait for its thread, unless called from it.
    fn cancel(mut self) {
        self.control.stop();
        if let Some(handle) = self.thread.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        // Signal only. A callback may still be running on the timer thread;
        // `cancel` is the variant that waits for it.
        self.control.stop();
    }
}

fn timer_loop(
    control: &TimerControl,
    callback: &AnimationCallback,
    gate: &Mutex<()>,
    counters: &Counters,
) {
    tracing::debug!("animation timer started");
    let mut last_fire = Instant::now();
    let mut state = control.lock();
    loop {
        if state.stopped {
            break;
        }
        let due = last_fire + state.period;
        let now = Instant::now();
        if now < due {
            state = control
                .cvar
                .wait_timeout(state, due - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
            continue;
        }
        drop(state);

        match gate.try_lock() {
            Ok(_guard) => invoke(callback, counters),
            Err(TryLockError::Poisoned(poisoned)) => {
                let _guard = poisoned.into_inner();
                invoke(callback, counters);
            }
            Err(TryLockError::WouldBlock) => {
                counters.skipped.fetch_add(1, Ordering::Relaxed);
            }
        }

        let finished = Instant::now();
        state = control.lock();
        let period = state.period.max(Duration::from_millis(1));
        last_fire = if finished >= due + period {
            let missed = (finished - due).as_nanos() / period.as_nanos();
            counters
                .skipped
                .fetch_add(u64::try_from(missed).unwrap_or(u64::MAX), Ordering::Relaxed);
            finished
        } else {
            due
        };
    }
    tracing::debug!(
        fired = counters.fired.load(Ordering::Relaxed),
        skipped = counters.skipped.load(Ordering::Relaxed),
        "animation timer stopped"
    );
}

fn invoke(callback: &AnimationCallback, counters: &Counters) {
    counters.fired.fetch_add(1, Ordering::Relaxed);
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback())) {
        tracing::error!(
            panic = %panic_message(payload.as_ref()),
            "animation callback panicked"
        );
    }
}

struct AnimationState {
    delay_ms: u64,
    timer: Option<TimerHandle>,
}

/// Repeating timer invoking one callback at a configurable period.
pub struct AnimationScheduler {
    name: String,
    state: Mutex<AnimationState>,
    callback: AnimationCallback,
    gate: Arc<Mutex<()>>,
    counters: Arc<Counters>,
}

impl AnimationScheduler {
    /// Create a disabled scheduler with the default delay.
    pub fn new(callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self::with_callback("stagehand-animation", Arc::new(callback))
    }

    /// Create a disabled scheduler whose timer threads use `name`.
    pub fn with_callback(name: impl Into<String>, callback: AnimationCallback) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(AnimationState {
                delay_ms: DEFAULT_DELAY_MS,
                timer: None,
            }),
            callback,
            gate: Arc::new(Mutex::new(())),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Turn the repeating timer on or off.
    ///
    /// Enabling fails with `WorkerLaunch` only if the timer thread cannot be
    /// created, in which case the scheduler stays disabled.
    pub fn set_enabled(&self, enabled: bool) -> Result<(), ProgramError> {
        let stale = {
            let mut state = self.lock();
            if enabled {
                if state.timer.is_some() {
                    return Ok(());
                }
                let timer = TimerHandle::spawn(
                    &self.name,
                    Duration::from_millis(state.delay_ms),
                    Arc::clone(&self.callback),
                    Arc::clone(&self.gate),
                    Arc::clone(&self.counters),
                )?;
                self.counters.timers_started.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(delay_ms = state.delay_ms, "animation enabled");
                state.timer = Some(timer);
                None
            } else {
                let stale = state.timer.take();
                if stale.is_some() {
                    tracing::debug!("animation disabled");
                }
                stale
            }
        };
        if let Some(timer) = stale {
            timer.cancel();
        }
        Ok(())
    }

    /// Same as `set_enabled(true)`.
    pub fn start(&self) -> Result<(), ProgramError> {
        self.set_enabled(true)
    }

    /// Same as `set_enabled(false)`.
    pub fn stop(&self) {
        // Disabling never spawns, so it cannot fail.
        let _ = self.set_enabled(false);
    }

    /// Disable without waiting for a callback in flight to return.
    ///
    /// The timer thread exits after its current callback, if any.
    pub fn halt(&self) {
        let stale = self.lock().timer.take();
        if stale.is_some() {
            tracing::debug!("animation halted");
        }
        drop(stale);
    }

    /// Whether the timer is running.
    pub fn is_enabled(&self) -> bool {
        self.lock().timer.is_some()
    }

    /// Set the delay between frames. An active timer adopts it immediately.
    pub fn set_delay(&self, delay_ms: i64) -> Result<(), ProgramError> {
        let delay = u64::try_from(delay_ms)
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| {
                ProgramError::invalid(
                    "animation delay",
                    format!("{delay_ms}; must be a positive integer"),
                )
            })?;
        let mut state = self.lock();
        if state.delay_ms != delay {
            state.delay_ms = delay;
            if let Some(timer) = &state.timer {
                timer.control.set_period(Duration::from_millis(delay));
            }
            tracing::trace!(delay_ms = delay, "animation delay changed");
        }
        Ok(())
    }

    /// Delay between frames in milliseconds.
    pub fn delay(&self) -> u64 {
        self.lock().delay_ms
    }

    /// Set the delay to produce `fps` frames per second; `0` stops animation.
    ///
    /// This does not start a stopped animation.
    pub fn set_frames_per_second(&self, fps: i64) -> Result<(), ProgramError> {
        if fps < 0 {
            return Err(ProgramError::invalid(
                "frames per second",
                format!("{fps}; must be non-negative"),
            ));
        }
        if fps == 0 {
            self.stop();
            return Ok(());
        }
        let fps = u32::try_from(fps).unwrap_or(u32::MAX);
        self.set_delay(i64::try_from(delay_for_fps(fps)).unwrap_or(1))
    }

    /// Activity counters.
    pub fn stats(&self) -> AnimationStats {
        AnimationStats {
            fired: self.counters.fired.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            timers_started: self.counters.timers_started.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AnimationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AnimationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("AnimationScheduler")
            .field("name", &self.name)
            .field("enabled", &state.timer.is_some())
            .field("delay_ms", &state.delay_ms)
            .finish()
    }
}

impl Drop for AnimationScheduler {
    fn drop(&mut self) {
        let timer = self.lock().timer.take();
        if let Some(timer) = timer {
            timer.cancel();
        }
    }
}
