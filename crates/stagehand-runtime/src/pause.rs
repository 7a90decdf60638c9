#![forbid(unsafe_code)]

//! Cooperative pause and kill control.
//!
//! Every blocking wait in user logic goes through [`PauseControl::pause`].
//! That makes `pause` the checkpoint where the kill flag is observed, and the
//! place where a controller can slow time down, freeze it, or single-step it.
//!
//! # Time scaling
//!
//! | `scale_factor` | `pause(ms)` blocks for |
//! |----------------|------------------------|
//! | `1.0` | `ms` |
//! | `0.5` | `ms / 2` |
//! | `0.0` | until a tick is requested or the factor becomes nonzero |
//!
//! # Invariants
//!
//! 1. Once killed, always killed: `pause` and `check_kill` fail with
//!    [`ProgramError::Killed`] forever after.
//! 2. The kill flag is checked before and after every wait, and a kill wakes
//!    in-flight waits immediately.
//! 3. A tick releases at most one indefinite pause.
//! 4. Leaving scale `0.0` wakes every thread parked in an indefinite pause.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use stagehand_core::error::ProgramError;

/// Re-check period of an indefinite pause.
pub const INDEFINITE_POLL: Duration = Duration::from_millis(250);

#[derive(Debug)]
struct PauseState {
    scale_factor: f64,
    tick_requested: bool,
}

/// Time scale, single-step tick and kill flag shared by a program's threads.
#[derive(Debug)]
pub struct PauseControl {
    state: Mutex<PauseState>,
    wake: Condvar,
    killed: AtomicBool,
}

impl Default for PauseControl {
    fn default() -> Self {
        Self {
            state: Mutex::new(PauseState {
                scale_factor: 1.0,
                tick_requested: false,
            }),
            wake: Condvar::new(),
            killed: AtomicBool::new(false),
        }
    }
}

impl PauseControl {
    /// Real-time control with no pending tick.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block the calling thread for `millis` scaled by the current factor.
    ///
    /// Negative, NaN, or zero durations do not block (but still observe the
    /// kill flag).
    pub fn pause(&self, millis: f64) -> Result<(), ProgramError> {
        self.check_kill()?;
        let mut state = self.lock();

        if state.scale_factor == 0.0 {
            loop {
                if self.is_killed() {
                    return Err(ProgramError::Killed);
                }
                if state.tick_requested {
                    state.tick_requested = false;
                    tracing::trace!("pause released by tick");
                    return Ok(());
                }
                if state.scale_factor != 0.0 {
                    return Ok(());
                }
                state = self
                    .wake
                    .wait_timeout(state, INDEFINITE_POLL)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
        }

        let duration = scaled_duration(millis, state.scale_factor);
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_killed() {
                return Err(ProgramError::Killed);
            }
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    deadline - now
                }
                None => INDEFINITE_POLL,
            };
            state = self
                .wake
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        drop(state);
        self.check_kill()
    }

    /// Change the time scale.
    ///
    /// Fails with `InvalidArgument` for negative or non-finite factors, leaving
    /// the current factor untouched.
    pub fn set_pause_scale_factor(&self, factor: f64) -> Result<(), ProgramError> {
        if !factor.is_finite() || factor < 0.0 {
            return Err(ProgramError::invalid(
                "pause scale factor",
                format!("must be a finite non-negative number, got {factor}"),
            ));
        }
        let mut state = self.lock();
        let old = state.scale_factor;
        state.scale_factor = factor;
        if old == 0.0 && factor != 0.0 {
            tracing::debug!(factor, "time resumed, waking paused threads");
            self.wake.notify_all();
        }
        Ok(())
    }

    /// Current time scale.
    pub fn scale_factor(&self) -> f64 {
        self.lock().scale_factor
    }

    /// Request that the next indefinite pause return once.
    pub fn pause_tick(&self) {
        let mut state = self.lock();
        state.tick_requested = true;
        self.wake.notify_all();
    }

    /// Whether a tick is waiting to be consumed.
    pub fn is_tick_pending(&self) -> bool {
        self.lock().tick_requested
    }

    /// Permanently request cancellation and wake every waiter.
    pub fn kill_me(&self) {
        if !self.killed.swap(true, Ordering::SeqCst) {
            tracing::debug!("kill requested");
        }
        // Taking the lock orders the store before any waiter's next check.
        let _state = self.lock();
        self.wake.notify_all();
    }

    /// Whether cancellation has been requested.
    #[inline]
    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    /// Fail with `Killed` if cancellation has been requested.
    pub fn check_kill(&self) -> Result<(), ProgramError> {
        if self.is_killed() {
            Err(ProgramError::Killed)
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> MutexGuard<'_, PauseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn scaled_duration(millis: f64, factor: f64) -> Duration {
    let scaled = millis * factor;
    if !(scaled > 0.0) {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(scaled / 1000.0).unwrap_or(Duration::MAX)
}
