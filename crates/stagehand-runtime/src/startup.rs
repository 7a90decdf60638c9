#![forbid(unsafe_code)]

//! Startup gate: hold the worker until the program's surface is on screen.
//!
//! The synchronizer sleeps an initial settling delay, then loops on the
//! [`VisibilitySignal`]. Between checks it waits on a condition variable that
//! the windowing collaborator pokes through [`SurfaceListener`], bounded by a
//! re-check period so a missed notification only costs one period.
//!
//! ```text
//! start ──sleep(initial_delay)──► showing? ──yes──► gate open
//!                                   ▲    │no
//!                                   │    ▼
//!                                   └─ wait(recheck | surface_changed)
//! ```

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use stagehand_core::error::ProgramError;
use stagehand_core::surface::{SurfaceListener, VisibilitySignal};

use crate::pause::PauseControl;

/// Timing of the startup gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupConfig {
    /// Settling delay before the first visibility check. Default: 1000ms.
    pub initial_delay: Duration,
    /// Upper bound between visibility checks. Default: 300ms.
    pub recheck: Duration,
    /// Give up with `StartupTimeout` after this long, measured from the
    /// start of the wait. Default: wait forever.
    pub timeout: Option<Duration>,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            recheck: Duration::from_millis(300),
            timeout: None,
        }
    }
}

impl StartupConfig {
    /// A gate with no settling delay, for tests and headless runs.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn with_recheck(mut self, recheck: Duration) -> Self {
        self.recheck = recheck.max(Duration::from_millis(1));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Blocks a worker until the visibility signal turns true.
#[derive(Debug)]
pub struct StartupSynchronizer {
    config: StartupConfig,
    generation: Mutex<u64>,
    changed: Condvar,
}

impl StartupSynchronizer {
    pub fn new(config: StartupConfig) -> Self {
        Self {
            config,
            generation: Mutex::new(0),
            changed: Condvar::new(),
        }
    }

    pub fn config(&self) -> &StartupConfig {
        &self.config
    }

    /// Wait until `signal` reports the surface as showing.
    ///
    /// Returns how long the gate was closed. Fails with `Killed` if `control`
    /// is killed while waiting (observed within one re-check period), or with
    /// `StartupTimeout` once the configured bound elapses.
    pub fn wait_for_startup(
        &self,
        signal: &dyn VisibilitySignal,
        control: &PauseControl,
    ) -> Result<Duration, ProgramError> {
        let started = Instant::now();
        self.settle(started, control)?;

        let mut generation = self.lock();
        loop {
            control.check_kill()?;
            if signal.is_showing() {
                let waited = started.elapsed();
                tracing::debug!(
                    waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                    "startup gate open"
                );
                return Ok(waited);
            }
            let wait = self.next_wait(started)?;
            let seen = *generation;
            generation = self
                .changed
                .wait_timeout_while(generation, wait, |current| *current == seen)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Sleep the initial delay in re-check sized slices so kill stays prompt.
    fn settle(&self, started: Instant, control: &PauseControl) -> Result<(), ProgramError> {
        loop {
            control.check_kill()?;
            let elapsed = started.elapsed();
            if elapsed >= self.config.initial_delay {
                return Ok(());
            }
            let slice = (self.config.initial_delay - elapsed).min(self.config.recheck);
            std::thread::sleep(slice);
        }
    }

    fn next_wait(&self, started: Instant) -> Result<Duration, ProgramError> {
        let Some(timeout) = self.config.timeout else {
            return Ok(self.config.recheck);
        };
        let waited = started.elapsed();
        if waited >= timeout {
            tracing::warn!(
                waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                "surface never became visible"
            );
            return Err(ProgramError::StartupTimeout { waited });
        }
        Ok(self.config.recheck.min(timeout - waited))
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        self.generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StartupSynchronizer {
    fn default() -> Self {
        Self::new(StartupConfig::default())
    }
}

impl SurfaceListener for StartupSynchronizer {
    fn surface_changed(&self) {
        let mut generation = self.lock();
        *generation = generation.wrapping_add(1);
        self.changed.notify_all();
    }
}
