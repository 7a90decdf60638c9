#![forbid(unsafe_code)]

//! Error taxonomy shared by every Stagehand crate.
//!
//! [`ProgramError`] covers the lifecycle engine itself:
//!
//! | Variant | Raised by | Recoverable |
//! |---------|-----------|-------------|
//! | `InvalidArgument` | setters (delay, fps, scale factor, sizes) | yes, nothing was mutated |
//! | `Killed` | `pause()` / `check_kill()` after a kill request | no, unwinds the worker |
//! | `WorkerLaunch` | launcher, every strategy refused | no |
//! | `WorkerFailure` | anything escaping `run()` or a worker hook | no |
//! | `StartupTimeout` | startup gate with a configured bound | no |
//! | `ExitHook` | a registered exit hook failed | reported after all hooks ran |
//!
//! `WorkerFailure` always carries the *root* cause of the chain it was built
//! from, so callers see one coherent message instead of wrapper noise.

use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

/// Boxed error accepted from user hooks.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result alias used by lifecycle hooks and runtime operations.
pub type ProgramResult<T = ()> = Result<T, ProgramError>;

/// Errors produced by the program runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProgramError {
    /// A caller passed a value outside the accepted domain.
    #[error("invalid {what}: {message}")]
    InvalidArgument {
        /// Name of the rejected argument.
        what: &'static str,
        /// Human-readable reason.
        message: String,
    },

    /// The program was asked to stop via `kill_me()`.
    #[error("program killed")]
    Killed,

    /// No launch strategy could execute the worker task.
    #[error("worker launch failed: {message}")]
    WorkerLaunch {
        /// Description of the last refusal.
        message: String,
    },

    /// A failure escaped the user's worker logic.
    #[error("uncaught worker failure: {root_cause}")]
    WorkerFailure {
        /// Display text of the innermost cause.
        root_cause: String,
        /// The original error, when one was available.
        #[source]
        source: Option<BoxError>,
    },

    /// The visual surface never became visible within the configured bound.
    #[error("surface not visible after {waited:?}")]
    StartupTimeout {
        /// How long the startup gate waited.
        waited: Duration,
    },

    /// An exit hook reported a failure.
    #[error("exit hook #{index} failed: {source}")]
    ExitHook {
        /// Registration index of the failing hook.
        index: usize,
        /// What the hook returned.
        #[source]
        source: Box<ProgramError>,
    },
}

impl ProgramError {
    /// Build an `InvalidArgument` error.
    pub fn invalid(what: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            what,
            message: message.into(),
        }
    }

    /// Wrap an arbitrary error as a worker failure, keeping its root cause.
    ///
    /// Errors that already are a [`ProgramError`] are returned unchanged so
    /// `Killed` and friends keep their meaning when passed through here.
    pub fn failure(err: impl Into<BoxError>) -> Self {
        let err: BoxError = err.into();
        match err.downcast::<ProgramError>() {
            Ok(program) => *program,
            Err(err) => {
                let root_cause = root_cause(&*err).to_string();
                Self::WorkerFailure {
                    root_cause,
                    source: Some(err),
                }
            }
        }
    }

    /// A worker failure described only by text.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::WorkerFailure {
            root_cause: message.into(),
            source: None,
        }
    }

    /// Returns `true` for the cooperative cancellation signal.
    pub fn is_killed(&self) -> bool {
        matches!(self, Self::Killed)
    }

    /// Returns a short stable label (snake_case) for logs.
    ///
    /// ```
    /// use stagehand_core::error::ProgramError;
    ///
    /// assert_eq!(ProgramError::Killed.as_label(), "program_killed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::Killed => "program_killed",
            Self::WorkerLaunch { .. } => "worker_launch_failed",
            Self::WorkerFailure { .. } => "worker_failure",
            Self::StartupTimeout { .. } => "startup_timeout",
            Self::ExitHook { .. } => "exit_hook_failed",
        }
    }
}

impl From<std::io::Error> for ProgramError {
    fn from(err: std::io::Error) -> Self {
        Self::failure(err)
    }
}

/// Follow `source()` links until an error without a cause is found.
pub fn root_cause<'a>(err: &'a (dyn StdError + 'static)) -> &'a (dyn StdError + 'static) {
    let mut current = err;
    while let Some(next) = current.source() {
        current = next;
    }
    current
}

/// Render a panic payload the way `std` prints it.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
