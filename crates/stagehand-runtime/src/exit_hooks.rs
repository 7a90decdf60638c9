#![forbid(unsafe_code)]

//! Ordered shutdown hooks, drained exactly once.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stagehand_core::error::{ProgramError, ProgramResult, panic_message};

/// Something to run while the program exits.
pub trait ExitHook: Send + Sync {
    fn exit(&self) -> ProgramResult;
}

impl<F> ExitHook for F
where
    F: Fn() -> ProgramResult + Send + Sync,
{
    fn exit(&self) -> ProgramResult {
        self()
    }
}

#[derive(Default)]
struct HookState {
    hooks: Vec<Arc<dyn ExitHook>>,
    drained: bool,
}

/// Append-only list of exit hooks.
#[derive(Default)]
pub struct ExitHookList {
    state: Mutex<HookState>,
}

impl ExitHookList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook. Fails once the list has been drained.
    pub fn add(&self, hook: Arc<dyn ExitHook>) -> ProgramResult {
        let mut state = self.lock();
        if state.drained {
            return Err(ProgramError::invalid(
                "exit hook",
                "registered after shutdown already ran the hooks",
            ));
        }
        state.hooks.push(hook);
        Ok(())
    }

    /// Run every hook in registration order.
    ///
    /// Returns `None` if the list was drained before. Otherwise all hooks run
    /// even if some fail, and the first failure is reported as
    /// [`ProgramError::ExitHook`].
    pub fn drain(&self) -> Option<ProgramResult> {
        let hooks = {
            let mut state = self.lock();
            if state.drained {
                return None;
            }
            state.drained = true;
            std::mem::take(&mut state.hooks)
        };

        let mut first_failure = None;
        for (index, hook) in hooks.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| hook.exit()))
                .unwrap_or_else(|payload| Err(ProgramError::msg(panic_message(payload.as_ref()))));
            if let Err(err) = outcome {
                tracing::warn!(index, error = %err, "exit hook failed");
                first_failure.get_or_insert(ProgramError::ExitHook {
                    index,
                    source: Box::new(err),
                });
            }
        }
        tracing::debug!(count = hooks.len(), "exit hooks drained");
        Some(first_failure.map_or(Ok(()), Err))
    }

    pub fn len(&self) -> usize {
        self.lock().hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_drained(&self) -> bool {
        self.lock().drained
    }

    fn lock(&self) -> MutexGuard<'_, HookState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ExitHookList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ExitHookList")
            .field("hooks", &state.hooks.len())
            .field("drained", &state.drained)
            .finish()
    }
}
