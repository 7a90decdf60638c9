#![forbid(unsafe_code)]

//! Test doubles and end-to-end checks for Stagehand.
//!
//! - [`RecordingProgram`] records every hook call with thread and phase.
//! - Launcher seams that refuse or queue work ([`RefusingSpawner`],
//!   [`RefusingExecutor`], [`QueuedExecutor`]).
//! - [`CountingExitHook`], [`TestButton`], and [`ScriptedToolkit`] whose
//!   windows only show when the test says so.
//!
//! [`quiet_config`] builds a configuration that never terminates the process,
//! never touches the file system, and skips the startup settling delay.

pub mod doubles;
pub mod recording;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use stagehand_core::logging::{self, LogConfig};
use stagehand_core::sink::MemorySink;
use stagehand_runtime::config_store::PersistenceConfig;
use stagehand_runtime::program::ProgramConfig;
use stagehand_runtime::startup::StartupConfig;

pub use doubles::{
    CountingExitHook, QueuedExecutor, RefusingExecutor, RefusingSpawner, ScriptedToolkit,
    TestButton, TestLabel,
};
pub use recording::{Hook, Record, RecordingProgram};

/// Counts terminator calls instead of ending the process.
#[derive(Debug, Default)]
pub struct TerminationCounter(AtomicUsize);

impl TerminationCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handles a test keeps next to a [`quiet_config`].
#[derive(Debug, Clone)]
pub struct Probes {
    pub sink: Arc<MemorySink>,
    pub terminations: Arc<TerminationCounter>,
}

/// A configuration safe to run inside a test process.
///
/// Also installs the test log subscriber (once per process), so
/// `STAGEHAND_LOG=debug cargo test` shows the runtime's trace.
pub fn quiet_config() -> (ProgramConfig, Probes) {
    logging::init(&LogConfig::for_tests());
    let probes = Probes {
        sink: Arc::new(MemorySink::new()),
        terminations: Arc::new(TerminationCounter::default()),
    };
    let terminations = Arc::clone(&probes.terminations);
    let config = ProgramConfig::default()
        .with_startup(StartupConfig::immediate().with_recheck(Duration::from_millis(5)))
        .with_persistence(PersistenceConfig::disabled())
        .with_output(probes.sink.clone())
        .with_terminator(move |_| {
            terminations.0.fetch_add(1, Ordering::SeqCst);
        });
    (config, probes)
}
