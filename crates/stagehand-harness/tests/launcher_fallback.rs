//! Worker launcher fallback through a running program.
//!
//! # Invariants
//!
//! 1. **Order**: thread, then executor, then the calling thread.
//! 2. **No loss**: a refusing strategy never drops the worker sequence.
//! 3. **Surfacing**: inline failures come back from `start()` itself.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stagehand_core::geometry::Size;
use stagehand_harness::{
    Hook, QueuedExecutor, RecordingProgram, RefusingExecutor, RefusingSpawner, quiet_config,
};
use stagehand_runtime::headless::HeadlessSurface;
use stagehand_runtime::{LaunchStrategy, LauncherConfig, Lifecycle};

fn host() -> Arc<HeadlessSurface> {
    Arc::new(HeadlessSurface::new(Size::new(64, 64)))
}

#[test]
fn refused_thread_defers_to_executor() {
    let spawner = Arc::new(RefusingSpawner::default());
    let executor = Arc::new(QueuedExecutor::default());
    let program = Arc::new(RecordingProgram::new());
    let (config, _probes) = quiet_config();
    let lifecycle = Lifecycle::with_program(
        program.clone(),
        config.with_host(host()).with_launcher(
            LauncherConfig::default()
                .with_spawner(spawner.clone())
                .with_executor(executor.clone()),
        ),
    );

    let worker = lifecycle.start(Vec::<String>::new()).unwrap();
    assert_eq!(worker.strategy(), LaunchStrategy::Executor);
    assert_eq!(spawner.attempts(), 1);
    assert_eq!(program.count(&Hook::Run), 0);

    assert_eq!(executor.run_all(), 1);
    worker.join().unwrap();
    assert_eq!(program.count(&Hook::Run), 1);
    assert_eq!(worker.thread_id(), Some(thread::current().id()));
}

#[test]
fn everything_refused_runs_inline() {
    let spawner = Arc::new(RefusingSpawner::default());
    let executor = Arc::new(RefusingExecutor::default());
    let program = Arc::new(RecordingProgram::new());
    let (config, _probes) = quiet_config();
    let lifecycle = Lifecycle::with_program(
        program.clone(),
        config.with_host(host()).with_launcher(
            LauncherConfig::default()
                .with_spawner(spawner.clone())
                .with_executor(executor.clone()),
        ),
    );

    let worker = lifecycle.start(Vec::<String>::new()).unwrap();
    assert_eq!(worker.strategy(), LaunchStrategy::Inline);
    assert!(worker.is_finished());
    assert_eq!((spawner.attempts(), executor.attempts()), (1, 1));
    assert_eq!(
        program.lifecycle_hooks(),
        vec![Hook::Init, Hook::StartHook, Hook::Run, Hook::EndHook]
    );
}

#[test]
fn inline_failure_comes_back_from_start() {
    let (config, probes) = quiet_config();
    let lifecycle = Lifecycle::new(
        RecordingProgram::new().failing_run("no sensor"),
        config.with_host(host()).with_launcher(
            LauncherConfig::default()
                .with_spawner(Arc::new(RefusingSpawner::default()))
                .with_executor(Arc::new(RefusingExecutor::default())),
        ),
    );
    let err = lifecycle.start(Vec::<String>::new()).unwrap_err();
    assert_eq!(err.to_string(), "uncaught worker failure: no sensor");
    assert_eq!(probes.sink.errors().len(), 1);
}

#[test]
fn custom_thread_name_is_used() {
    let program = Arc::new(RecordingProgram::new());
    let (config, _probes) = quiet_config();
    let lifecycle = Lifecycle::with_program(
        program.clone(),
        config
            .with_host(host())
            .with_launcher(LauncherConfig::default().with_thread_name("sim-worker")),
    );
    let worker = lifecycle.start(Vec::<String>::new()).unwrap();
    worker.join_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert_eq!(worker.thread_name().as_deref(), Some("sim-worker"));
    assert_eq!(
        lifecycle.main_thread().and_then(|h| h.thread_name()).as_deref(),
        Some("sim-worker")
    );
}
