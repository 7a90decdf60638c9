//! Startup gate behaviour with a scripted windowing collaborator.
//!
//! # Invariants
//!
//! 1. **Gate**: no worker hook runs before the surface is showing.
//! 2. **Init first**: `init` runs on the caller before the gate opens.
//! 3. **Bounded**: a configured timeout ends the wait with `StartupTimeout`.
//! 4. **Kill**: a kill request ends the wait with `Killed`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stagehand_core::geometry::Size;
use stagehand_harness::{Hook, RecordingProgram, ScriptedToolkit, quiet_config};
use stagehand_runtime::headless::HeadlessSurface;
use stagehand_runtime::{Lifecycle, Phase, StartupConfig};

#[test]
fn worker_waits_for_host_to_show() {
    let host = Arc::new(HeadlessSurface::new(Size::new(0, 0)));
    let program = Arc::new(RecordingProgram::new());
    let (config, _probes) = quiet_config();
    let lifecycle = Lifecycle::with_program(program.clone(), config.with_host(host.clone()));

    let worker = lifecycle.start(Vec::<String>::new()).unwrap();
    assert!(worker.join_timeout(Duration::from_millis(80)).is_none());
    assert_eq!(program.hooks(), vec![Hook::Init]);
    assert_eq!(lifecycle.phase(), Phase::Initialized);

    host.resize(Size::new(320, 240));
    worker.join_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert_eq!(program.count(&Hook::Run), 1);
    assert_eq!(lifecycle.phase(), Phase::Finished);
}

#[test]
fn standalone_window_reveal_opens_gate() {
    let toolkit = ScriptedToolkit::new(Size::new(800, 600));
    let program = Arc::new(RecordingProgram::new());
    let (config, _probes) = quiet_config();
    let lifecycle = Arc::new(Lifecycle::with_program(
        program.clone(),
        config.with_toolkit(toolkit.clone()),
    ));

    // Standalone start blocks the caller until run finishes.
    let starter = {
        let lifecycle = Arc::clone(&lifecycle);
        thread::spawn(move || lifecycle.start(Vec::<String>::new()))
    };
    thread::sleep(Duration::from_millis(80));
    assert_eq!(program.count(&Hook::Run), 0);

    toolkit.reveal();
    let worker = starter.join().unwrap().unwrap();
    worker.join().unwrap();
    assert_eq!(program.count(&Hook::Run), 1);
    assert_eq!(toolkit.created().len(), 1);
}

#[test]
fn bounded_wait_times_out() {
    let host = Arc::new(HeadlessSurface::new(Size::new(0, 0)));
    let program = Arc::new(RecordingProgram::new());
    let (config, probes) = quiet_config();
    let lifecycle = Lifecycle::with_program(
        program.clone(),
        config.with_host(host).with_startup(
            StartupConfig::immediate()
                .with_recheck(Duration::from_millis(5))
                .with_timeout(Duration::from_millis(60)),
        ),
    );
    let worker = lifecycle.start(Vec::<String>::new()).unwrap();
    let err = worker.join_timeout(Duration::from_secs(5)).unwrap().unwrap_err();
    assert_eq!(err.as_label(), "startup_timeout");
    assert_eq!(program.hooks(), vec![Hook::Init]);
    assert_eq!(probes.sink.errors().len(), 1);
}

#[test]
fn kill_releases_waiting_worker() {
    let host = Arc::new(HeadlessSurface::new(Size::new(0, 0)));
    let (config, probes) = quiet_config();
    let lifecycle = Lifecycle::new(RecordingProgram::new(), config.with_host(host));
    let worker = lifecycle.start(Vec::<String>::new()).unwrap();
    thread::sleep(Duration::from_millis(30));
    lifecycle.kill_me();
    let err = worker.join_timeout(Duration::from_secs(5)).unwrap().unwrap_err();
    assert!(err.is_killed());
    assert!(probes.sink.errors().is_empty());
}
