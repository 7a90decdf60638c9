//! Lifecycle end-to-end tests.
//!
//! # Invariants
//!
//! 1. **Ordering**: `init` once, strictly before `start_hook`, `run`, `end_hook`.
//! 2. **Idempotent exit**: hooks drain once however often `exit()` is called,
//!    and no caller terminates the process before the drain has finished.
//! 3. **Parameters**: named and positional arguments are both retrievable.
//! 4. **Wiring**: only clickable widgets reach `action_performed`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use stagehand_core::capability::{WidgetKind, WireScope};
use stagehand_core::error::ProgramResult;
use stagehand_core::geometry::{Rect, Size};
use stagehand_core::parameters::ARGS_KEY;
use stagehand_harness::{
    CountingExitHook, Hook, RecordingProgram, ScriptedToolkit, TestButton, TestLabel, quiet_config,
};
use stagehand_runtime::headless::{HeadlessSurface, HeadlessToolkit};
use stagehand_runtime::{Lifecycle, Phase, ProgramMode, StartupConfig};

#[test]
fn start_runs_each_hook_once_in_order() {
    let program = Arc::new(RecordingProgram::new());
    let (config, probes) = quiet_config();
    let lifecycle = Lifecycle::with_program(program.clone(), config);

    let hook = CountingExitHook::new();
    lifecycle.add_exit_hook(hook.clone()).unwrap();

    let worker = lifecycle.start(Vec::<String>::new()).unwrap();
    worker.join().unwrap();

    assert_eq!(
        program.lifecycle_hooks(),
        vec![Hook::Init, Hook::StartHook, Hook::Run, Hook::EndHook]
    );
    let records = program.records();
    assert_eq!(records[0].phase, Phase::Started);
    assert_eq!(records[2].phase, Phase::Running);

    lifecycle.exit().unwrap();
    lifecycle.exit().unwrap();
    assert_eq!(hook.calls(), 1);
    assert_eq!(program.count(&Hook::Run), 1);
    assert_eq!(probes.terminations.count(), 2);
    assert!(probes.sink.errors().is_empty());
}

#[test]
fn concurrent_exit_terminates_only_after_hooks_drain() {
    let drained = Arc::new(AtomicBool::new(false));
    let early = Arc::new(AtomicUsize::new(0));
    let total = Arc::new(AtomicUsize::new(0));
    let (config, _probes) = quiet_config();
    let config = {
        let drained = Arc::clone(&drained);
        let early = Arc::clone(&early);
        let total = Arc::clone(&total);
        config.with_terminator(move |_| {
            if !drained.load(Ordering::SeqCst) {
                early.fetch_add(1, Ordering::SeqCst);
            }
            total.fetch_add(1, Ordering::SeqCst);
        })
    };
    let lifecycle = Arc::new(Lifecycle::new(RecordingProgram::new(), config));
    let flag = Arc::clone(&drained);
    lifecycle
        .add_exit_hook(Arc::new(move || -> ProgramResult {
            thread::sleep(Duration::from_millis(300));
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();

    let first = {
        let lifecycle = Arc::clone(&lifecycle);
        thread::spawn(move || lifecycle.exit())
    };
    thread::sleep(Duration::from_millis(50));
    lifecycle.exit().unwrap();
    first.join().unwrap().unwrap();

    assert_eq!(early.load(Ordering::SeqCst), 0);
    assert_eq!(total.load(Ordering::SeqCst), 2);
    assert_eq!(lifecycle.phase(), Phase::Exited);
}

#[test]
fn failing_exit_hook_does_not_block_later_hooks() {
    let (config, _probes) = quiet_config();
    let lifecycle = Lifecycle::new(RecordingProgram::new(), config.exit_on_close(false));
    let failing = CountingExitHook::failing();
    let after = CountingExitHook::new();
    lifecycle.add_exit_hook(failing.clone()).unwrap();
    lifecycle.add_exit_hook(after.clone()).unwrap();

    let err = lifecycle.exit().unwrap_err();
    assert_eq!(err.as_label(), "exit_hook_failed");
    assert_eq!((failing.calls(), after.calls()), (1, 1));
    assert!(!lifecycle.is_killed());
}

#[test]
fn arguments_become_parameters() {
    let toolkit = Arc::new(HeadlessToolkit::new(Size::new(1000, 800)));
    let (config, _probes) = quiet_config();
    let lifecycle = Lifecycle::new(RecordingProgram::new(), config.with_toolkit(toolkit.clone()));

    lifecycle
        .start(["width=800", "height=600", "foo", "bar"])
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(lifecycle.parameter("WIDTH").as_deref(), Some("800"));
    assert_eq!(lifecycle.parameter("height").as_deref(), Some("600"));
    assert_eq!(lifecycle.parameter(ARGS_KEY).as_deref(), Some("foo\tbar"));
    assert_eq!(toolkit.windows()[0].bounds, Rect::new(16, 40, 800, 600));
}

#[test]
fn percentage_sizes_fill_the_screen() {
    let toolkit = Arc::new(HeadlessToolkit::new(Size::new(1000, 800)));
    let (config, _probes) = quiet_config();
    let lifecycle = Lifecycle::new(RecordingProgram::new(), config.with_toolkit(toolkit.clone()));
    lifecycle.start(["width=100%", "height=*"]).unwrap();
    assert_eq!(toolkit.windows()[0].bounds, Rect::new(0, 0, 1000, 800));
}

#[test]
fn embedded_program_runs_on_worker_thread() {
    let host = Arc::new(HeadlessSurface::new(Size::new(200, 100)));
    let program = Arc::new(RecordingProgram::new());
    let (config, probes) = quiet_config();
    let lifecycle = Lifecycle::with_program(program.clone(), config.with_host(host.clone()));
    assert_eq!(lifecycle.mode(), ProgramMode::Embedded);

    let worker = lifecycle.start(Vec::<String>::new()).unwrap();
    worker.join_timeout(Duration::from_secs(5)).unwrap().unwrap();

    let run = &program.records()[2];
    assert_eq!(run.hook, Hook::Run);
    assert_eq!(run.thread.as_deref(), Some("stagehand-main"));
    assert!(host.is_visible());

    lifecycle.exit().unwrap();
    assert_eq!(probes.terminations.count(), 0);
}

#[test]
fn run_failure_is_reported_not_propagated() {
    let program = Arc::new(RecordingProgram::new().failing_run("sensor offline"));
    let (config, probes) = quiet_config();
    let lifecycle = Lifecycle::with_program(program.clone(), config);

    let worker = lifecycle.start(Vec::<String>::new()).unwrap();
    let err = worker.join().unwrap_err();
    assert_eq!(err.to_string(), "uncaught worker failure: sensor offline");
    assert_eq!(
        probes.sink.errors(),
        vec!["uncaught worker failure: sensor offline".to_owned()]
    );
    assert_eq!(program.count(&Hook::EndHook), 0);
}

#[test]
fn panicking_run_becomes_worker_failure() {
    let host = Arc::new(HeadlessSurface::new(Size::new(10, 10)));
    let (config, _probes) = quiet_config();
    let lifecycle = Lifecycle::new(
        RecordingProgram::new().panicking_run(),
        config.with_host(host),
    );
    let worker = lifecycle.start(Vec::<String>::new()).unwrap();
    let err = worker.join_timeout(Duration::from_secs(5)).unwrap().unwrap_err();
    assert_eq!(err.as_label(), "worker_failure");
    assert!(err.to_string().contains("recording program asked to panic"));
}

#[test]
fn clickable_widgets_reach_action_performed() {
    let toolkit = ScriptedToolkit::new(Size::new(1000, 800));
    let ok = TestButton::new("ok");
    let field = TestButton::with_kind("name", WidgetKind::Field);
    toolkit.place(ok.clone());
    toolkit.place(field.clone());
    toolkit.place(Arc::new(TestLabel("caption".into())));

    let program = Arc::new(RecordingProgram::new());
    let (config, _probes) = quiet_config();
    let lifecycle = Lifecycle::with_program(
        program.clone(),
        config.with_toolkit(toolkit.clone()).with_startup(
            StartupConfig::immediate()
                .with_recheck(Duration::from_millis(5))
                .with_timeout(Duration::from_millis(200)),
        ),
    );
    assert_eq!(lifecycle.add_action_listeners(), 0);

    // The window is still zero-sized, so the worker gives up.
    let worker = lifecycle.start(Vec::<String>::new()).unwrap();
    assert_eq!(worker.join().unwrap_err().as_label(), "startup_timeout");

    assert_eq!(lifecycle.add_action_listeners_in(WireScope::ButtonsOnly), 1);
    assert_eq!((ok.listener_count(), field.listener_count()), (1, 0));
    ok.click();
    assert_eq!(program.count(&Hook::ActionPerformed("ok".into())), 1);
}
