#![forbid(unsafe_code)]

//! Lifecycle controller.
//!
//! [`Lifecycle`] drives one [`Program`] from construction to exit and hands
//! every hook a [`ProgramContext`], the program's view of its own runtime.
//!
//! # Phases
//!
//! ```text
//! Constructed ─► ModeDetected ─► SurfaceReady ─► Started ─► Initialized
//!                                                               │
//!                      Exited ◄── Finished ◄── Running ◄────────┘
//! ```
//!
//! | Transition | Trigger |
//! |------------|---------|
//! | `ModeDetected` | construction: a host surface selects embedded mode |
//! | `SurfaceReady` | first `start()`: window created (standalone) or host adopted |
//! | `Started` | surface validated and shown |
//! | `Initialized` | `init()` returned `Ok` |
//! | `Running` | startup gate opened on the worker |
//! | `Finished` | `run()` and `end_hook()` returned `Ok` |
//! | `Exited` | first `exit()` completed its shutdown sequence |
//!
//! # Invariants
//!
//! 1. The surface is built at most once and `init()` runs at most once.
//! 2. `init()` finishes before the worker is launched, so before `run()`.
//! 3. The worker runs `start_hook`, `run`, `end_hook` in that order, and only
//!    after the surface is showing.
//! 4. Exit hooks are drained by the first `exit()` only. No `exit()` call
//!    terminates the process while that drain is in progress.
//! 5. Phases never move backwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

use stagehand_core::capability::{ActionEvent, ActionListener, WireScope, wire_action_listeners};
use stagehand_core::error::{ProgramError, ProgramResult};
use stagehand_core::geometry::program_bounds;
use stagehand_core::parameters::Parameters;
use stagehand_core::sink::OutputSink;
use stagehand_core::surface::{Surface, Toolkit};

use crate::animation::{AnimationScheduler, AnimationStats};
use crate::config_store::{PersistenceConfig, Properties};
use crate::exit_hooks::{ExitHook, ExitHookList};
use crate::launcher::{WorkerHandle, WorkerLauncher};
use crate::pause::PauseControl;
use crate::program::{Phase, Program, ProgramConfig, ProgramMode, Terminator};
use crate::startup::StartupSynchronizer;

#[derive(Default)]
struct LifecycleState {
    phase: Phase,
    parameters: Option<Parameters>,
    surface: Option<Arc<dyn Surface>>,
    start_claimed: bool,
    started: bool,
    init_finished: bool,
    shown: bool,
    worker: Option<WorkerHandle>,
}

/// Progress of the shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitState {
    Idle,
    Running(ThreadId),
    Done,
}

struct Core {
    program: Arc<dyn Program>,
    mode: ProgramMode,
    host: Option<Arc<dyn Surface>>,
    toolkit: Arc<dyn Toolkit>,
    output: Arc<dyn OutputSink>,
    persistence: PersistenceConfig,
    terminator: Terminator,
    title: Mutex<String>,
    state: Mutex<LifecycleState>,
    exit_on_close: AtomicBool,
    exit: Mutex<ExitState>,
    exit_done: Condvar,
    launcher: WorkerLauncher,
    startup: Arc<StartupSynchronizer>,
    pause: PauseControl,
    animation: AnimationScheduler,
    hooks: ExitHookList,
}

impl Core {
    fn lock(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance(&self, phase: Phase) {
        let mut state = self.lock();
        if phase > state.phase {
            tracing::debug!(from = state.phase.as_str(), to = phase.as_str(), "phase");
            state.phase = phase;
        }
    }
}

/// A program's handle on its own runtime.
///
/// Cheap to clone; every clone refers to the same program.
#[derive(Clone)]
pub struct ProgramContext {
    core: Arc<Core>,
}

impl ProgramContext {
    // --- pause / kill ---

    /// Sleep `millis` scaled by the pause scale factor, observing kill.
    pub fn pause(&self, millis: f64) -> ProgramResult {
        self.core.pause.pause(millis)
    }

    pub fn set_pause_scale_factor(&self, factor: f64) -> ProgramResult {
        self.core.pause.set_pause_scale_factor(factor)
    }

    pub fn pause_scale_factor(&self) -> f64 {
        self.core.pause.scale_factor()
    }

    /// Release one indefinite pause.
    pub fn pause_tick(&self) {
        self.core.pause.pause_tick();
    }

    /// Request cooperative cancellation of the program's threads.
    pub fn kill_me(&self) {
        self.core.pause.kill_me();
    }

    pub fn is_killed(&self) -> bool {
        self.core.pause.is_killed()
    }

    /// Fail with `Killed` once cancellation was requested.
    pub fn check_kill(&self) -> ProgramResult {
        self.core.pause.check_kill()
    }

    pub fn pause_control(&self) -> &PauseControl {
        &self.core.pause
    }

    // --- animation ---

    /// Start or stop calling [`Program::animation`] repeatedly.
    pub fn set_animated(&self, animated: bool) -> ProgramResult {
        self.core.animation.set_enabled(animated)
    }

    pub fn is_animated(&self) -> bool {
        self.core.animation.is_enabled()
    }

    pub fn set_animation_delay(&self, delay_ms: i64) -> ProgramResult {
        self.core.animation.set_delay(delay_ms)
    }

    pub fn animation_delay(&self) -> u64 {
        self.core.animation.delay()
    }

    /// Set the animation rate; `0` stops animation.
    pub fn set_frames_per_second(&self, fps: i64) -> ProgramResult {
        self.core.animation.set_frames_per_second(fps)
    }

    pub fn animation_stats(&self) -> AnimationStats {
        self.core.animation.stats()
    }

    // --- parameters ---

    /// Value of a launch parameter, looked up case-insensitively.
    pub fn parameter(&self, name: &str) -> Option<String> {
        self.core
            .lock()
            .parameters
            .as_ref()
            .and_then(|p| p.get(name))
            .map(str::to_owned)
    }

    /// Set a launch parameter. Setting one before `start()` makes `start()`
    /// ignore its arguments.
    pub fn set_parameter(&self, name: &str, value: impl Into<String>) {
        self.core
            .lock()
            .parameters
            .get_or_insert_with(Parameters::new)
            .set(name, value);
    }

    /// Snapshot of all launch parameters.
    pub fn parameters(&self) -> Parameters {
        self.core.lock().parameters.clone().unwrap_or_default()
    }

    // --- state ---

    pub fn mode(&self) -> ProgramMode {
        self.core.mode
    }

    pub fn is_embedded(&self) -> bool {
        self.core.mode == ProgramMode::Embedded
    }

    pub fn phase(&self) -> Phase {
        self.core.lock().phase
    }

    pub fn is_started(&self) -> bool {
        self.core.lock().started
    }

    pub fn is_initialized(&self) -> bool {
        self.core.lock().init_finished
    }

    pub fn is_shown(&self) -> bool {
        self.core.lock().shown
    }

    pub fn set_exit_on_close(&self, enabled: bool) {
        self.core.exit_on_close.store(enabled, Ordering::SeqCst);
    }

    pub fn is_exit_on_close(&self) -> bool {
        self.core.exit_on_close.load(Ordering::SeqCst)
    }

    pub fn title(&self) -> String {
        self.core
            .title
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Change the title, updating the window if one exists.
    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        if let Some(surface) = self.surface() {
            surface.set_title(&title);
        }
        *self.core.title.lock().unwrap_or_else(PoisonError::into_inner) = title;
    }

    /// The program's surface, once `start()` built it.
    pub fn surface(&self) -> Option<Arc<dyn Surface>> {
        self.core.lock().surface.clone()
    }

    /// Handle of the worker running `run()`, once launched.
    pub fn main_thread(&self) -> Option<WorkerHandle> {
        self.core.lock().worker.clone()
    }

    pub fn output(&self) -> &dyn OutputSink {
        self.core.output.as_ref()
    }

    // --- wiring ---

    /// Route actions from every clickable widget on the surface to
    /// [`Program::action_performed`]. Returns the number of widgets wired.
    pub fn add_action_listeners(&self) -> usize {
        self.add_action_listeners_in(WireScope::All)
    }

    pub fn add_action_listeners_in(&self, scope: WireScope) -> usize {
        let Some(surface) = self.surface() else {
            tracing::debug!("no surface yet, nothing to wire");
            return 0;
        };
        let weak = Arc::downgrade(&self.core);
        let listener: Arc<dyn ActionListener> = Arc::new(move |event: &ActionEvent| {
            if let Some(core) = weak.upgrade() {
                let ctx = ProgramContext { core };
                ctx.core.program.action_performed(&ctx, event);
            }
        });
        wire_action_listeners(&surface.widgets(), &listener, scope)
    }

    // --- shutdown ---

    /// Register a hook to run during [`exit`](Self::exit).
    pub fn add_exit_hook(&self, hook: Arc<dyn ExitHook>) -> ProgramResult {
        self.core.hooks.add(hook)
    }

    /// Shut the program down.
    ///
    /// The first call saves settings, halts animation, runs exit hooks and,
    /// with exit-on-close, requests cancellation. Calls from other threads
    /// block until that sequence has finished. Every call then terminates the
    /// process if exit-on-close is set and the program is standalone.
    ///
    /// A call made from inside the sequence (an exit hook calling `exit()`)
    /// returns `Ok(())` at once and never terminates.
    ///
    /// Returns the first exit hook failure, reported by the first call only.
    pub fn exit(&self) -> ProgramResult {
        let core = &self.core;
        let me = thread::current().id();
        let first = {
            let mut state = core.exit.lock().unwrap_or_else(PoisonError::into_inner);
            loop {
                let current = *state;
                match current {
                    ExitState::Idle => {
                        *state = ExitState::Running(me);
                        break true;
                    }
                    ExitState::Running(owner) if owner == me => return Ok(()),
                    ExitState::Running(_) => {
                        state = core
                            .exit_done
                            .wait(state)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                    ExitState::Done => break false,
                }
            }
        };

        let mut outcome = Ok(());
        if first {
            tracing::debug!(mode = core.mode.as_str(), "exit sequence started");
            self.save_configuration();
            // An animation frame may be parked in `pause()`; never wait on it.
            core.animation.halt();
            if let Some(Err(err)) = core.hooks.drain() {
                outcome = Err(err);
            }
            if self.is_exit_on_close() {
                core.pause.kill_me();
            }
            core.advance(Phase::Exited);
            *core.exit.lock().unwrap_or_else(PoisonError::into_inner) = ExitState::Done;
            core.exit_done.notify_all();
        }
        if self.is_exit_on_close() && core.mode == ProgramMode::Standalone {
            tracing::debug!("terminating process");
            (core.terminator)(0);
        }
        outcome
    }

    fn save_configuration(&self) {
        let Some(store) = self.core.persistence.save_store() else {
            return;
        };
        let mut properties = Properties::new();
        self.core.program.save_configuration(self, &mut properties);
        if let Err(err) = store.save(&properties) {
            tracing::warn!(store = store.name(), error = %err, "failed to save settings");
            self.core
                .output
                .show_error_message(&format!("could not save settings: {err}"));
        }
    }

    fn load_configuration(&self) {
        let Some(store) = self.core.persistence.load_store() else {
            return;
        };
        match store.load() {
            Ok(Some(properties)) => {
                tracing::debug!(store = store.name(), entries = properties.len(), "loaded settings");
                self.core.program.load_configuration(self, &properties);
            }
            Ok(None) => tracing::debug!(store = store.name(), "no saved settings"),
            Err(err) => {
                tracing::warn!(store = store.name(), error = %err, "failed to load settings");
                self.core
                    .output
                    .show_error_message(&format!("could not load settings: {err}"));
            }
        }
    }

    /// Adopt the host or create the window. Runs once.
    fn build_surface(&self) -> ProgramResult<Arc<dyn Surface>> {
        let core = &self.core;
        let surface = match &core.host {
            Some(host) => Arc::clone(host),
            None => {
                let params = self.parameters();
                let bounds = program_bounds(&params, core.toolkit.screen_size())?;
                core.toolkit.create_window(&self.title(), bounds)
            }
        };
        surface.add_listener(core.startup.clone());
        core.lock().surface = Some(Arc::clone(&surface));
        core.advance(Phase::SurfaceReady);
        Ok(surface)
    }

    fn worker_sequence(&self, surface: &dyn Surface) -> ProgramResult {
        let core = &self.core;
        let waited = core.startup.wait_for_startup(surface, &core.pause)?;
        tracing::debug!(
            waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
            "surface showing"
        );
        core.advance(Phase::Running);
        core.program.start_hook(self)?;
        core.program.run(self)?;
        core.program.end_hook(self)?;
        core.advance(Phase::Finished);
        if !surface.is_showing() {
            tracing::debug!("surface gone after run, exiting");
            self.exit()?;
        }
        Ok(())
    }

    fn report(&self, result: ProgramResult) -> ProgramResult {
        if let Err(err) = &result {
            if !err.is_killed() {
                self.core.output.show_error_message(&err.to_string());
            }
        }
        result
    }
}

impl std::fmt::Debug for ProgramContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramContext")
            .field("mode", &self.core.mode)
            .field("phase", &self.phase())
            .field("killed", &self.is_killed())
            .finish_non_exhaustive()
    }
}

/// Owner of a running program.
///
/// Dereferences to the program's [`ProgramContext`].
pub struct Lifecycle {
    ctx: ProgramContext,
}

impl Lifecycle {
    /// Wrap `program` with `config`.
    pub fn new(program: impl Program, config: ProgramConfig) -> Self {
        Self::with_program(Arc::new(program), config)
    }

    /// Like [`new`](Self::new) for a program the caller keeps a handle to.
    pub fn with_program(program: Arc<dyn Program>, config: ProgramConfig) -> Self {
        let mode = config.mode();
        let delay_ms = config.animation_delay_ms;
        let core = Arc::new_cyclic(|weak: &Weak<Core>| {
            let weak = weak.clone();
            let animation = AnimationScheduler::with_callback(
                "stagehand-animation",
                Arc::new(move || {
                    if let Some(core) = weak.upgrade() {
                        let ctx = ProgramContext { core };
                        ctx.core.program.animation(&ctx);
                    }
                }),
            );
            if let Some(delay_ms) = delay_ms {
                if let Err(err) = animation.set_delay(i64::try_from(delay_ms).unwrap_or(i64::MAX)) {
                    tracing::warn!(error = %err, "ignoring configured animation delay");
                }
            }
            Core {
                program,
                mode,
                host: config.host,
                toolkit: config.toolkit,
                output: config.output,
                persistence: config.persistence,
                terminator: config.terminator,
                title: Mutex::new(config.title),
                state: Mutex::new(LifecycleState::default()),
                exit_on_close: AtomicBool::new(config.exit_on_close),
                exit: Mutex::new(ExitState::Idle),
                exit_done: Condvar::new(),
                launcher: WorkerLauncher::new(config.launcher),
                startup: Arc::new(StartupSynchronizer::new(config.startup)),
                pause: PauseControl::new(),
                animation,
                hooks: ExitHookList::new(),
            }
        });
        core.advance(Phase::ModeDetected);
        tracing::debug!(mode = mode.as_str(), "program constructed");
        Self {
            ctx: ProgramContext { core },
        }
    }

    pub fn context(&self) -> &ProgramContext {
        &self.ctx
    }

    /// Start the program.
    ///
    /// The first call parses `args` (unless parameters were already set),
    /// builds and shows the surface, runs `init`, loads settings in
    /// standalone mode and hands the worker sequence to the launcher. A
    /// standalone program runs it on the calling thread, so this returns
    /// after `run` finished; an embedded program gets a worker thread.
    ///
    /// Later calls only re-validate and re-show the surface and return the
    /// same worker handle. `init` failures propagate from here; worker
    /// failures are collected through [`WorkerHandle::join`].
    pub fn start<I, S>(&self, args: I) -> ProgramResult<WorkerHandle>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ctx = &self.ctx;
        let core = &ctx.core;
        {
            let mut state = core.lock();
            if state.parameters.is_none() {
                state.parameters = Some(Parameters::parse(args));
            }
            if state.start_claimed {
                let surface = state.surface.clone();
                let worker = state.worker.clone();
                drop(state);
                if let Some(surface) = surface {
                    surface.validate();
                    surface.set_visible(true);
                }
                return worker.ok_or_else(|| {
                    ProgramError::invalid("start", "program has not finished initializing")
                });
            }
            state.start_claimed = true;
        }

        let surface = ctx.build_surface()?;
        surface.validate();
        surface.set_visible(true);
        {
            let mut state = core.lock();
            state.shown = true;
            state.started = true;
        }
        core.advance(Phase::Started);

        core.program.init(ctx)?;
        core.lock().init_finished = true;
        core.advance(Phase::Initialized);

        if core.mode == ProgramMode::Standalone {
            ctx.load_configuration();
        }

        let worker_ctx = ctx.clone();
        let worker_surface = Arc::clone(&surface);
        let task = move || {
            let result = worker_ctx.worker_sequence(worker_surface.as_ref());
            worker_ctx.report(result)
        };
        let handle = match core.mode {
            ProgramMode::Standalone => core.launcher.run_inline(task),
            ProgramMode::Embedded => core.launcher.launch(task)?,
        };
        core.lock().worker = Some(handle.clone());
        Ok(handle)
    }
}

impl std::ops::Deref for Lifecycle {
    type Target = ProgramContext;

    fn deref(&self) -> &ProgramContext {
        &self.ctx
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle").field("ctx", &self.ctx).finish()
    }
}
