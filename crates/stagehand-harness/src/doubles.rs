#![forbid(unsafe_code)]

//! Launcher seams, exit hooks, widgets and toolkits for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stagehand_core::capability::{ActionEvent, ActionListener, Clickable, Widget, WidgetKind};
use stagehand_core::error::{ProgramError, ProgramResult};
use stagehand_core::geometry::{Rect, Size};
use stagehand_core::surface::{Surface, Toolkit};
use stagehand_runtime::exit_hooks::ExitHook;
use stagehand_runtime::headless::HeadlessSurface;
use stagehand_runtime::launcher::{Executor, Job, Refused, ThreadSpawner};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Spawner that refuses every thread, dropping the job it was given.
#[derive(Debug, Default)]
pub struct RefusingSpawner {
    attempts: AtomicUsize,
}

impl RefusingSpawner {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl ThreadSpawner for RefusingSpawner {
    fn spawn(&self, name: &str, job: Job) -> Result<(), Refused> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        drop(job);
        Err(Refused(format!("no thread for {name}")))
    }
}

/// Executor that refuses every job.
#[derive(Debug, Default)]
pub struct RefusingExecutor {
    attempts: AtomicUsize,
}

impl RefusingExecutor {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Executor for RefusingExecutor {
    fn execute(&self, job: Job) -> Result<(), Refused> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        drop(job);
        Err(Refused("executor closed".to_owned()))
    }
}

/// Executor that queues jobs until the test runs them.
#[derive(Default)]
pub struct QueuedExecutor {
    jobs: Mutex<Vec<Job>>,
}

impl QueuedExecutor {
    pub fn pending(&self) -> usize {
        lock(&self.jobs).len()
    }

    /// Run every queued job on the calling thread. Returns how many ran.
    pub fn run_all(&self) -> usize {
        let jobs = std::mem::take(&mut *lock(&self.jobs));
        let count = jobs.len();
        for job in jobs {
            job();
        }
        count
    }
}

impl Executor for QueuedExecutor {
    fn execute(&self, job: Job) -> Result<(), Refused> {
        lock(&self.jobs).push(job);
        Ok(())
    }
}

impl std::fmt::Debug for QueuedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedExecutor")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Exit hook counting its invocations, optionally failing.
#[derive(Debug, Default)]
pub struct CountingExitHook {
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl CountingExitHook {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn failing() -> Arc<Self> {
        let hook = Self::default();
        hook.fail.store(true, Ordering::SeqCst);
        Arc::new(hook)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ExitHook for CountingExitHook {
    fn exit(&self) -> ProgramResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProgramError::msg(format!("exit hook call {call} failed")));
        }
        Ok(())
    }
}

/// Clickable widget that fires on demand.
pub struct TestButton {
    name: String,
    kind: WidgetKind,
    listeners: Mutex<Vec<Arc<dyn ActionListener>>>,
}

impl TestButton {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::with_kind(name, WidgetKind::Button)
    }

    pub fn with_kind(name: impl Into<String>, kind: WidgetKind) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            kind,
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Fire an action with the button's name as command.
    pub fn click(&self) {
        let event = ActionEvent::new(self.name.clone(), self.name.clone());
        let listeners = lock(&self.listeners).clone();
        for listener in listeners {
            listener.action_performed(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

impl Clickable for TestButton {
    fn add_action_listener(&self, listener: Arc<dyn ActionListener>) {
        lock(&self.listeners).push(listener);
    }
}

impl Widget for TestButton {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> WidgetKind {
        self.kind
    }

    fn as_clickable(&self) -> Option<&dyn Clickable> {
        Some(self)
    }
}

/// Non-interactive widget.
#[derive(Debug)]
pub struct TestLabel(pub String);

impl Widget for TestLabel {
    fn name(&self) -> &str {
        &self.0
    }

    fn kind(&self) -> WidgetKind {
        WidgetKind::Label
    }
}

/// Toolkit whose windows stay zero-sized until [`reveal`](Self::reveal).
///
/// Widgets registered with [`place`](Self::place) are put on every window it
/// creates.
pub struct ScriptedToolkit {
    screen: Size,
    windows: Mutex<Vec<(Rect, Arc<HeadlessSurface>)>>,
    widgets: Mutex<Vec<Arc<dyn Widget>>>,
}

impl ScriptedToolkit {
    pub fn new(screen: Size) -> Arc<Self> {
        Arc::new(Self {
            screen,
            windows: Mutex::new(Vec::new()),
            widgets: Mutex::new(Vec::new()),
        })
    }

    /// Put `widget` on windows created from now on.
    pub fn place(&self, widget: Arc<dyn Widget>) {
        lock(&self.widgets).push(widget);
    }

    /// Give every window its requested size, making visible ones show.
    pub fn reveal(&self) {
        let windows = lock(&self.windows).clone();
        for (bounds, surface) in windows {
            surface.resize(bounds.size());
        }
    }

    /// Bounds of every created window.
    pub fn created(&self) -> Vec<Rect> {
        lock(&self.windows).iter().map(|(r, _)| *r).collect()
    }
}

impl Toolkit for ScriptedToolkit {
    fn screen_size(&self) -> Size {
        self.screen
    }

    fn create_window(&self, title: &str, bounds: Rect) -> Arc<dyn Surface> {
        let surface = Arc::new(HeadlessSurface::new(Size::new(0, 0)));
        surface.set_title(title);
        for widget in lock(&self.widgets).iter() {
            surface.add_widget(Arc::clone(widget));
        }
        lock(&self.windows).push((bounds, Arc::clone(&surface)));
        surface
    }
}

impl std::fmt::Debug for ScriptedToolkit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedToolkit")
            .field("screen", &self.screen)
            .field("windows", &lock(&self.windows).len())
            .finish_non_exhaustive()
    }
}
