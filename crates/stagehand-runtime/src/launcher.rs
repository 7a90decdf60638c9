#![forbid(unsafe_code)]

//! Worker launcher: run the program's worker sequence off the caller's thread.
//!
//! # Strategy chain
//!
//! | Order | Strategy | Seam | On refusal |
//! |-------|----------|------|------------|
//! | 1 | dedicated named thread | [`ThreadSpawner`] | try 2 |
//! | 2 | one deferred invocation | [`Executor`] | try 3 |
//! | 3 | synchronous, calling thread | none | cannot refuse |
//!
//! The task sits in a take-once [`TaskSlot`]. A strategy only receives a
//! [`Job`] that *refers* to the slot, so a refusing strategy that drops its
//! job cannot drop the task with it.
//!
//! # Failure capture
//!
//! Errors returned by the task and panics escaping it are both caught. Panics
//! become [`ProgramError::WorkerFailure`] carrying the panic text; returned
//! errors keep their variant. On a worker thread the failure is logged and
//! delivered through [`WorkerHandle::join`]. On the synchronous fallback it is
//! returned from [`WorkerLauncher::launch`] directly.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use stagehand_core::error::{ProgramError, ProgramResult, panic_message};
use thiserror::Error;

/// Default name of the worker thread.
pub const DEFAULT_THREAD_NAME: &str = "stagehand-main";

/// The user's worker sequence.
pub type WorkerTask = Box<dyn FnOnce() -> ProgramResult + Send + 'static>;

/// What a strategy is handed to execute.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A strategy declined to run a job.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct Refused(pub String);

impl From<std::io::Error> for Refused {
    fn from(err: std::io::Error) -> Self {
        Self(err.to_string())
    }
}

/// Creates dedicated threads.
pub trait ThreadSpawner: Send + Sync {
    /// Run `job` on a new thread called `name`, detached.
    fn spawn(&self, name: &str, job: Job) -> Result<(), Refused>;
}

/// Spawns through `std::thread::Builder`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdThreadSpawner;

impl ThreadSpawner for StdThreadSpawner {
    fn spawn(&self, name: &str, job: Job) -> Result<(), Refused> {
        thread::Builder::new().name(name.to_owned()).spawn(job)?;
        Ok(())
    }
}

/// Runs jobs at some later point on some other thread.
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job) -> Result<(), Refused>;
}

/// Single background thread running one-shot jobs in submission order.
///
/// The thread is started on first use and exits when the executor is dropped.
pub struct ScheduledExecutor {
    name: String,
    delay: Duration,
    queue: Mutex<Option<mpsc::Sender<Job>>>,
}

impl ScheduledExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "stagehand-executor".to_owned(),
            delay: Duration::ZERO,
            queue: Mutex::new(None),
        }
    }

    /// Defer every job by `delay` before running it.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn start(&self) -> Result<mpsc::Sender<Job>, Refused> {
        let (tx, rx) = mpsc::channel::<Job>();
        let delay = self.delay;
        thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                for job in rx {
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    job();
                }
            })?;
        tracing::debug!(name = %self.name, "scheduled executor started");
        Ok(tx)
    }
}

impl Default for ScheduledExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for ScheduledExecutor {
    fn execute(&self, job: Job) -> Result<(), Refused> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.is_none() {
            *queue = Some(self.start()?);
        }
        let Some(tx) = queue.as_ref() else {
            return Err(Refused("executor unavailable".to_owned()));
        };
        if let Err(mpsc::SendError(_)) = tx.send(job) {
            *queue = None;
            return Err(Refused("executor thread exited".to_owned()));
        }
        Ok(())
    }
}

impl fmt::Debug for ScheduledExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledExecutor")
            .field("name", &self.name)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

/// Take-once holder for a [`WorkerTask`].
#[derive(Clone)]
pub struct TaskSlot(Arc<Mutex<Option<WorkerTask>>>);

impl TaskSlot {
    pub fn new(task: WorkerTask) -> Self {
        Self(Arc::new(Mutex::new(Some(task))))
    }

    /// Remove the task. Only the first caller gets it.
    pub fn take(&self) -> Option<WorkerTask> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub fn is_taken(&self) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}

impl fmt::Debug for TaskSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSlot")
            .field("taken", &self.is_taken())
            .finish()
    }
}

/// How a worker task ended up being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaunchStrategy {
    Thread,
    Executor,
    Inline,
}

impl LaunchStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Thread => "thread",
            Self::Executor => "executor",
            Self::Inline => "inline",
        }
    }
}

#[derive(Default)]
struct CompletionState {
    thread_id: Option<ThreadId>,
    thread_name: Option<String>,
    finished: bool,
    result: Option<ProgramResult>,
}

#[derive(Default)]
struct Completion {
    state: Mutex<CompletionState>,
    done: Condvar,
}

impl Completion {
    fn lock(&self) -> MutexGuard<'_, CompletionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) {
        let current = thread::current();
        let mut state = self.lock();
        state.thread_id = Some(current.id());
        state.thread_name = current.name().map(str::to_owned);
    }

    fn finish(&self, result: ProgramResult) {
        let mut state = self.lock();
        state.finished = true;
        state.result = Some(result);
        self.done.notify_all();
    }

    fn take_error(&self) -> Option<ProgramError> {
        let mut state = self.lock();
        match state.result.take() {
            Some(Err(err)) => Some(err),
            other => {
                state.result = other;
                None
            }
        }
    }
}

/// Identity and completion of one launched worker.
///
/// Clones observe the same worker. The result can be collected once.
#[derive(Clone)]
pub struct WorkerHandle {
    strategy: LaunchStrategy,
    completion: Arc<Completion>,
}

impl WorkerHandle {
    pub fn strategy(&self) -> LaunchStrategy {
        self.strategy
    }

    /// Id of the thread running the task, once it has started.
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.completion.lock().thread_id
    }

    pub fn thread_name(&self) -> Option<String> {
        self.completion.lock().thread_name.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.completion.lock().finished
    }

    /// Block until the task has finished and take its result.
    ///
    /// A second call (from any clone) gets a `WorkerFailure` saying the
    /// result was already collected.
    pub fn join(&self) -> ProgramResult {
        let state = self.completion.lock();
        let mut state = self
            .completion
            .done
            .wait_while(state, |s| !s.finished)
            .unwrap_or_else(PoisonError::into_inner);
        take_result(&mut state)
    }

    /// Like [`join`](Self::join) but gives up after `timeout`, returning
    /// `None` if the task is still running.
    pub fn join_timeout(&self, timeout: Duration) -> Option<ProgramResult> {
        let state = self.completion.lock();
        let (mut state, _) = self
            .completion
            .done
            .wait_timeout_while(state, timeout, |s| !s.finished)
            .unwrap_or_else(PoisonError::into_inner);
        state.finished.then(|| take_result(&mut state))
    }
}

fn take_result(state: &mut CompletionState) -> ProgramResult {
    state
        .result
        .take()
        .unwrap_or_else(|| Err(ProgramError::msg("worker result already collected")))
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.completion.lock();
        f.debug_struct("WorkerHandle")
            .field("strategy", &self.strategy)
            .field("thread_name", &state.thread_name)
            .field("finished", &state.finished)
            .finish()
    }
}

/// Seams and naming for the launcher.
#[derive(Clone)]
pub struct LauncherConfig {
    pub thread_name: String,
    pub spawner: Arc<dyn ThreadSpawner>,
    pub executor: Arc<dyn Executor>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            spawner: Arc::new(StdThreadSpawner),
            executor: Arc::new(ScheduledExecutor::new()),
        }
    }
}

impl LauncherConfig {
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    #[must_use]
    pub fn with_spawner(mut self, spawner: Arc<dyn ThreadSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }
}

impl fmt::Debug for LauncherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LauncherConfig")
            .field("thread_name", &self.thread_name)
            .finish_non_exhaustive()
    }
}

/// Executes worker tasks using the strategy chain.
#[derive(Debug, Default)]
pub struct WorkerLauncher {
    config: LauncherConfig,
}

impl WorkerLauncher {
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Start `task` asynchronously, falling back through the strategy chain.
    ///
    /// Returns as soon as a strategy accepted the task. If every asynchronous
    /// strategy refused, the task runs here and its failure, if any, is
    /// returned instead of a handle.
    pub fn launch<F>(&self, task: F) -> ProgramResult<WorkerHandle>
    where
        F: FnOnce() -> ProgramResult + Send + 'static,
    {
        let slot = TaskSlot::new(Box::new(task));
        let completion = Arc::new(Completion::default());

        match self
            .config
            .spawner
            .spawn(&self.config.thread_name, job(&slot, &completion))
        {
            Ok(()) => {
                tracing::info!(strategy = "thread", name = %self.config.thread_name, "worker launched");
                return Ok(handle(LaunchStrategy::Thread, completion));
            }
            Err(err) => {
                tracing::warn!(error = %err, "thread spawn refused, deferring to executor");
            }
        }

        match self.config.executor.execute(job(&slot, &completion)) {
            Ok(()) => {
                tracing::info!(strategy = "executor", "worker launched");
                return Ok(handle(LaunchStrategy::Executor, completion));
            }
            Err(err) => {
                tracing::warn!(error = %err, "executor refused, running worker inline");
            }
        }

        tracing::info!(strategy = "inline", "worker launched");
        run_job(&slot, &completion);
        if let Some(err) = completion.take_error() {
            return Err(err);
        }
        Ok(handle(LaunchStrategy::Inline, completion))
    }

    /// Run `task` to completion on the calling thread.
    ///
    /// Unlike the fallback inside [`launch`](Self::launch), the outcome stays
    /// in the returned handle for [`WorkerHandle::join`].
    pub fn run_inline<F>(&self, task: F) -> WorkerHandle
    where
        F: FnOnce() -> ProgramResult + Send + 'static,
    {
        let slot = TaskSlot::new(Box::new(task));
        let completion = Arc::new(Completion::default());
        tracing::debug!(strategy = "inline", "running worker on calling thread");
        run_job(&slot, &completion);
        handle(LaunchStrategy::Inline, completion)
    }
}

fn handle(strategy: LaunchStrategy, completion: Arc<Completion>) -> WorkerHandle {
    WorkerHandle {
        strategy,
        completion,
    }
}

fn job(slot: &TaskSlot, completion: &Arc<Completion>) -> Job {
    let slot = slot.clone();
    let completion = Arc::clone(completion);
    Box::new(move || run_job(&slot, &completion))
}

fn run_job(slot: &TaskSlot, completion: &Completion) {
    let Some(task) = slot.take() else {
        return;
    };
    completion.begin();
    let result = match catch_unwind(AssertUnwindSafe(task)) {
        Ok(result) => result,
        Err(payload) => Err(ProgramError::msg(panic_message(payload.as_ref()))),
    };
    match &result {
        Ok(()) => tracing::debug!("worker finished"),
        Err(err) if err.is_killed() => tracing::debug!("worker stopped by kill request"),
        Err(err) => tracing::error!(error = %err, kind = err.as_label(), "worker failed"),
    }
    completion.finish(result);
}
