#![forbid(unsafe_code)]

//! A [`Program`] that records every hook invocation.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use stagehand_core::capability::ActionEvent;
use stagehand_core::error::{ProgramError, ProgramResult};
use stagehand_runtime::config_store::Properties;
use stagehand_runtime::lifecycle::ProgramContext;
use stagehand_runtime::program::{Phase, Program};

/// Which hook ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hook {
    Init,
    StartHook,
    Run,
    EndHook,
    Animation,
    SaveConfiguration,
    LoadConfiguration,
    ActionPerformed(String),
}

impl Hook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::StartHook => "start_hook",
            Self::Run => "run",
            Self::EndHook => "end_hook",
            Self::Animation => "animation",
            Self::SaveConfiguration => "save_configuration",
            Self::LoadConfiguration => "load_configuration",
            Self::ActionPerformed(_) => "action_performed",
        }
    }
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct Record {
    pub hook: Hook,
    /// Name of the thread the hook ran on.
    pub thread: Option<String>,
    /// Phase observed when the hook started.
    pub phase: Phase,
    /// Time since the program was created.
    pub at: Duration,
}

#[derive(Debug, Default, Clone)]
struct Behavior {
    fail_init: Option<String>,
    fail_run: Option<String>,
    panic_run: bool,
    run_pauses: usize,
    pause_ms: f64,
    settings: Properties,
    exit_after_run: bool,
}

/// Program double recording hook calls in order.
#[derive(Debug)]
pub struct RecordingProgram {
    origin: Instant,
    behavior: Behavior,
    records: Mutex<Vec<Record>>,
    loaded: Mutex<Option<Properties>>,
}

impl Default for RecordingProgram {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingProgram {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            behavior: Behavior::default(),
            records: Mutex::new(Vec::new()),
            loaded: Mutex::new(None),
        }
    }

    /// Make `init` fail with `message`.
    #[must_use]
    pub fn failing_init(mut self, message: impl Into<String>) -> Self {
        self.behavior.fail_init = Some(message.into());
        self
    }

    /// Make `run` fail with `message`.
    #[must_use]
    pub fn failing_run(mut self, message: impl Into<String>) -> Self {
        self.behavior.fail_run = Some(message.into());
        self
    }

    /// Make `run` panic.
    #[must_use]
    pub fn panicking_run(mut self) -> Self {
        self.behavior.panic_run = true;
        self
    }

    /// Make `run` call `pause(millis)` `count` times.
    #[must_use]
    pub fn pausing(mut self, count: usize, millis: f64) -> Self {
        self.behavior.run_pauses = count;
        self.behavior.pause_ms = millis;
        self
    }

    /// Save `key = value` from `save_configuration`.
    #[must_use]
    pub fn saving(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.behavior.settings.insert(key.into(), value.into());
        self
    }

    /// Call `exit()` at the end of `run`.
    #[must_use]
    pub fn exiting_after_run(mut self) -> Self {
        self.behavior.exit_after_run = true;
        self
    }

    pub fn records(&self) -> Vec<Record> {
        lock(&self.records).clone()
    }

    /// Hooks in invocation order.
    pub fn hooks(&self) -> Vec<Hook> {
        lock(&self.records).iter().map(|r| r.hook.clone()).collect()
    }

    /// How many times `hook` ran.
    pub fn count(&self, hook: &Hook) -> usize {
        lock(&self.records).iter().filter(|r| r.hook == *hook).count()
    }

    /// Hooks in order, animation frames left out.
    pub fn lifecycle_hooks(&self) -> Vec<Hook> {
        self.hooks()
            .into_iter()
            .filter(|h| *h != Hook::Animation)
            .collect()
    }

    /// Settings passed to `load_configuration`, if it ran.
    pub fn loaded(&self) -> Option<Properties> {
        lock(&self.loaded).clone()
    }

    /// The record as JSON lines, one object per hook call.
    pub fn to_jsonl(&self) -> String {
        let mut out = String::new();
        for record in lock(&self.records).iter() {
            let line = serde_json::json!({
                "hook": record.hook.as_str(),
                "thread": record.thread,
                "phase": record.phase.as_str(),
                "at_us": record.at.as_micros() as u64,
            });
            out.push_str(&line.to_string());
            out.push('\n');
        }
        out
    }

    fn record(&self, ctx: &ProgramContext, hook: Hook) {
        let record = Record {
            hook,
            thread: thread::current().name().map(str::to_owned),
            phase: ctx.phase(),
            at: self.origin.elapsed(),
        };
        lock(&self.records).push(record);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Program for RecordingProgram {
    fn init(&self, ctx: &ProgramContext) -> ProgramResult {
        self.record(ctx, Hook::Init);
        match &self.behavior.fail_init {
            Some(message) => Err(ProgramError::msg(message.clone())),
            None => Ok(()),
        }
    }

    fn start_hook(&self, ctx: &ProgramContext) -> ProgramResult {
        self.record(ctx, Hook::StartHook);
        Ok(())
    }

    fn run(&self, ctx: &ProgramContext) -> ProgramResult {
        self.record(ctx, Hook::Run);
        if self.behavior.panic_run {
            panic!("recording program asked to panic");
        }
        for _ in 0..self.behavior.run_pauses {
            ctx.pause(self.behavior.pause_ms)?;
        }
        if let Some(message) = &self.behavior.fail_run {
            return Err(ProgramError::msg(message.clone()));
        }
        if self.behavior.exit_after_run {
            ctx.exit()?;
        }
        Ok(())
    }

    fn end_hook(&self, ctx: &ProgramContext) -> ProgramResult {
        self.record(ctx, Hook::EndHook);
        Ok(())
    }

    fn animation(&self, ctx: &ProgramContext) {
        self.record(ctx, Hook::Animation);
    }

    fn save_configuration(&self, ctx: &ProgramContext, properties: &mut Properties) {
        self.record(ctx, Hook::SaveConfiguration);
        properties.extend(self.behavior.settings.clone());
    }

    fn load_configuration(&self, ctx: &ProgramContext, properties: &Properties) {
        self.record(ctx, Hook::LoadConfiguration);
        *lock(&self.loaded) = Some(properties.clone());
    }

    fn action_performed(&self, ctx: &ProgramContext, event: &ActionEvent) {
        self.record(ctx, Hook::ActionPerformed(event.command.clone()));
    }
}
