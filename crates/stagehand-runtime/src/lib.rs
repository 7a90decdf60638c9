#![forbid(unsafe_code)]

//! Runtime for Stagehand programs.
//!
//! # Modules
//!
//! | Module | Role |
//! |--------|------|
//! | [`lifecycle`] | phase machine, `start()`/`exit()`, [`ProgramContext`] |
//! | [`launcher`] | worker thread with executor and inline fallbacks |
//! | [`startup`] | gate holding the worker until the surface shows |
//! | [`animation`] | repeating timer for the `animation()` hook |
//! | [`pause`] | time scaling, single-step ticks, cooperative kill |
//! | [`exit_hooks`] | ordered shutdown hooks |
//! | [`config_store`] | settings persistence |
//! | [`headless`] | in-memory surface and toolkit |
//! | [`program`] | the [`Program`] trait and [`ProgramConfig`] |
//!
//! # Threads
//!
//! A running program touches at most three threads: the caller of `start()`,
//! the worker running `run()`, and the animation timer. Every blocking wait
//! in user code goes through [`ProgramContext::pause`], which is where a kill
//! request is observed.

pub mod animation;
pub mod config_store;
pub mod exit_hooks;
pub mod headless;
pub mod launcher;
pub mod lifecycle;
pub mod pause;
pub mod program;
pub mod startup;

pub use animation::{AnimationScheduler, AnimationStats};
#[cfg(feature = "config-file")]
pub use config_store::FileConfigStore;
pub use config_store::{ConfigStore, MemoryConfigStore, PersistenceConfig, Properties, StorageError};
pub use exit_hooks::{ExitHook, ExitHookList};
pub use headless::{HeadlessSurface, HeadlessToolkit};
pub use launcher::{
    Executor, LaunchStrategy, LauncherConfig, ScheduledExecutor, StdThreadSpawner, ThreadSpawner,
    WorkerHandle, WorkerLauncher,
};
pub use lifecycle::{Lifecycle, ProgramContext};
pub use pause::PauseControl;
pub use program::{Phase, Program, ProgramConfig, ProgramMode};
pub use startup::{StartupConfig, StartupSynchronizer};
