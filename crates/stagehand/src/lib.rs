#![forbid(unsafe_code)]

//! Stagehand public facade crate.
//!
//! Stagehand runs a long-lived program either embedded in a host surface or as
//! a standalone window. It starts the program's logic on a worker once the
//! surface is on screen, drives an optional animation timer, and gives the
//! program cooperative pause and kill control.
//!
//! ```no_run
//! use stagehand::prelude::*;
//!
//! struct Counter;
//!
//! impl Program for Counter {
//!     fn run(&self, ctx: &ProgramContext) -> ProgramResult {
//!         for i in 0..10 {
//!             ctx.output().println(&format!("tick {i}"));
//!             ctx.pause(100.0)?;
//!         }
//!         ctx.exit()
//!     }
//! }
//!
//! fn main() -> ProgramResult {
//!     let lifecycle = Lifecycle::new(Counter, ProgramConfig::default().with_title("Counter"));
//!     lifecycle.start(std::env::args().skip(1))?;
//!     Ok(())
//! }
//! ```

// --- Core re-exports -------------------------------------------------------

pub use stagehand_core::capability::{
    ActionEvent, ActionListener, Clickable, Widget, WidgetKind, WireScope, wire_action_listeners,
};
pub use stagehand_core::error::{BoxError, ProgramError, ProgramResult};
pub use stagehand_core::geometry::{Rect, Size, program_bounds};
pub use stagehand_core::parameters::Parameters;
pub use stagehand_core::sink::{MemorySink, OutputSink, StdioSink, TracingSink};
pub use stagehand_core::surface::{Surface, SurfaceListener, Toolkit, VisibilitySignal};

// --- Runtime re-exports ----------------------------------------------------

pub use stagehand_runtime::{
    AnimationScheduler, AnimationStats, ConfigStore, ExitHook, HeadlessSurface, HeadlessToolkit,
    LaunchStrategy, LauncherConfig, Lifecycle, MemoryConfigStore, PauseControl, PersistenceConfig,
    Phase, Program, ProgramConfig, ProgramContext, ProgramMode, Properties, StartupConfig,
    StorageError, WorkerHandle,
};

#[cfg(feature = "config-file")]
pub use stagehand_runtime::FileConfigStore;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        ActionEvent, Lifecycle, OutputSink, Phase, Program, ProgramConfig, ProgramContext,
        ProgramError, ProgramMode, ProgramResult, Properties, StartupConfig,
    };

    pub use crate::{core, runtime};
}

pub use stagehand_core as core;
pub use stagehand_runtime as runtime;
