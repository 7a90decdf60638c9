#![forbid(unsafe_code)]

//! Core: error taxonomy, launch parameters, program bounds, and the contracts
//! the runtime shares with its windowing collaborator.
//!
//! Nothing in this crate spawns threads. The lifecycle engine itself lives in
//! `stagehand-runtime`.

pub mod capability;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod parameters;
pub mod sink;
pub mod surface;

pub use capability::{
    ActionEvent, ActionListener, Clickable, Widget, WidgetKind, WireScope, wire_action_listeners,
};
pub use error::{BoxError, ProgramError, ProgramResult};
pub use geometry::{Rect, Size};
pub use parameters::Parameters;
pub use sink::{MemorySink, OutputSink, StdioSink, TracingSink};
pub use surface::{Surface, SurfaceListener, Toolkit, VisibilitySignal};
