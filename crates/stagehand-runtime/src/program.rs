#![forbid(unsafe_code)]

//! The user-facing program contract and its configuration.

use std::fmt;
use std::sync::Arc;

use stagehand_core::capability::ActionEvent;
use stagehand_core::error::ProgramResult;
use stagehand_core::sink::{OutputSink, StdioSink};
use stagehand_core::surface::{Surface, Toolkit};

use crate::animation::{DEFAULT_DELAY_MS, delay_for_fps};
use crate::config_store::{PersistenceConfig, Properties};
use crate::headless::HeadlessToolkit;
use crate::launcher::LauncherConfig;
use crate::lifecycle::ProgramContext;
use crate::startup::StartupConfig;

/// Application logic driven by a [`Lifecycle`](crate::lifecycle::Lifecycle).
///
/// Every hook has a no-op default. Hooks run on these threads:
///
/// | Hook | Thread |
/// |------|--------|
/// | `init` | caller of `start()` |
/// | `start_hook`, `run`, `end_hook` | worker |
/// | `animation` | animation timer |
/// | `save_configuration` | caller of `exit()` |
/// | `load_configuration` | caller of `start()` |
/// | `action_performed` | whichever thread fires the widget |
pub trait Program: Send + Sync + 'static {
    /// One-time setup, before the worker starts.
    fn init(&self, ctx: &ProgramContext) -> ProgramResult {
        let _ = ctx;
        Ok(())
    }

    /// Runs on the worker right before `run`.
    fn start_hook(&self, ctx: &ProgramContext) -> ProgramResult {
        let _ = ctx;
        Ok(())
    }

    /// The program's main logic.
    fn run(&self, ctx: &ProgramContext) -> ProgramResult {
        let _ = ctx;
        Ok(())
    }

    /// Runs on the worker after `run` returned successfully.
    fn end_hook(&self, ctx: &ProgramContext) -> ProgramResult {
        let _ = ctx;
        Ok(())
    }

    /// One animation frame.
    fn animation(&self, ctx: &ProgramContext) {
        let _ = ctx;
    }

    /// Fill `properties` with settings to persist.
    fn save_configuration(&self, ctx: &ProgramContext, properties: &mut Properties) {
        let _ = (ctx, properties);
    }

    /// Restore settings persisted by a previous run.
    fn load_configuration(&self, ctx: &ProgramContext, properties: &Properties) {
        let _ = (ctx, properties);
    }

    /// A wired widget fired an action.
    fn action_performed(&self, ctx: &ProgramContext, event: &ActionEvent) {
        let _ = (ctx, event);
    }
}

/// Where the program's surface comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramMode {
    /// The program owns a top-level window.
    Standalone,
    /// The program lives inside a host-supplied surface.
    Embedded,
}

impl ProgramMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standalone => "standalone",
            Self::Embedded => "embedded",
        }
    }
}

/// Lifecycle phase. Phases only move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    #[default]
    Constructed,
    ModeDetected,
    SurfaceReady,
    Started,
    Initialized,
    Running,
    Finished,
    Exited,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Constructed => "constructed",
            Self::ModeDetected => "mode_detected",
            Self::SurfaceReady => "surface_ready",
            Self::Started => "started",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Exited => "exited",
        }
    }
}

/// Ends the process. Receives the exit status.
pub type Terminator = Arc<dyn Fn(i32) + Send + Sync>;

fn exit_process(code: i32) {
    std::process::exit(code)
}

/// Everything a [`Lifecycle`](crate::lifecycle::Lifecycle) needs besides the
/// program itself.
#[derive(Clone)]
pub struct ProgramConfig {
    /// Window title in standalone mode.
    pub title: String,
    /// Host surface. `Some` selects embedded mode.
    pub host: Option<Arc<dyn Surface>>,
    /// Window factory for standalone mode.
    pub toolkit: Arc<dyn Toolkit>,
    /// Destination for status and error text.
    pub output: Arc<dyn OutputSink>,
    pub startup: StartupConfig,
    pub launcher: LauncherConfig,
    pub persistence: PersistenceConfig,
    /// Terminate the process when a standalone program exits. Default: true.
    pub exit_on_close: bool,
    /// Initial delay between animation frames. `None` keeps the scheduler's
    /// default delay.
    pub animation_delay_ms: Option<u64>,
    pub terminator: Terminator,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            title: "Stagehand Program".to_owned(),
            host: None,
            toolkit: Arc::new(HeadlessToolkit::default()),
            output: Arc::new(StdioSink),
            startup: StartupConfig::default(),
            launcher: LauncherConfig::default(),
            persistence: PersistenceConfig::default(),
            exit_on_close: true,
            animation_delay_ms: Some(DEFAULT_DELAY_MS),
            terminator: Arc::new(exit_process),
        }
    }
}

impl ProgramConfig {
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Embed the program in `host`.
    #[must_use]
    pub fn with_host(mut self, host: Arc<dyn Surface>) -> Self {
        self.host = Some(host);
        self
    }

    #[must_use]
    pub fn with_toolkit(mut self, toolkit: Arc<dyn Toolkit>) -> Self {
        self.toolkit = toolkit;
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: Arc<dyn OutputSink>) -> Self {
        self.output = output;
        self
    }

    #[must_use]
    pub fn with_startup(mut self, startup: StartupConfig) -> Self {
        self.startup = startup;
        self
    }

    #[must_use]
    pub fn with_launcher(mut self, launcher: LauncherConfig) -> Self {
        self.launcher = launcher;
        self
    }

    #[must_use]
    pub fn with_persistence(mut self, persistence: PersistenceConfig) -> Self {
        self.persistence = persistence;
        self
    }

    #[must_use]
    pub fn exit_on_close(mut self, enabled: bool) -> Self {
        self.exit_on_close = enabled;
        self
    }

    /// Initial animation rate.
    ///
    /// `0` means stopped, as `set_frames_per_second(0)` does at run time: no
    /// rate is configured, animation stays off, and a later
    /// `set_animated(true)` runs at the default delay.
    #[must_use]
    pub fn frames_per_second(mut self, fps: u32) -> Self {
        self.animation_delay_ms = (fps > 0).then(|| delay_for_fps(fps));
        self
    }

    #[must_use]
    pub fn with_terminator(mut self, terminator: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.terminator = Arc::new(terminator);
        self
    }

    /// Mode implied by the configuration.
    pub fn mode(&self) -> ProgramMode {
        if self.host.is_some() {
            ProgramMode::Embedded
        } else {
            ProgramMode::Standalone
        }
    }
}

impl fmt::Debug for ProgramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramConfig")
            .field("title", &self.title)
            .field("mode", &self.mode())
            .field("startup", &self.startup)
            .field("launcher", &self.launcher)
            .field("persistence", &self.persistence)
            .field("exit_on_close", &self.exit_on_close)
            .field("animation_delay_ms", &self.animation_delay_ms)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessSurface;
    use stagehand_core::geometry::Size;

    #[test]
    fn mode_follows_host() {
        let config = ProgramConfig::default();
        assert_eq!(config.mode(), ProgramMode::Standalone);
        let config = config.with_host(Arc::new(HeadlessSurface::new(Size::new(10, 10))));
        assert_eq!(config.mode(), ProgramMode::Embedded);
    }

    #[test]
    fn phases_are_ordered() {
        assert!(Phase::Constructed < Phase::ModeDetected);
        assert!(Phase::Initialized < Phase::Running);
        assert!(Phase::Finished < Phase::Exited);
        assert_eq!(Phase::SurfaceReady.as_str(), "surface_ready");
    }

    #[test]
    fn builder_sets_animation_rate() {
        let config = ProgramConfig::default().frames_per_second(25);
        assert_eq!(config.animation_delay_ms, Some(40));
        assert!(config.exit_on_close);
        assert_eq!(config.frames_per_second(0).animation_delay_ms, None);
        assert!(!ProgramConfig::default().exit_on_close(false).exit_on_close);
    }
}
