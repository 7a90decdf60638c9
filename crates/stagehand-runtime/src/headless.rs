#![forbid(unsafe_code)]

//! Headless surface and toolkit.
//!
//! Stand-ins for a real windowing collaborator: the surface is "showing" when
//! it is visible and has a nonzero size, and every change notifies the
//! registered listeners. Used by the default standalone configuration and by
//! tests that drive visibility by hand.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stagehand_core::capability::Widget;
use stagehand_core::geometry::{Rect, Size};
use stagehand_core::surface::{Surface, SurfaceListener, Toolkit, VisibilitySignal};

#[derive(Default)]
struct SurfaceState {
    title: String,
    visible: bool,
    size: Size,
    validations: usize,
    listeners: Vec<Arc<dyn SurfaceListener>>,
    widgets: Vec<Arc<dyn Widget>>,
}

/// In-memory surface.
#[derive(Default)]
pub struct HeadlessSurface {
    state: Mutex<SurfaceState>,
}

impl HeadlessSurface {
    /// A hidden surface of the given size.
    pub fn new(size: Size) -> Self {
        Self {
            state: Mutex::new(SurfaceState {
                size,
                ..SurfaceState::default()
            }),
        }
    }

    /// Change the size and notify listeners.
    pub fn resize(&self, size: Size) {
        self.lock().size = size;
        self.notify();
    }

    /// Place a widget on the surface.
    pub fn add_widget(&self, widget: Arc<dyn Widget>) {
        self.lock().widgets.push(widget);
    }

    pub fn title(&self) -> String {
        self.lock().title.clone()
    }

    pub fn is_visible(&self) -> bool {
        self.lock().visible
    }

    /// How many times `validate` was called.
    pub fn validations(&self) -> usize {
        self.lock().validations
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn notify(&self) {
        let listeners = self.lock().listeners.clone();
        for listener in listeners {
            listener.surface_changed();
        }
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VisibilitySignal for HeadlessSurface {
    fn is_showing(&self) -> bool {
        let state = self.lock();
        state.visible && state.size.width > 0 && state.size.height > 0
    }
}

impl Surface for HeadlessSurface {
    fn set_visible(&self, visible: bool) {
        let changed = {
            let mut state = self.lock();
            std::mem::replace(&mut state.visible, visible) != visible
        };
        if changed {
            self.notify();
        }
    }

    fn validate(&self) {
        self.lock().validations += 1;
    }

    fn add_listener(&self, listener: Arc<dyn SurfaceListener>) {
        self.lock().listeners.push(listener);
    }

    fn size(&self) -> Size {
        self.lock().size
    }

    fn widgets(&self) -> Vec<Arc<dyn Widget>> {
        self.lock().widgets.clone()
    }

    fn set_title(&self, title: &str) {
        title.clone_into(&mut self.lock().title);
    }
}

impl std::fmt::Debug for HeadlessSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("HeadlessSurface")
            .field("title", &state.title)
            .field("visible", &state.visible)
            .field("size", &state.size)
            .finish_non_exhaustive()
    }
}

/// A window created by [`HeadlessToolkit`].
#[derive(Debug, Clone)]
pub struct CreatedWindow {
    pub title: String,
    pub bounds: Rect,
    pub surface: Arc<HeadlessSurface>,
}

/// Toolkit producing [`HeadlessSurface`] windows on a fixed-size screen.
#[derive(Debug)]
pub struct HeadlessToolkit {
    screen: Size,
    windows: Mutex<Vec<CreatedWindow>>,
}

impl HeadlessToolkit {
    pub fn new(screen: Size) -> Self {
        Self {
            screen,
            windows: Mutex::new(Vec::new()),
        }
    }

    /// Every window created so far.
    pub fn windows(&self) -> Vec<CreatedWindow> {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for HeadlessToolkit {
    fn default() -> Self {
        Self::new(Size::new(1920, 1080))
    }
}

impl Toolkit for HeadlessToolkit {
    fn screen_size(&self) -> Size {
        self.screen
    }

    fn create_window(&self, title: &str, bounds: Rect) -> Arc<dyn Surface> {
        let surface = Arc::new(HeadlessSurface::new(Size::new(bounds.width, bounds.height)));
        surface.set_title(title);
        tracing::debug!(title, ?bounds, "headless window created");
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CreatedWindow {
                title: title.to_owned(),
                bounds,
                surface: Arc::clone(&surface),
            });
        surface
    }
}
