#![forbid(unsafe_code)]

//! Contracts with the windowing collaborator.
//!
//! The runtime never renders. It only needs to know whether its surface is on
//! screen ([`VisibilitySignal`]), to be told when that may have changed
//! ([`SurfaceListener`]), and, in standalone mode, to ask a [`Toolkit`] for a
//! top-level window.

use std::sync::Arc;

use crate::capability::Widget;
use crate::geometry::{Rect, Size};

/// Whether the visual surface has a nonzero size and is displayed.
pub trait VisibilitySignal: Send + Sync {
    fn is_showing(&self) -> bool;
}

/// Notified by the windowing collaborator on every resize/show event.
pub trait SurfaceListener: Send + Sync {
    fn surface_changed(&self);
}

/// A visual surface: a host container (embedded) or a top-level window.
pub trait Surface: VisibilitySignal {
    /// Show or hide the surface.
    fn set_visible(&self, visible: bool);

    /// Re-run layout. Hosts without layout can ignore it.
    fn validate(&self) {}

    /// Register for resize/show notifications.
    fn add_listener(&self, listener: Arc<dyn SurfaceListener>);

    /// Current size of the surface.
    fn size(&self) -> Size;

    /// Widgets placed on the surface, for capability wiring.
    fn widgets(&self) -> Vec<Arc<dyn Widget>> {
        Vec::new()
    }

    /// Update the window title. Embedded hosts usually have none.
    fn set_title(&self, title: &str) {
        let _ = title;
    }
}

/// Creates top-level windows for standalone programs.
pub trait Toolkit: Send + Sync {
    /// Dimensions of the screen used to resolve percentage sizes.
    fn screen_size(&self) -> Size;

    /// Create a (not yet visible) top-level window with the given bounds.
    fn create_window(&self, title: &str, bounds: Rect) -> Arc<dyn Surface>;
}
