#![forbid(unsafe_code)]

//! Explicit capability wiring for interactive widgets.
//!
//! Widgets that can fire actions implement [`Clickable`] and expose it through
//! [`Widget::as_clickable`]. [`wire_action_listeners`] walks a widget list and
//! attaches one listener to every widget that opted in; nothing else is
//! touched.

use std::sync::Arc;

/// The kind of a widget, as far as wiring cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Button,
    Field,
    Chooser,
    Label,
    Other,
}

/// An action fired by a clickable widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEvent {
    /// Command string, usually the widget's label.
    pub command: String,
    /// Name of the widget that fired.
    pub source: String,
}

impl ActionEvent {
    /// Create an action event.
    pub fn new(command: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            source: source.into(),
        }
    }
}

/// Receives action events.
pub trait ActionListener: Send + Sync {
    fn action_performed(&self, event: &ActionEvent);
}

impl<F> ActionListener for F
where
    F: Fn(&ActionEvent) + Send + Sync,
{
    fn action_performed(&self, event: &ActionEvent) {
        self(event)
    }
}

/// A widget that accepts action listeners.
pub trait Clickable: Send + Sync {
    fn add_action_listener(&self, listener: Arc<dyn ActionListener>);
}

/// Anything placed on a program surface.
pub trait Widget: Send + Sync {
    /// Name used in diagnostics and as the event source.
    fn name(&self) -> &str;

    fn kind(&self) -> WidgetKind {
        WidgetKind::Other
    }

    /// The widget's clickable capability, if it has one.
    fn as_clickable(&self) -> Option<&dyn Clickable> {
        None
    }
}

/// Which clickable widgets get wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireScope {
    /// Every widget exposing [`Clickable`].
    #[default]
    All,
    /// Only clickable widgets whose kind is [`WidgetKind::Button`].
    ButtonsOnly,
}

/// Attach `listener` to every clickable widget in scope.
///
/// Returns the number of widgets wired.
pub fn wire_action_listeners(
    widgets: &[Arc<dyn Widget>],
    listener: &Arc<dyn ActionListener>,
    scope: WireScope,
) -> usize {
    let mut wired = 0;
    for widget in widgets {
        if scope == WireScope::ButtonsOnly && widget.kind() != WidgetKind::Button {
            continue;
        }
        if let Some(clickable) = widget.as_clickable() {
            clickable.add_action_listener(Arc::clone(listener));
            wired += 1;
        }
    }
    tracing::debug!(wired, total = widgets.len(), ?scope, "wired action listeners");
    wired
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Button {
        name: &'static str,
        kind: WidgetKind,
        listeners: Mutex<Vec<Arc<dyn ActionListener>>>,
    }

    impl Button {
        fn new(name: &'static str, kind: WidgetKind) -> Arc<Self> {
            Arc::new(Self {
                name,
                kind,
                listeners: Mutex::new(Vec::new()),
            })
        }

        fn click(&self) {
            let event = ActionEvent::new(self.name, self.name);
            for listener in self.listeners.lock().unwrap().iter() {
                listener.action_performed(&event);
            }
        }
    }

    impl Clickable for Button {
        fn add_action_listener(&self, listener: Arc<dyn ActionListener>) {
            self.listeners.lock().unwrap().push(listener);
        }
    }

    impl Widget for Button {
        fn name(&self) -> &str {
            self.name
        }

        fn kind(&self) -> WidgetKind {
            self.kind
        }

        fn as_clickable(&self) -> Option<&dyn Clickable> {
            Some(self)
        }
    }

    struct Label;

    impl Widget for Label {
        fn name(&self) -> &str {
            "label"
        }
    }

    #[test]
    fn only_clickable_widgets_are_wired() {
        let ok = Button::new("ok", WidgetKind::Button);
        let field = Button::new("field", WidgetKind::Field);
        let widgets: Vec<Arc<dyn Widget>> = vec![
            ok.clone() as Arc<dyn Widget>,
            Arc::new(Label),
            field.clone(),
        ];
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let listener: Arc<dyn ActionListener> = Arc::new(move |_: &ActionEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(wire_action_listeners(&widgets, &listener, WireScope::All), 2);
        ok.click();
        field.click();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn buttons_only_skips_other_clickables() {
        let ok = Button::new("ok", WidgetKind::Button);
        let field = Button::new("field", WidgetKind::Field);
        let widgets: Vec<Arc<dyn Widget>> = vec![ok.clone() as Arc<dyn Widget>, field.clone()];
        let listener: Arc<dyn ActionListener> = Arc::new(|_: &ActionEvent| {});

        assert_eq!(
            wire_action_listeners(&widgets, &listener, WireScope::ButtonsOnly),
            1
        );
        assert_eq!(ok.listeners.lock().unwrap().len(), 1);
        assert!(field.listeners.lock().unwrap().is_empty());
    }
}
