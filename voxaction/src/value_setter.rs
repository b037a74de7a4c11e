//! Writing values into framework-controlled inputs.

use crate::element::{UIElement, UiEvent};
use crate::errors::ActionError;
use tracing::debug;

/// Port for putting a value into a control the rendering framework owns.
///
/// A naive assignment goes through the framework's instrumented setter, so the
/// framework never notices a change and the next render reverts the value.
/// Implementations encapsulate whatever a given framework needs instead.
pub trait ControlledValueSetter: Send + Sync {
    /// Put `value` into `element` and fire `events` so the framework commits it.
    fn set_value(
        &self,
        element: &UIElement,
        value: &str,
        events: &[UiEvent],
    ) -> Result<(), ActionError>;
}

/// Setter for trackers that compare the DOM value against a last-seen marker
/// (the React-style `_valueTracker`).
///
/// Order matters: native write, then tracker invalidation, then events.
/// Invalidating before the write would let the write refresh the marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReactiveValueSetter;

impl ControlledValueSetter for ReactiveValueSetter {
    fn set_value(
        &self,
        element: &UIElement,
        value: &str,
        events: &[UiEvent],
    ) -> Result<(), ActionError> {
        element.set_native_value(value)?;
        if !element.invalidate_value_tracker() {
            debug!(
                "{:?} has no value tracker; dispatching events anyway",
                element.stable_id()
            );
        }
        for event in events {
            element.dispatch_event(*event)?;
        }
        Ok(())
    }
}

pub const SELECT_EVENTS: &[UiEvent] = &[UiEvent::Change];
pub const TEXT_EVENTS: &[UiEvent] = &[UiEvent::Input, UiEvent::Change];
