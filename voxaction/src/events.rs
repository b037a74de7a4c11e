//! Named signals broadcast after an action takes effect.
//!
//! Page-level components register a [`SignalListener`] on the engine's
//! [`SignalBus`] instead of the engine reaching into an ambient global bus.

use crate::action::ActionType;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

pub const NAVIGATE: &str = "voice:navigate";
pub const SWITCH_TAB: &str = "voice:switch-tab";
pub const CLICK_BUTTON: &str = "voice:click-button";
pub const EXPAND_DROPDOWN: &str = "voice:expand-dropdown";
pub const SELECT_DROPDOWN: &str = "voice:select-dropdown";
pub const FILL_INPUT: &str = "voice:fill-input";
pub const CLEAR_INPUT: &str = "voice:clear-input";
pub const SELECT_LIST_ITEM: &str = "voice:select-list-item";
pub const OPEN_MODAL: &str = "voice:open-modal";
pub const CLOSE_MODAL: &str = "voice:close-modal";
pub const TOAST: &str = "voice:toast";
pub const SCROLL: &str = "voice:scroll";
pub const SUBMIT_FORM: &str = "voice:submit-form";
pub const OPEN_MENU_AND_CLICK: &str = "voice:open-menu-and-click";

/// The signal name broadcast for each action kind.
pub fn signal_name(kind: ActionType) -> &'static str {
    match kind {
        ActionType::Navigate => NAVIGATE,
        ActionType::SwitchTab => SWITCH_TAB,
        ActionType::ClickButton => CLICK_BUTTON,
        ActionType::ExpandDropdown => EXPAND_DROPDOWN,
        ActionType::SelectDropdown => SELECT_DROPDOWN,
        ActionType::FillInput => FILL_INPUT,
        ActionType::ClearInput => CLEAR_INPUT,
        ActionType::SelectListItem => SELECT_LIST_ITEM,
        ActionType::OpenModal => OPEN_MODAL,
        ActionType::CloseModal => CLOSE_MODAL,
        ActionType::Toast => TOAST,
        ActionType::Scroll => SCROLL,
        ActionType::SubmitForm => SUBMIT_FORM,
        ActionType::OpenMenuAndClick => OPEN_MENU_AND_CLICK,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSignal {
    pub name: &'static str,
    pub kind: ActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Stable id of the element the action landed on, when there was one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_id: Option<String>,
    pub payload: Value,
}

pub trait SignalListener: Send + Sync {
    fn on_signal(&self, signal: &ActionSignal);
}

impl<F> SignalListener for F
where
    F: Fn(&ActionSignal) + Send + Sync,
{
    fn on_signal(&self, signal: &ActionSignal) {
        self(signal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct SignalBus {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn SignalListener>)>>,
}

impl fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn SignalListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, listener));
        id
    }

    /// Returns `false` if the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn emit(&self, signal: &ActionSignal) {
        // Snapshot first so listeners may (un)subscribe from inside the callback.
        let listeners: Vec<Arc<dyn SignalListener>> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        debug!(
            signal = signal.name,
            listeners = listeners.len(),
            "broadcasting action signal"
        );
        for listener in listeners {
            listener.on_signal(signal);
        }
    }
}
