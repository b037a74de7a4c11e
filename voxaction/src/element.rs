use crate::errors::ActionError;
use crate::selector::ElementKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fmt::Debug;

/// Events the engine may dispatch on an element after mutating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiEvent {
    Input,
    Change,
    MouseDown,
    Click,
    Focus,
}

impl UiEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            UiEvent::Input => "input",
            UiEvent::Change => "change",
            UiEvent::MouseDown => "mousedown",
            UiEvent::Click => "click",
            UiEvent::Focus => "focus",
        }
    }
}

/// One entry of a selection control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// Empty-valued options are "Select..." placeholders, never real choices.
    pub fn is_placeholder(&self) -> bool {
        self.value.trim().is_empty()
    }
}

/// Helper functions for clean serialization
fn is_empty_string(opt: &Option<String>) -> bool {
    match opt {
        Some(s) => s.is_empty(),
        None => true,
    }
}

fn is_false_bool(opt: &Option<bool>) -> bool {
    matches!(opt, Some(false) | None)
}

/// Attributes associated with a UI element
#[derive(Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UIElementAttributes {
    /// Lowercased tag name (`button`, `input`, `select`, `textarea`, `form`, `div`, ...)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    /// ARIA role, when one is set (`tab`, `dialog`, `menuitem`, `listitem`, ...)
    #[serde(default, skip_serializing_if = "is_empty_string")]
    pub role: Option<String>,
    /// The stable identifier the engine resolves against
    #[serde(default, skip_serializing_if = "is_empty_string")]
    pub stable_id: Option<String>,
    /// Visible text content
    #[serde(default, skip_serializing_if = "is_empty_string")]
    pub text: Option<String>,
    /// Accessible label (`aria-label` or an associated `<label>`)
    #[serde(default, skip_serializing_if = "is_empty_string")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "is_empty_string")]
    pub placeholder: Option<String>,
    /// `type` attribute of inputs and buttons
    #[serde(default, skip_serializing_if = "is_empty_string")]
    pub input_type: Option<String>,
    #[serde(default, skip_serializing_if = "is_empty_string")]
    pub value: Option<String>,
    /// `false` when the native `disabled` attribute is present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "is_false_bool")]
    pub aria_disabled: Option<bool>,
    /// Tab activity / option selection (`aria-selected`)
    #[serde(default, skip_serializing_if = "is_false_bool")]
    pub is_selected: Option<bool>,
    /// Modal / menu visibility
    #[serde(default, skip_serializing_if = "is_false_bool")]
    pub is_open: Option<bool>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, String>,
}

impl fmt::Debug for UIElementAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug_struct = f.debug_struct("UIElementAttributes");

        if !self.tag.is_empty() {
            debug_struct.field("tag", &self.tag);
        }

        for (name, field) in [
            ("role", &self.role),
            ("stable_id", &self.stable_id),
            ("text", &self.text),
            ("label", &self.label),
            ("placeholder", &self.placeholder),
            ("input_type", &self.input_type),
            ("value", &self.value),
        ] {
            if let Some(value) = field {
                if !value.is_empty() {
                    debug_struct.field(name, value);
                }
            }
        }

        if let Some(false) = self.enabled {
            debug_struct.field("enabled", &false);
        }

        if let Some(true) = self.aria_disabled {
            debug_struct.field("aria_disabled", &true);
        }

        if let Some(true) = self.is_selected {
            debug_struct.field("is_selected", &true);
        }

        if let Some(true) = self.is_open {
            debug_struct.field("is_open", &true);
        }

        if !self.properties.is_empty() {
            debug_struct.field("properties", &self.properties);
        }

        debug_struct.finish()
    }
}

/// Interface for platform-specific element implementations
pub trait UIElementImpl: Send + Sync + Debug {
    fn object_id(&self) -> usize;
    fn stable_id(&self) -> Option<String>;
    fn attributes(&self) -> UIElementAttributes;
    fn children(&self) -> Result<Vec<UIElement>, ActionError>;
    fn parent(&self) -> Result<Option<UIElement>, ActionError>;
    fn click(&self) -> Result<(), ActionError>;
    fn focus(&self) -> Result<(), ActionError>;
    fn scroll_into_view(&self) -> Result<(), ActionError>;

    /// Show the native picker of a selection control without changing its value.
    fn show_picker(&self) -> Result<(), ActionError>;

    /// Ask a form container to submit itself, running its validation.
    fn request_submit(&self) -> Result<(), ActionError>;

    /// Options of a selection control, in display order.
    fn options(&self) -> Vec<SelectOption> {
        Vec::new()
    }

    /// Write `value` through the element's native (non-overridden) setter,
    /// bypassing any wrapper a rendering framework installed.
    fn set_native_value(&self, value: &str) -> Result<(), ActionError>;

    /// Reset the framework's last-seen value marker so the next event is
    /// treated as a change. Returns `false` when the element has no tracker.
    fn invalidate_value_tracker(&self) -> bool;

    fn dispatch_event(&self, event: UiEvent) -> Result<(), ActionError>;

    fn as_any(&self) -> &dyn std::any::Any;

    fn clone_box(&self) -> Box<dyn UIElementImpl>;
}

/// Represents a UI element in the live tree
#[derive(Debug)]
pub struct UIElement {
    inner: Box<dyn UIElementImpl>,
}

impl UIElement {
    /// Create a new UI element from a platform-specific implementation
    pub fn new(impl_: Box<dyn UIElementImpl>) -> Self {
        Self { inner: impl_ }
    }

    pub fn object_id(&self) -> usize {
        self.inner.object_id()
    }

    /// Get the element's stable identifier, if it carries one
    pub fn stable_id(&self) -> Option<String> {
        self.inner.stable_id().filter(|id| !id.is_empty())
    }

    pub fn stable_id_or_empty(&self) -> String {
        self.stable_id().unwrap_or_default()
    }

    pub fn attributes(&self) -> UIElementAttributes {
        self.inner.attributes()
    }

    pub fn tag(&self) -> String {
        self.attributes().tag
    }

    pub fn role(&self) -> Option<String> {
        self.attributes().role
    }

    pub fn children(&self) -> Result<Vec<UIElement>, ActionError> {
        self.inner.children()
    }

    pub fn parent(&self) -> Result<Option<UIElement>, ActionError> {
        self.inner.parent()
    }

    /// Current value of an input or selection control
    pub fn value(&self) -> Option<String> {
        self.attributes().value
    }

    pub fn options(&self) -> Vec<SelectOption> {
        self.inner.options()
    }

    /// Both the native `disabled` attribute and `aria-disabled` count.
    pub fn is_enabled(&self) -> bool {
        let attrs = self.attributes();
        attrs.enabled.unwrap_or(true) && !attrs.aria_disabled.unwrap_or(false)
    }

    pub fn is_selected(&self) -> bool {
        self.attributes().is_selected.unwrap_or(false)
    }

    pub fn is_open(&self) -> bool {
        self.attributes().is_open.unwrap_or(false)
    }

    /// Text-entry controls: text-like `<input>`s and `<textarea>`.
    pub fn is_text_entry(&self) -> bool {
        let attrs = self.attributes();
        match attrs.tag.as_str() {
            "textarea" => true,
            "input" => matches!(
                attrs.input_type.as_deref().unwrap_or("text"),
                "text" | "search" | "email" | "url" | "tel" | "password" | "number" | "date"
                    | "datetime-local" | "time"
            ),
            _ => attrs.properties.get("contenteditable").map(String::as_str) == Some("true"),
        }
    }

    pub fn is_select(&self) -> bool {
        self.tag() == "select"
    }

    /// Whether the element plays the role named by `kind`.
    pub fn matches_kind(&self, kind: ElementKind) -> bool {
        let attrs = self.attributes();
        let role = attrs.role.as_deref().unwrap_or("");
        let tag = attrs.tag.as_str();
        match kind {
            ElementKind::Tab => role == "tab",
            // A <button> with another role (tab, menuitem) plays that role instead.
            ElementKind::Button => {
                role == "button"
                    || (role.is_empty()
                        && (tag == "button"
                            || (tag == "input"
                                && matches!(
                                    attrs.input_type.as_deref(),
                                    Some("button" | "submit")
                                ))))
            }
            ElementKind::Input => self.is_text_entry(),
            ElementKind::Dropdown => tag == "select" || role == "combobox" || role == "listbox",
            ElementKind::Form => tag == "form" || role == "form",
            ElementKind::Modal => role == "dialog" || role == "alertdialog" || tag == "dialog",
            ElementKind::List => matches!(role, "list" | "listbox" | "grid" | "table" | "menu")
                || matches!(tag, "ul" | "ol" | "table"),
            ElementKind::ListItem => {
                matches!(role, "listitem" | "option" | "row") || matches!(tag, "li" | "tr")
            }
            ElementKind::Menu => role == "menu" || role == "menubar",
            ElementKind::MenuItem => role.starts_with("menuitem"),
            ElementKind::Any => true,
        }
    }

    /// Human-readable name: label, then text, then placeholder, then stable id
    pub fn display_name(&self) -> String {
        let attrs = self.attributes();
        attrs
            .label
            .or(attrs.text)
            .or(attrs.placeholder)
            .or(attrs.stable_id)
            .unwrap_or_else(|| attrs.tag.clone())
    }

    pub fn click(&self) -> Result<(), ActionError> {
        self.inner.click()
    }

    pub fn focus(&self) -> Result<(), ActionError> {
        self.inner.focus()
    }

    pub fn scroll_into_view(&self) -> Result<(), ActionError> {
        self.inner.scroll_into_view()
    }

    pub fn show_picker(&self) -> Result<(), ActionError> {
        self.inner.show_picker()
    }

    pub fn request_submit(&self) -> Result<(), ActionError> {
        self.inner.request_submit()
    }

    pub fn set_native_value(&self, value: &str) -> Result<(), ActionError> {
        self.inner.set_native_value(value)
    }

    pub fn invalidate_value_tracker(&self) -> bool {
        self.inner.invalidate_value_tracker()
    }

    pub fn dispatch_event(&self, event: UiEvent) -> Result<(), ActionError> {
        self.inner.dispatch_event(event)
    }

    /// Get the underlying implementation as a specific type
    pub fn as_any(&self) -> &dyn std::any::Any {
        self.inner.as_any()
    }
}

impl Clone for UIElement {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_box(),
        }
    }
}

impl PartialEq for UIElement {
    fn eq(&self, other: &Self) -> bool {
        self.object_id() == other.object_id()
    }
}

impl Eq for UIElement {}
