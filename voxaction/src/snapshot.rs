//! Structured summary of the interactive surface, and what changed between two.

use crate::element::SelectOption;
use crate::platforms::UiTree;
use crate::selector::ElementKind;
use crate::UIElement;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabState {
    pub id: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonState {
    pub id: String,
    pub label: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputState {
    pub id: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropdownState {
    pub id: String,
    pub selected: String,
    pub options: Vec<SelectOption>,
}

/// Snapshot of the tagged interactive elements at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_tab: Option<String>,
    pub tabs: Vec<TabState>,
    pub buttons: Vec<ButtonState>,
    pub inputs: Vec<InputState>,
    pub dropdowns: Vec<DropdownState>,
    pub open_modals: Vec<String>,
}

impl UiState {
    pub fn tab(&self, id: &str) -> Option<&TabState> {
        self.tabs.iter().find(|t| t.id == id)
    }

    pub fn button(&self, id: &str) -> Option<&ButtonState> {
        self.buttons.iter().find(|b| b.id == id)
    }

    pub fn input(&self, id: &str) -> Option<&InputState> {
        self.inputs.iter().find(|i| i.id == id)
    }

    pub fn dropdown(&self, id: &str) -> Option<&DropdownState> {
        self.dropdowns.iter().find(|d| d.id == id)
    }

    pub fn is_modal_open(&self, id: &str) -> bool {
        self.open_modals.iter().any(|m| m == id)
    }
}

/// Scan the tree once per category, keeping only elements with a stable id.
pub fn capture_state(tree: &dyn UiTree) -> UiState {
    let tagged = |kind: ElementKind| -> Vec<(String, UIElement)> {
        tree.elements_of_kind(kind)
            .into_iter()
            .filter_map(|element| element.stable_id().map(|id| (id, element)))
            .collect()
    };

    let tabs: Vec<TabState> = tagged(ElementKind::Tab)
        .into_iter()
        .map(|(id, tab)| TabState {
            id,
            active: tab.is_selected(),
        })
        .collect();
    let active_tab = tabs.iter().find(|t| t.active).map(|t| t.id.clone());

    let buttons = tagged(ElementKind::Button)
        .into_iter()
        .map(|(id, button)| ButtonState {
            id,
            label: button.display_name(),
            enabled: button.is_enabled(),
        })
        .collect();

    let inputs = tagged(ElementKind::Input)
        .into_iter()
        .map(|(id, input)| InputState {
            id,
            value: input.value().unwrap_or_default(),
        })
        .collect();

    let dropdowns = tagged(ElementKind::Dropdown)
        .into_iter()
        .map(|(id, dropdown)| DropdownState {
            id,
            selected: dropdown.value().unwrap_or_default(),
            options: dropdown.options(),
        })
        .collect();

    let open_modals = tagged(ElementKind::Modal)
        .into_iter()
        .filter(|(_, modal)| modal.is_open())
        .map(|(id, _)| id)
        .collect();

    UiState {
        active_tab,
        tabs,
        buttons,
        inputs,
        dropdowns,
        open_modals,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabChange {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Difference between two snapshots. Pure: no tree access.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_changed: Option<TabChange>,
    pub dropdowns_changed: Vec<String>,
    pub inputs_changed: Vec<String>,
    pub modals_opened: Vec<String>,
    pub modals_closed: Vec<String>,
}

impl StateDiff {
    pub fn between(before: &UiState, after: &UiState) -> Self {
        let tab_changed = (before.active_tab != after.active_tab).then(|| TabChange {
            from: before.active_tab.clone(),
            to: after.active_tab.clone(),
        });

        let before_selected: HashMap<&str, &str> = before
            .dropdowns
            .iter()
            .map(|d| (d.id.as_str(), d.selected.as_str()))
            .collect();
        let dropdowns_changed = after
            .dropdowns
            .iter()
            .filter(|d| before_selected.get(d.id.as_str()).copied().unwrap_or("") != d.selected)
            .map(|d| d.id.clone())
            .collect();

        let before_values: HashMap<&str, &str> = before
            .inputs
            .iter()
            .map(|i| (i.id.as_str(), i.value.as_str()))
            .collect();
        let inputs_changed = after
            .inputs
            .iter()
            .filter(|i| before_values.get(i.id.as_str()).copied().unwrap_or("") != i.value)
            .map(|i| i.id.clone())
            .collect();

        let modals_opened = after
            .open_modals
            .iter()
            .filter(|m| !before.open_modals.contains(m))
            .cloned()
            .collect();
        let modals_closed = before
            .open_modals
            .iter()
            .filter(|m| !after.open_modals.contains(m))
            .cloned()
            .collect();

        Self {
            tab_changed,
            dropdowns_changed,
            inputs_changed,
            modals_opened,
            modals_closed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tab_changed.is_none()
            && self.dropdowns_changed.is_empty()
            && self.inputs_changed.is_empty()
            && self.modals_opened.is_empty()
            && self.modals_closed.is_empty()
    }

    pub fn dropdown_changed(&self, id: &str) -> bool {
        self.dropdowns_changed.iter().any(|d| d == id)
    }

    pub fn input_changed(&self, id: &str) -> bool {
        self.inputs_changed.iter().any(|i| i == id)
    }

    /// One-line human summary, e.g. `tab: a -> b; inputs: title`.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StateDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("no changes");
        }
        let mut parts = Vec::new();
        if let Some(change) = &self.tab_changed {
            parts.push(format!(
                "tab: {} -> {}",
                change.from.as_deref().unwrap_or("none"),
                change.to.as_deref().unwrap_or("none")
            ));
        }
        for (label, ids) in [
            ("dropdowns", &self.dropdowns_changed),
            ("inputs", &self.inputs_changed),
            ("opened", &self.modals_opened),
            ("closed", &self.modals_closed),
        ] {
            if !ids.is_empty() {
                parts.push(format!("{label}: {}", ids.join(", ")));
            }
        }
        f.write_str(&parts.join("; "))
    }
}
