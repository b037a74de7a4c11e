//! One primitive per action kind.
//!
//! Primitives mutate the tree and report what they touched. They never
//! verify: observing whether the change stuck is the verification loop's job.

use crate::action::{
    ActionPayload, CloseModalPayload, OptionSelection, ScrollPayload, SelectListItemPayload, SubmitFormPayload,
    ToastPayload, VoiceAction,
};
use crate::config::EngineConfig;
use crate::element::{SelectOption, UIElement};
use crate::errors::ActionError;
use crate::events::{signal_name, ActionSignal, SignalBus};
use crate::locator::Locator;
use crate::platforms::ScrollDirection;
use crate::selector::{parse_ordinal, resolve_index, ElementKind};
use crate::value_setter::{ControlledValueSetter, SELECT_EVENTS, TEXT_EVENTS};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// How long a menu gets to render its items after its trigger is activated.
///
/// Menus usually mount their items on the next frame; this is a tunable
/// estimate, not a guarantee. Override it with `timing.menuOpenDelay`.
pub const DEFAULT_MENU_OPEN_DELAY: Duration = Duration::from_millis(100);

/// Labels and ids that mark a modal's dismiss control.
const CLOSE_CONTROL_NAMES: [&str; 6] = ["close", "×", "x", "cerrar", "dismiss", "cancel"];

/// What a successful primitive touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    /// Stable id of the element acted on, when it has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_id: Option<String>,
    /// Value written (fill/select), used by verification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub detail: String,
    /// Nothing needed doing (e.g. closing when no modal is open)
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub no_op: bool,
}

impl ActionOutcome {
    fn on(element: &UIElement, detail: impl Into<String>) -> Self {
        Self {
            resolved_id: element.stable_id(),
            detail: detail.into(),
            ..Default::default()
        }
    }

    fn detail(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            ..Default::default()
        }
    }

    fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    fn no_op(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            no_op: true,
            ..Default::default()
        }
    }
}

pub struct ActionExecutor {
    locator: Locator,
    setter: Arc<dyn ControlledValueSetter>,
    signals: Arc<SignalBus>,
    menu_open_delay: Duration,
    default_scroll_amount: u32,
}

impl ActionExecutor {
    pub fn new(
        locator: Locator,
        setter: Arc<dyn ControlledValueSetter>,
        signals: Arc<SignalBus>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            locator,
            setter,
            signals,
            menu_open_delay: config.timing.menu_open_delay,
            default_scroll_amount: config.default_scroll_amount,
        }
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Run the primitive for `action` and, on success, broadcast its signal.
    ///
    /// Modal and toast actions have no direct tree mutation: the broadcast
    /// signal is their effect, picked up by whichever page listens for it.
    #[instrument(level = "debug", skip(self, action), fields(kind = %action.kind(), correlation_id = action.correlation_id()))]
    pub async fn execute(&self, action: &VoiceAction) -> Result<ActionOutcome, ActionError> {
        let outcome = match action.payload() {
            ActionPayload::Navigate(p) => self.navigate(&p.route),
            ActionPayload::SwitchTab(p) => self.switch_tab(&p.target),
            ActionPayload::ClickButton(p) => self.click_button(&p.target),
            ActionPayload::ExpandDropdown(p) => self.expand_dropdown(&p.target),
            ActionPayload::SelectDropdown(p) => self.select_dropdown(&p.target, &p.selection),
            ActionPayload::FillInput(p) => self.fill_input(&p.target, &p.content, p.append),
            ActionPayload::ClearInput(p) => self.clear_input(&p.target),
            ActionPayload::SelectListItem(p) => self.select_list_item(p),
            ActionPayload::OpenModal(p) => self.open_modal(&p.modal_id),
            ActionPayload::CloseModal(p) => self.close_modal(p.modal_id.as_deref()),
            ActionPayload::Toast(p) => self.toast(p),
            ActionPayload::Scroll(p) => self.scroll(p),
            ActionPayload::SubmitForm(p) => self.submit_form(p),
            ActionPayload::OpenMenuAndClick(p) => {
                self.open_menu_and_click(&p.menu_target, &p.item_target)
                    .await
            }
        }?;

        self.signals.emit(&ActionSignal {
            name: signal_name(action.kind()),
            kind: action.kind(),
            correlation_id: Some(action.correlation_id().to_string()),
            resolved_id: outcome.resolved_id.clone(),
            payload: signal_payload(action, &outcome),
        });
        debug!("{} primitive done: {}", action.kind(), outcome.detail);
        Ok(outcome)
    }

    pub fn navigate(&self, route: &str) -> Result<ActionOutcome, ActionError> {
        self.locator.tree().navigate(route)?;
        Ok(ActionOutcome::detail(format!("navigated to {route}")))
    }

    pub fn switch_tab(&self, target: &str) -> Result<ActionOutcome, ActionError> {
        let tab = self.locator.locate(target, ElementKind::Tab)?;
        ensure_kind(&tab, target, ElementKind::Tab)?;
        tab.click()?;
        Ok(ActionOutcome::on(&tab, format!("activated tab {}", tab.display_name())))
    }

    /// Disabled (native or `aria-disabled`) buttons are refused, never forced.
    pub fn click_button(&self, target: &str) -> Result<ActionOutcome, ActionError> {
        let button = self.locator.locate(target, ElementKind::Button)?;
        ensure_kind(&button, target, ElementKind::Button)?;
        ensure_enabled(&button)?;
        button.scroll_into_view()?;
        button.click()?;
        Ok(ActionOutcome::on(
            &button,
            format!("clicked {}", button.display_name()),
        ))
    }

    /// Open the control's option list without touching its value.
    pub fn expand_dropdown(&self, target: &str) -> Result<ActionOutcome, ActionError> {
        let dropdown = self.locator.locate(target, ElementKind::Dropdown)?;
        ensure_kind(&dropdown, target, ElementKind::Dropdown)?;
        ensure_enabled(&dropdown)?;
        dropdown.focus()?;
        if dropdown.is_select() {
            dropdown.show_picker()?;
        } else {
            dropdown.click()?;
        }
        Ok(ActionOutcome::on(
            &dropdown,
            format!("expanded {}", dropdown.display_name()),
        ))
    }

    pub fn select_dropdown(
        &self,
        target: &str,
        selection: &OptionSelection,
    ) -> Result<ActionOutcome, ActionError> {
        let dropdown = self.locator.locate(target, ElementKind::Dropdown)?;
        if !dropdown.is_select() {
            return Err(ActionError::UnsupportedOperation(format!(
                "{} is not a selection control",
                dropdown.display_name()
            )));
        }
        ensure_enabled(&dropdown)?;

        let options: Vec<SelectOption> = dropdown
            .options()
            .into_iter()
            .filter(|option| !option.is_placeholder())
            .collect();
        let option = pick_option(&options, selection).ok_or_else(|| {
            ActionError::OptionNotFound(format!(
                "{} has no option {} among {} choices",
                dropdown.display_name(),
                describe_selection(selection),
                options.len()
            ))
        })?;

        self.setter
            .set_value(&dropdown, &option.value, SELECT_EVENTS)?;
        Ok(
            ActionOutcome::on(&dropdown, format!("selected \"{}\"", option.label))
                .with_value(option.value.clone()),
        )
    }

    pub fn fill_input(
        &self,
        target: &str,
        content: &str,
        append: bool,
    ) -> Result<ActionOutcome, ActionError> {
        let input = self.locator.locate(target, ElementKind::Input)?;
        if !input.is_text_entry() {
            return Err(ActionError::UnsupportedOperation(format!(
                "{} is not a text-entry control",
                input.display_name()
            )));
        }
        ensure_enabled(&input)?;

        let value = if append {
            format!("{}{}", input.value().unwrap_or_default(), content)
        } else {
            content.to_string()
        };

        input.focus()?;
        self.setter.set_value(&input, &value, TEXT_EVENTS)?;
        Ok(ActionOutcome::on(&input, format!("filled {}", input.display_name())).with_value(value))
    }

    pub fn clear_input(&self, target: &str) -> Result<ActionOutcome, ActionError> {
        self.fill_input(target, "", false)
    }

    pub fn select_list_item(
        &self,
        payload: &SelectListItemPayload,
    ) -> Result<ActionOutcome, ActionError> {
        let item = match payload {
            SelectListItemPayload::Direct { item_target } => {
                self.locator.locate(item_target, ElementKind::ListItem)?
            }
            SelectListItemPayload::Positional {
                list_target,
                item_index,
            } => {
                let list = self.locator.locate(list_target, ElementKind::List)?;
                let items = list_items(&list);
                resolve_index(*item_index, items.len())
                    .and_then(|i| items.into_iter().nth(i))
                    .ok_or_else(|| {
                        ActionError::OptionNotFound(format!(
                            "{} has no item at position {}",
                            list.display_name(),
                            item_index
                        ))
                    })?
            }
        };
        ensure_enabled(&item)?;
        item.scroll_into_view()?;
        item.click()?;
        Ok(ActionOutcome::on(&item, format!("selected {}", item.display_name())))
    }

    pub fn open_modal(&self, modal_id: &str) -> Result<ActionOutcome, ActionError> {
        Ok(ActionOutcome {
            resolved_id: Some(modal_id.to_string()),
            ..ActionOutcome::detail(format!("requested modal {modal_id}"))
        })
    }

    /// With nothing open this succeeds as a no-op. Otherwise a conventional
    /// close control inside the modal is tried before the signal-only path.
    pub fn close_modal(&self, modal_id: Option<&str>) -> Result<ActionOutcome, ActionError> {
        let open: Vec<UIElement> = self
            .locator
            .tree()
            .elements_of_kind(ElementKind::Modal)
            .into_iter()
            .filter(|modal| modal.is_open())
            .filter(|modal| modal_id.is_none() || modal.stable_id().as_deref() == modal_id)
            .collect();

        let Some(modal) = open.first() else {
            return Ok(ActionOutcome::no_op("no modal open"));
        };

        match find_close_control(modal) {
            Some(control) => match control.click() {
                Ok(()) => {
                    return Ok(ActionOutcome::on(
                        modal,
                        format!("closed {} via its close control", modal.display_name()),
                    ))
                }
                Err(e) => warn!("close control of {:?} failed: {}", modal.stable_id(), e),
            },
            None => debug!("{:?} has no close control", modal.stable_id()),
        }
        Ok(ActionOutcome::on(
            modal,
            format!("requested close of {}", modal.display_name()),
        ))
    }

    pub fn toast(&self, payload: &ToastPayload) -> Result<ActionOutcome, ActionError> {
        Ok(ActionOutcome::detail(format!(
            "{:?} toast: {}",
            payload.variant, payload.message
        )))
    }

    pub fn scroll(&self, payload: &ScrollPayload) -> Result<ActionOutcome, ActionError> {
        if let Some(target) = payload.target.as_deref() {
            let element = self.locator.locate(target, ElementKind::Any)?;
            element.scroll_into_view()?;
            return Ok(ActionOutcome::on(
                &element,
                format!("scrolled {} into view", element.display_name()),
            ));
        }

        let tree = self.locator.tree();
        if !tree.has_scroll_root() {
            return Err(ActionError::EnvironmentUnavailable(
                "no scrollable document root".to_string(),
            ));
        }
        let direction = payload.direction.unwrap_or(ScrollDirection::Down);
        let amount = payload.amount.unwrap_or(self.default_scroll_amount);
        tree.scroll_document(direction, amount)?;
        Ok(ActionOutcome::detail(format!("scrolled {direction:?} by {amount}px")))
    }

    /// Explicit submit control, then the form's own submission, then the
    /// first enabled submit button anywhere.
    pub fn submit_form(&self, payload: &SubmitFormPayload) -> Result<ActionOutcome, ActionError> {
        if let Some(target) = payload.submit_button_target.as_deref() {
            match self.locator.resolve(target, ElementKind::Button) {
                Some(found) if !found.element.matches_kind(ElementKind::Button) => {
                    debug!("\"{}\" resolved to a non-button, ignored", target)
                }
                Some(found) if found.element.is_enabled() => {
                    found.element.click()?;
                    return Ok(ActionOutcome::on(
                        &found.element,
                        format!("submitted via {}", found.element.display_name()),
                    ));
                }
                Some(_) => debug!("submit control \"{}\" is disabled", target),
                None => debug!("submit control \"{}\" not found", target),
            }
        }

        if let Some(target) = payload.form_target.as_deref() {
            if let Some(found) = self.locator.resolve(target, ElementKind::Form) {
                found.element.request_submit()?;
                return Ok(ActionOutcome::on(
                    &found.element,
                    format!("requested submit of {}", found.element.display_name()),
                ));
            }
            debug!("form \"{}\" not found", target);
        }

        let fallback = self
            .locator
            .tree()
            .elements_of_kind(ElementKind::Button)
            .into_iter()
            .find(|button| {
                button.attributes().input_type.as_deref() == Some("submit") && button.is_enabled()
            });
        match fallback {
            Some(button) => {
                button.click()?;
                Ok(ActionOutcome::on(
                    &button,
                    format!("submitted via {}", button.display_name()),
                ))
            }
            None => Err(ActionError::not_found(
                payload
                    .submit_button_target
                    .as_deref()
                    .or(payload.form_target.as_deref())
                    .unwrap_or("submit"),
                ElementKind::Button,
            )),
        }
    }

    /// Activate the menu, give it [`DEFAULT_MENU_OPEN_DELAY`] (or the
    /// configured delay) to render, then activate the item.
    pub async fn open_menu_and_click(
        &self,
        menu_target: &str,
        item_target: &str,
    ) -> Result<ActionOutcome, ActionError> {
        let trigger = self
            .locator
            .resolve(menu_target, ElementKind::Button)
            .or_else(|| self.locator.resolve(menu_target, ElementKind::Any))
            .map(|resolved| resolved.element)
            .ok_or_else(|| ActionError::not_found(menu_target, ElementKind::Menu))?;
        ensure_enabled(&trigger)?;
        trigger.click()?;

        if !self.menu_open_delay.is_zero() {
            tokio::time::sleep(self.menu_open_delay).await;
        }

        let item = self
            .locator
            .resolve(item_target, ElementKind::MenuItem)
            .map(|resolved| resolved.element)
            .ok_or_else(|| ActionError::not_found(item_target, ElementKind::MenuItem))?;
        ensure_enabled(&item)?;
        item.click()?;
        Ok(ActionOutcome::on(
            &item,
            format!("clicked {} in {}", item.display_name(), trigger.display_name()),
        ))
    }
}

/// The action's payload, with the modal a bare `closeModal` acted on filled
/// in so listeners leave other modals alone.
fn signal_payload(action: &VoiceAction, outcome: &ActionOutcome) -> Value {
    let mut payload = action.payload_json();
    if let (ActionPayload::CloseModal(CloseModalPayload { modal_id: None }), Some(id)) =
        (action.payload(), outcome.resolved_id.as_deref())
    {
        match payload.as_object_mut() {
            Some(fields) => {
                fields.insert("modalId".to_string(), Value::String(id.to_string()));
            }
            None => payload = json!({ "modalId": id }),
        }
    }
    payload
}

/// Refuse an element resolved for `kind` that plays another role.
fn ensure_kind(element: &UIElement, target: &str, kind: ElementKind) -> Result<(), ActionError> {
    if element.matches_kind(kind) {
        return Ok(());
    }
    let attrs = element.attributes();
    Err(ActionError::WrongElementKind {
        target: target.to_string(),
        expected: kind,
        found: match attrs.role {
            Some(role) => format!("a {} ({role})", attrs.tag),
            None => format!("a {}", attrs.tag),
        },
    })
}

fn ensure_enabled(element: &UIElement) -> Result<(), ActionError> {
    if element.is_enabled() {
        Ok(())
    } else {
        Err(ActionError::ElementNotEnabled(element.display_name()))
    }
}

fn pick_option<'a>(
    options: &'a [SelectOption],
    selection: &OptionSelection,
) -> Option<&'a SelectOption> {
    match selection {
        OptionSelection::Index(index) => {
            resolve_index(*index, options.len()).and_then(|i| options.get(i))
        }
        OptionSelection::Value(wanted) => {
            let wanted = wanted.trim().to_lowercase();
            options
                .iter()
                .find(|o| o.value.to_lowercase() == wanted)
                .or_else(|| options.iter().find(|o| o.label.to_lowercase() == wanted))
                .or_else(|| {
                    options
                        .iter()
                        .find(|o| o.label.to_lowercase().contains(&wanted))
                })
                .or_else(|| {
                    let index = parse_ordinal(&wanted)?;
                    resolve_index(index, options.len()).and_then(|i| options.get(i))
                })
        }
    }
}

fn describe_selection(selection: &OptionSelection) -> String {
    match selection {
        OptionSelection::Index(index) => format!("at index {index}"),
        OptionSelection::Value(value) => format!("matching \"{value}\""),
    }
}

/// Children of a container that count as its items, in document order.
fn list_items(list: &UIElement) -> Vec<UIElement> {
    let item_prefix = list.stable_id().map(|id| format!("{id}-item"));
    let mut items = Vec::new();
    collect_items(list, item_prefix.as_deref(), &mut items);
    items
}

fn collect_items(element: &UIElement, item_prefix: Option<&str>, items: &mut Vec<UIElement>) {
    let Ok(children) = element.children() else {
        return;
    };
    for child in children {
        let by_role = matches!(
            child.role().as_deref(),
            Some("listitem" | "option" | "row" | "menuitem")
        );
        let by_id = item_prefix
            .zip(child.stable_id())
            .is_some_and(|(prefix, id)| id.starts_with(prefix));
        if by_role || by_id {
            items.push(child);
        } else {
            collect_items(&child, item_prefix, items);
        }
    }
}

fn find_close_control(modal: &UIElement) -> Option<UIElement> {
    let children = modal.children().ok()?;
    for child in children {
        if child.matches_kind(ElementKind::Button) && is_close_control(&child) {
            return Some(child);
        }
        if let Some(found) = find_close_control(&child) {
            return Some(found);
        }
    }
    None
}

fn is_close_control(element: &UIElement) -> bool {
    let attrs = element.attributes();
    let named = [attrs.label, attrs.text]
        .into_iter()
        .flatten()
        .any(|name| CLOSE_CONTROL_NAMES.contains(&name.trim().to_lowercase().as_str()));
    named
        || attrs
            .stable_id
            .is_some_and(|id| id.to_lowercase().contains("close"))
}
