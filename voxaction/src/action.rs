//! The closed vocabulary of voice actions and its validation.
//!
//! Upstream input is untrusted JSON. [`validate`] is the only way to obtain a
//! [`VoiceAction`] from it, and it never panics: every structural problem is
//! reported as a diagnostic on an [`ActionValidation`] with no action.

use crate::errors::ActionError;
use crate::platforms::ScrollDirection;
use crate::selector::parse_ordinal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use tracing::{debug, warn};

const MAX_CORRELATION_ID_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Navigate,
    SwitchTab,
    ClickButton,
    ExpandDropdown,
    SelectDropdown,
    FillInput,
    ClearInput,
    SelectListItem,
    OpenModal,
    CloseModal,
    Toast,
    Scroll,
    SubmitForm,
    OpenMenuAndClick,
}

impl ActionType {
    pub const ALL: [ActionType; 14] = [
        ActionType::Navigate,
        ActionType::SwitchTab,
        ActionType::ClickButton,
        ActionType::ExpandDropdown,
        ActionType::SelectDropdown,
        ActionType::FillInput,
        ActionType::ClearInput,
        ActionType::SelectListItem,
        ActionType::OpenModal,
        ActionType::CloseModal,
        ActionType::Toast,
        ActionType::Scroll,
        ActionType::SubmitForm,
        ActionType::OpenMenuAndClick,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Navigate => "navigate",
            ActionType::SwitchTab => "switchTab",
            ActionType::ClickButton => "clickButton",
            ActionType::ExpandDropdown => "expandDropdown",
            ActionType::SelectDropdown => "selectDropdown",
            ActionType::FillInput => "fillInput",
            ActionType::ClearInput => "clearInput",
            ActionType::SelectListItem => "selectListItem",
            ActionType::OpenModal => "openModal",
            ActionType::CloseModal => "closeModal",
            ActionType::Toast => "toast",
            ActionType::Scroll => "scroll",
            ActionType::SubmitForm => "submitForm",
            ActionType::OpenMenuAndClick => "openMenuAndClick",
        }
    }

    /// Exact canonical name lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Lenient lookup for legacy `{kind, payload}` signals: case, `_`, `-`
    /// and spaces are ignored and a few short verbs are accepted.
    pub fn from_legacy(name: &str) -> Option<Self> {
        let squashed: String = name
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        let kind = match squashed.as_str() {
            "navigate" | "navigateto" | "goto" | "go" | "route" => ActionType::Navigate,
            "switchtab" | "tab" | "selecttab" | "opentab" => ActionType::SwitchTab,
            "clickbutton" | "click" | "press" | "button" => ActionType::ClickButton,
            "expanddropdown" | "opendropdown" | "expand" => ActionType::ExpandDropdown,
            "selectdropdown" | "select" | "selectoption" | "choose" => ActionType::SelectDropdown,
            "fillinput" | "fill" | "type" | "typetext" | "setinput" => ActionType::FillInput,
            "clearinput" | "clear" => ActionType::ClearInput,
            "selectlistitem" | "selectitem" | "listitem" => ActionType::SelectListItem,
            "openmodal" | "showmodal" => ActionType::OpenModal,
            "closemodal" | "dismiss" | "hidemodal" => ActionType::CloseModal,
            "toast" | "showtoast" | "notify" => ActionType::Toast,
            "scroll" => ActionType::Scroll,
            "submitform" | "submit" => ActionType::SubmitForm,
            "openmenuandclick" | "menuclick" => ActionType::OpenMenuAndClick,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigatePayload {
    pub route: String,
}

/// Payload of the kinds that only name a target element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetPayload {
    pub target: String,
}

/// Which option of a selection control to pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionSelection {
    /// Zero-based among real options; negative counts from the end
    Index(i64),
    /// Option value or visible text
    Value(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSelectDropdown", into = "RawSelectDropdown")]
pub struct SelectDropdownPayload {
    pub target: String,
    pub selection: OptionSelection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSelectDropdown {
    target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

impl TryFrom<RawSelectDropdown> for SelectDropdownPayload {
    type Error = String;

    fn try_from(raw: RawSelectDropdown) -> Result<Self, Self::Error> {
        let selection = match (raw.index, raw.value) {
            (Some(index), None) => OptionSelection::Index(index),
            (None, Some(value)) => OptionSelection::Value(value),
            (Some(_), Some(_)) => {
                return Err("selectDropdown takes either `index` or `value`, not both".to_string())
            }
            (None, None) => {
                return Err("selectDropdown requires one of `index` or `value`".to_string())
            }
        };
        Ok(Self {
            target: raw.target,
            selection,
        })
    }
}

impl From<SelectDropdownPayload> for RawSelectDropdown {
    fn from(payload: SelectDropdownPayload) -> Self {
        let (index, value) = match payload.selection {
            OptionSelection::Index(index) => (Some(index), None),
            OptionSelection::Value(value) => (None, Some(value)),
        };
        Self {
            target: payload.target,
            index,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillInputPayload {
    pub target: String,
    pub content: String,
    #[serde(default)]
    pub append: bool,
}

/// An item addressed directly, or by position inside a named container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawListItem", into = "RawListItem")]
pub enum SelectListItemPayload {
    Positional { list_target: String, item_index: i64 },
    Direct { item_target: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawListItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    list_target: Option<String>,
    /// A number, or a spoken ordinal such as "third"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    item_index: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    item_target: Option<String>,
}

impl TryFrom<RawListItem> for SelectListItemPayload {
    type Error = String;

    fn try_from(raw: RawListItem) -> Result<Self, Self::Error> {
        match (raw.list_target, raw.item_index, raw.item_target) {
            (None, None, Some(item_target)) => Ok(Self::Direct { item_target }),
            (_, _, Some(_)) => Err(
                "selectListItem takes `itemTarget` or `listTarget` with `itemIndex`, not both"
                    .to_string(),
            ),
            (Some(list_target), Some(index), None) => {
                let item_index = match &index {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => parse_ordinal(s),
                    _ => None,
                }
                .ok_or_else(|| format!("selectListItem `itemIndex` is not a position: {index}"))?;
                Ok(Self::Positional {
                    list_target,
                    item_index,
                })
            }
            _ => Err(
                "selectListItem requires `itemTarget`, or `listTarget` together with `itemIndex`"
                    .to_string(),
            ),
        }
    }
}

impl From<SelectListItemPayload> for RawListItem {
    fn from(payload: SelectListItemPayload) -> Self {
        match payload {
            SelectListItemPayload::Positional {
                list_target,
                item_index,
            } => Self {
                list_target: Some(list_target),
                item_index: Some(json!(item_index)),
                item_target: None,
            },
            SelectListItemPayload::Direct { item_target } => Self {
                list_target: None,
                item_index: None,
                item_target: Some(item_target),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenModalPayload {
    pub modal_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseModalPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modal_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToastPayload {
    pub message: String,
    #[serde(default)]
    pub variant: ToastVariant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<ScrollDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFormPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_button_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenMenuAndClickPayload {
    pub menu_target: String,
    pub item_target: String,
}

/// Kind-specific payload; the serde tag doubles as the wire `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ActionPayload {
    Navigate(NavigatePayload),
    SwitchTab(TargetPayload),
    ClickButton(TargetPayload),
    ExpandDropdown(TargetPayload),
    SelectDropdown(SelectDropdownPayload),
    FillInput(FillInputPayload),
    ClearInput(TargetPayload),
    SelectListItem(SelectListItemPayload),
    OpenModal(OpenModalPayload),
    CloseModal(CloseModalPayload),
    Toast(ToastPayload),
    Scroll(ScrollPayload),
    SubmitForm(SubmitFormPayload),
    OpenMenuAndClick(OpenMenuAndClickPayload),
}

impl ActionPayload {
    pub fn kind(&self) -> ActionType {
        match self {
            ActionPayload::Navigate(_) => ActionType::Navigate,
            ActionPayload::SwitchTab(_) => ActionType::SwitchTab,
            ActionPayload::ClickButton(_) => ActionType::ClickButton,
            ActionPayload::ExpandDropdown(_) => ActionType::ExpandDropdown,
            ActionPayload::SelectDropdown(_) => ActionType::SelectDropdown,
            ActionPayload::FillInput(_) => ActionType::FillInput,
            ActionPayload::ClearInput(_) => ActionType::ClearInput,
            ActionPayload::SelectListItem(_) => ActionType::SelectListItem,
            ActionPayload::OpenModal(_) => ActionType::OpenModal,
            ActionPayload::CloseModal(_) => ActionType::CloseModal,
            ActionPayload::Toast(_) => ActionType::Toast,
            ActionPayload::Scroll(_) => ActionType::Scroll,
            ActionPayload::SubmitForm(_) => ActionType::SubmitForm,
            ActionPayload::OpenMenuAndClick(_) => ActionType::OpenMenuAndClick,
        }
    }

    /// The element (or route, or message) the action is primarily about.
    pub fn primary_target(&self) -> Option<&str> {
        match self {
            ActionPayload::Navigate(p) => Some(&p.route),
            ActionPayload::SwitchTab(p)
            | ActionPayload::ClickButton(p)
            | ActionPayload::ExpandDropdown(p)
            | ActionPayload::ClearInput(p) => Some(&p.target),
            ActionPayload::SelectDropdown(p) => Some(&p.target),
            ActionPayload::FillInput(p) => Some(&p.target),
            ActionPayload::SelectListItem(SelectListItemPayload::Positional {
                list_target, ..
            }) => Some(list_target),
            ActionPayload::SelectListItem(SelectListItemPayload::Direct { item_target }) => {
                Some(item_target)
            }
            ActionPayload::OpenModal(p) => Some(&p.modal_id),
            ActionPayload::CloseModal(p) => p.modal_id.as_deref(),
            ActionPayload::Toast(p) => Some(&p.message),
            ActionPayload::Scroll(p) => p.target.as_deref(),
            ActionPayload::SubmitForm(p) => p
                .submit_button_target
                .as_deref()
                .or(p.form_target.as_deref()),
            ActionPayload::OpenMenuAndClick(p) => Some(&p.menu_target),
        }
    }

    /// Semantic checks serde cannot express: required strings must not be blank.
    fn check(&self) -> Result<(), String> {
        fn required(field: &str, value: &str) -> Result<(), String> {
            if value.trim().is_empty() {
                Err(format!("`{field}` must not be empty"))
            } else {
                Ok(())
            }
        }
        fn optional(field: &str, value: Option<&String>) -> Result<(), String> {
            value.map_or(Ok(()), |v| required(field, v))
        }

        match self {
            ActionPayload::Navigate(p) => required("route", &p.route),
            ActionPayload::SwitchTab(p)
            | ActionPayload::ClickButton(p)
            | ActionPayload::ExpandDropdown(p)
            | ActionPayload::ClearInput(p) => required("target", &p.target),
            ActionPayload::SelectDropdown(p) => {
                required("target", &p.target)?;
                match &p.selection {
                    OptionSelection::Value(v) => required("value", v),
                    OptionSelection::Index(_) => Ok(()),
                }
            }
            ActionPayload::FillInput(p) => required("target", &p.target),
            ActionPayload::SelectListItem(SelectListItemPayload::Positional {
                list_target, ..
            }) => required("listTarget", list_target),
            ActionPayload::SelectListItem(SelectListItemPayload::Direct { item_target }) => {
                required("itemTarget", item_target)
            }
            ActionPayload::OpenModal(p) => required("modalId", &p.modal_id),
            ActionPayload::CloseModal(p) => optional("modalId", p.modal_id.as_ref()),
            ActionPayload::Toast(p) => required("message", &p.message),
            ActionPayload::Scroll(p) => {
                optional("target", p.target.as_ref())?;
                if p.direction.is_none() && p.target.is_none() {
                    return Err("scroll requires a `direction` or a `target`".to_string());
                }
                Ok(())
            }
            ActionPayload::SubmitForm(p) => {
                optional("formTarget", p.form_target.as_ref())?;
                optional("submitButtonTarget", p.submit_button_target.as_ref())
            }
            ActionPayload::OpenMenuAndClick(p) => {
                required("menuTarget", &p.menu_target)?;
                required("itemTarget", &p.item_target)
            }
        }
    }
}

/// A validated voice action. Immutable: fields are only readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceAction {
    #[serde(flatten)]
    payload: ActionPayload,
    correlation_id: String,
    created_at: DateTime<Utc>,
}

impl VoiceAction {
    /// Validate a payload built in code. A fresh correlation id is generated.
    pub fn new(payload: ActionPayload) -> Result<Self, ActionError> {
        payload.check().map_err(ActionError::InvalidAction)?;
        Ok(Self {
            payload,
            correlation_id: new_correlation_id(),
            created_at: Utc::now(),
        })
    }

    pub fn kind(&self) -> ActionType {
        self.payload.kind()
    }

    pub fn payload(&self) -> &ActionPayload {
        &self.payload
    }

    pub fn primary_target(&self) -> Option<&str> {
        self.payload.primary_target()
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The payload as it travels on the wire (without the type tag).
    pub fn payload_json(&self) -> Value {
        serde_json::to_value(&self.payload)
            .ok()
            .and_then(|mut v| v.get_mut("payload").map(Value::take))
            .unwrap_or(Value::Null)
    }
}

/// Outcome of validating untrusted input.
#[derive(Debug, Clone)]
pub struct ActionValidation {
    pub action: Option<VoiceAction>,
    pub diagnostic: Option<String>,
}

impl ActionValidation {
    fn rejected(diagnostic: impl Into<String>) -> Self {
        let diagnostic = diagnostic.into();
        debug!("voice action rejected: {}", diagnostic);
        Self {
            action: None,
            diagnostic: Some(diagnostic),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.action.is_some()
    }

    pub fn into_result(self) -> Result<VoiceAction, ActionError> {
        match self.action {
            Some(action) => Ok(action),
            None => Err(ActionError::InvalidAction(
                self.diagnostic
                    .unwrap_or_else(|| "unknown validation failure".to_string()),
            )),
        }
    }
}

/// Validate untrusted input into a [`VoiceAction`].
///
/// Accepts the canonical `{type, payload, correlationId?}` shape and the
/// legacy `{kind, payload}` shape, which is normalized first.
pub fn validate(raw: &Value) -> ActionValidation {
    let Some(obj) = raw.as_object() else {
        return ActionValidation::rejected("action must be a JSON object");
    };

    let (kind, payload) = if let Some(tag) = obj.get("type") {
        let Some(name) = tag.as_str() else {
            return ActionValidation::rejected("`type` must be a string");
        };
        let Some(kind) = ActionType::from_name(name) else {
            return ActionValidation::rejected(format!("unknown action type '{name}'"));
        };
        (kind, obj.get("payload").cloned())
    } else if let Some(legacy) = obj.get("kind") {
        let Some(name) = legacy.as_str() else {
            return ActionValidation::rejected("`kind` must be a string");
        };
        let Some(kind) = ActionType::from_legacy(name) else {
            return ActionValidation::rejected(format!("unknown legacy action kind '{name}'"));
        };
        let payload = obj.get("payload").cloned().map(|p| normalize_legacy_payload(kind, p));
        (kind, payload)
    } else {
        return ActionValidation::rejected("missing action `type`");
    };

    let payload = match payload {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(p @ Value::Object(_)) => p,
        Some(_) => {
            return ActionValidation::rejected(format!("{kind} payload must be an object"));
        }
    };

    let payload: ActionPayload =
        match serde_json::from_value(json!({ "type": kind.as_str(), "payload": payload })) {
            Ok(payload) => payload,
            Err(e) => return ActionValidation::rejected(format!("invalid {kind} payload: {e}")),
        };

    if let Err(reason) = payload.check() {
        return ActionValidation::rejected(format!("invalid {kind} payload: {reason}"));
    }

    let correlation_id = match obj.get("correlationId").or_else(|| obj.get("correlation_id")) {
        None | Some(Value::Null) => new_correlation_id(),
        Some(Value::String(id)) if is_well_formed_correlation_id(id) => id.clone(),
        Some(other) => {
            warn!(
                "discarding malformed correlation id {} on {} action",
                other, kind
            );
            new_correlation_id()
        }
    };

    ActionValidation {
        action: Some(VoiceAction {
            payload,
            correlation_id,
            created_at: Utc::now(),
        }),
        diagnostic: None,
    }
}

/// Rewrite legacy payload field names onto the canonical ones.
fn normalize_legacy_payload(kind: ActionType, payload: Value) -> Value {
    let Value::Object(map) = payload else {
        return payload;
    };

    let mut normalized: Map<String, Value> = map
        .into_iter()
        .map(|(key, value)| (snake_to_camel(&key), value))
        .collect();

    let mut alias = |canonical: &str, legacy: &[&str]| {
        if normalized.contains_key(canonical) {
            return;
        }
        if let Some(value) = legacy.iter().find_map(|key| normalized.remove(*key)) {
            normalized.insert(canonical.to_string(), value);
        }
    };

    match kind {
        ActionType::Navigate => alias("route", &["path", "url", "to", "href"]),
        ActionType::SwitchTab => alias("target", &["tab", "id", "name", "element"]),
        ActionType::ClickButton => alias("target", &["button", "id", "name", "element"]),
        ActionType::ExpandDropdown | ActionType::SelectDropdown => {
            alias("target", &["dropdown", "select", "id", "name", "element"])
        }
        ActionType::FillInput => {
            alias("target", &["field", "input", "id", "name", "element"]);
            alias("content", &["text", "value"]);
        }
        ActionType::ClearInput => alias("target", &["field", "input", "id", "name", "element"]),
        ActionType::OpenModal | ActionType::CloseModal => alias("modalId", &["modal", "id"]),
        ActionType::Toast => alias("message", &["text", "msg"]),
        ActionType::OpenMenuAndClick => {
            alias("menuTarget", &["menu"]);
            alias("itemTarget", &["item"]);
        }
        ActionType::SelectListItem | ActionType::Scroll | ActionType::SubmitForm => {}
    }

    Value::Object(normalized)
}

fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn is_well_formed_correlation_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_CORRELATION_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
