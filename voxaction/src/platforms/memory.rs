//! In-memory UI tree with a reactive controlled-value model.
//!
//! Used for headless runs and throughout the tests. Controlled inputs behave
//! the way reactive frameworks treat them: the framework keeps its own copy
//! of the value plus a "last seen" tracker, swallows `input`/`change` events
//! whose value matches the tracker, and re-renders the DOM value from its own
//! state on [`UiTree::settle`].

use crate::element::{SelectOption, UIElementAttributes, UIElementImpl, UiEvent};
use crate::errors::ActionError;
use crate::events::{ActionSignal, SignalListener};
use crate::platforms::{ScrollDirection, UiTree};
use crate::selector::ElementKind;
use crate::UIElement;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

const VIEWPORT_HEIGHT: u32 = 800;

/// Handle to a node inside a [`MemoryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// What a node does when it is clicked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ClickBehavior {
    #[default]
    None,
    /// Select this tab and deselect its siblings
    ActivateTab,
    /// Reveal (or hide) the menu with this stable id
    ToggleMenu(String),
    /// Open the modal with this stable id
    OpenModal(String),
    /// Close the enclosing modal
    CloseModal,
    /// Submit the enclosing form
    Submit,
}

#[derive(Debug, Clone)]
struct Controlled {
    /// Value held by the framework; the DOM value is re-rendered from it
    state: String,
    /// Framework's last-seen DOM value, `None` once invalidated
    tracker: Option<String>,
}

#[derive(Debug, Clone)]
struct Node {
    attrs: UIElementAttributes,
    parent: Option<usize>,
    children: Vec<usize>,
    hidden: bool,
    options: Vec<SelectOption>,
    controlled: Option<Controlled>,
    behavior: ClickBehavior,
    clicks: u32,
    accepted_changes: u32,
    events: Vec<UiEvent>,
    picker_open: bool,
    in_view: bool,
}

#[derive(Debug)]
struct TreeState {
    nodes: Vec<Node>,
    navigation_enabled: bool,
    navigations: Vec<String>,
    scrollable: bool,
    document_height: u32,
    scroll_y: u32,
    submissions: Vec<String>,
    focused: Option<usize>,
}

/// Declarative description of a node to add to a [`MemoryTree`].
#[derive(Debug, Clone, Default)]
pub struct NodeSpec {
    attrs: UIElementAttributes,
    options: Vec<SelectOption>,
    controlled: bool,
    hidden: bool,
    behavior: ClickBehavior,
}

impl NodeSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            attrs: UIElementAttributes {
                tag: tag.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn div() -> Self {
        Self::new("div")
    }

    pub fn tablist(id: &str) -> Self {
        Self::new("div").role("tablist").id(id)
    }

    pub fn tab(id: &str, text: &str) -> Self {
        Self::new("button")
            .role("tab")
            .id(id)
            .text(text)
            .on_click(ClickBehavior::ActivateTab)
    }

    pub fn button(id: &str, text: &str) -> Self {
        Self::new("button").id(id).text(text)
    }

    pub fn submit_button(id: &str, text: &str) -> Self {
        Self::button(id, text)
            .input_type("submit")
            .on_click(ClickBehavior::Submit)
    }

    pub fn input(id: &str) -> Self {
        Self::new("input").id(id).input_type("text")
    }

    pub fn textarea(id: &str) -> Self {
        Self::new("textarea").id(id)
    }

    /// A selection control; an option with an empty value acts as placeholder.
    pub fn select<'a>(id: &str, options: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut spec = Self::new("select").id(id);
        spec.options = options
            .into_iter()
            .map(|(value, label)| SelectOption::new(value, label))
            .collect();
        spec
    }

    pub fn form(id: &str) -> Self {
        Self::new("form").id(id)
    }

    /// A modal dialog, closed (unrendered) until opened.
    pub fn modal(id: &str) -> Self {
        Self::new("div").role("dialog").id(id).hidden()
    }

    pub fn close_button(id: &str) -> Self {
        Self::button(id, "×")
            .label("Close")
            .on_click(ClickBehavior::CloseModal)
    }

    pub fn list(id: &str) -> Self {
        Self::new("ul").role("list").id(id)
    }

    pub fn list_item(text: &str) -> Self {
        Self::new("li").role("listitem").text(text)
    }

    /// A menu container, hidden until its trigger is clicked.
    pub fn menu(id: &str) -> Self {
        Self::new("div").role("menu").id(id).hidden()
    }

    pub fn menu_trigger(id: &str, text: &str, menu_id: &str) -> Self {
        Self::button(id, text).on_click(ClickBehavior::ToggleMenu(menu_id.to_string()))
    }

    pub fn menu_item(id: &str, text: &str) -> Self {
        Self::new("div").role("menuitem").id(id).text(text)
    }

    pub fn id(mut self, stable_id: &str) -> Self {
        self.attrs.stable_id = Some(stable_id.to_string());
        self
    }

    /// Drop the stable identifier, leaving only text and labels to match on.
    pub fn untagged(mut self) -> Self {
        self.attrs.stable_id = None;
        self
    }

    pub fn role(mut self, role: &str) -> Self {
        self.attrs.role = Some(role.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.attrs.text = Some(text.to_string());
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.attrs.label = Some(label.to_string());
        self
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.attrs.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn input_type(mut self, input_type: &str) -> Self {
        self.attrs.input_type = Some(input_type.to_string());
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.attrs.value = Some(value.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.attrs.enabled = Some(false);
        self
    }

    pub fn aria_disabled(mut self) -> Self {
        self.attrs.aria_disabled = Some(true);
        self
    }

    pub fn selected(mut self) -> Self {
        self.attrs.is_selected = Some(true);
        self
    }

    /// Put the element under framework control (value state + tracker).
    pub fn controlled(mut self) -> Self {
        self.controlled = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Render a modal as already open.
    pub fn open(mut self) -> Self {
        self.hidden = false;
        self.attrs.is_open = Some(true);
        self
    }

    pub fn on_click(mut self, behavior: ClickBehavior) -> Self {
        self.behavior = behavior;
        self
    }
}

/// A UI tree held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryTree {
    state: Arc<Mutex<TreeState>>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    pub fn new() -> Self {
        let body = Node::from_spec(NodeSpec::new("body"), None);
        Self {
            state: Arc::new(Mutex::new(TreeState {
                nodes: vec![body],
                navigation_enabled: true,
                navigations: Vec::new(),
                scrollable: true,
                document_height: 2400,
                scroll_y: 0,
                submissions: Vec::new(),
                focused: None,
            })),
        }
    }

    /// A tree with no navigation mechanism, like a server-rendered context.
    pub fn without_navigation(self) -> Self {
        self.lock().navigation_enabled = false;
        self
    }

    pub fn without_scroll_root(self) -> Self {
        self.lock().scrollable = false;
        self
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a node under `parent` and return its handle.
    pub fn add(&self, parent: NodeId, spec: NodeSpec) -> NodeId {
        let mut state = self.lock();
        let index = state.nodes.len();
        state.nodes.push(Node::from_spec(spec, Some(parent.0)));
        if let Some(parent_node) = state.nodes.get_mut(parent.0) {
            parent_node.children.push(index);
        }
        NodeId(index)
    }

    /// Append a node under the document body.
    pub fn add_root(&self, spec: NodeSpec) -> NodeId {
        self.add(self.root_id(), spec)
    }

    pub fn element(&self, node: NodeId) -> UIElement {
        self.handle(node.0)
    }

    /// Number of effective clicks on the element with this stable id.
    pub fn click_count(&self, stable_id: &str) -> u32 {
        self.with_node(stable_id, |node| node.clicks).unwrap_or(0)
    }

    /// Current DOM value of the element with this stable id.
    pub fn value_of(&self, stable_id: &str) -> Option<String> {
        self.with_node(stable_id, |node| node.attrs.value.clone())
            .flatten()
    }

    /// Value held by the framework for a controlled element.
    pub fn framework_value(&self, stable_id: &str) -> Option<String> {
        self.with_node(stable_id, |node| {
            node.controlled.as_ref().map(|c| c.state.clone())
        })
        .flatten()
    }

    /// Number of `input`/`change` events the framework accepted as changes.
    pub fn accepted_changes(&self, stable_id: &str) -> u32 {
        self.with_node(stable_id, |node| node.accepted_changes)
            .unwrap_or(0)
    }

    pub fn events_of(&self, stable_id: &str) -> Vec<UiEvent> {
        self.with_node(stable_id, |node| node.events.clone())
            .unwrap_or_default()
    }

    pub fn is_picker_open(&self, stable_id: &str) -> bool {
        self.with_node(stable_id, |node| node.picker_open)
            .unwrap_or(false)
    }

    pub fn is_in_view(&self, stable_id: &str) -> bool {
        self.with_node(stable_id, |node| node.in_view)
            .unwrap_or(false)
    }

    pub fn is_focused(&self, stable_id: &str) -> bool {
        let state = self.lock();
        state
            .focused
            .and_then(|index| state.nodes.get(index))
            .and_then(|node| node.attrs.stable_id.as_deref())
            == Some(stable_id)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn submissions(&self) -> Vec<String> {
        self.lock().submissions.clone()
    }

    pub fn scroll_position(&self) -> u32 {
        self.lock().scroll_y
    }

    /// Stable ids of modals currently open.
    pub fn open_modals(&self) -> Vec<String> {
        self.lock()
            .nodes
            .iter()
            .filter(|node| is_modal(node) && node.attrs.is_open.unwrap_or(false))
            .filter_map(|node| node.attrs.stable_id.clone())
            .collect()
    }

    pub fn open_modal(&self, stable_id: &str) -> bool {
        let mut state = self.lock();
        match state.index_of_any(stable_id) {
            Some(index) => {
                set_modal_open(&mut state.nodes[index], true);
                true
            }
            None => false,
        }
    }

    pub fn close_modal(&self, stable_id: Option<&str>) {
        let mut state = self.lock();
        let targets: Vec<usize> = state
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| is_modal(node))
            .filter(|(_, node)| {
                stable_id.is_none() || node.attrs.stable_id.as_deref() == stable_id
            })
            .map(|(index, _)| index)
            .collect();
        for index in targets {
            set_modal_open(&mut state.nodes[index], false);
        }
    }

    fn lock(&self) -> MutexGuard<'_, TreeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_node<T>(&self, stable_id: &str, f: impl FnOnce(&Node) -> T) -> Option<T> {
        let state = self.lock();
        state.index_of_any(stable_id).map(|index| f(&state.nodes[index]))
    }

    fn handle(&self, index: usize) -> UIElement {
        UIElement::new(Box::new(MemoryElement {
            state: self.state.clone(),
            index,
        }))
    }

    fn visible_in_order(&self) -> Vec<usize> {
        let state = self.lock();
        let mut order = Vec::new();
        state.walk_visible(0, &mut order);
        order
    }
}

impl Node {
    fn from_spec(spec: NodeSpec, parent: Option<usize>) -> Self {
        let initial = spec.attrs.value.clone().unwrap_or_default();
        let mut attrs = spec.attrs;
        let options = spec.options;
        if attrs.tag == "select" {
            if let Some(pos) = options.iter().position(|o| o.value == initial) {
                attrs.value = Some(options[pos].value.clone());
            } else {
                attrs.value = options.first().map(|o| o.value.clone());
            }
        }
        let controlled = spec.controlled.then(|| {
            let value = attrs.value.clone().unwrap_or_default();
            Controlled {
                state: value.clone(),
                tracker: Some(value),
            }
        });
        Self {
            attrs,
            parent,
            children: Vec::new(),
            hidden: spec.hidden,
            options,
            controlled,
            behavior: spec.behavior,
            clicks: 0,
            accepted_changes: 0,
            events: Vec::new(),
            picker_open: false,
            in_view: false,
        }
    }

    fn is_enabled(&self) -> bool {
        self.attrs.enabled.unwrap_or(true) && !self.attrs.aria_disabled.unwrap_or(false)
    }
}

fn is_modal(node: &Node) -> bool {
    matches!(node.attrs.role.as_deref(), Some("dialog" | "alertdialog"))
}

fn set_modal_open(node: &mut Node, open: bool) {
    node.hidden = !open;
    node.attrs.is_open = Some(open);
}

impl TreeState {
    fn index_of(&self, stable_id: &str) -> Option<usize> {
        let mut order = Vec::new();
        self.walk_visible(0, &mut order);
        order
            .into_iter()
            .find(|&index| self.nodes[index].attrs.stable_id.as_deref() == Some(stable_id))
    }

    /// Like `index_of`, but falls back to unrendered nodes.
    fn index_of_any(&self, stable_id: &str) -> Option<usize> {
        self.index_of(stable_id).or_else(|| {
            self.nodes
                .iter()
                .position(|node| node.attrs.stable_id.as_deref() == Some(stable_id))
        })
    }

    fn walk_visible(&self, index: usize, order: &mut Vec<usize>) {
        let Some(node) = self.nodes.get(index) else {
            return;
        };
        if node.hidden {
            return;
        }
        order.push(index);
        for &child in &node.children {
            self.walk_visible(child, order);
        }
    }

    fn is_rendered(&self, index: usize) -> bool {
        let mut current = Some(index);
        while let Some(i) = current {
            match self.nodes.get(i) {
                Some(node) if !node.hidden => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    fn ancestor_where(&self, index: usize, pred: impl Fn(&Node) -> bool) -> Option<usize> {
        let mut current = self.nodes.get(index).and_then(|n| n.parent);
        while let Some(i) = current {
            let node = &self.nodes[i];
            if pred(node) {
                return Some(i);
            }
            current = node.parent;
        }
        None
    }

    fn submit_form(&mut self, form_index: usize) {
        let name = self.nodes[form_index]
            .attrs
            .stable_id
            .clone()
            .unwrap_or_else(|| format!("form#{form_index}"));
        debug!("memory tree: form {} submitted", name);
        self.submissions.push(name);
    }

    /// Re-render controlled elements from framework state.
    fn rerender(&mut self) {
        for node in &mut self.nodes {
            let Some(framework_value) = node.controlled.as_ref().map(|c| c.state.clone()) else {
                continue;
            };
            if node.attrs.value.as_deref() != Some(framework_value.as_str()) {
                debug!(
                    "memory tree: re-render reverted {:?} to framework value {:?}",
                    node.attrs.stable_id, framework_value
                );
                node.attrs.value = Some(framework_value.clone());
                node.controlled = Some(Controlled {
                    state: framework_value.clone(),
                    tracker: Some(framework_value),
                });
            }
        }
    }
}

#[async_trait::async_trait]
impl UiTree for MemoryTree {
    fn root(&self) -> UIElement {
        self.handle(0)
    }

    fn find_by_stable_id(&self, stable_id: &str) -> Option<UIElement> {
        let index = self.lock().index_of(stable_id)?;
        Some(self.handle(index))
    }

    fn tagged_elements(&self) -> Vec<UIElement> {
        let tagged: Vec<usize> = {
            let order = self.visible_in_order();
            let state = self.lock();
            order
                .into_iter()
                .filter(|&index| {
                    state.nodes[index]
                        .attrs
                        .stable_id
                        .as_deref()
                        .is_some_and(|id| !id.is_empty())
                })
                .collect()
        };
        tagged.into_iter().map(|index| self.handle(index)).collect()
    }

    fn elements_of_kind(&self, kind: ElementKind) -> Vec<UIElement> {
        self.visible_in_order()
            .into_iter()
            .map(|index| self.handle(index))
            .filter(|element| element.matches_kind(kind))
            .collect()
    }

    fn navigate(&self, route: &str) -> Result<(), ActionError> {
        let mut state = self.lock();
        if !state.navigation_enabled {
            return Err(ActionError::EnvironmentUnavailable(format!(
                "no navigation mechanism available to open {route}"
            )));
        }
        state.navigations.push(route.to_string());
        Ok(())
    }

    fn has_scroll_root(&self) -> bool {
        self.lock().scrollable
    }

    fn scroll_document(
        &self,
        direction: ScrollDirection,
        amount: u32,
    ) -> Result<(), ActionError> {
        let mut state = self.lock();
        if !state.scrollable {
            return Err(ActionError::EnvironmentUnavailable(
                "document has no scrollable root".to_string(),
            ));
        }
        let max = state.document_height.saturating_sub(VIEWPORT_HEIGHT);
        state.scroll_y = match direction {
            ScrollDirection::Up => state.scroll_y.saturating_sub(amount),
            ScrollDirection::Down => state.scroll_y.saturating_add(amount).min(max),
            ScrollDirection::Top => 0,
            ScrollDirection::Bottom => max,
        };
        Ok(())
    }

    async fn settle(&self) {
        self.lock().rerender();
    }
}

impl SignalListener for MemoryTree {
    fn on_signal(&self, signal: &ActionSignal) {
        match signal.name {
            crate::events::OPEN_MODAL => {
                if let Some(id) = signal.payload.get("modalId").and_then(|v| v.as_str()) {
                    self.open_modal(id);
                }
            }
            crate::events::CLOSE_MODAL => {
                let id = signal.payload.get("modalId").and_then(|v| v.as_str());
                self.close_modal(id);
            }
            _ => {}
        }
    }
}

#[derive(Clone)]
struct MemoryElement {
    state: Arc<Mutex<TreeState>>,
    index: usize,
}

impl std::fmt::Debug for MemoryElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryElement")
            .field("index", &self.index)
            .finish()
    }
}

impl MemoryElement {
    fn lock(&self) -> MutexGuard<'_, TreeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sibling(&self, index: usize) -> UIElement {
        UIElement::new(Box::new(MemoryElement {
            state: self.state.clone(),
            index,
        }))
    }

    fn detached(&self) -> ActionError {
        ActionError::PlatformError(format!("node {} is no longer rendered", self.index))
    }

    /// Plain `element.value = v`: goes through the framework's instrumented
    /// setter, which also updates the tracker. The follow-up event is then
    /// swallowed and the next render reverts the DOM value.
    pub fn assign_value(&self, value: &str) {
        let mut state = self.lock();
        let node = &mut state.nodes[self.index];
        node.attrs.value = Some(value.to_string());
        if let Some(controlled) = node.controlled.as_mut() {
            controlled.tracker = Some(value.to_string());
        }
    }
}

impl UIElementImpl for MemoryElement {
    fn object_id(&self) -> usize {
        self.index
    }

    fn stable_id(&self) -> Option<String> {
        self.lock().nodes[self.index].attrs.stable_id.clone()
    }

    fn attributes(&self) -> UIElementAttributes {
        self.lock().nodes[self.index].attrs.clone()
    }

    fn children(&self) -> Result<Vec<UIElement>, ActionError> {
        let children: Vec<usize> = {
            let state = self.lock();
            state.nodes[self.index]
                .children
                .iter()
                .copied()
                .filter(|&child| !state.nodes[child].hidden)
                .collect()
        };
        Ok(children.into_iter().map(|i| self.sibling(i)).collect())
    }

    fn parent(&self) -> Result<Option<UIElement>, ActionError> {
        let parent = self.lock().nodes[self.index].parent;
        Ok(parent.map(|i| self.sibling(i)))
    }

    fn click(&self) -> Result<(), ActionError> {
        let mut state = self.lock();
        if !state.is_rendered(self.index) {
            return Err(self.detached());
        }
        if !state.nodes[self.index].is_enabled() {
            // Disabled controls swallow clicks.
            return Ok(());
        }
        state.nodes[self.index].clicks += 1;
        state.nodes[self.index].events.push(UiEvent::Click);

        match state.nodes[self.index].behavior.clone() {
            ClickBehavior::None => {}
            ClickBehavior::ActivateTab => {
                let siblings = state.nodes[self.index]
                    .parent
                    .map(|p| state.nodes[p].children.clone())
                    .unwrap_or_default();
                for sibling in siblings {
                    if state.nodes[sibling].attrs.role.as_deref() == Some("tab") {
                        state.nodes[sibling].attrs.is_selected = Some(sibling == self.index);
                    }
                }
            }
            ClickBehavior::ToggleMenu(menu_id) => {
                if let Some(menu) = state.nodes.iter_mut().find(|n| {
                    n.attrs.stable_id.as_deref() == Some(menu_id.as_str())
                }) {
                    menu.hidden = !menu.hidden;
                    menu.attrs.is_open = Some(!menu.hidden);
                }
            }
            ClickBehavior::OpenModal(modal_id) => {
                if let Some(modal) = state.nodes.iter_mut().find(|n| {
                    n.attrs.stable_id.as_deref() == Some(modal_id.as_str())
                }) {
                    set_modal_open(modal, true);
                }
            }
            ClickBehavior::CloseModal => {
                if let Some(modal) = state.ancestor_where(self.index, is_modal) {
                    set_modal_open(&mut state.nodes[modal], false);
                }
            }
            ClickBehavior::Submit => {
                if let Some(form) = state.ancestor_where(self.index, |n| n.attrs.tag == "form") {
                    state.submit_form(form);
                }
            }
        }
        Ok(())
    }

    fn focus(&self) -> Result<(), ActionError> {
        let mut state = self.lock();
        if !state.is_rendered(self.index) {
            return Err(self.detached());
        }
        state.focused = Some(self.index);
        state.nodes[self.index].events.push(UiEvent::Focus);
        Ok(())
    }

    fn scroll_into_view(&self) -> Result<(), ActionError> {
        let mut state = self.lock();
        if !state.is_rendered(self.index) {
            return Err(self.detached());
        }
        state.nodes[self.index].in_view = true;
        Ok(())
    }

    fn show_picker(&self) -> Result<(), ActionError> {
        let mut state = self.lock();
        let node = &mut state.nodes[self.index];
        if node.attrs.tag != "select" {
            return Err(ActionError::UnsupportedOperation(format!(
                "<{}> has no native picker",
                node.attrs.tag
            )));
        }
        node.events.push(UiEvent::MouseDown);
        node.picker_open = true;
        Ok(())
    }

    fn request_submit(&self) -> Result<(), ActionError> {
        let mut state = self.lock();
        if state.nodes[self.index].attrs.tag != "form" {
            return Err(ActionError::UnsupportedOperation(
                "only forms can be submitted".to_string(),
            ));
        }
        state.submit_form(self.index);
        Ok(())
    }

    fn options(&self) -> Vec<SelectOption> {
        self.lock().nodes[self.index].options.clone()
    }

    fn set_native_value(&self, value: &str) -> Result<(), ActionError> {
        let mut state = self.lock();
        let node = &mut state.nodes[self.index];
        if node.attrs.tag == "select" {
            // Unknown values leave the control with no selection, as browsers do.
            let known = node.options.iter().any(|o| o.value == value);
            node.attrs.value = Some(if known { value.to_string() } else { String::new() });
        } else {
            node.attrs.value = Some(value.to_string());
        }
        Ok(())
    }

    fn invalidate_value_tracker(&self) -> bool {
        let mut state = self.lock();
        match state.nodes[self.index].controlled.as_mut() {
            Some(controlled) => {
                controlled.tracker = None;
                true
            }
            None => false,
        }
    }

    fn dispatch_event(&self, event: UiEvent) -> Result<(), ActionError> {
        let mut state = self.lock();
        let node = &mut state.nodes[self.index];
        node.events.push(event);
        if !matches!(event, UiEvent::Input | UiEvent::Change) {
            return Ok(());
        }
        let current = node.attrs.value.clone().unwrap_or_default();
        match node.controlled.as_mut() {
            Some(controlled) => {
                if controlled.tracker.as_deref() == Some(current.as_str()) {
                    debug!(
                        "memory tree: {} event swallowed for {:?}",
                        event.as_str(),
                        node.attrs.stable_id
                    );
                } else {
                    controlled.state = current.clone();
                    controlled.tracker = Some(current);
                    node.accepted_changes += 1;
                }
            }
            None => node.accepted_changes += 1,
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn clone_box(&self) -> Box<dyn UIElementImpl> {
        Box::new(self.clone())
    }
}

/// Run the framework's instrumented setter on a memory-tree element.
///
/// Returns `false` when `element` does not belong to a [`MemoryTree`].
pub fn assign_value(element: &UIElement, value: &str) -> bool {
    match element.as_any().downcast_ref::<MemoryElement>() {
        Some(memory) => {
            memory.assign_value(value);
            true
        }
        None => false,
    }
}
