use super::{dashboard, test_config};
use crate::errors::{ActionError, FailureClass};
use crate::locator::Locator;
use crate::platforms::memory::{MemoryTree, NodeSpec};
use crate::selector::{ElementKind, Selector};
use std::sync::Arc;

fn locator_for(tree: &MemoryTree) -> Locator {
    let config = test_config();
    Locator::new(Arc::new(tree.clone()), config.aliases, config.prefixes)
}

#[test]
fn test_alias_resolves_tab() {
    let tree = dashboard();
    let locator = locator_for(&tree);

    let resolved = locator
        .resolve("Materials", ElementKind::Tab)
        .expect("materials tab should resolve");
    assert_eq!(resolved.element.stable_id().as_deref(), Some("tab-materials"));
    assert_eq!(resolved.selector.strategy(), "alias");
}

#[test]
fn test_alias_wins_over_direct_id() {
    let tree = dashboard();
    // A section whose id is exactly the spoken word.
    tree.add_root(NodeSpec::div().id("materials").text("Course materials"));
    let locator = locator_for(&tree);

    let resolved = locator
        .resolve("materials", ElementKind::Tab)
        .expect("should resolve");
    assert_eq!(
        resolved.element.stable_id().as_deref(),
        Some("tab-materials"),
        "alias must take precedence over an exact id match"
    );
}

#[test]
fn test_prefix_convention_resolves_input() {
    let tree = dashboard();
    let locator = locator_for(&tree);

    let resolved = locator
        .resolve("course title", ElementKind::Input)
        .expect("course title should resolve");
    assert_eq!(
        resolved.selector,
        Selector::PrefixedId {
            prefix: "input-".to_string(),
            id: "course-title".to_string()
        }
    );
    assert_eq!(
        resolved.element.stable_id().as_deref(),
        Some("input-course-title")
    );
}

#[test]
fn test_exact_id_resolves_before_prefix() {
    let tree = dashboard();
    let locator = locator_for(&tree);

    let resolved = locator
        .resolve("save", ElementKind::Button)
        .expect("save should resolve");
    assert_eq!(resolved.selector, Selector::Id("save".to_string()));
}

#[test]
fn test_id_fragment_matches_any_tagged_element() {
    let tree = dashboard();
    let locator = locator_for(&tree);

    let resolved = locator
        .resolve("actions", ElementKind::Button)
        .expect("trigger should resolve");
    assert_eq!(
        resolved.element.stable_id().as_deref(),
        Some("actions-menu-button")
    );
    assert_eq!(resolved.selector.strategy(), "id_contains");

    // No input carries this fragment, but a list item does.
    let resolved = locator
        .resolve("list item 2", ElementKind::Input)
        .expect("fragment matches outside the class");
    assert_eq!(
        resolved.element.stable_id().as_deref(),
        Some("session-list-item-2")
    );
    assert_eq!(resolved.selector.strategy(), "id_contains");
}

#[test]
fn test_id_fragment_prefers_requested_kind() {
    let tree = MemoryTree::new();
    tree.add_root(NodeSpec::div().id("notes-panel"));
    tree.add_root(NodeSpec::input("input-notes"));
    let locator = locator_for(&tree);

    let resolved = locator
        .resolve("note", ElementKind::Input)
        .expect("should resolve");
    assert_eq!(
        resolved.element.stable_id().as_deref(),
        Some("input-notes"),
        "a candidate of the requested kind wins over an earlier one"
    );
    assert_eq!(resolved.selector.strategy(), "id_contains");
}

#[test]
fn test_text_and_placeholder_matching() {
    let tree = dashboard();
    let locator = locator_for(&tree);

    let by_text = locator
        .resolve("enroll student", ElementKind::Button)
        .expect("enroll button should resolve by text");
    assert_eq!(by_text.element.stable_id().as_deref(), Some("btn-enroll"));
    assert_eq!(by_text.selector.strategy(), "text");

    let by_placeholder = locator
        .resolve("describe the course", ElementKind::Input)
        .expect("description should resolve by placeholder");
    assert_eq!(
        by_placeholder.element.stable_id().as_deref(),
        Some("description")
    );
}

#[test]
fn test_untagged_element_found_by_text() {
    let tree = MemoryTree::new();
    tree.add_root(NodeSpec::button("ignored", "Publish").untagged());
    let locator = locator_for(&tree);

    let resolved = locator
        .resolve("publish", ElementKind::Button)
        .expect("text match does not need a stable id");
    assert!(resolved.element.stable_id().is_none());
}

#[test]
fn test_word_subset_fallback() {
    let tree = MemoryTree::new();
    tree.add_root(NodeSpec::div().id("panel-weekly-summary"));
    let locator = locator_for(&tree);

    let resolved = locator
        .resolve("summary weekly", ElementKind::Any)
        .expect("all words appear in the id");
    assert_eq!(resolved.selector.strategy(), "words");
}

#[test]
fn test_hidden_elements_are_not_resolved() {
    let tree = dashboard();
    let locator = locator_for(&tree);

    assert!(
        locator
            .resolve("student email", ElementKind::Input)
            .is_none(),
        "inputs inside a closed modal must not resolve"
    );
    tree.open_modal("enroll-modal");
    assert!(locator
        .resolve("student email", ElementKind::Input)
        .is_some());
}

#[test]
fn test_locate_miss_is_recoverable_with_suggestion() {
    let tree = dashboard();
    let locator = locator_for(&tree);

    let error = locator
        .locate("gradebook", ElementKind::Tab)
        .expect_err("no gradebook tab exists");
    assert!(matches!(error, ActionError::ElementNotFound { .. }));
    assert_eq!(error.class(), FailureClass::Resolution);
    assert!(error.is_recoverable());
    let suggestion = error.suggestion().expect("not-found carries a suggestion");
    assert!(suggestion.contains("gradebook"), "got: {suggestion}");
}

#[test]
fn test_resolution_reads_live_tree() {
    let tree = MemoryTree::new();
    let locator = locator_for(&tree);
    assert!(locator.resolve("late", ElementKind::Button).is_none());

    tree.add_root(NodeSpec::button("btn-late", "Late"));
    assert!(
        locator.resolve("late", ElementKind::Button).is_some(),
        "elements added after construction must be found"
    );
}
