mod config_tests;
mod idempotency_tests;
mod locator_tests;
mod verification_tests;
mod workflow_tests;

use crate::config::EngineConfig;
use crate::platforms::memory::{ClickBehavior, MemoryTree, NodeSpec};
use crate::selector::ElementKind;
use crate::VoiceEngine;
use std::sync::Arc;

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_target(true)
        .try_init();
}

/// A session-management page: tabs, a course form with controlled fields,
/// standalone buttons, two modals, a list and an actions menu.
pub fn dashboard() -> MemoryTree {
    let tree = MemoryTree::new();

    let tabs = tree.add_root(NodeSpec::tablist("session-tabs"));
    tree.add(tabs, NodeSpec::tab("tab-overview", "Overview").selected());
    tree.add(tabs, NodeSpec::tab("tab-materials", "Materials"));
    tree.add(tabs, NodeSpec::tab("tab-attendance", "Attendance"));

    let form = tree.add_root(NodeSpec::form("course-form"));
    tree.add(
        form,
        NodeSpec::input("input-course-title")
            .label("Course title")
            .controlled(),
    );
    tree.add(
        form,
        NodeSpec::textarea("description")
            .placeholder("Describe the course")
            .controlled(),
    );
    tree.add(
        form,
        NodeSpec::select(
            "dropdown-course",
            [
                ("", "Select a course..."),
                ("bio-101", "Biology 101"),
                ("chem-201", "Chemistry 201"),
                ("phys-301", "Physics 301"),
            ],
        )
        .label("Course")
        .controlled(),
    );
    tree.add(
        form,
        NodeSpec::submit_button("btn-create-course", "Create course"),
    );

    tree.add_root(NodeSpec::button("save", "Save"));
    tree.add_root(NodeSpec::button("go-live", "Go live").disabled());
    tree.add_root(NodeSpec::button("share", "Share").aria_disabled());
    tree.add_root(
        NodeSpec::button("btn-enroll", "Enroll student")
            .on_click(ClickBehavior::OpenModal("enroll-modal".to_string())),
    );

    let enroll = tree.add_root(NodeSpec::modal("enroll-modal"));
    tree.add(
        enroll,
        NodeSpec::input("input-student-email").label("Student email"),
    );
    tree.add(enroll, NodeSpec::close_button("enroll-modal-close"));
    tree.add_root(NodeSpec::modal("confirm-modal"));

    let list = tree.add_root(NodeSpec::list("session-list"));
    for (i, title) in ["Week 1: Intro", "Week 2: Cells", "Week 3: Genetics"]
        .into_iter()
        .enumerate()
    {
        tree.add(
            list,
            NodeSpec::list_item(title).id(&format!("session-list-item-{}", i + 1)),
        );
    }

    tree.add_root(NodeSpec::menu_trigger(
        "actions-menu-button",
        "Actions",
        "actions-menu",
    ));
    let menu = tree.add_root(NodeSpec::menu("actions-menu"));
    tree.add(menu, NodeSpec::menu_item("menu-duplicate", "Duplicate"));
    tree.add(menu, NodeSpec::menu_item("menu-archive", "Archive"));

    tree
}

/// Zero delays plus the aliases the dashboard scenarios rely on.
pub fn test_config() -> EngineConfig {
    EngineConfig::default()
        .zero_delays()
        .with_alias(ElementKind::Tab, "materials", "tab-materials")
        .and_then(|c| c.with_alias(ElementKind::Tab, "roll call", "tab-attendance"))
        .and_then(|c| c.with_alias(ElementKind::Button, "go live", "go-live"))
        .and_then(|c| c.with_alias(ElementKind::Dropdown, "course", "dropdown-course"))
        .expect("aliases for tab/button/dropdown are accepted")
}

/// Engine over `tree`, with the tree subscribed as the page listening for
/// modal signals.
pub fn engine_for(tree: &MemoryTree) -> VoiceEngine {
    init_tracing();
    let engine = VoiceEngine::new(Arc::new(tree.clone()), test_config());
    engine.subscribe(Arc::new(tree.clone()));
    engine
}
