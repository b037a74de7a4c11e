use super::{dashboard, init_tracing, test_config};
use crate::action::{validate, ActionPayload, TargetPayload, VoiceAction};
use crate::element::{UIElement, UiEvent};
use crate::errors::{ActionError, FailureClass};
use crate::executor::ActionOutcome;
use crate::platforms::memory::{assign_value, ClickBehavior, MemoryTree, NodeSpec};
use crate::snapshot::{DropdownState, StateDiff, UiState};
use crate::value_setter::ControlledValueSetter;
use crate::verification::{
    verify, ExecutionContext, NoRepair, RepairStrategy, Verdict, VerificationState,
};
use crate::VoiceEngine;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Plain value assignment, the way a naive script would do it.
struct NaiveSetter;

impl ControlledValueSetter for NaiveSetter {
    fn set_value(
        &self,
        element: &UIElement,
        value: &str,
        events: &[UiEvent],
    ) -> Result<(), ActionError> {
        assign_value(element, value);
        for event in events {
            element.dispatch_event(*event)?;
        }
        Ok(())
    }
}

fn action(raw: serde_json::Value) -> VoiceAction {
    validate(&raw).into_result().expect("test action is valid")
}

#[tokio::test]
async fn test_naive_assignment_is_reverted_and_fails_after_retry() {
    init_tracing();
    let tree = dashboard();
    let engine = VoiceEngine::with_components(
        Arc::new(tree.clone()),
        test_config(),
        Arc::new(NaiveSetter),
        Arc::new(NoRepair),
    );

    let result = engine
        .execute(&json!({
            "type": "fillInput",
            "payload": {"target": "course title", "content": "Biology"}
        }))
        .await;

    assert!(!result.success);
    assert_eq!(tree.value_of("input-course-title").as_deref(), Some(""));
    assert_eq!(tree.accepted_changes("input-course-title"), 0);
    assert_eq!(result.context.retry_count, 1);
    assert_eq!(
        result.context.transitions,
        vec![
            VerificationState::Pending,
            VerificationState::Executed,
            VerificationState::Stabilizing,
            VerificationState::Failed,
            VerificationState::Retry,
            VerificationState::Executed,
            VerificationState::Stabilizing,
            VerificationState::Failed,
        ]
    );
    assert_eq!(result.failure_class(), Some(FailureClass::Verification));
    assert!(!result.is_recoverable(), "exhausted verification is terminal");
    assert!(result.suggestion().is_some());
    assert!(
        result.outcome.is_some(),
        "the primitive outcome is kept alongside the failure"
    );
}

#[tokio::test]
async fn test_successful_run_transitions() {
    let tree = dashboard();
    let engine = super::engine_for(&tree);

    let result = engine
        .execute(&json!({"type": "switchTab", "payload": {"target": "attendance"}}))
        .await;

    assert!(result.success);
    assert_eq!(result.context.state(), VerificationState::Verified);
    assert_eq!(
        result.context.transitions,
        vec![
            VerificationState::Pending,
            VerificationState::Executed,
            VerificationState::Stabilizing,
            VerificationState::Verified,
        ]
    );
    assert_eq!(result.context.retry_count, 0);
    assert!(result.context.before.is_some() && result.context.after.is_some());
}

struct Redirect {
    calls: AtomicU32,
    to: &'static str,
}

impl RepairStrategy for Redirect {
    fn repair(
        &self,
        _action: &VoiceAction,
        reason: &str,
        context: &ExecutionContext,
    ) -> Option<VoiceAction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(!reason.is_empty());
        assert_eq!(context.state(), VerificationState::Failed);
        VoiceAction::new(ActionPayload::SwitchTab(TargetPayload {
            target: self.to.to_string(),
        }))
        .ok()
    }
}

fn tree_with_inert_tab() -> MemoryTree {
    let tree = dashboard();
    let tabs = tree.add_root(NodeSpec::tablist("archive-tabs"));
    tree.add(
        tabs,
        NodeSpec::tab("tab-archive", "Archive").on_click(ClickBehavior::None),
    );
    tree
}

#[tokio::test]
async fn test_repair_replaces_action_on_retry() {
    let tree = tree_with_inert_tab();
    let repair = Arc::new(Redirect {
        calls: AtomicU32::new(0),
        to: "materials",
    });
    let engine = VoiceEngine::with_components(
        Arc::new(tree.clone()),
        test_config(),
        Arc::new(crate::ReactiveValueSetter),
        repair.clone(),
    );

    let result = engine
        .execute(&json!({"type": "switchTab", "payload": {"target": "archive"}}))
        .await;

    assert!(result.success, "{:?}", result.failure);
    assert_eq!(repair.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.context.retry_count, 1);
    assert_eq!(
        result.outcome.unwrap().resolved_id.as_deref(),
        Some("tab-materials")
    );
}

#[tokio::test]
async fn test_retry_bound_comes_from_config() {
    let tree = tree_with_inert_tab();
    let repair = Arc::new(Redirect {
        calls: AtomicU32::new(0),
        to: "archive",
    });
    let mut config = test_config();
    config.max_retries = 3;
    let engine = VoiceEngine::with_components(
        Arc::new(tree.clone()),
        config,
        Arc::new(crate::ReactiveValueSetter),
        repair.clone(),
    );

    let result = engine
        .execute(&json!({"type": "switchTab", "payload": {"target": "archive"}}))
        .await;

    assert!(!result.success);
    assert_eq!(result.context.retry_count, 3);
    assert_eq!(repair.calls.load(Ordering::SeqCst), 3);
    assert_eq!(tree.click_count("tab-archive"), 4, "first attempt plus three retries");
}

#[tokio::test]
async fn test_primitive_failure_does_not_retry() {
    let tree = dashboard();
    let engine = super::engine_for(&tree);

    let result = engine
        .execute(&json!({"type": "switchTab", "payload": {"target": "gradebook"}}))
        .await;

    assert!(!result.success);
    assert_eq!(result.context.retry_count, 0);
    assert!(result.context.after.is_none());
}

#[tokio::test]
async fn test_rejected_input_never_touches_tree() {
    let tree = dashboard();
    let engine = super::engine_for(&tree);

    let result = engine.execute(&json!({"type": "explode"})).await;

    assert!(!result.success);
    assert_eq!(result.failure_class(), Some(FailureClass::Validation));
    assert!(result.kind.is_none());
    assert!(result.context.before.is_none());
    assert_eq!(
        result.context.transitions,
        vec![VerificationState::Pending, VerificationState::Failed]
    );
    assert!(engine.idempotency().is_empty(), "rejections are not cached");
}

#[tokio::test]
async fn test_execute_str_rejects_bad_json() {
    let tree = dashboard();
    let engine = super::engine_for(&tree);

    let result = engine.execute_str("{not json").await;
    assert!(!result.success);
    assert_eq!(result.failure_class(), Some(FailureClass::Validation));

    let ok = engine
        .execute_str(r#"{"type":"clickButton","payload":{"target":"save"}}"#)
        .await;
    assert!(ok.success);
}

#[test]
fn test_verify_select_requires_exact_option() {
    let select = action(json!({
        "type": "selectDropdown",
        "payload": {"target": "course", "value": "bio-101"}
    }));
    let outcome = ActionOutcome {
        resolved_id: Some("dropdown-course".to_string()),
        value: Some("bio-101".to_string()),
        ..Default::default()
    };
    let state = |selected: &str| UiState {
        dropdowns: vec![DropdownState {
            id: "dropdown-course".to_string(),
            selected: selected.to_string(),
            options: Vec::new(),
        }],
        ..Default::default()
    };

    let before = state("");
    let wrong = state("chem-201");
    let diff = StateDiff::between(&before, &wrong);
    assert!(
        matches!(verify(&select, &outcome, &before, &wrong, &diff), Verdict::Fail { .. }),
        "a change to another option is not success"
    );

    let right = state("bio-101");
    let diff = StateDiff::between(&before, &right);
    assert_eq!(verify(&select, &outcome, &before, &right, &diff), Verdict::Pass);
}

#[test]
fn test_verify_untagged_tab_passes() {
    let switch = action(json!({"type": "switchTab", "payload": {"target": "x"}}));
    let empty = UiState::default();
    let diff = StateDiff::default();

    let untagged = ActionOutcome::default();
    assert_eq!(verify(&switch, &untagged, &empty, &empty, &diff), Verdict::Pass);

    let vanished = ActionOutcome {
        resolved_id: Some("tab-x".to_string()),
        ..Default::default()
    };
    assert!(
        matches!(verify(&switch, &vanished, &empty, &empty, &diff), Verdict::Fail { .. }),
        "a tagged tab missing from the snapshot is not success"
    );
}

#[test]
fn test_verify_open_modal() {
    let open = action(json!({"type": "openModal", "payload": {"modalId": "enroll"}}));
    let outcome = ActionOutcome::default();
    let closed = UiState::default();
    let opened = UiState {
        open_modals: vec!["enroll".to_string()],
        ..Default::default()
    };
    let diff = StateDiff::between(&closed, &opened);
    assert_eq!(verify(&open, &outcome, &closed, &opened, &diff), Verdict::Pass);

    let diff = StateDiff::default();
    assert!(matches!(
        verify(&open, &outcome, &closed, &closed, &diff),
        Verdict::Fail { .. }
    ));
}

#[test]
fn test_result_serializes_for_callers() {
    let result = crate::ExecutionResult::rejected("missing action `type`");
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["success"], false);
    assert_eq!(value["failure"]["class"], "validation");
    assert_eq!(value["failure"]["recoverable"], false);
    assert_eq!(value["context"]["transitions"], json!(["PENDING", "FAILED"]));
    assert_eq!(value["cached"], false);
}
