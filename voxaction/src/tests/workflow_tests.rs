use super::{dashboard, engine_for};
use crate::workflow::{
    fuse_navigation, tab_param, with_tab_param, StepStatus, Workflow, WorkflowStep,
};
use serde_json::json;

#[test]
fn test_tab_param_strips_prefix() {
    assert_eq!(tab_param("materials", Some("tab-")), "materials");
    assert_eq!(tab_param("tab-materials", Some("tab-")), "materials");
    assert_eq!(tab_param("Roll Call", Some("tab-")), "roll-call");
    assert_eq!(tab_param("tab-", Some("tab-")), "tab-");
    assert_eq!(tab_param("tab-materials", None), "tab-materials");
}

#[test]
fn test_with_tab_param_respects_existing_query() {
    assert_eq!(with_tab_param("/sessions", "materials"), "/sessions?tab=materials");
    assert_eq!(
        with_tab_param("/sessions?week=2", "materials"),
        "/sessions?week=2&tab=materials"
    );
    assert_eq!(with_tab_param("/s", "a&b"), "/s?tab=a%26b");
}

#[test]
fn test_fusion_in_either_order() {
    let forward = [
        WorkflowStep::new("navigate", json!({"route": "/sessions"})),
        WorkflowStep::new("switchTab", json!({"target": "materials"})),
    ];
    let fused = fuse_navigation(&forward, Some("tab-")).expect("should fuse");
    assert_eq!(fused.route, "/sessions?tab=materials");
    assert_eq!((fused.navigate_index, fused.switch_tab_index), (0, 1));

    let reversed = [
        WorkflowStep::new("switch_tab", json!({"target": "materials"})),
        WorkflowStep::new("navigate", json!({"route": "/sessions"})),
    ];
    let fused = fuse_navigation(&reversed, Some("tab-")).expect("should fuse");
    assert_eq!((fused.navigate_index, fused.switch_tab_index), (1, 0));
}

#[test]
fn test_no_fusion_without_both_steps() {
    let only_tab = [WorkflowStep::new("switchTab", json!({"target": "materials"}))];
    assert!(fuse_navigation(&only_tab, Some("tab-")).is_none());

    let routeless = [
        WorkflowStep::new("navigate", json!({})),
        WorkflowStep::new("switchTab", json!({"target": "materials"})),
    ];
    assert!(fuse_navigation(&routeless, Some("tab-")).is_none());
}

#[tokio::test]
async fn test_navigate_and_switch_tab_are_fused() {
    let tree = dashboard();
    let engine = engine_for(&tree);
    let workflow = Workflow::named(
        "open materials",
        vec![
            WorkflowStep::new("navigate", json!({"route": "/sessions"})),
            WorkflowStep::new("switchTab", json!({"target": "materials"})),
        ],
    );

    let result = engine.run_workflow(&workflow).await;

    assert!(result.success);
    assert_eq!(result.fused_route.as_deref(), Some("/sessions?tab=materials"));
    assert_eq!(tree.navigations(), vec!["/sessions?tab=materials".to_string()]);
    let statuses: Vec<StepStatus> = result.steps.iter().map(|s| s.status).collect();
    assert_eq!(statuses, vec![StepStatus::Succeeded, StepStatus::Fused]);
    assert_eq!(
        tree.click_count("tab-materials"),
        0,
        "the tab switch travels in the route, not as a click"
    );
}

#[tokio::test]
async fn test_failed_step_does_not_abort() {
    let tree = dashboard();
    let engine = engine_for(&tree);
    let workflow = Workflow::new(vec![
        WorkflowStep::new("clickButton", json!({"target": "missing button"})),
        WorkflowStep::new("fillInput", json!({"target": "course title", "content": "Bio"})),
    ]);

    let result = engine.run_workflow(&workflow).await;

    assert!(!result.success);
    assert_eq!(result.steps[0].status, StepStatus::Failed);
    assert_eq!(result.steps[1].status, StepStatus::Succeeded);
    assert_eq!(tree.value_of("input-course-title").as_deref(), Some("Bio"));
}

#[tokio::test]
async fn test_malformed_steps_are_skipped() {
    let tree = dashboard();
    let engine = engine_for(&tree);
    let workflow = Workflow::new(vec![
        WorkflowStep::new("levitate", json!({})),
        WorkflowStep::new("clickButton", json!({})),
        WorkflowStep::new("click", json!({"target": "save"})),
    ]);

    let result = engine.run_workflow(&workflow).await;

    assert!(result.success, "skipped steps are not failures");
    assert_eq!(result.count(StepStatus::Skipped), 2);
    assert_eq!(result.steps[2].status, StepStatus::Succeeded);
    assert_eq!(tree.click_count("save"), 1);
}

#[tokio::test]
async fn test_navigate_step_without_route_fails() {
    let tree = dashboard();
    let engine = engine_for(&tree);
    let workflow = Workflow::new(vec![WorkflowStep::new("navigate", json!({}))]);

    let result = engine.run_workflow(&workflow).await;

    assert!(!result.success);
    assert_eq!(result.steps[0].status, StepStatus::Failed);
    assert!(tree.navigations().is_empty());
}

#[tokio::test]
async fn test_workflow_steps_bypass_idempotency() {
    let tree = dashboard();
    let engine = engine_for(&tree);
    let workflow = Workflow::new(vec![
        WorkflowStep::new("clickButton", json!({"target": "save"})),
        WorkflowStep::new("clickButton", json!({"target": "save"})),
    ]);

    let result = engine.run_workflow(&workflow).await;

    assert!(result.success);
    assert_eq!(tree.click_count("save"), 2);
    assert!(engine.idempotency().is_empty());
}

#[test]
fn test_workflow_from_yaml() {
    let workflow = Workflow::from_yaml_str(
        r#"
name: enroll
steps:
  - action: navigate
    payload:
      route: /courses/42
    waitForLoad: true
  - action: openModal
    payload:
      modalId: enroll-modal
"#,
    )
    .expect("valid workflow yaml");

    assert_eq!(workflow.name.as_deref(), Some("enroll"));
    assert_eq!(workflow.steps.len(), 2);
    assert_eq!(workflow.steps[0].wait_for_load, Some(true));
    assert_eq!(workflow.steps[1].payload["modalId"], "enroll-modal");
}

#[test]
fn test_workflow_from_json_requires_steps() {
    assert!(Workflow::from_json_str(r#"{"name": "empty"}"#).is_err());
    let workflow = Workflow::from_json_str(r#"{"steps": []}"#).unwrap();
    assert!(workflow.steps.is_empty());
}
