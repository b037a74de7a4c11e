//! Multi-step sequences of actions.
//!
//! Steps run straight through the primitives with a settle delay between
//! them; there is no per-step verification, only a final summary. A
//! navigate step paired with a tab switch is fused into one navigation that
//! carries the tab in the query string, since a tab-switch signal sent to a
//! page that has not mounted yet is lost.

use crate::action::{validate, ActionType};
use crate::executor::ActionExecutor;
use crate::selector::NormalizedTarget;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    /// Action kind, canonical (`switchTab`) or legacy (`switch_tab`, `tab`)
    pub action: String,
    #[serde(default)]
    pub payload: Value,
    /// Give the page the longer navigation settle after this step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_load: Option<bool>,
}

impl WorkflowStep {
    pub fn new(action: impl Into<String>, payload: Value) -> Self {
        Self {
            action: action.into(),
            payload,
            wait_for_load: None,
        }
    }

    pub fn wait_for_load(mut self) -> Self {
        self.wait_for_load = Some(true);
        self
    }

    fn kind(&self) -> Option<ActionType> {
        ActionType::from_name(&self.action).or_else(|| ActionType::from_legacy(&self.action))
    }

    fn string_field(&self, field: &str) -> Option<&str> {
        self.payload
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub steps: Vec<WorkflowStep>,
}

impl Workflow {
    pub fn new(steps: Vec<WorkflowStep>) -> Self {
        Self { name: None, steps }
    }

    pub fn named(name: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Self {
            name: Some(name.into()),
            steps,
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse workflow JSON")
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse workflow YAML")
    }
}

/// A navigate step and a tab-switch step merged into one navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusedNavigation {
    pub navigate_index: usize,
    pub switch_tab_index: usize,
    pub route: String,
}

/// Find a navigate step with a route and a tab-switch step with a target,
/// in any order, and build the combined destination.
pub fn fuse_navigation(steps: &[WorkflowStep], tab_prefix: Option<&str>) -> Option<FusedNavigation> {
    let (navigate_index, route) = steps.iter().enumerate().find_map(|(i, step)| {
        (step.kind() == Some(ActionType::Navigate))
            .then(|| step.string_field("route"))
            .flatten()
            .map(|route| (i, route))
    })?;
    let (switch_tab_index, tab) = steps.iter().enumerate().find_map(|(i, step)| {
        (step.kind() == Some(ActionType::SwitchTab))
            .then(|| step.string_field("target"))
            .flatten()
            .map(|target| (i, target))
    })?;

    Some(FusedNavigation {
        navigate_index,
        switch_tab_index,
        route: with_tab_param(route, &tab_param(tab, tab_prefix)),
    })
}

/// The tab identifier carried in the query: hyphenated, without the class prefix.
pub fn tab_param(target: &str, tab_prefix: Option<&str>) -> String {
    let hyphenated = NormalizedTarget::new(target).hyphenated;
    match tab_prefix.and_then(|prefix| hyphenated.strip_prefix(prefix)) {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => hyphenated,
    }
}

pub fn with_tab_param(route: &str, tab: &str) -> String {
    let separator = if route.contains('?') { '&' } else { '?' };
    format!("{route}{separator}tab={}", urlencoding::encode(tab))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    /// Malformed step, skipped with a warning
    Skipped,
    /// Absorbed into a fused navigation and not run on its own
    Fused,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub index: usize,
    pub action: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// No step failed (skipped steps do not count as failures)
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fused_route: Option<String>,
    pub steps: Vec<StepReport>,
}

impl WorkflowResult {
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }
}

pub struct WorkflowRunner {
    executor: Arc<ActionExecutor>,
    navigation_settle: Duration,
    step_settle: Duration,
    tab_prefix: Option<String>,
}

impl WorkflowRunner {
    pub fn new(
        executor: Arc<ActionExecutor>,
        navigation_settle: Duration,
        step_settle: Duration,
        tab_prefix: Option<String>,
    ) -> Self {
        Self {
            executor,
            navigation_settle,
            step_settle,
            tab_prefix,
        }
    }

    #[instrument(skip(self, workflow), fields(name = workflow.name.as_deref().unwrap_or("unnamed"), steps = workflow.steps.len()))]
    pub async fn run(&self, workflow: &Workflow) -> WorkflowResult {
        let fused = fuse_navigation(&workflow.steps, self.tab_prefix.as_deref());
        if let Some(fused) = &fused {
            debug!(
                "fusing steps {} and {} into navigation to {}",
                fused.navigate_index, fused.switch_tab_index, fused.route
            );
        }

        let mut reports = Vec::with_capacity(workflow.steps.len());
        for (index, step) in workflow.steps.iter().enumerate() {
            let report = |status, detail: Option<String>| StepReport {
                index,
                action: step.action.clone(),
                status,
                detail,
            };

            if fused.as_ref().is_some_and(|f| f.switch_tab_index == index) {
                reports.push(report(StepStatus::Fused, None));
                continue;
            }

            let Some(kind) = step.kind() else {
                warn!("step {}: unknown action '{}', skipping", index, step.action);
                reports.push(report(
                    StepStatus::Skipped,
                    Some(format!("unknown action '{}'", step.action)),
                ));
                continue;
            };

            let mut payload = step.payload.clone();
            if let Some(fused) = fused.as_ref().filter(|f| f.navigate_index == index) {
                payload = json!({ "route": fused.route });
            }

            let raw = if ActionType::from_name(&step.action).is_some() {
                json!({ "type": step.action, "payload": payload })
            } else {
                json!({ "kind": step.action, "payload": payload })
            };
            let validation = validate(&raw);
            let action = match validation.action {
                Some(action) => action,
                None if kind == ActionType::Navigate => {
                    let reason = validation
                        .diagnostic
                        .unwrap_or_else(|| "navigate step has no route".to_string());
                    warn!("step {}: {}", index, reason);
                    reports.push(report(StepStatus::Failed, Some(reason)));
                    continue;
                }
                None => {
                    let reason = validation.diagnostic.unwrap_or_default();
                    warn!("step {}: {}, skipping", index, reason);
                    reports.push(report(StepStatus::Skipped, Some(reason)));
                    continue;
                }
            };

            match self.executor.execute(&action).await {
                Ok(outcome) => reports.push(report(StepStatus::Succeeded, Some(outcome.detail))),
                Err(error) => {
                    warn!("step {} ({}) failed: {}", index, kind, error);
                    reports.push(report(StepStatus::Failed, Some(error.to_string())));
                }
            }

            let settle = if kind == ActionType::Navigate || step.wait_for_load == Some(true) {
                self.navigation_settle
            } else {
                self.step_settle
            };
            if !settle.is_zero() {
                tokio::time::sleep(settle).await;
            }
            self.executor.locator().tree().settle().await;
        }

        let result = WorkflowResult {
            name: workflow.name.clone(),
            success: !reports.iter().any(|r| r.status == StepStatus::Failed),
            fused_route: fused.map(|f| f.route),
            steps: reports,
        };
        info!(
            "workflow {} finished: {} succeeded, {} failed, {} skipped",
            workflow.name.as_deref().unwrap_or("unnamed"),
            result.count(StepStatus::Succeeded),
            result.count(StepStatus::Failed),
            result.count(StepStatus::Skipped)
        );
        result
    }
}
