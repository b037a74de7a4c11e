//! Snapshot, execute, stabilize, re-snapshot, verify; with a bounded retry.

use crate::action::{ActionPayload, ActionType, VoiceAction};
use crate::errors::{ActionError, FailureClass};
use crate::executor::{ActionExecutor, ActionOutcome};
use crate::snapshot::{capture_state, StateDiff, UiState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// States of one verification-loop run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationState {
    Pending,
    Executed,
    Stabilizing,
    Verified,
    Failed,
    Retry,
}

/// Everything observed during one run, kept for logging and tests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<VoiceAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<UiState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<UiState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<StateDiff>,
    pub elapsed_ms: u64,
    pub retry_count: u32,
    /// Every state visited, in order
    pub transitions: Vec<VerificationState>,
    pub started_at: DateTime<Utc>,
    #[serde(skip)]
    started: Option<Instant>,
}

impl ExecutionContext {
    fn new(action: Option<VoiceAction>) -> Self {
        Self {
            action,
            before: None,
            after: None,
            diff: None,
            elapsed_ms: 0,
            retry_count: 0,
            transitions: vec![VerificationState::Pending],
            started_at: Utc::now(),
            started: Some(Instant::now()),
        }
    }

    fn enter(&mut self, state: VerificationState) {
        debug!("verification state -> {:?}", state);
        self.transitions.push(state);
    }

    fn finish(&mut self) {
        if let Some(started) = self.started {
            self.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        }
    }

    /// The state the run ended in.
    pub fn state(&self) -> VerificationState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(VerificationState::Pending)
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionFailure {
    pub class: FailureClass,
    pub reason: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl From<&ActionError> for ActionFailure {
    fn from(error: &ActionError) -> Self {
        Self {
            class: error.class(),
            reason: error.to_string(),
            recoverable: error.is_recoverable(),
            suggestion: error.suggestion(),
        }
    }
}

/// What the caller gets back for every action, whatever happened.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ActionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ActionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ActionFailure>,
    pub context: ExecutionContext,
    /// Served from the idempotency cache without running anything
    pub cached: bool,
}

impl ExecutionResult {
    fn from_context(
        context: ExecutionContext,
        outcome: Option<ActionOutcome>,
        failure: Option<ActionFailure>,
    ) -> Self {
        let kind = context.action.as_ref().map(VoiceAction::kind);
        let correlation_id = context
            .action
            .as_ref()
            .map(|a| a.correlation_id().to_string());
        Self {
            success: failure.is_none(),
            kind,
            correlation_id,
            outcome,
            failure,
            context,
            cached: false,
        }
    }

    /// Terminal result for input that never became an action.
    pub fn rejected(diagnostic: impl Into<String>) -> Self {
        let error = ActionError::InvalidAction(diagnostic.into());
        let mut context = ExecutionContext::new(None);
        context.enter(VerificationState::Failed);
        context.finish();
        Self::from_context(context, None, Some(ActionFailure::from(&error)))
    }

    pub fn is_recoverable(&self) -> bool {
        self.failure.as_ref().is_some_and(|f| f.recoverable)
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.failure.as_ref().and_then(|f| f.suggestion.as_deref())
    }

    pub fn failure_class(&self) -> Option<FailureClass> {
        self.failure.as_ref().map(|f| f.class)
    }
}

/// Kind-specific acceptance decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail {
        reason: String,
        suggestion: Option<String>,
    },
}

impl Verdict {
    fn fail(reason: impl Into<String>, suggestion: &str) -> Self {
        Verdict::Fail {
            reason: reason.into(),
            suggestion: Some(suggestion.to_string()),
        }
    }
}

/// Decide whether `action` took effect.
///
/// `clickButton` is accepted on existence plus activation: a button's effect
/// is arbitrary application logic, so nothing generic can be observed.
pub fn verify(
    action: &VoiceAction,
    outcome: &ActionOutcome,
    before: &UiState,
    after: &UiState,
    diff: &StateDiff,
) -> Verdict {
    let resolved = outcome.resolved_id.as_deref();
    match action.payload() {
        ActionPayload::Navigate(_) => Verdict::Pass,
        ActionPayload::SwitchTab(p) => match resolved {
            Some(id) if after.active_tab.as_deref() == Some(id) => Verdict::Pass,
            Some(id) if after.tab(id).is_none() => Verdict::fail(
                format!("tab {id} is gone after activation"),
                "The page may have changed; ask for the tab again.",
            ),
            Some(id) => Verdict::fail(
                format!(
                    "tab {id} is not active after activation (active: {})",
                    after.active_tab.as_deref().unwrap_or("none")
                ),
                &format!("Try the name shown on the tab instead of \"{}\".", p.target),
            ),
            None => Verdict::Pass,
        },
        ActionPayload::SelectDropdown(_) => {
            let (Some(id), Some(expected)) = (resolved, outcome.value.as_deref()) else {
                return Verdict::Pass;
            };
            match after.dropdown(id) {
                Some(state) if state.selected == expected => Verdict::Pass,
                Some(state) => Verdict::fail(
                    format!(
                        "{id} shows \"{}\" instead of \"{expected}\"{}",
                        state.selected,
                        if diff.dropdown_changed(id) { "" } else { " (no change observed)" }
                    ),
                    "Say the option exactly as it is listed, or its position.",
                ),
                None => Verdict::fail(
                    format!("{id} disappeared after selection"),
                    "The form may have changed; ask for the field again.",
                ),
            }
        }
        ActionPayload::FillInput(p) => {
            let (Some(id), Some(expected)) = (resolved, outcome.value.as_deref()) else {
                return Verdict::Pass;
            };
            let Some(state) = after.input(id) else {
                return Verdict::fail(
                    format!("{id} disappeared after filling"),
                    "The form may have changed; ask for the field again.",
                );
            };
            let holds = if p.append {
                state.value.contains(p.content.as_str())
            } else {
                state.value == expected
            };
            if holds {
                Verdict::Pass
            } else {
                Verdict::fail(
                    format!(
                        "{id} holds \"{}\" instead of \"{expected}\"{}",
                        state.value,
                        if diff.input_changed(id) { "" } else { " (value was not committed)" }
                    ),
                    "The field may be read-only or reformat its input; try typing it manually.",
                )
            }
        }
        ActionPayload::ClearInput(_) => match resolved.and_then(|id| after.input(id)) {
            Some(state) if !state.value.is_empty() => Verdict::fail(
                format!("{} still holds \"{}\"", state.id, state.value),
                "The field may be read-only.",
            ),
            _ => Verdict::Pass,
        },
        ActionPayload::ClickButton(_) => {
            if let Some(id) = resolved.filter(|id| before.button(id).is_none()) {
                debug!("clicked untracked button {}", id);
            }
            Verdict::Pass
        }
        ActionPayload::OpenModal(p) => {
            if after.is_modal_open(&p.modal_id) {
                Verdict::Pass
            } else {
                Verdict::fail(
                    format!("modal {} is not open", p.modal_id),
                    "This page may not offer that dialog right now.",
                )
            }
        }
        ActionPayload::CloseModal(p) => {
            if outcome.no_op {
                return Verdict::Pass;
            }
            match p.modal_id.as_deref().or(resolved) {
                Some(id) if after.is_modal_open(id) => Verdict::fail(
                    format!("modal {id} is still open"),
                    "Try the dialog's close button.",
                ),
                _ => Verdict::Pass,
            }
        }
        ActionPayload::ExpandDropdown(_)
        | ActionPayload::SelectListItem(_)
        | ActionPayload::Toast(_)
        | ActionPayload::Scroll(_)
        | ActionPayload::SubmitForm(_)
        | ActionPayload::OpenMenuAndClick(_) => Verdict::Pass,
    }
}

/// Extension point consulted after a failed verification.
///
/// A repair may return an adjusted action to run on the retry; `None` keeps
/// the original.
pub trait RepairStrategy: Send + Sync {
    fn repair(&self, action: &VoiceAction, reason: &str, context: &ExecutionContext)
        -> Option<VoiceAction>;
}

/// Computes no repair; the retry re-runs the action unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRepair;

impl RepairStrategy for NoRepair {
    fn repair(&self, _: &VoiceAction, _: &str, _: &ExecutionContext) -> Option<VoiceAction> {
        None
    }
}

pub struct VerificationLoop {
    executor: Arc<ActionExecutor>,
    repair: Arc<dyn RepairStrategy>,
    stabilization: Duration,
    max_retries: u32,
}

impl VerificationLoop {
    pub fn new(
        executor: Arc<ActionExecutor>,
        repair: Arc<dyn RepairStrategy>,
        stabilization: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            executor,
            repair,
            stabilization,
            max_retries,
        }
    }

    /// Run `action` to a result. Never panics and never returns early
    /// without an [`ExecutionResult`].
    #[instrument(skip(self, action), fields(kind = %action.kind(), correlation_id = action.correlation_id()))]
    pub async fn run(&self, action: VoiceAction) -> ExecutionResult {
        let tree = self.executor.locator().tree().clone();
        let mut context = ExecutionContext::new(Some(action.clone()));
        let mut current = action;

        loop {
            let before = capture_state(tree.as_ref());
            context.before = Some(before.clone());

            let outcome = match self.executor.execute(&current).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    // Primitive failures are reported as-is and do not consume a retry.
                    warn!("{} failed before verification: {}", current.kind(), error);
                    context.enter(VerificationState::Failed);
                    context.finish();
                    return ExecutionResult::from_context(
                        context,
                        None,
                        Some(ActionFailure::from(&error)),
                    );
                }
            };
            context.enter(VerificationState::Executed);

            if current.kind() == ActionType::Navigate {
                // The observing context is about to be replaced; nothing to diff.
                context.enter(VerificationState::Verified);
                context.finish();
                info!("{} accepted without diff: {}", current.kind(), outcome.detail);
                return ExecutionResult::from_context(context, Some(outcome), None);
            }

            context.enter(VerificationState::Stabilizing);
            if !self.stabilization.is_zero() {
                tokio::time::sleep(self.stabilization).await;
            }
            tree.settle().await;

            let after = capture_state(tree.as_ref());
            let diff = StateDiff::between(&before, &after);
            debug!("{} diff: {}", current.kind(), diff);
            let verdict = verify(&current, &outcome, &before, &after, &diff);
            context.after = Some(after);
            context.diff = Some(diff);

            let (reason, suggestion) = match verdict {
                Verdict::Pass => {
                    context.enter(VerificationState::Verified);
                    context.finish();
                    info!(
                        "{} verified after {} retr{}: {}",
                        current.kind(),
                        context.retry_count,
                        if context.retry_count == 1 { "y" } else { "ies" },
                        outcome.detail
                    );
                    return ExecutionResult::from_context(context, Some(outcome), None);
                }
                Verdict::Fail { reason, suggestion } => (reason, suggestion),
            };

            context.enter(VerificationState::Failed);
            if context.retry_count >= self.max_retries {
                context.finish();
                warn!(
                    "{} failed verification after {} retries: {}",
                    current.kind(),
                    context.retry_count,
                    reason
                );
                let error = ActionError::VerificationFailed { reason, suggestion };
                return ExecutionResult::from_context(
                    context,
                    Some(outcome),
                    Some(ActionFailure::from(&error)),
                );
            }

            if let Some(repaired) = self.repair.repair(&current, &reason, &context) {
                debug!("repair replaced {} action", current.kind());
                current = repaired;
            }
            context.retry_count += 1;
            context.enter(VerificationState::Retry);
            warn!("{} verification failed ({}), retrying", current.kind(), reason);
        }
    }
}
