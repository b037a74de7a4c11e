//! Voice-driven UI actions over a live, reactive UI tree
//!
//! Intents arrive from a speech pipeline as small JSON actions ("switch to the
//! materials tab", "fill in the course title"). The engine validates them,
//! resolves free-form targets to elements, performs the mutation in a way
//! reactive frameworks accept, and verifies the change by diffing snapshots
//! taken before and after.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

pub mod action;
pub mod config;
pub mod duration_parser;
pub mod element;
pub mod errors;
pub mod events;
pub mod executor;
pub mod idempotency;
pub mod locator;
pub mod platforms;
pub mod selector;
pub mod snapshot;
#[cfg(test)]
mod tests;
pub mod utils;
pub mod value_setter;
pub mod verification;
pub mod workflow;

pub use action::{validate, ActionPayload, ActionType, ActionValidation, VoiceAction};
pub use config::EngineConfig;
pub use element::{UIElement, UIElementAttributes};
pub use errors::{ActionError, FailureClass};
pub use events::{ActionSignal, SignalBus, SignalListener, SubscriptionId};
pub use executor::{ActionExecutor, ActionOutcome};
pub use idempotency::{idempotency_key, IdempotencyCache};
pub use locator::Locator;
pub use platforms::UiTree;
pub use selector::{parse_ordinal, ElementKind, Selector};
pub use snapshot::{StateDiff, UiState};
pub use value_setter::{ControlledValueSetter, ReactiveValueSetter};
pub use verification::{ExecutionResult, NoRepair, RepairStrategy, VerificationState};
pub use workflow::{Workflow, WorkflowResult, WorkflowStep};

/// The composed engine: resolver, primitives, verification loop,
/// idempotency cache and workflow runner over one UI tree.
///
/// Single actions and workflows are serialized through one async gate, so an
/// action's "before" snapshot never observes another action mid-flight.
///
/// ```
/// use std::sync::Arc;
/// use voxaction::platforms::memory::{MemoryTree, NodeSpec};
/// use voxaction::{EngineConfig, VoiceEngine};
///
/// # tokio_test_runtime(async {
/// let tree = MemoryTree::new();
/// let tabs = tree.add_root(NodeSpec::tablist("course-tabs"));
/// tree.add(tabs, NodeSpec::tab("tab-overview", "Overview").selected());
/// tree.add(tabs, NodeSpec::tab("tab-materials", "Materials"));
///
/// let engine = VoiceEngine::new(Arc::new(tree), EngineConfig::default().zero_delays());
/// let result = engine
///     .execute(&serde_json::json!({"type": "switchTab", "payload": {"target": "materials"}}))
///     .await;
/// assert!(result.success);
/// # });
/// # fn tokio_test_runtime(f: impl std::future::Future<Output = ()>) {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
pub struct VoiceEngine {
    tree: Arc<dyn UiTree>,
    config: EngineConfig,
    signals: Arc<SignalBus>,
    executor: Arc<ActionExecutor>,
    verifier: verification::VerificationLoop,
    workflows: workflow::WorkflowRunner,
    cache: Arc<IdempotencyCache>,
    gate: Mutex<()>,
}

impl VoiceEngine {
    /// Compose an engine with the reactive value setter and no repair strategy.
    pub fn new(tree: Arc<dyn UiTree>, config: EngineConfig) -> Self {
        Self::with_components(
            tree,
            config,
            Arc::new(ReactiveValueSetter),
            Arc::new(NoRepair),
        )
    }

    #[instrument(skip_all)]
    pub fn with_components(
        tree: Arc<dyn UiTree>,
        config: EngineConfig,
        setter: Arc<dyn ControlledValueSetter>,
        repair: Arc<dyn RepairStrategy>,
    ) -> Self {
        let signals = Arc::new(SignalBus::new());
        let locator = Locator::new(
            tree.clone(),
            config.aliases.clone(),
            config.prefixes.clone(),
        );
        let executor = Arc::new(ActionExecutor::new(
            locator,
            setter,
            signals.clone(),
            &config,
        ));
        let verifier = verification::VerificationLoop::new(
            executor.clone(),
            repair,
            config.timing.stabilization,
            config.max_retries,
        );
        let workflows = workflow::WorkflowRunner::new(
            executor.clone(),
            config.timing.navigation_settle,
            config.timing.step_settle,
            config.prefixes.prefix_for(ElementKind::Tab).map(str::to_string),
        );
        let cache = Arc::new(IdempotencyCache::new(config.timing.idempotency_ttl));
        debug!("voice engine ready: {:?}", config.timing);

        Self {
            tree,
            config,
            signals,
            executor,
            verifier,
            workflows,
            cache,
            gate: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tree(&self) -> &Arc<dyn UiTree> {
        &self.tree
    }

    pub fn locator(&self) -> &Locator {
        self.executor.locator()
    }

    pub fn signals(&self) -> &Arc<SignalBus> {
        &self.signals
    }

    /// Register a page-level listener for action signals.
    pub fn subscribe(&self, listener: Arc<dyn SignalListener>) -> SubscriptionId {
        self.signals.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.signals.unsubscribe(id)
    }

    pub fn capture_state(&self) -> UiState {
        snapshot::capture_state(self.tree.as_ref())
    }

    /// Validate and run untrusted input (canonical or legacy shape).
    pub async fn execute(&self, raw: &Value) -> ExecutionResult {
        let validation = validate(raw);
        match validation.action {
            Some(action) => self.execute_action(action).await,
            None => ExecutionResult::rejected(
                validation
                    .diagnostic
                    .unwrap_or_else(|| "invalid action".to_string()),
            ),
        }
    }

    /// Like [`VoiceEngine::execute`], for input that is still JSON text.
    pub async fn execute_str(&self, raw: &str) -> ExecutionResult {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => self.execute(&value).await,
            Err(e) => ExecutionResult::rejected(format!("action is not valid JSON: {e}")),
        }
    }

    /// Run a validated action through the idempotency cache and the
    /// verification loop.
    #[instrument(skip(self, action), fields(kind = %action.kind(), correlation_id = action.correlation_id()))]
    pub async fn execute_action(&self, action: VoiceAction) -> ExecutionResult {
        let key = idempotency_key(&action);
        let _turn = self.gate.lock().await;

        // Checked under the gate so a duplicate queued behind the original
        // sees its recorded result.
        if let Some(cached) = self.cache.check(&key) {
            info!("duplicate {} within idempotency window, served from cache", key);
            return cached;
        }

        let result = self.verifier.run(action).await;
        self.cache.record(&key, result.clone());
        result
    }

    /// Run a workflow. Steps bypass the idempotency cache and verification.
    pub async fn run_workflow(&self, workflow: &Workflow) -> WorkflowResult {
        let _turn = self.gate.lock().await;
        self.workflows.run(workflow).await
    }

    pub fn idempotency(&self) -> &IdempotencyCache {
        &self.cache
    }

    /// Drop idempotency entries older than twice the TTL.
    pub fn sweep_idempotency(&self) -> usize {
        self.cache.sweep()
    }

    /// Sweep the idempotency cache every `interval` until the handle is aborted.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.cache.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.sweep();
            }
        })
    }
}
