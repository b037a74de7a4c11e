//! Short-lived memo of recent results, guarding against duplicate dispatch.

use crate::action::{ActionPayload, OptionSelection, SelectListItemPayload, VoiceAction};
use crate::verification::ExecutionResult;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct IdempotencyEntry {
    pub result: ExecutionResult,
    pub timestamp: Instant,
}

/// Results keyed by action identity. Entries are served for one TTL and
/// removed by [`IdempotencyCache::sweep`] once older than twice the TTL;
/// the owner decides when to sweep.
#[derive(Debug)]
pub struct IdempotencyCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, IdempotencyEntry>>,
}

impl Default for IdempotencyCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl IdempotencyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The memoized result for `key`, if it is younger than the TTL.
    pub fn check(&self, key: &str) -> Option<ExecutionResult> {
        self.check_at(key, Instant::now())
    }

    pub(crate) fn check_at(&self, key: &str, now: Instant) -> Option<ExecutionResult> {
        let entries = self.lock();
        let entry = entries.get(key)?;
        if now.saturating_duration_since(entry.timestamp) >= self.ttl {
            return None;
        }
        let mut result = entry.result.clone();
        result.cached = true;
        Some(result)
    }

    /// Store or overwrite the result for `key`.
    pub fn record(&self, key: &str, result: ExecutionResult) {
        self.record_at(key, result, Instant::now());
    }

    pub(crate) fn record_at(&self, key: &str, result: ExecutionResult, now: Instant) {
        self.lock().insert(
            key.to_string(),
            IdempotencyEntry {
                result,
                timestamp: now,
            },
        );
    }

    /// Remove entries older than twice the TTL. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> usize {
        let horizon = self.ttl * 2;
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.timestamp) <= horizon);
        let removed = before - entries.len();
        if removed > 0 {
            debug!("idempotency sweep removed {} entries", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, IdempotencyEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `kind:target[:content]`, with the target lowercased and trimmed.
///
/// Kinds whose effect depends on more than the target (the text filled, the
/// option picked, the scroll step) append it so distinct requests never
/// collide.
pub fn idempotency_key(action: &VoiceAction) -> String {
    let target = action
        .primary_target()
        .map(|t| t.trim().to_lowercase())
        .unwrap_or_default();
    let content = match action.payload() {
        ActionPayload::FillInput(p) => Some(format!(
            "{}{}",
            if p.append { "+" } else { "" },
            p.content
        )),
        ActionPayload::SelectDropdown(p) => Some(match &p.selection {
            OptionSelection::Index(index) => format!("#{index}"),
            OptionSelection::Value(value) => value.trim().to_lowercase(),
        }),
        ActionPayload::SelectListItem(SelectListItemPayload::Positional { item_index, .. }) => {
            Some(format!("#{item_index}"))
        }
        ActionPayload::Scroll(p) => Some(format!(
            "{}{}",
            p.direction
                .map(|d| format!("{d:?}").to_lowercase())
                .unwrap_or_default(),
            p.amount.map(|a| format!("/{a}")).unwrap_or_default()
        )),
        ActionPayload::Toast(p) => Some(format!("{:?}", p.variant).to_lowercase()),
        ActionPayload::SubmitForm(p) => p.form_target.as_deref().map(|t| t.trim().to_lowercase()),
        ActionPayload::OpenMenuAndClick(p) => Some(p.item_target.trim().to_lowercase()),
        _ => None,
    };
    match content {
        Some(content) => format!("{}:{}:{}", action.kind(), target, content),
        None => format!("{}:{}", action.kind(), target),
    }
}
