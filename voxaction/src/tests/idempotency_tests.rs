use super::{dashboard, engine_for};
use crate::action::validate;
use crate::idempotency::{idempotency_key, IdempotencyCache};
use crate::verification::ExecutionResult;
use serde_json::json;
use std::time::{Duration, Instant};

fn key_of(raw: serde_json::Value) -> String {
    idempotency_key(&validate(&raw).into_result().expect("valid action"))
}

#[test]
fn test_key_normalizes_target() {
    assert_eq!(
        key_of(json!({"type": "switchTab", "payload": {"target": "  Materials "}})),
        "switchTab:materials"
    );
    assert_eq!(
        key_of(json!({"type": "switchTab", "payload": {"target": "materials"}})),
        key_of(json!({"type": "switchTab", "payload": {"target": "MATERIALS"}}))
    );
}

#[test]
fn test_key_distinguishes_content() {
    let fill = |content: &str| {
        key_of(json!({
            "type": "fillInput",
            "payload": {"target": "title", "content": content}
        }))
    };
    assert_eq!(fill("Biology"), "fillInput:title:Biology");
    assert_ne!(fill("Biology"), fill("Chemistry"));

    let append = key_of(json!({
        "type": "fillInput",
        "payload": {"target": "title", "content": "Biology", "append": true}
    }));
    assert_ne!(append, fill("Biology"));

    let select = |payload: serde_json::Value| {
        key_of(json!({"type": "selectDropdown", "payload": payload}))
    };
    assert_ne!(
        select(json!({"target": "course", "index": 0})),
        select(json!({"target": "course", "index": -1}))
    );
    assert_ne!(
        select(json!({"target": "course", "index": 1})),
        select(json!({"target": "course", "value": "1"}))
    );
}

#[test]
fn test_key_ignores_correlation_id() {
    let a = key_of(json!({
        "type": "clickButton", "payload": {"target": "save"}, "correlationId": "a"
    }));
    let b = key_of(json!({
        "type": "clickButton", "payload": {"target": "save"}, "correlationId": "b"
    }));
    assert_eq!(a, b);
}

#[test]
fn test_cache_hit_within_ttl() {
    let cache = IdempotencyCache::new(Duration::from_secs(5));
    let start = Instant::now();
    cache.record_at("k", ExecutionResult::rejected("x"), start);

    let hit = cache
        .check_at("k", start + Duration::from_secs(4))
        .expect("entry is fresh");
    assert!(hit.cached, "served entries are marked as cached");

    assert!(cache.check_at("k", start + Duration::from_secs(5)).is_none());
    assert!(cache.check_at("other", start).is_none());
}

#[test]
fn test_expired_entry_kept_until_sweep() {
    let cache = IdempotencyCache::new(Duration::from_secs(5));
    let start = Instant::now();
    cache.record_at("old", ExecutionResult::rejected("x"), start);
    cache.record_at("young", ExecutionResult::rejected("y"), start + Duration::from_secs(8));

    // Past the TTL but within twice the TTL: unused, not yet removed.
    assert_eq!(cache.sweep_at(start + Duration::from_secs(9)), 0);
    assert_eq!(cache.len(), 2);

    assert_eq!(cache.sweep_at(start + Duration::from_secs(11)), 1);
    assert_eq!(cache.len(), 1);
    assert!(cache.check_at("young", start + Duration::from_secs(11)).is_some());
}

#[test]
fn test_record_overwrites() {
    let cache = IdempotencyCache::default();
    let start = Instant::now();
    cache.record_at("k", ExecutionResult::rejected("first"), start);
    cache.record_at("k", ExecutionResult::rejected("second"), start);

    let hit = cache.check_at("k", start).unwrap();
    assert!(hit.failure.unwrap().reason.contains("second"));
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_rapid_duplicate_clicks_run_once() {
    let tree = dashboard();
    let engine = engine_for(&tree);
    let click = json!({"type": "clickButton", "payload": {"target": "save"}});

    let (first, second) = tokio::join!(engine.execute(&click), engine.execute(&click));

    assert!(first.success && second.success);
    assert_eq!(tree.click_count("save"), 1, "the button must be clicked once");
    assert!(
        first.cached ^ second.cached,
        "exactly one result comes from the cache"
    );
    assert_eq!(engine.idempotency().len(), 1);
}

#[tokio::test]
async fn test_refill_after_cache_clear_is_a_no_op_diff() {
    let tree = dashboard();
    let engine = engine_for(&tree);
    let fill = json!({
        "type": "fillInput",
        "payload": {"target": "course title", "content": "Biology"}
    });

    let first = engine.execute(&fill).await;
    assert!(first.success);
    engine.idempotency().clear();

    let second = engine.execute(&fill).await;
    assert!(second.success, "{:?}", second.failure);
    assert!(!second.cached);
    assert!(
        second.context.diff.as_ref().unwrap().is_empty(),
        "value was already in place"
    );
    assert_eq!(tree.value_of("input-course-title").as_deref(), Some("Biology"));
}

#[tokio::test]
async fn test_failures_are_cached_too() {
    let tree = dashboard();
    let engine = engine_for(&tree);
    let click = json!({"type": "clickButton", "payload": {"target": "go live"}});

    let first = engine.execute(&click).await;
    let second = engine.execute(&click).await;

    assert!(!first.success && !second.success);
    assert!(second.cached);
    assert_eq!(
        first.failure.unwrap().reason,
        second.failure.unwrap().reason
    );
}

#[tokio::test]
async fn test_sweeper_task_removes_stale_entries() {
    let tree = dashboard();
    let mut config = super::test_config();
    config.timing.idempotency_ttl = Duration::from_millis(10);
    let engine = crate::VoiceEngine::new(std::sync::Arc::new(tree.clone()), config);

    engine
        .execute(&json!({"type": "clickButton", "payload": {"target": "save"}}))
        .await;
    assert_eq!(engine.idempotency().len(), 1);

    let sweeper = engine.spawn_sweeper(Duration::from_millis(5));
    tokio::time::sleep(Duration::from_millis(100)).await;
    sweeper.abort();

    assert!(engine.idempotency().is_empty());
}
