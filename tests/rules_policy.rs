//! Rule evaluation and access-policy queries against a loaded cache.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::{account_source, at, definition, ready_cache, ScriptedSource};
use refcache::segment::ReferenceSegment;
use refcache::{AccessPolicy, CacheConfig, CategoryReferenceId, Reference, Rule, SegmentDefinitionId, SessionId};
use serde_json::{json, Value};

async fn loaded_account() -> Arc<refcache::ReferenceCache> {
    let cache = ready_cache(Arc::new(account_source()), CacheConfig::default()).await;
    cache.load_reference("ACCOUNT:1", Some(&SessionId::new("s1"))).await.unwrap();
    cache
}

#[tokio::test]
async fn test_created_date_rule() {
    let cache = loaded_account().await;
    let rule = Rule::new(json!({">": [{"var": "CREATED_DATE"}, 1_600_000_000_000_i64]}));

    assert_eq!(cache.apply_metrics_logic("ACCOUNT:1", &rule).unwrap(), Some(Value::Bool(true)));
    assert_eq!(cache.apply_metrics_logic("ACCOUNT:2", &rule).unwrap(), None);
    assert_eq!(cache.apply_metrics_condition("ACCOUNT:2", &rule).unwrap(), None);
}

#[tokio::test]
async fn test_missing_metric_is_not_an_error() {
    let cache = loaded_account().await;
    let rule = Rule::parse(r#"{"if": [{"var": "LEVEL"}, "ranked", "unranked"]}"#).unwrap();

    assert_eq!(cache.apply_metrics_logic("ACCOUNT:1", &rule).unwrap(), Some(json!("unranked")));
    assert_eq!(
        cache
            .apply_metrics_logic("ACCOUNT:1", &Rule::new(json!({"missing": ["GOLD", "LEVEL"]})))
            .unwrap(),
        Some(json!(["LEVEL"]))
    );
}

#[tokio::test]
async fn test_compound_condition() {
    let cache = loaded_account().await;
    let rule = Rule::new(json!({"and": [
        {">=": [{"var": "GOLD"}, 10]},
        {"<": [0, {"var": "CREATED_DATE"}, 2_000_000_000_000_i64]},
    ]}));
    assert_eq!(cache.apply_metrics_condition("ACCOUNT:1", &rule).unwrap(), Some(true));

    let poorer = Rule::new(json!({">": [{"var": "GOLD"}, 10]}));
    assert_eq!(cache.apply_metrics_condition("ACCOUNT:1", &poorer).unwrap(), Some(false));
}

#[tokio::test]
async fn test_unknown_operator_surfaces_rule_error() {
    let cache = loaded_account().await;
    let err = cache
        .apply_metrics_logic("ACCOUNT:1", &Rule::new(json!({"regex": [{"var": "GOLD"}, "1.*"]})))
        .unwrap_err();
    assert!(err.is_rule());
}

#[tokio::test]
async fn test_policy_union_over_memberships() {
    let id = CategoryReferenceId::new("ACCOUNT", "1");
    let source = ScriptedSource {
        references: HashMap::from([(id.clone(), Reference::new("ACCOUNT", "1", "alice"))]),
        memberships: HashMap::from([(
            id.clone(),
            vec![ReferenceSegment::new("first"), ReferenceSegment::new("second"), ReferenceSegment::new("gone")],
        )]),
        definitions: vec![
            definition("first", &["A", "B"], at(0)),
            definition("second", &["B", "C"], at(0)),
            definition("other", &["D"], at(0)),
        ],
        ..ScriptedSource::default()
    };
    let cache = ready_cache(Arc::new(source), CacheConfig::default()).await;
    cache.load_reference(&id, None).await.unwrap();

    let policies = cache.get_reference_access_policies(&id);
    assert_eq!(policies.len(), 3);
    assert_eq!(policies, vec![AccessPolicy::new("A"), AccessPolicy::new("B"), AccessPolicy::new("C")]);

    assert!(cache.has_access_policy(&id, &"C".into()));
    assert!(!cache.has_access_policy(&id, &"D".into()));
    assert!(!cache.has_access_policy("ACCOUNT:9", &"A".into()));

    let ids = [SegmentDefinitionId::new("other"), SegmentDefinitionId::new("gone")];
    assert!(cache.has_access_policy_in_segment_definitions(&"D".into(), &ids));
    assert!(!cache.has_access_policy_in_segment_definitions(&"A".into(), &ids));
    assert!(!cache.has_access_policy_in_segment_definitions(&"A".into(), &[]));
}

#[tokio::test]
async fn test_policies_follow_definition_removal() {
    let cache = loaded_account().await;
    assert!(cache.has_access_policy("ACCOUNT:1", &"WRITE".into()));

    assert!(cache.remove_segment_definition(&"vip".into()));
    assert!(!cache.has_access_policy("ACCOUNT:1", &"WRITE".into()));
    assert!(cache.get_reference_access_policies("ACCOUNT:1").is_empty());
}
