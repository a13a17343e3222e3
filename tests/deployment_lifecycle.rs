//! End-to-end deployment tests for the model engine.
//!
//! These tests drive the full path a model document takes in production:
//! stored record, parse, validation against the live graphs, registration,
//! and resolution through a tenant's schema chain. Each test builds its own
//! engine over an in-memory store.

use content_model_engine::{
    ANY_TENANT, ConstraintRegistry, EngineConfig, EngineError, InMemoryModelStore, ModelEngine,
    ModelRecord, ModelScope, ModelStore, ValidationError,
};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn record(tenant: &str, name: &str, data: serde_json::Value) -> ModelRecord {
    ModelRecord {
        tenant: tenant.to_string(),
        name: name.to_string(),
        data: data.to_string(),
        format: "compact".to_string(),
        active: true,
    }
}

/// Route engine log output through the test harness; `RUST_LOG` selects the
/// level as usual.
fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(true)
        .try_init();
}

/// The two models every deployment starts from: the data dictionary owning
/// `d` and the system model owning `sys` with the root type.
async fn deploy_bootstrap(engine: &ModelEngine<InMemoryModelStore>) {
    init_logging();
    engine
        .deploy(
            ANY_TENANT,
            record(
                ANY_TENANT,
                "d:dictionary",
                json!({
                    "name": "d:dictionary",
                    "namespaces": [
                        {"prefix": "d", "uri": "http://example.com/model/dictionary/1.0"}
                    ],
                }),
            ),
        )
        .await
        .unwrap();
    engine
        .deploy(
            ANY_TENANT,
            record(
                ANY_TENANT,
                "sys:system",
                json!({
                    "name": "sys:system",
                    "namespaces": [
                        {"prefix": "sys", "uri": "http://example.com/model/system/1.0"}
                    ],
                    "imports": ["d"],
                    "types": [
                        {"name": "sys:base", "mandatoryProperties": ["sys:name"]}
                    ],
                    "properties": [
                        {"name": "sys:name", "type": "d:text"}
                    ],
                }),
            ),
        )
        .await
        .unwrap();
}

fn forum_model() -> serde_json::Value {
    json!({
        "name": "fm:forumModel",
        "description": "Discussion board content types",
        "namespaces": [
            {"prefix": "fm", "uri": "http://example.com/model/forum/1.0"}
        ],
        "imports": ["sys", "d"],
        "types": [
            {
                "name": "fm:post",
                "parent": "sys:base",
                "mandatoryProperties": ["fm:subject"],
                "suggestedProperties": ["fm:score"],
                "mandatoryAspects": ["fm:auditable"]
            },
            {"name": "fm:reply", "parent": "fm:post"}
        ],
        "aspects": [
            {"name": "fm:auditable", "mandatoryProperties": ["fm:reviewer"]}
        ],
        "properties": [
            {"name": "fm:subject", "type": "d:text"},
            {"name": "fm:score", "type": "d:int", "tokenized": false},
            {"name": "fm:reviewer", "type": "d:text", "tokenized": false}
        ],
    })
}

#[tokio::test]
async fn test_common_models_reach_every_tenant() {
    let engine = ModelEngine::new(InMemoryModelStore::new());
    deploy_bootstrap(&engine).await;

    for tenant in ["acme", "globex"] {
        let chain = engine.chain(tenant).await.unwrap();
        assert!(chain.get_type("sys:base").is_some(), "tenant {tenant}");
        assert_eq!(
            chain.uri_for_prefix("d"),
            Some("http://example.com/model/dictionary/1.0")
        );
    }
}

#[tokio::test]
async fn test_tenant_extension_builds_on_common() {
    let engine = ModelEngine::new(InMemoryModelStore::new());
    deploy_bootstrap(&engine).await;
    engine
        .deploy("acme", record("acme", "fm:forumModel", forum_model()))
        .await
        .unwrap();

    let chain = engine.chain("acme").await.unwrap();
    let flat = chain.flat_type("fm:reply", &[]).unwrap();

    // The lineage spans both graphs, nearest parent first.
    assert_eq!(
        flat.ancestors,
        vec!["fm:post".to_string(), "sys:base".to_string()]
    );
    for property in ["fm:subject", "fm:reviewer", "sys:name"] {
        assert!(
            flat.mandatory_properties.iter().any(|p| p == property),
            "missing {property}"
        );
    }
    assert!(flat.suggested_properties.iter().any(|p| p == "fm:score"));
    assert_eq!(flat.mandatory_aspects, vec!["fm:auditable".to_string()]);
}

#[tokio::test]
async fn test_tenants_do_not_see_each_other() {
    let engine = ModelEngine::new(InMemoryModelStore::new());
    deploy_bootstrap(&engine).await;

    // Both tenants claim the same prefix with different URIs; graphs are
    // separate, so neither deployment conflicts with the other.
    engine
        .deploy("acme", record("acme", "fm:forumModel", forum_model()))
        .await
        .unwrap();
    engine
        .deploy(
            "globex",
            record(
                "globex",
                "fm:fileModel",
                json!({
                    "name": "fm:fileModel",
                    "namespaces": [
                        {"prefix": "fm", "uri": "http://globex.example/model/files/1.0"}
                    ],
                }),
            ),
        )
        .await
        .unwrap();

    let acme = engine.chain("acme").await.unwrap();
    let globex = engine.chain("globex").await.unwrap();

    assert_eq!(
        acme.uri_for_prefix("fm"),
        Some("http://example.com/model/forum/1.0")
    );
    assert_eq!(
        globex.uri_for_prefix("fm"),
        Some("http://globex.example/model/files/1.0")
    );
    assert!(acme.get_type("fm:post").is_some());
    assert!(globex.get_type("fm:post").is_none());
}

#[tokio::test]
async fn test_common_prefixes_cannot_be_shadowed() {
    let engine = ModelEngine::new(InMemoryModelStore::new());
    deploy_bootstrap(&engine).await;

    let prefix_clash = engine
        .deploy(
            "acme",
            record(
                "acme",
                "sys:custom",
                json!({
                    "name": "sys:custom",
                    "namespaces": [
                        {"prefix": "sys", "uri": "http://acme.example/model/custom/1.0"}
                    ],
                }),
            ),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        prefix_clash,
        EngineError::Validation(ValidationError::NamespaceForbidden { .. })
    ));

    let uri_clash = engine
        .deploy(
            "acme",
            record(
                "acme",
                "alias:system",
                json!({
                    "name": "alias:system",
                    "namespaces": [
                        {"prefix": "alias", "uri": "http://example.com/model/system/1.0"}
                    ],
                }),
            ),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        uri_clash,
        EngineError::Validation(ValidationError::DuplicateNamespaceUri { .. })
    ));
}

#[tokio::test]
async fn test_undeploy_then_redeploy_round_trip() {
    let engine = ModelEngine::new(InMemoryModelStore::new());
    deploy_bootstrap(&engine).await;
    engine
        .deploy("acme", record("acme", "fm:forumModel", forum_model()))
        .await
        .unwrap();

    engine.undeploy("acme", "fm:forumModel").await.unwrap();
    let chain = engine.chain("acme").await.unwrap();
    assert!(chain.resolve_prefix("fm").is_none());
    let stored = engine
        .store()
        .get_model("acme", ModelScope::Tenant, "fm:forumModel")
        .await
        .unwrap();
    assert!(stored.is_none());

    // Redeploying with a bumped URI takes effect immediately.
    let mut bumped = forum_model();
    bumped["namespaces"][0]["uri"] = json!("http://example.com/model/forum/2.0");
    engine
        .deploy("acme", record("acme", "fm:forumModel", bumped))
        .await
        .unwrap();
    let chain = engine.chain("acme").await.unwrap();
    assert_eq!(
        chain.uri_for_prefix("fm"),
        Some("http://example.com/model/forum/2.0")
    );
}

#[tokio::test]
async fn test_registry_rebuilds_from_storage_alone() {
    let store = InMemoryModelStore::new();
    {
        let engine = ModelEngine::new(store.clone());
        deploy_bootstrap(&engine).await;
        engine
            .deploy("acme", record("acme", "fm:forumModel", forum_model()))
            .await
            .unwrap();
    }

    // A fresh engine over the same records compiles the same registry.
    let engine = ModelEngine::new(store);
    let chain = engine.chain("acme").await.unwrap();
    assert!(chain.get_type("fm:post").is_some());
    assert!(chain.get_type("sys:base").is_some());
    let flat = chain.flat_type("fm:post", &[]).unwrap();
    assert_eq!(flat.ancestors, vec!["sys:base".to_string()]);
}

#[tokio::test]
async fn test_failed_deploy_leaves_no_trace() {
    let engine = ModelEngine::new(InMemoryModelStore::new());
    deploy_bootstrap(&engine).await;

    let error = engine
        .deploy(
            "acme",
            record(
                "acme",
                "bad:model",
                json!({
                    "name": "bad:model",
                    "namespaces": [
                        {"prefix": "bad", "uri": "http://acme.example/model/bad/1.0"}
                    ],
                    "imports": ["d"],
                    "properties": [
                        {"name": "bad:blob", "type": "d:imaginary"}
                    ],
                }),
            ),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        EngineError::Validation(ValidationError::UnknownPropertyType { .. })
    ));

    // Nothing was persisted and nothing was registered.
    let stored = engine
        .store()
        .get_model("acme", ModelScope::Tenant, "bad:model")
        .await
        .unwrap();
    assert!(stored.is_none());
    let chain = engine.chain("acme").await.unwrap();
    assert!(chain.resolve_prefix("bad").is_none());
}

#[tokio::test]
async fn test_mixed_format_records_load_together() {
    let store = InMemoryModelStore::new();
    store
        .save_model(
            ModelScope::Common,
            record(
                ANY_TENANT,
                "d:dictionary",
                json!({
                    "name": "d:dictionary",
                    "namespaces": [
                        {"prefix": "d", "uri": "http://example.com/model/dictionary/1.0"}
                    ],
                }),
            ),
        )
        .await
        .unwrap();

    // The same store can mix compact and definition documents.
    let mut definition = record(
        "acme",
        "wf:workflowModel",
        json!({
            "model": {
                "name": "wf:workflowModel",
                "namespaces": [
                    {"prefix": "wf", "uri": "http://acme.example/model/workflow/1.0"}
                ],
                "imports": ["d"],
                "types": [
                    {
                        "name": "wf:task",
                        "properties": [
                            {"name": "wf:assignee", "type": "d:text", "mandatory": true},
                            {
                                "name": "wf:priority",
                                "type": "d:int",
                                "index": {"enabled": true, "tokenized": false}
                            }
                        ]
                    }
                ]
            }
        }),
    );
    definition.format = "definition".to_string();
    store
        .save_model(ModelScope::Tenant, definition)
        .await
        .unwrap();

    let config = EngineConfig {
        root_type: "wf:task".to_string(),
        ..Default::default()
    };
    let engine = ModelEngine::with_config(store, Arc::new(ConstraintRegistry::new()), config);

    let chain = engine.chain("acme").await.unwrap();
    let task = chain.get_type("wf:task").unwrap();
    assert_eq!(task.mandatory_properties, vec!["wf:assignee".to_string()]);
    assert_eq!(task.suggested_properties, vec!["wf:priority".to_string()]);
    let priority = chain.get_property("wf:priority").unwrap();
    assert!(!priority.tokenized);
}

#[tokio::test]
async fn test_concurrent_readers_always_see_complete_graphs() {
    let store = InMemoryModelStore::new();
    {
        let engine = ModelEngine::new(store.clone());
        deploy_bootstrap(&engine).await;
        engine
            .deploy("acme", record("acme", "fm:forumModel", forum_model()))
            .await
            .unwrap();
    }

    // Cold start: racing first reads may compile the graph twice, but every
    // caller gets a fully registered snapshot.
    let engine = ModelEngine::new(store);
    let chains = futures::future::join_all((0..8).map(|_| engine.chain("acme"))).await;
    for chain in chains {
        let chain = chain.unwrap();
        assert!(chain.get_type("fm:post").is_some());
        let flat = chain.flat_type("fm:reply", &[]).unwrap();
        assert_eq!(flat.ancestors.len(), 2);
    }

    // Readers racing a redeploy resolve against the old snapshot or the new
    // one, never a half-swapped graph.
    let mut bumped = forum_model();
    bumped["namespaces"][0]["uri"] = json!("http://example.com/model/forum/2.0");
    let deploy = engine.deploy("acme", record("acme", "fm:forumModel", bumped));
    let reads = futures::future::join_all((0..8).map(|_| engine.chain("acme")));
    let (deployed, chains) = tokio::join!(deploy, reads);
    deployed.unwrap();
    for chain in chains {
        let chain = chain.unwrap();
        let uri = chain.uri_for_prefix("fm").unwrap();
        assert!(
            uri == "http://example.com/model/forum/1.0"
                || uri == "http://example.com/model/forum/2.0",
            "unexpected namespace URI {uri}"
        );
        assert_eq!(chain.flat_type("fm:reply", &[]).unwrap().ancestors.len(), 2);
    }
}

proptest! {
    // The store hands records back sorted by name while the import chain
    // follows the shuffle, so most orders make the first registration pass
    // cover only part of the set and leave the rest to the retry loop.
    #[test]
    fn test_storage_order_never_decides_registration(
        order in Just((0..5usize).collect::<Vec<_>>()).prop_shuffle()
    ) {
        init_logging();
        tokio_test::block_on(async {
            let store = InMemoryModelStore::new();
            for (position, &id) in order.iter().enumerate() {
                let prefix = format!("m{id}");
                let name = format!("{prefix}:model");
                let mut doc = json!({
                    "name": name.as_str(),
                    "namespaces": [
                        {
                            "prefix": prefix.as_str(),
                            "uri": format!("http://example.com/model/{prefix}/1.0")
                        }
                    ],
                });
                if position > 0 {
                    doc["imports"] = json!([format!("m{}", order[position - 1])]);
                }
                store
                    .save_model(ModelScope::Tenant, record("acme", &name, doc))
                    .await
                    .unwrap();
            }

            let engine = ModelEngine::new(store);
            let graph = engine.tenant_graph("acme").await.unwrap();
            assert_eq!(graph.models().len(), 5);
            for id in 0..5 {
                assert!(graph.owns_prefix(&format!("m{id}")), "missing m{id}");
            }
        });
    }
}
