//! Tests driving the engine and the index reconciler together.
//!
//! The scenarios here follow the production flow: models are deployed
//! through the engine, the tenant's schema chain is handed to the
//! reconciler, and the in-memory index stands in for the search engine so
//! every remote mutation can be counted and inspected.

use content_model_engine::index::IndexField;
use content_model_engine::{
    ANY_TENANT, IndexReconciler, InMemoryIndex, InMemoryModelStore, ModelEngine, ModelRecord,
    SearchIndexApi,
};
use serde_json::json;

fn record(tenant: &str, name: &str, data: serde_json::Value) -> ModelRecord {
    ModelRecord {
        tenant: tenant.to_string(),
        name: name.to_string(),
        data: data.to_string(),
        format: "compact".to_string(),
        active: true,
    }
}

/// Route engine and reconciler log output through the test harness.
fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(true)
        .try_init();
}

async fn deploy_bootstrap(engine: &ModelEngine<InMemoryModelStore>) {
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
        "namespaces": [
            {"prefix": "fm", "uri": "http://example.com/model/forum/1.0"}
        ],
        "imports": ["sys", "d"],
        "types": [
            {
                "name": "fm:post",
                "parent": "sys:base",
                "mandatoryProperties": ["fm:subject", "fm:score"]
            }
        ],
        "properties": [
            {"name": "fm:subject", "type": "d:text"},
            {"name": "fm:score", "type": "d:int", "tokenized": false}
        ],
    })
}

/// Engine with the bootstrap models plus a provisioned reconciler.
async fn engine_and_reconciler() -> (
    ModelEngine<InMemoryModelStore>,
    IndexReconciler<InMemoryIndex>,
    InMemoryIndex,
) {
    init_logging();
    let engine = ModelEngine::new(InMemoryModelStore::new());
    deploy_bootstrap(&engine).await;

    let index = InMemoryIndex::new();
    index.create_config_set("_default", None).await.unwrap();
    let reconciler = IndexReconciler::new(index.clone());
    reconciler.provision_tenant("acme").await;
    index.reset_counts().await;

    (engine, reconciler, index)
}

#[tokio::test]
async fn test_first_pass_creates_model_and_core_fields() {
    let (engine, reconciler, index) = engine_and_reconciler().await;
    engine
        .deploy("acme", record("acme", "fm:forumModel", forum_model()))
        .await
        .unwrap();

    let chain = engine.chain("acme").await.unwrap();
    let report = reconciler.reconcile("acme", &chain).await.unwrap();
    let collection = report.collection.as_str();

    assert!(report.core_synced);
    assert!(report.fields_created > 0);

    // Model properties landed with their mapped index types.
    let subject = index.field(collection, "@fm:subject").await.unwrap();
    assert_eq!(subject.field_type, "text_en");
    assert!(!subject.multi_valued);
    let score = index.field(collection, "@fm:score").await.unwrap();
    assert_eq!(score.field_type, "pint");

    // Core fields landed too, and @sys:name exists exactly once even though
    // the system model declares it as well.
    assert!(index.field(collection, "@sys:created").await.is_some());
    let name = index.field(collection, "@sys:name").await.unwrap();
    assert_eq!(name.field_type, "text_en");
}

#[tokio::test]
async fn test_second_pass_makes_no_remote_calls() {
    let (engine, reconciler, index) = engine_and_reconciler().await;
    engine
        .deploy("acme", record("acme", "fm:forumModel", forum_model()))
        .await
        .unwrap();

    let chain = engine.chain("acme").await.unwrap();
    reconciler.reconcile("acme", &chain).await.unwrap();
    index.reset_counts().await;

    let report = reconciler.reconcile("acme", &chain).await.unwrap();
    assert_eq!(report.mutations(), 0);
    assert_eq!(index.counts().await.total(), 0);
}

#[tokio::test]
async fn test_needs_sync_follows_deployments() {
    let (engine, reconciler, _index) = engine_and_reconciler().await;
    engine
        .deploy("acme", record("acme", "fm:forumModel", forum_model()))
        .await
        .unwrap();

    let chain = engine.chain("acme").await.unwrap();
    assert!(reconciler.needs_sync("acme", &chain).await);
    reconciler.reconcile("acme", &chain).await.unwrap();
    assert!(!reconciler.needs_sync("acme", &chain).await);

    // Any change to the visible model set flips the digest.
    engine
        .deploy(
            "acme",
            record(
                "acme",
                "ext:extras",
                json!({
                    "name": "ext:extras",
                    "namespaces": [
                        {"prefix": "ext", "uri": "http://acme.example/model/extras/1.0"}
                    ],
                }),
            ),
        )
        .await
        .unwrap();
    let chain = engine.chain("acme").await.unwrap();
    assert!(reconciler.needs_sync("acme", &chain).await);
}

#[tokio::test]
async fn test_redeploy_updates_index_typing() {
    let (engine, reconciler, index) = engine_and_reconciler().await;
    engine
        .deploy("acme", record("acme", "fm:forumModel", forum_model()))
        .await
        .unwrap();
    let chain = engine.chain("acme").await.unwrap();
    reconciler.reconcile("acme", &chain).await.unwrap();

    // Subject switches to untokenized text, which maps to string_ci.
    let mut v2 = forum_model();
    v2["properties"][0]["tokenized"] = json!(false);
    engine
        .deploy("acme", record("acme", "fm:forumModel", v2))
        .await
        .unwrap();

    let chain = engine.chain("acme").await.unwrap();
    index.reset_counts().await;
    let report = reconciler.reconcile("acme", &chain).await.unwrap();

    assert_eq!(report.fields_updated, 1);
    assert_eq!(report.fields_created, 0);
    let subject = index
        .field(&report.collection, "@fm:subject")
        .await
        .unwrap();
    assert_eq!(subject.field_type, "string_ci");
}

#[tokio::test]
async fn test_model_wildcards_narrow_existing_dynamics() {
    let (engine, reconciler, index) = engine_and_reconciler().await;
    let collection = reconciler.config().naming.collection_for("acme");

    // A catch-all left behind by an earlier deployment generation.
    index
        .add_dynamic_field(
            &collection,
            &IndexField {
                name: "@cfg:*".to_string(),
                field_type: "string".to_string(),
                multi_valued: true,
                indexed: true,
                stored: false,
            },
        )
        .await
        .unwrap();

    engine
        .deploy(
            "acme",
            record(
                "acme",
                "cfg:configModel",
                json!({
                    "name": "cfg:configModel",
                    "namespaces": [
                        {"prefix": "cfg", "uri": "http://acme.example/model/config/1.0"}
                    ],
                    "imports": ["d"],
                    "dynamicProperties": [
                        {"name": "cfg:opt-*", "type": "d:text", "tokenized": false}
                    ],
                }),
            ),
        )
        .await
        .unwrap();

    let chain = engine.chain("acme").await.unwrap();
    let report = reconciler.reconcile("acme", &chain).await.unwrap();

    // The wanted shape differs from the catch-all, so a narrower pattern is
    // prepended; the catch-all itself is left untouched.
    assert_eq!(report.dynamic_created, 2, "core wildcard plus the narrowed one");
    let dynamics = index.dynamic_fields(&collection).await;
    assert_eq!(dynamics[0].name, "@cfg:opt-*");
    assert_eq!(dynamics[0].field_type, "string_ci");
    assert!(dynamics.iter().any(|f| f.name == "@cfg:*"));
}

#[tokio::test]
async fn test_teardown_forgets_the_tenant() {
    let (engine, reconciler, index) = engine_and_reconciler().await;
    engine
        .deploy("acme", record("acme", "fm:forumModel", forum_model()))
        .await
        .unwrap();
    let chain = engine.chain("acme").await.unwrap();
    reconciler.reconcile("acme", &chain).await.unwrap();
    assert!(!reconciler.needs_sync("acme", &chain).await);

    reconciler.teardown_tenant("acme").await;

    let collection = reconciler.config().naming.collection_for("acme");
    assert!(!index.has_collection(&collection).await);
    assert!(
        !index
            .has_collection(&reconciler.config().naming.security_collection_for("acme"))
            .await
    );
    assert!(!index.has_config_set(&collection).await);
    // Bookkeeping is gone with the collection.
    assert!(reconciler.needs_sync("acme", &chain).await);
}
