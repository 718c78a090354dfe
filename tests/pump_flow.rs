//! End-to-end flow tests against an in-memory aggregator.
//!
//! These tests drive the real pipeline (fetch, data-config build, mapping
//! derivation, file round-trip, cross-instance resolution) with a stub
//! `AggregatorApi`, proving the pieces compose the way the CLI uses them.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::json;

use data_pump::instance::{AppInstance, Role};
use data_pump::models::{Classifier, DbInfo};
use data_pump::store;
use data_pump::traits::AggregatorApi;

// ─── Stub aggregator ────────────────────────────────────────────────

struct StubAggregator {
    records: Vec<DbInfo>,
    list_calls: AtomicUsize,
}

impl StubAggregator {
    fn new(records: Vec<DbInfo>) -> Self {
        Self {
            records,
            list_calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AggregatorApi for StubAggregator {
    async fn database_list(&self, namespace: &str) -> Result<Vec<DbInfo>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .iter()
            .filter(|db| db.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn get_by_classifier(
        &self,
        namespace: &str,
        dbtype: &str,
        classifier: &Classifier,
    ) -> Result<Option<DbInfo>> {
        Ok(self
            .records
            .iter()
            .find(|db| {
                db.namespace == namespace && db.dbtype == dbtype && &db.classifier == classifier
            })
            .cloned())
    }

    async fn reset_password(
        &self,
        _namespace: &str,
        _dbtype: &str,
        _classifier: &Classifier,
    ) -> Result<()> {
        Ok(())
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────

fn classifier(value: serde_json::Value) -> Classifier {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn record(namespace: &str, microservice: &str, dbtype: &str, tenant_id: &str) -> DbInfo {
    DbInfo {
        namespace: namespace.to_string(),
        microservice: microservice.to_string(),
        dbtype: dbtype.to_string(),
        classifier: classifier(json!({
            "namespace": namespace,
            "tenantId": tenant_id,
            "microserviceName": microservice,
        })),
        database: format!("{}_db", microservice.replace('-', "_")),
        username: format!("{}_user", microservice.replace('-', "_")),
    }
}

fn source_instance() -> AppInstance {
    let mut tenants = IndexMap::new();
    tenants.insert("alpha".to_string(), "t-1".to_string());
    AppInstance::new("origin", "ns1", Some(Role::Source), tenants).unwrap()
}

fn target_instance() -> AppInstance {
    let mut tenants = IndexMap::new();
    tenants.insert("alpha".to_string(), "t-77".to_string());
    AppInstance::new("clone", "ns2", Some(Role::Target), tenants).unwrap()
}

// ─── Tests ──────────────────────────────────────────────────────────

/// The aggregator is hit exactly once however often the config is read;
/// an explicit refresh is the only way to fetch again.
#[tokio::test]
async fn data_config_fetches_once_until_refreshed() {
    let aggregator = StubAggregator::new(vec![record("ns1", "svc", "postgresql", "t-1")]);
    let mut instance = source_instance();

    let first = instance.get_data_config(&aggregator).await.unwrap();
    let second = instance.get_data_config(&aggregator).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(aggregator.calls(), 1);

    instance.refresh_databases();
    instance.get_data_config(&aggregator).await.unwrap();
    assert_eq!(aggregator.calls(), 2);
}

/// The exact masked tree for the single-record scenario.
#[tokio::test]
async fn pull_builds_masked_data_config() {
    let aggregator = StubAggregator::new(vec![record("ns1", "svc", "postgresql", "t-1")]);
    let mut instance = source_instance();

    let config = instance.get_data_config(&aggregator).await.unwrap();

    let items = &config["svc"]["postgresql"];
    assert_eq!(items.len(), 1);
    assert!(!items[0].is_cloneable);
    assert_eq!(
        items[0].classifier,
        classifier(json!({
            "namespace": "$$app-namespace",
            "tenantId": "$$alpha",
            "microserviceName": "svc",
        }))
    );
}

/// Copies handed out by the getters are independent of the stored trees.
#[tokio::test]
async fn data_config_copies_are_independent() {
    let aggregator = StubAggregator::new(vec![record("ns1", "svc", "postgresql", "t-1")]);
    let mut instance = source_instance();

    let mut first = instance.get_data_config(&aggregator).await.unwrap();
    first["svc"]["postgresql"][0].is_cloneable = true;

    let second = instance.get_data_config(&aggregator).await.unwrap();
    assert!(!second["svc"]["postgresql"][0].is_cloneable);
}

/// Flipping a cloneable flag and updating yields a mapping with the same
/// masked classifier and empty connection slots; non-cloneable entries never
/// appear.
#[tokio::test]
async fn mapping_is_the_cloneable_subset() {
    let aggregator = StubAggregator::new(vec![
        record("ns1", "order-svc", "postgresql", "t-1"),
        record("ns1", "order-svc", "mongodb", "t-1"),
        record("ns1", "audit-svc", "postgresql", "t-1"),
    ]);
    let mut instance = source_instance();

    let mut config = instance.get_data_config(&aggregator).await.unwrap();
    config["order-svc"]["postgresql"][0].is_cloneable = true;
    instance.load_data_config(&config);
    instance.mapping_update();

    let mapping = instance.get_mapping().unwrap();
    assert_eq!(mapping.len(), 1);
    let items = &mapping["order-svc"]["postgresql"];
    assert_eq!(items.len(), 1);
    assert!(items[0].is_cloneable);
    assert_eq!(
        items[0].classifier,
        config["order-svc"]["postgresql"][0].classifier
    );
    assert!(items[0].source.is_empty());
    assert!(items[0].target.is_empty());
    assert!(!mapping.contains_key("audit-svc"));
    assert!(!mapping["order-svc"].contains_key("mongodb"));
}

/// A mapping classifier resolved by a different instance gets that
/// instance's namespace and tenant ids.
#[tokio::test]
async fn mapping_resolves_against_target_instance() {
    let aggregator = StubAggregator::new(vec![record("ns1", "svc", "postgresql", "t-1")]);
    let mut source = source_instance();
    let target = target_instance();

    let mut config = source.get_data_config(&aggregator).await.unwrap();
    config["svc"]["postgresql"][0].is_cloneable = true;
    source.load_data_config(&config);
    source.mapping_update();
    let mapping = source.get_mapping().unwrap();

    let resolved = target.resolve_classifier(&mapping["svc"]["postgresql"][0].classifier);
    assert_eq!(
        resolved,
        classifier(json!({
            "namespace": "ns2",
            "tenantId": "t-77",
            "microserviceName": "svc",
        }))
    );
}

/// The full file-based workflow the CLI runs: pull to disk, edit flags,
/// derive the mapping, write it, read it back unchanged.
#[tokio::test]
async fn file_roundtrip_through_pull_and_mapping_update() {
    let tmp = tempfile::tempdir().unwrap();
    let config_path = tmp.path().join("data").join("config.json");
    let mapping_path = tmp.path().join("data").join("mapping.json");

    let aggregator = StubAggregator::new(vec![
        record("ns1", "svc", "postgresql", "t-1"),
        record("ns1", "svc", "postgresql", "t-1"),
    ]);
    let mut instance = source_instance();

    let config = instance.get_data_config(&aggregator).await.unwrap();
    // duplicate records each keep their own entry
    assert_eq!(config["svc"]["postgresql"].len(), 2);
    store::save_data_config(&config_path, &config).unwrap();

    // operator flips one flag in the file
    let mut edited = store::load_data_config(&config_path).unwrap();
    edited["svc"]["postgresql"][1].is_cloneable = true;

    instance.load_data_config(&edited);
    instance.mapping_update();
    assert!(instance.is_mapping_uptodate());

    let mapping = instance.get_mapping().unwrap();
    store::save_mapping(&mapping_path, &mapping).unwrap();
    assert_eq!(store::load_mapping(&mapping_path).unwrap(), mapping);
    assert_eq!(mapping["svc"]["postgresql"].len(), 1);
}

/// Reloading the data config after a mapping exists never refreshes the
/// mapping; the staleness limitation is intentional behavior.
#[tokio::test]
async fn existing_mapping_survives_config_reload() {
    let aggregator = StubAggregator::new(vec![record("ns1", "svc", "postgresql", "t-1")]);
    let mut instance = source_instance();

    let mut config = instance.get_data_config(&aggregator).await.unwrap();
    config["svc"]["postgresql"][0].is_cloneable = true;
    instance.load_data_config(&config);
    instance.mapping_update();
    let mapping_before = instance.get_mapping().unwrap();

    // new topology appears upstream and the config is reloaded
    let mut grown = config.clone();
    grown
        .entry("new-svc".to_string())
        .or_default()
        .entry("mongodb".to_string())
        .or_default()
        .push(data_pump::models::DataConfigItem {
            classifier: classifier(json!({
                "namespace": "$$app-namespace",
                "microserviceName": "new-svc",
            })),
            is_cloneable: true,
        });
    instance.load_data_config(&grown);
    assert!(!instance.is_mapping_uptodate());

    instance.mapping_update();
    assert_eq!(instance.get_mapping().unwrap(), mapping_before);
}
