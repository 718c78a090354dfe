//! Building the data-config tree and deriving the mapping tree.
//!
//! Both builders are pure: the data-config builder turns a flat aggregator
//! record list into the two-level topology tree, the mapping builder filters
//! that tree down to its cloneable entries. State handling (caching, the
//! "up to date" flag, empty-precondition warnings) lives in
//! [`crate::instance`].

use crate::classifier::ClassifierScope;
use crate::models::{ConnectionInfo, DataConfig, DataConfigItem, DbInfo, Mapping, MappingItem};

/// Build a data-config tree from the aggregator's flat record list.
///
/// Buckets are created in order of first appearance; records with identical
/// classifiers each get their own entry. Every classifier is masked against
/// `scope`; records whose tenant id has no entry in the scope's table keep
/// the concrete id (masking is best-effort by design of the mapping format).
pub fn build_data_config(records: &[DbInfo], scope: &ClassifierScope<'_>) -> DataConfig {
    let mut config = DataConfig::new();
    for db in records {
        let items = config
            .entry(db.microservice.clone())
            .or_default()
            .entry(db.dbtype.clone())
            .or_default();
        items.push(DataConfigItem {
            classifier: scope.mask(&db.classifier).classifier,
            is_cloneable: false,
        });
    }
    config
}

/// Derive a mapping tree from a data-config tree.
///
/// Walks the tree in its iteration order and keeps only cloneable entries,
/// each with the same masked classifier and empty source/target connection
/// slots. The result is independent storage; an all-non-cloneable config
/// yields an empty mapping.
pub fn derive_mapping(config: &DataConfig) -> Mapping {
    let mut mapping = Mapping::new();
    for (microservice, db_types) in config {
        for (dbtype, items) in db_types {
            for item in items {
                if !item.is_cloneable {
                    continue;
                }
                mapping
                    .entry(microservice.clone())
                    .or_default()
                    .entry(dbtype.clone())
                    .or_default()
                    .push(MappingItem {
                        classifier: item.classifier.clone(),
                        is_cloneable: true,
                        source: ConnectionInfo::default(),
                        target: ConnectionInfo::default(),
                    });
            }
        }
    }
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    fn tenants() -> IndexMap<String, String> {
        let mut t = IndexMap::new();
        t.insert("alpha".to_string(), "t-1".to_string());
        t
    }

    fn record(microservice: &str, dbtype: &str) -> DbInfo {
        let classifier = match json!({
            "namespace": "ns1",
            "tenantId": "t-1",
            "microserviceName": microservice,
        }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        DbInfo {
            namespace: "ns1".to_string(),
            microservice: microservice.to_string(),
            dbtype: dbtype.to_string(),
            classifier,
            database: "db1".to_string(),
            username: "u1".to_string(),
        }
    }

    #[test]
    fn builds_masked_tree_from_single_record() {
        let tenants = tenants();
        let scope = ClassifierScope {
            namespace: "ns1",
            tenants: &tenants,
        };
        let config = build_data_config(&[record("svc", "postgresql")], &scope);

        assert_eq!(config.len(), 1);
        let items = &config["svc"]["postgresql"];
        assert_eq!(items.len(), 1);
        assert!(!items[0].is_cloneable);
        assert_eq!(items[0].classifier["namespace"], json!("$$app-namespace"));
        assert_eq!(items[0].classifier["tenantId"], json!("$$alpha"));
        assert_eq!(items[0].classifier["microserviceName"], json!("svc"));
    }

    #[test]
    fn keeps_discovery_order_and_duplicates() {
        let tenants = tenants();
        let scope = ClassifierScope {
            namespace: "ns1",
            tenants: &tenants,
        };
        let records = vec![
            record("zeta", "postgresql"),
            record("alpha-svc", "mongodb"),
            record("zeta", "postgresql"),
            record("zeta", "mongodb"),
        ];
        let config = build_data_config(&records, &scope);

        let services: Vec<&String> = config.keys().collect();
        assert_eq!(services, vec!["zeta", "alpha-svc"]);
        let zeta_types: Vec<&String> = config["zeta"].keys().collect();
        assert_eq!(zeta_types, vec!["postgresql", "mongodb"]);
        // identical records are not deduplicated
        assert_eq!(config["zeta"]["postgresql"].len(), 2);
    }

    #[test]
    fn mapping_holds_only_cloneable_entries() {
        let tenants = tenants();
        let scope = ClassifierScope {
            namespace: "ns1",
            tenants: &tenants,
        };
        let records = vec![
            record("svc-a", "postgresql"),
            record("svc-a", "postgresql"),
            record("svc-b", "mongodb"),
        ];
        let mut config = build_data_config(&records, &scope);
        config["svc-a"]["postgresql"][1].is_cloneable = true;

        let mapping = derive_mapping(&config);
        assert_eq!(mapping.len(), 1);
        let items = &mapping["svc-a"]["postgresql"];
        assert_eq!(items.len(), 1);
        assert!(items[0].is_cloneable);
        assert_eq!(
            items[0].classifier,
            config["svc-a"]["postgresql"][1].classifier
        );
        assert!(items[0].source.is_empty());
        assert!(items[0].target.is_empty());
        assert!(!mapping.contains_key("svc-b"));
    }

    #[test]
    fn mapping_of_non_cloneable_config_is_empty() {
        let tenants = tenants();
        let scope = ClassifierScope {
            namespace: "ns1",
            tenants: &tenants,
        };
        let config = build_data_config(&[record("svc", "postgresql")], &scope);
        assert!(derive_mapping(&config).is_empty());
    }
}
