//! Core data models shared by the mapping engine, the builders, and the
//! service clients.
//!
//! These types mirror the shapes the DBaaS aggregator reports and the shapes
//! the data-config and mapping files persist.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key-value descriptor uniquely identifying a database within an
/// environment. Field order is preserved so masked classifiers round-trip
/// through the mapping file unchanged.
pub type Classifier = serde_json::Map<String, Value>;

/// One database as reported by the DBaaS aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbInfo {
    pub namespace: String,
    pub microservice: String,
    pub dbtype: String,
    pub classifier: Classifier,
    pub database: String,
    pub username: String,
}

/// One database entry in the data-config tree.
///
/// `is_cloneable` defaults to false on discovery; operators flip it in the
/// data-config file before deriving a mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfigItem {
    pub classifier: Classifier,
    pub is_cloneable: bool,
}

/// Physical connection details filled in by the provisioning step.
/// Both slots start empty and serialize as `{}` until populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl ConnectionInfo {
    pub fn is_empty(&self) -> bool {
        self.database.is_none() && self.username.is_none()
    }
}

/// One cloneable database entry in the mapping tree: the data-config record
/// plus the source and target connection slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingItem {
    pub classifier: Classifier,
    pub is_cloneable: bool,
    #[serde(default)]
    pub source: ConnectionInfo,
    #[serde(default)]
    pub target: ConnectionInfo,
}

/// Two-level topology tree: microservice name → database type → entries,
/// in order of first appearance. Never resorted, never deduplicated.
pub type DataConfig = IndexMap<String, IndexMap<String, Vec<DataConfigItem>>>;

/// Same shape as [`DataConfig`], holding only cloneable entries.
pub type Mapping = IndexMap<String, IndexMap<String, Vec<MappingItem>>>;

/// State of a backup job as reported by the backup daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupStatus {
    pub backup_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
