//! Capability traits for the external services the pump talks to.
//!
//! The core never speaks HTTP itself: it consumes these two interfaces, and
//! the [`crate::dbaas`] and [`crate::backup`] modules provide the production
//! implementations. Tests substitute in-memory implementations.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{BackupStatus, Classifier, DbInfo};

/// Read and write access to the DBaaS aggregator API.
#[async_trait]
pub trait AggregatorApi: Send + Sync {
    /// List every database registered in `namespace`.
    ///
    /// Returns an empty vector (not an error) when the namespace has no
    /// registrations. Individual records missing required fields are skipped
    /// and reported through logging; the rest of the batch is returned.
    async fn database_list(&self, namespace: &str) -> Result<Vec<DbInfo>>;

    /// Look up a single database by its concrete classifier.
    ///
    /// Returns `None` when the aggregator knows no database under that
    /// classifier.
    async fn get_by_classifier(
        &self,
        namespace: &str,
        dbtype: &str,
        classifier: &Classifier,
    ) -> Result<Option<DbInfo>>;

    /// Rotate the credentials of the database identified by `classifier`.
    ///
    /// Destructive: callers must consult [`crate::guard::ChangeGuard`] first.
    async fn reset_password(
        &self,
        namespace: &str,
        dbtype: &str,
        classifier: &Classifier,
    ) -> Result<()>;
}

/// Backup and restore triggers of the backup daemon.
#[async_trait]
pub trait BackupApi: Send + Sync {
    /// Start a backup of the named databases; returns the daemon's backup id.
    async fn trigger_backup(&self, databases: &[String]) -> Result<String>;

    /// Report the state of a previously triggered backup.
    async fn backup_status(&self, backup_id: &str) -> Result<BackupStatus>;

    /// Restore the named databases from a backup.
    ///
    /// Destructive: callers must consult [`crate::guard::ChangeGuard`] first.
    async fn trigger_restore(&self, backup_id: &str, databases: &[String]) -> Result<()>;
}
