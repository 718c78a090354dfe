//! Backup, restore, and password-reset commands.
//!
//! These are the write-side operations of the pump. Restore and password
//! reset are destructive and consult the [`ChangeGuard`] before any request
//! leaves the process; a deny-listed endpoint/namespace pair aborts the
//! whole operation.
//!
//! [`ChangeGuard`]: crate::guard::ChangeGuard

use anyhow::{bail, Result};
use tracing::warn;

use crate::backup::BackupDaemon;
use crate::config::Settings;
use crate::dbaas::DbaasAggregator;
use crate::models::{ConnectionInfo, Mapping, MappingItem};
use crate::store;
use crate::traits::{AggregatorApi, BackupApi};

/// Trigger a backup of the mapping's source databases.
pub async fn run_backup(settings: &Settings, instance_name: &str) -> Result<()> {
    let instance = settings.build_instance(instance_name)?;
    let mapping = store::load_mapping(&settings.files.mapping)?;

    let databases = collect_databases(&mapping, |item| &item.source);
    if databases.is_empty() {
        bail!("no source databases recorded in the mapping; provision the mapping first");
    }

    let daemon = BackupDaemon::new(&settings.backup)?;
    let backup_id = daemon.trigger_backup(&databases).await?;
    println!(
        "Backup '{}' started for {} database(s) of '{}'.",
        backup_id,
        databases.len(),
        instance.namespace()
    );

    Ok(())
}

/// Report the daemon's status for a backup id.
pub async fn run_backup_status(settings: &Settings, backup_id: &str) -> Result<()> {
    let daemon = BackupDaemon::new(&settings.backup)?;
    let status = daemon.backup_status(backup_id).await?;
    println!("backup:  {}", status.backup_id);
    println!("status:  {}", status.status);
    if let Some(created) = status.created {
        println!("created: {}", created.format("%Y-%m-%dT%H:%M:%SZ"));
    }
    if let Some(message) = status.message {
        println!("message: {}", message);
    }
    Ok(())
}

/// Restore the mapping's target databases from a backup. Guarded.
pub async fn run_restore(settings: &Settings, backup_id: &str, instance_name: &str) -> Result<()> {
    let instance = settings.build_instance(instance_name)?;
    settings
        .change_guard()
        .ensure_allowed(&settings.backup.url, instance.namespace())?;

    let mapping = store::load_mapping(&settings.files.mapping)?;
    let databases = collect_databases(&mapping, |item| &item.target);
    if databases.is_empty() {
        bail!("no target databases recorded in the mapping; provision the mapping first");
    }

    let daemon = BackupDaemon::new(&settings.backup)?;
    daemon.trigger_restore(backup_id, &databases).await?;
    println!(
        "Restore from '{}' started for {} database(s) of '{}'.",
        backup_id,
        databases.len(),
        instance.namespace()
    );

    Ok(())
}

/// Rotate credentials for every mapped database of an instance. Guarded.
///
/// Each mapping classifier is resolved against the instance's namespace and
/// tenant table, verified to exist through the aggregator, and reset.
/// Databases the aggregator does not know are skipped with a warning.
pub async fn run_reset_passwords(settings: &Settings, instance_name: &str) -> Result<()> {
    let instance = settings.build_instance(instance_name)?;
    settings
        .change_guard()
        .ensure_allowed(&settings.dbaas.url, instance.namespace())?;

    let mapping = store::load_mapping(&settings.files.mapping)?;
    let aggregator = DbaasAggregator::new(&settings.dbaas)?;

    let mut reset = 0usize;
    let mut skipped = 0usize;
    for db_types in mapping.values() {
        for (dbtype, items) in db_types {
            for item in items {
                let classifier = instance.resolve_classifier(&item.classifier);
                let found = aggregator
                    .get_by_classifier(instance.namespace(), dbtype, &classifier)
                    .await?;
                let Some(info) = found else {
                    warn!(
                        namespace = %instance.namespace(),
                        dbtype = %dbtype,
                        "no database registered for mapping classifier, skipping"
                    );
                    skipped += 1;
                    continue;
                };
                aggregator
                    .reset_password(instance.namespace(), &info.dbtype, &classifier)
                    .await?;
                reset += 1;
            }
        }
    }

    println!(
        "Passwords reset for {} database(s) of '{}' ({} skipped).",
        reset,
        instance.namespace(),
        skipped
    );

    Ok(())
}

fn collect_databases<F>(mapping: &Mapping, slot: F) -> Vec<String>
where
    F: Fn(&MappingItem) -> &ConnectionInfo,
{
    mapping
        .values()
        .flat_map(|db_types| db_types.values())
        .flatten()
        .filter_map(|item| slot(item).database.clone())
        .collect()
}
