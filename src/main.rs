//! # Data Pump CLI (`dpump`)
//!
//! The `dpump` binary drives the cloning workflow end to end:
//!
//! ```bash
//! dpump --config ./dpump.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dpump status` | Show configured instances, endpoints, and files |
//! | `dpump pull --instance <name>` | Fetch live topology into the data-config file |
//! | `dpump mapping update` | Derive the mapping from the data-config file |
//! | `dpump mapping show` | Print the mapping tree |
//! | `dpump backup run --instance <name>` | Trigger a backup of mapped source databases |
//! | `dpump backup status <id>` | Poll a backup's state |
//! | `dpump restore --backup-id <id> --instance <name>` | Restore mapped target databases |
//! | `dpump reset-passwords --instance <name>` | Rotate credentials of mapped databases |
//!
//! A typical cloning run: `pull` the source topology, flip `is_cloneable`
//! flags in the data-config file, `mapping update`, provision the mapping
//! externally, then `backup run` / `restore` against the target.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use data_pump::{backup_cmd, config, mapping_cmd, pull, status};

/// Data Pump: clone DBaaS-managed database sets between namespaces.
///
/// All commands accept a `--config` flag pointing to a TOML settings file
/// declaring the instances, service endpoints, and file locations.
#[derive(Parser)]
#[command(
    name = "dpump",
    about = "Data Pump: clone DBaaS-managed database sets between namespaces",
    version
)]
struct Cli {
    /// Path to the settings file (TOML).
    #[arg(long, global = true, default_value = "./dpump.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show configured instances, endpoints, guard rules, and files.
    Status,

    /// Fetch an instance's live topology into the data-config file.
    ///
    /// Every discovered database gets a masked classifier and starts with
    /// `is_cloneable: false`; edit the file to mark entries for cloning.
    Pull {
        /// Instance to pull, as named in `[instances.<name>]`.
        #[arg(long)]
        instance: String,

        /// Drop any cached aggregator data and fetch fresh.
        #[arg(long)]
        refresh: bool,
    },

    /// Derive or inspect the mapping tree.
    Mapping {
        #[command(subcommand)]
        action: MappingAction,
    },

    /// Trigger backups and poll their state.
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Restore mapped target databases from a backup. Deny-list guarded.
    Restore {
        /// Backup id returned by `dpump backup run`.
        #[arg(long)]
        backup_id: String,

        /// Target instance, as named in `[instances.<name>]`.
        #[arg(long)]
        instance: String,
    },

    /// Rotate credentials of every mapped database. Deny-list guarded.
    ResetPasswords {
        /// Instance whose databases get new passwords.
        #[arg(long)]
        instance: String,
    },
}

#[derive(Subcommand)]
enum MappingAction {
    /// Derive the mapping from the data-config file's cloneable entries.
    ///
    /// A no-op when a non-empty mapping was already derived; reloading the
    /// data config does not refresh an existing mapping.
    Update,

    /// Print the mapping tree with its connection slots.
    Show,
}

#[derive(Subcommand)]
enum BackupAction {
    /// Start a backup of the mapping's source databases.
    Run {
        /// Instance being backed up.
        #[arg(long)]
        instance: String,
    },

    /// Show the daemon's status for a backup id.
    Status {
        /// Backup id returned by `dpump backup run`.
        backup_id: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let settings = config::load_settings(&cli.config)?;

    match cli.command {
        Commands::Status => {
            status::run_status(&settings)?;
        }
        Commands::Pull { instance, refresh } => {
            pull::run_pull(&settings, &instance, refresh).await?;
        }
        Commands::Mapping { action } => match action {
            MappingAction::Update => {
                mapping_cmd::run_mapping_update(&settings)?;
            }
            MappingAction::Show => {
                mapping_cmd::run_mapping_show(&settings)?;
            }
        },
        Commands::Backup { action } => match action {
            BackupAction::Run { instance } => {
                backup_cmd::run_backup(&settings, &instance).await?;
            }
            BackupAction::Status { backup_id } => {
                backup_cmd::run_backup_status(&settings, &backup_id).await?;
            }
        },
        Commands::Restore {
            backup_id,
            instance,
        } => {
            backup_cmd::run_restore(&settings, &backup_id, &instance).await?;
        }
        Commands::ResetPasswords { instance } => {
            backup_cmd::run_reset_passwords(&settings, &instance).await?;
        }
    }

    Ok(())
}
