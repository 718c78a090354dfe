//! Pull the live topology of an instance into the data-config file.
//!
//! Fetches the instance's database list from the DBaaS aggregator, builds
//! the masked data-config tree, and writes it out. Every entry starts with
//! `is_cloneable: false`; operators flip the flag in the file before running
//! `dpump mapping update`.

use anyhow::Result;

use crate::config::Settings;
use crate::dbaas::DbaasAggregator;
use crate::store;

pub async fn run_pull(settings: &Settings, instance_name: &str, refresh: bool) -> Result<()> {
    let mut instance = settings.build_instance(instance_name)?;
    let aggregator = DbaasAggregator::new(&settings.dbaas)?;

    if refresh {
        instance.refresh_databases();
    }
    let config = instance.get_data_config(&aggregator).await?;
    store::save_data_config(&settings.files.data_config, &config)?;

    let databases: usize = config
        .values()
        .flat_map(|db_types| db_types.values())
        .map(Vec::len)
        .sum();
    println!(
        "Pulled {} database(s) across {} microservice(s) from '{}'.",
        databases,
        config.len(),
        instance.namespace()
    );
    println!(
        "Data config written to {}.",
        settings.files.data_config.display()
    );

    Ok(())
}
