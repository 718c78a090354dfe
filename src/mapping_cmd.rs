//! Mapping management: derive the mapping from the data-config file and
//! inspect the result.

use anyhow::Result;

use crate::config::Settings;
use crate::models::Mapping;
use crate::store;

/// Derive the mapping for the source instance and write the mapping file.
///
/// Loads the data-config file (with any `is_cloneable` edits the operator
/// made), runs the mapping update, and persists the result. An empty data
/// config is reported but is not an error; the operator can pull again and
/// retry.
pub fn run_mapping_update(settings: &Settings) -> Result<()> {
    let mut instance = settings.source_instance()?;
    let config = store::load_data_config(&settings.files.data_config)?;
    instance.load_data_config(&config);
    instance.mapping_update();

    let Ok(mapping) = instance.get_mapping() else {
        println!("Data config is empty; mapping not updated.");
        return Ok(());
    };
    store::save_mapping(&settings.files.mapping, &mapping)?;

    let entries = count_entries(&mapping);
    if entries == 0 {
        println!("No cloneable entries in the data config; wrote an empty mapping.");
    } else {
        println!(
            "Mapping updated: {} cloneable database(s) across {} microservice(s).",
            entries,
            mapping.len()
        );
    }
    println!("Mapping written to {}.", settings.files.mapping.display());

    Ok(())
}

/// Print the mapping file as a tree.
pub fn run_mapping_show(settings: &Settings) -> Result<()> {
    let mapping = store::load_mapping(&settings.files.mapping)?;
    if mapping.is_empty() {
        println!("Mapping is empty.");
        return Ok(());
    }

    for (microservice, db_types) in &mapping {
        println!("{}", microservice);
        for (dbtype, items) in db_types {
            println!("  {} ({})", dbtype, items.len());
            for item in items {
                let source = item.source.database.as_deref().unwrap_or("-");
                let target = item.target.database.as_deref().unwrap_or("-");
                println!(
                    "    {}  source={} target={}",
                    serde_json::to_string(&item.classifier)?,
                    source,
                    target
                );
            }
        }
    }
    println!();
    println!("{} cloneable database(s) total.", count_entries(&mapping));

    Ok(())
}

fn count_entries(mapping: &Mapping) -> usize {
    mapping
        .values()
        .flat_map(|db_types| db_types.values())
        .map(Vec::len)
        .sum()
}
