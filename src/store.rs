//! Reading and writing the data-config and mapping files.
//!
//! Both trees persist as pretty-printed JSON in the paths named by
//! `[files]` in the settings. Key order in the files is the discovery order
//! of the trees, so a pull followed by a save is stable across runs.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

use crate::models::{DataConfig, Mapping};

pub fn load_data_config(path: &Path) -> Result<DataConfig> {
    load_json(path).with_context(|| format!("Failed to load data config: {}", path.display()))
}

pub fn save_data_config(path: &Path, config: &DataConfig) -> Result<()> {
    save_json(path, config).with_context(|| format!("Failed to save data config: {}", path.display()))
}

pub fn load_mapping(path: &Path) -> Result<Mapping> {
    load_json(path).with_context(|| format!("Failed to load mapping: {}", path.display()))
}

pub fn save_mapping(path: &Path, mapping: &Mapping) -> Result<()> {
    save_json(path, mapping).with_context(|| format!("Failed to save mapping: {}", path.display()))
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    Ok(())
}
