//! One environment's view of its database topology and cloning mapping.
//!
//! An [`AppInstance`] binds a namespace and a tenant table to the data-config
//! and mapping trees built for that environment. The source instance of a
//! migration job masks its topology into a portable mapping; the target
//! instance resolves that mapping back into concrete classifiers.
//!
//! Lifecycle of the tree pair: `EMPTY → (get_data_config | load_data_config)
//! → CONFIG_LOADED → (mapping_update | load_mapping) → MAPPING_LOADED`.
//! There is no transition back; loading either tree clears the "mapping up
//! to date" flag but never clears the other tree.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{error, warn};

use crate::classifier::{ClassifierScope, Unresolved};
use crate::models::{Classifier, DataConfig, DbInfo, Mapping};
use crate::topology;
use crate::traits::AggregatorApi;

/// Whether the instance is the origin or the destination of a cloning job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Source,
    Target,
}

impl FromStr for Role {
    type Err = InstanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source" => Ok(Role::Source),
            "target" => Ok(Role::Target),
            other => Err(InstanceError::InvalidRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Source => f.write_str("source"),
            Role::Target => f.write_str("target"),
        }
    }
}

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("the 'namespace' value must be a non-empty string")]
    EmptyNamespace,
    #[error("the 'tenants' table must contain at least one entry")]
    EmptyTenants,
    #[error("invalid role '{0}': expected 'source' or 'target'")]
    InvalidRole(String),
    #[error("no mapping loaded: run mapping_update() or load_mapping() first")]
    MappingNotLoaded,
}

/// Cache of the aggregator's record list for one namespace.
///
/// The list is fetched at most once per cache lifetime; [`refresh`] drops the
/// cached copy so the next access fetches again. Keeping the fetch explicit
/// here (instead of inside a getter) makes the network side effect visible
/// in the call signature.
///
/// [`refresh`]: DatabaseCache::refresh
#[derive(Debug, Default)]
pub struct DatabaseCache {
    records: Option<Vec<DbInfo>>,
}

impl DatabaseCache {
    /// Return the cached records, fetching them through `client` on first use.
    pub async fn get_or_fetch(
        &mut self,
        client: &dyn AggregatorApi,
        namespace: &str,
    ) -> Result<&[DbInfo]> {
        if self.records.is_none() {
            self.records = Some(client.database_list(namespace).await?);
        }
        Ok(self.records.as_deref().unwrap_or_default())
    }

    /// Drop the cached list; the next [`get_or_fetch`] fetches fresh data.
    ///
    /// [`get_or_fetch`]: DatabaseCache::get_or_fetch
    pub fn refresh(&mut self) {
        self.records = None;
    }

    pub fn is_populated(&self) -> bool {
        self.records.is_some()
    }
}

/// One environment: identity plus the topology state owned for it.
#[derive(Debug)]
pub struct AppInstance {
    name: String,
    namespace: String,
    role: Option<Role>,
    tenants: IndexMap<String, String>,
    databases: DatabaseCache,
    data_config: Option<DataConfig>,
    mapping: Option<Mapping>,
    mapping_uptodate: bool,
}

impl AppInstance {
    /// Create an instance, validating all identity invariants up front.
    ///
    /// `namespace` must be non-empty and `tenants` must hold at least one
    /// entry; there is no deferred validation at first use.
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        role: Option<Role>,
        tenants: IndexMap<String, String>,
    ) -> Result<Self, InstanceError> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(InstanceError::EmptyNamespace);
        }
        if tenants.is_empty() {
            return Err(InstanceError::EmptyTenants);
        }
        Ok(Self {
            name: name.into(),
            namespace,
            role,
            tenants,
            databases: DatabaseCache::default(),
            data_config: None,
            mapping: None,
            mapping_uptodate: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn tenants(&self) -> &IndexMap<String, String> {
        &self.tenants
    }

    /// True after a successful [`mapping_update`]; cleared by every load.
    ///
    /// [`mapping_update`]: AppInstance::mapping_update
    pub fn is_mapping_uptodate(&self) -> bool {
        self.mapping_uptodate
    }

    /// Replace the stored data-config tree with a copy of `config`.
    pub fn load_data_config(&mut self, config: &DataConfig) {
        self.data_config = Some(config.clone());
        self.mapping_uptodate = false;
    }

    /// Return a copy of the data-config tree, building it from the
    /// aggregator's record list first if none is stored.
    ///
    /// The record list is fetched at most once per instance; call
    /// [`refresh_databases`] to force the next build to fetch again.
    ///
    /// [`refresh_databases`]: AppInstance::refresh_databases
    pub async fn get_data_config(&mut self, aggregator: &dyn AggregatorApi) -> Result<DataConfig> {
        if let Some(ref config) = self.data_config {
            return Ok(config.clone());
        }
        let scope = ClassifierScope {
            namespace: &self.namespace,
            tenants: &self.tenants,
        };
        let records = self
            .databases
            .get_or_fetch(aggregator, &self.namespace)
            .await?;
        let config = topology::build_data_config(records, &scope);
        self.data_config = Some(config.clone());
        Ok(config)
    }

    /// Drop the cached aggregator record list and any data-config built
    /// from it, so the next [`get_data_config`] rebuilds from live data.
    ///
    /// [`get_data_config`]: AppInstance::get_data_config
    pub fn refresh_databases(&mut self) {
        self.databases.refresh();
        self.data_config = None;
        self.mapping_uptodate = false;
    }

    /// Replace the stored mapping tree with a copy of `mapping`.
    pub fn load_mapping(&mut self, mapping: &Mapping) {
        self.mapping = Some(mapping.clone());
        self.mapping_uptodate = false;
    }

    /// Return a copy of the mapping tree.
    ///
    /// Never builds lazily: with nothing loaded this is
    /// [`InstanceError::MappingNotLoaded`].
    pub fn get_mapping(&self) -> Result<Mapping, InstanceError> {
        self.mapping
            .clone()
            .ok_or(InstanceError::MappingNotLoaded)
    }

    /// Derive the mapping from the data-config tree, if no mapping exists.
    ///
    /// A present non-empty mapping makes this a no-op even when the
    /// data-config changed after it was derived; a reload never refreshes
    /// an existing mapping. An empty or absent data-config logs a warning
    /// and changes nothing; the caller may load a config and retry.
    pub fn mapping_update(&mut self) {
        if self.mapping.as_ref().is_some_and(|m| !m.is_empty()) {
            return;
        }
        let Some(config) = self.data_config.as_ref().filter(|c| !c.is_empty()) else {
            warn!(
                instance = %self.name,
                "data config is empty, mapping left untouched"
            );
            return;
        };
        self.mapping = Some(topology::derive_mapping(config));
        self.mapping_uptodate = true;
    }

    /// Resolve a templated classifier against this instance's namespace and
    /// tenant table. Fields that cannot be resolved are logged and left
    /// templated; masking (the inverse) reports misses without logging.
    pub fn resolve_classifier(&self, classifier: &Classifier) -> Classifier {
        let outcome = self.scope().resolve(classifier);
        for miss in &outcome.unresolved {
            match miss {
                Unresolved::UnknownTenantName(name) => {
                    error!(instance = %self.name, tenant = %name, "tenant name missing in config");
                }
                Unresolved::NotTemplated(value) => {
                    error!(instance = %self.name, value = %value, "tenantId is not a template value");
                }
                Unresolved::UnknownTenantId(_) => {}
            }
        }
        outcome.classifier
    }

    pub(crate) fn scope(&self) -> ClassifierScope<'_> {
        ClassifierScope {
            namespace: &self.namespace,
            tenants: &self.tenants,
        }
    }
}
