//! Classifier masking and resolution.
//!
//! A concrete classifier names a database inside one environment: its
//! `namespace` and `tenantId` values are specific to that deployment. Masking
//! rewrites those two fields into portable `$$`-templates keyed by the owning
//! instance's tenant table; resolution substitutes a (possibly different)
//! instance's concrete values back in.
//!
//! Both transforms are pure: they return a new classifier plus the list of
//! fields they could not translate. Policy for unresolved fields (ignore,
//! log, abort) belongs to the caller.

use serde_json::Value;

use crate::models::Classifier;

/// Prefix marking a templated classifier value.
pub const MAPPING_MARK: &str = "$$";

/// Templated stand-in for the owning instance's namespace.
pub const NAMESPACE_TEMPLATE: &str = "app-namespace";

/// Classifier field carrying the environment namespace.
pub const NAMESPACE_KEY: &str = "namespace";

/// Classifier field carrying the opaque tenant identifier.
pub const TENANT_ID_KEY: &str = "tenantId";

/// One instance's view for masking/resolution: its namespace and its
/// tenant-name → tenant-id table.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierScope<'a> {
    pub namespace: &'a str,
    pub tenants: &'a indexmap::IndexMap<String, String>,
}

/// A classifier field the transform left untranslated, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
    /// Masking found a `tenantId` that matches no id in the tenant table.
    UnknownTenantId(String),
    /// Resolution found a templated tenant name absent from the tenant table.
    UnknownTenantName(String),
    /// Resolution found a `tenantId` value without the `$$` mark.
    NotTemplated(String),
}

/// Result of a mask or resolve pass: the rewritten classifier and any
/// fields left as-is.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub classifier: Classifier,
    pub unresolved: Vec<Unresolved>,
}

impl Outcome {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

impl ClassifierScope<'_> {
    /// Mask a concrete classifier into its portable template.
    ///
    /// `namespace` becomes `$$app-namespace`; a `tenantId` matching a tenant
    /// id in the table becomes `$$<tenant-name>`. A `tenantId` with no match
    /// stays unchanged and is reported. Classifiers lacking both fields pass
    /// through untouched.
    pub fn mask(&self, classifier: &Classifier) -> Outcome {
        let mut masked = classifier.clone();
        let mut unresolved = Vec::new();

        if masked.contains_key(NAMESPACE_KEY) {
            masked.insert(
                NAMESPACE_KEY.to_string(),
                Value::String(format!("{MAPPING_MARK}{NAMESPACE_TEMPLATE}")),
            );
        }
        if let Some(Value::String(tenant_id)) = masked.get(TENANT_ID_KEY).cloned() {
            match self.tenant_name_by_id(&tenant_id) {
                Some(name) => {
                    let templated = format!("{MAPPING_MARK}{name}");
                    masked.insert(TENANT_ID_KEY.to_string(), Value::String(templated));
                }
                None => unresolved.push(Unresolved::UnknownTenantId(tenant_id)),
            }
        }

        Outcome {
            classifier: masked,
            unresolved,
        }
    }

    /// Resolve a templated classifier against this scope's concrete values.
    ///
    /// `namespace` becomes the scope's namespace regardless of its previous
    /// value; a `$$<tenant-name>` tenant id is looked up in the tenant table.
    /// An unknown tenant name, or a `tenantId` that never carried the mark,
    /// stays unchanged and is reported.
    pub fn resolve(&self, classifier: &Classifier) -> Outcome {
        let mut resolved = classifier.clone();
        let mut unresolved = Vec::new();

        if resolved.contains_key(NAMESPACE_KEY) {
            resolved.insert(
                NAMESPACE_KEY.to_string(),
                Value::String(self.namespace.to_string()),
            );
        }
        if let Some(Value::String(value)) = resolved.get(TENANT_ID_KEY).cloned() {
            match value.strip_prefix(MAPPING_MARK) {
                Some(tenant_name) => match self.tenants.get(tenant_name) {
                    Some(id) => {
                        resolved.insert(TENANT_ID_KEY.to_string(), Value::String(id.clone()));
                    }
                    None => {
                        unresolved.push(Unresolved::UnknownTenantName(tenant_name.to_string()));
                    }
                },
                None => unresolved.push(Unresolved::NotTemplated(value)),
            }
        }

        Outcome {
            classifier: resolved,
            unresolved,
        }
    }

    /// Reverse lookup: tenant name whose id equals `tenant_id`. First match
    /// in table order wins.
    fn tenant_name_by_id(&self, tenant_id: &str) -> Option<&str> {
        self.tenants
            .iter()
            .find(|(_, id)| id.as_str() == tenant_id)
            .map(|(name, _)| name.as_str())
    }
}
