//! Deny-list guard consulted before every destructive operation.
//!
//! Password resets and restores against protected environments must never
//! happen by accident. The guard holds `(endpoint substring, namespace)`
//! pairs from the settings file; a write operation is forbidden when any
//! rule's endpoint fragment occurs in the endpoint identifier and its
//! namespace matches exactly. The guard is plain data injected into the
//! commands that need it.

use serde::Deserialize;
use thiserror::Error;

/// One deny rule: an endpoint substring (e.g. `.prod.`) plus the namespace
/// it protects.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DenyRule {
    pub endpoint: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Error)]
#[error("changes forbidden: endpoint '{endpoint}' is deny-listed for namespace '{namespace}'")]
pub struct ChangesForbidden {
    pub endpoint: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChangeGuard {
    rules: Vec<DenyRule>,
}

impl ChangeGuard {
    pub fn new(rules: Vec<DenyRule>) -> Self {
        Self { rules }
    }

    /// True when a deny rule covers this endpoint/namespace pair.
    pub fn changes_forbidden(&self, endpoint: &str, namespace: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| endpoint.contains(&rule.endpoint) && rule.namespace == namespace)
    }

    /// Guard clause for write paths: error out before any partial write.
    pub fn ensure_allowed(&self, endpoint: &str, namespace: &str) -> Result<(), ChangesForbidden> {
        if self.changes_forbidden(endpoint, namespace) {
            return Err(ChangesForbidden {
                endpoint: endpoint.to_string(),
                namespace: namespace.to_string(),
            });
        }
        Ok(())
    }
}
