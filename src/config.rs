use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::guard::{ChangeGuard, DenyRule};
use crate::instance::{AppInstance, Role};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub files: FilesConfig,
    pub dbaas: EndpointConfig,
    pub backup: EndpointConfig,
    #[serde(default)]
    pub guard: GuardConfig,
    pub instances: IndexMap<String, InstanceConfig>,
}

/// Where the data-config and mapping trees live on disk.
#[derive(Debug, Deserialize, Clone)]
pub struct FilesConfig {
    pub data_config: PathBuf,
    pub mapping: PathBuf,
}

/// Connection settings shared by the DBaaS aggregator and the backup daemon.
#[derive(Debug, Deserialize, Clone)]
pub struct EndpointConfig {
    pub url: String,
    /// `none` or `basic`. Basic auth reads base64 credentials from the
    /// environment variable named in `credentials_env`.
    #[serde(default = "default_auth")]
    pub auth: String,
    #[serde(default)]
    pub credentials_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl EndpointConfig {
    /// Resolve the basic-auth credential string from the configured
    /// environment variable. `None` when auth is disabled.
    ///
    /// The value must already be base64 (`user:password` encoded); it is
    /// validated here and sent verbatim in the `Authorization` header.
    pub fn credentials(&self) -> Result<Option<String>> {
        if self.auth != "basic" {
            return Ok(None);
        }
        let var = self
            .credentials_env
            .as_deref()
            .context("credentials_env is required when auth is 'basic'")?;
        let value = std::env::var(var)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", var))?;
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD
            .decode(&value)
            .with_context(|| format!("{} must hold base64-encoded credentials", var))?;
        Ok(Some(value))
    }
}

fn default_auth() -> String {
    "none".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GuardConfig {
    #[serde(default)]
    pub deny: Vec<DenyRule>,
}

/// One environment declared in the settings file.
#[derive(Debug, Deserialize, Clone)]
pub struct InstanceConfig {
    pub namespace: String,
    #[serde(default)]
    pub role: Option<String>,
    pub tenants: IndexMap<String, String>,
}

impl Settings {
    pub fn change_guard(&self) -> ChangeGuard {
        ChangeGuard::new(self.guard.deny.clone())
    }

    /// Construct the [`AppInstance`] declared under `name`.
    pub fn build_instance(&self, name: &str) -> Result<AppInstance> {
        let entry = self
            .instances
            .get(name)
            .with_context(|| format!("unknown instance: '{}'", name))?;
        let role = entry
            .role
            .as_deref()
            .map(|r| r.parse::<Role>())
            .transpose()
            .with_context(|| format!("instance '{}'", name))?;
        AppInstance::new(name, &entry.namespace, role, entry.tenants.clone())
            .with_context(|| format!("instance '{}'", name))
    }

    /// The instance declared with `role = "source"`.
    pub fn source_instance(&self) -> Result<AppInstance> {
        self.instance_with_role(Role::Source)
    }

    /// The instance declared with `role = "target"`.
    pub fn target_instance(&self) -> Result<AppInstance> {
        self.instance_with_role(Role::Target)
    }

    fn instance_with_role(&self, role: Role) -> Result<AppInstance> {
        let role_str = role.to_string();
        let name = self
            .instances
            .iter()
            .find(|(_, cfg)| cfg.role.as_deref() == Some(role_str.as_str()))
            .map(|(name, _)| name.clone())
            .with_context(|| format!("no instance with role '{}' configured", role))?;
        self.build_instance(&name)
    }
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

    let settings: Settings =
        toml::from_str(&content).with_context(|| "Failed to parse settings file")?;

    if settings.instances.is_empty() {
        bail!("at least one [instances.<name>] section is required");
    }

    for (name, instance) in &settings.instances {
        if instance.namespace.is_empty() {
            bail!("instance '{}': namespace must be a non-empty string", name);
        }
        if instance.tenants.is_empty() {
            bail!("instance '{}': at least one tenant is required", name);
        }
        if let Some(role) = instance.role.as_deref() {
            role.parse::<Role>()
                .with_context(|| format!("instance '{}'", name))?;
        }
    }

    for (section, endpoint) in [("dbaas", &settings.dbaas), ("backup", &settings.backup)] {
        if endpoint.url.is_empty() {
            bail!("{}.url must be a non-empty string", section);
        }
        match endpoint.auth.as_str() {
            "none" => {}
            "basic" => {
                if endpoint.credentials_env.is_none() {
                    bail!(
                        "{}.credentials_env is required when {}.auth is 'basic'",
                        section,
                        section
                    );
                }
            }
            other => bail!(
                "Unknown {}.auth mode: '{}'. Must be none or basic.",
                section,
                other
            ),
        }
    }

    Ok(settings)
}
