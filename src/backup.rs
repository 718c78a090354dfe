//! postgres-backup-daemon API client.
//!
//! Implements [`BackupApi`] over the daemon's REST endpoints with the same
//! transport policy as the aggregator client: JSON, optional basic auth,
//! retry with backoff on 429/5xx/network errors.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::EndpointConfig;
use crate::models::BackupStatus;
use crate::traits::BackupApi;

pub struct BackupDaemon {
    url: String,
    credentials: Option<String>,
    client: reqwest::Client,
    max_retries: u32,
}

impl BackupDaemon {
    pub fn new(config: &EndpointConfig) -> Result<Self> {
        let credentials = config.credentials()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            credentials,
            client,
            max_retries: config.max_retries,
        })
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.url, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let mut req = self
                .client
                .request(method.clone(), &url)
                .header("Accept", "application/json");
            if let Some(ref credentials) = self.credentials {
                req = req.header("Authorization", format!("Basic {}", credentials));
            }
            if let Some(body) = body {
                req = req.json(body);
            }

            debug!(%method, %url, attempt, "backup daemon request");
            match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.as_u16() == 429 || status.is_server_error() {
                        let text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow!("backup daemon error {}: {}", status, text));
                        continue;
                    }
                    if !status.is_success() {
                        let text = response.text().await.unwrap_or_default();
                        bail!("backup daemon error {}: {}", status, text);
                    }
                    return Ok(response);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("backup daemon request failed after retries")))
    }
}

#[async_trait]
impl BackupApi for BackupDaemon {
    async fn trigger_backup(&self, databases: &[String]) -> Result<String> {
        let body = json!({ "databases": databases });
        let response = self.request(Method::POST, "/backup", Some(&body)).await?;
        let json: Value = response.json().await?;
        parse_backup_id(&json)
    }

    async fn backup_status(&self, backup_id: &str) -> Result<BackupStatus> {
        let path = format!("/backup/{}/status", backup_id);
        let response = self.request(Method::GET, &path, None).await?;
        let json: Value = response.json().await?;
        parse_backup_status(backup_id, &json)
    }

    async fn trigger_restore(&self, backup_id: &str, databases: &[String]) -> Result<()> {
        let body = json!({ "backup_id": backup_id, "databases": databases });
        self.request(Method::POST, "/restore", Some(&body)).await?;
        Ok(())
    }
}

fn parse_backup_id(json: &Value) -> Result<String> {
    json.get("backup_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("backup daemon response has no backup_id"))
}

fn parse_backup_status(backup_id: &str, json: &Value) -> Result<BackupStatus> {
    let status = json
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("backup daemon status response has no status"))?
        .to_string();
    Ok(BackupStatus {
        backup_id: backup_id.to_string(),
        status,
        created: json
            .get("created")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok()),
        message: json
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}
