//! DBaaS aggregator API client.
//!
//! Implements [`AggregatorApi`] over the aggregator's REST endpoints.
//! Transport policy follows the other service clients in this codebase:
//! JSON in and out, optional basic auth, bounded retries with exponential
//! backoff for rate limits (429), server errors (5xx), and network failures;
//! other client errors fail immediately. Response parsing is kept in pure
//! `parse_*` functions so it can be tested without a server.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use crate::config::EndpointConfig;
use crate::models::{Classifier, DbInfo};
use crate::traits::AggregatorApi;

pub struct DbaasAggregator {
    url: String,
    credentials: Option<String>,
    client: reqwest::Client,
    max_retries: u32,
}

impl DbaasAggregator {
    /// Create a client from endpoint settings.
    ///
    /// # Errors
    ///
    /// Returns an error when basic auth is configured but the credentials
    /// environment variable is unset or not valid base64.
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

    /// Issue one API request with retry/backoff.
    ///
    /// Retries 429, 5xx, and network errors; every other response is
    /// returned to the caller, which decides what the status means for its
    /// operation (404 is a legitimate "absent" for classifier lookups).
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
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
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

            debug!(%method, %url, attempt, "DBaaS request");
            match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.as_u16() == 429 || status.is_server_error() {
                        let text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow!("DBaaS API error {}: {}", status, text));
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("DBaaS request failed after retries")))
    }
}

#[async_trait]
impl AggregatorApi for DbaasAggregator {
    async fn database_list(&self, namespace: &str) -> Result<Vec<DbInfo>> {
        let path = format!("/api/v3/dbaas/namespaces/{}/databases/list", namespace);
        let response = self.request(Method::GET, &path, None).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("DBaaS API error {}: {}", status, text);
        }
        let json: Value = response.json().await?;
        Ok(parse_database_list(namespace, &json))
    }

    async fn get_by_classifier(
        &self,
        namespace: &str,
        dbtype: &str,
        classifier: &Classifier,
    ) -> Result<Option<DbInfo>> {
        let path = format!(
            "/api/v3/dbaas/namespaces/{}/databases/get-by-classifier/{}",
            namespace, dbtype
        );
        let body = Value::Object(classifier.clone());
        let response = self.request(Method::POST, &path, Some(&body)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let json: Value = response.json().await?;
                Ok(Some(parse_db_info(namespace, &json)?))
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                bail!("DBaaS API error {}: {}", status, text);
            }
        }
    }

    async fn reset_password(
        &self,
        namespace: &str,
        dbtype: &str,
        classifier: &Classifier,
    ) -> Result<()> {
        let path = format!(
            "/api/v3/dbaas/namespaces/{}/databases/reset-password/{}",
            namespace, dbtype
        );
        let body = Value::Object(classifier.clone());
        let response = self.request(Method::POST, &path, Some(&body)).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("DBaaS API error {}: {}", status, text);
        }
        Ok(())
    }
}

/// Parse the database list response, skipping malformed records.
///
/// A record missing a required field is reported and dropped; its siblings
/// survive. An empty array parses to an empty vector.
fn parse_database_list(namespace: &str, json: &Value) -> Vec<DbInfo> {
    let items = match json.as_array() {
        Some(items) => items,
        None => {
            error!("invalid database list response: expected an array");
            return Vec::new();
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match parse_db_info(namespace, item) {
            Ok(info) => records.push(info),
            Err(err) => error!(%err, "skipping malformed database record"),
        }
    }
    records
}

/// Parse one aggregator record into a [`DbInfo`].
///
/// The microservice name comes from the classifier's `microserviceName`
/// field; the record's own `namespace` wins over the queried one when
/// present.
fn parse_db_info(namespace: &str, item: &Value) -> Result<DbInfo> {
    let classifier = item
        .get("classifier")
        .and_then(Value::as_object)
        .ok_or_else(|| anyhow!("record has no classifier object"))?
        .clone();
    let microservice = classifier
        .get("microserviceName")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("classifier has no microserviceName"))?
        .to_string();
    let dbtype = item
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("record has no type"))?
        .to_string();
    let database = item
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("record has no name"))?
        .to_string();
    let username = item
        .get("connectionProperties")
        .and_then(|c| c.get("username"))
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("record has no connection username"))?
        .to_string();
    let namespace = item
        .get("namespace")
        .and_then(Value::as_str)
        .unwrap_or(namespace)
        .to_string();

    Ok(DbInfo {
        namespace,
        microservice,
        dbtype,
        classifier,
        database,
        username,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> Value {
        json!({
            "name": "svc_db_1",
            "namespace": "shop-dev-1",
            "type": "postgresql",
            "classifier": {
                "namespace": "shop-dev-1",
                "tenantId": "t-100",
                "microserviceName": "order-svc",
            },
            "connectionProperties": { "username": "order_user" },
        })
    }

    #[test]
    fn parses_complete_record() {
        let info = parse_db_info("shop-dev-1", &record()).unwrap();
        assert_eq!(info.microservice, "order-svc");
        assert_eq!(info.dbtype, "postgresql");
        assert_eq!(info.database, "svc_db_1");
        assert_eq!(info.username, "order_user");
        assert_eq!(info.namespace, "shop-dev-1");
    }

    #[test]
    fn record_without_namespace_inherits_queried_one() {
        let mut item = record();
        item.as_object_mut().unwrap().remove("namespace");
        let info = parse_db_info("shop-dev-9", &item).unwrap();
        assert_eq!(info.namespace, "shop-dev-9");
    }

    #[test]
    fn record_missing_required_field_is_an_error() {
        for field in ["name", "type", "classifier", "connectionProperties"] {
            let mut item = record();
            item.as_object_mut().unwrap().remove(field);
            assert!(
                parse_db_info("shop-dev-1", &item).is_err(),
                "missing '{}' should fail",
                field
            );
        }
    }

    #[test]
    fn list_skips_malformed_records_and_keeps_valid_ones() {
        let mut broken = record();
        broken.as_object_mut().unwrap().remove("type");
        let listing = json!([record(), broken, record()]);

        let records = parse_database_list("shop-dev-1", &listing);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn empty_listing_parses_to_empty_vec() {
        assert!(parse_database_list("shop-dev-1", &json!([])).is_empty());
    }
}
