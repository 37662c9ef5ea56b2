//! The FHIR server protocol surface the bulk orchestrator consumes (§6): a
//! `CapabilityStatement` read, per-type counts, and paged search. The rest of
//! a FHIR server (CRUD, transaction processing, search parameter indexing) is
//! explicitly out of scope (§1) — the orchestrator only ever talks to a FHIR
//! server through this trait.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FhirClientError {
    #[error("request to FHIR server timed out")]
    Timeout,
    #[error("FHIR server unreachable: {0}")]
    NetworkError(String),
    #[error("FHIR server returned HTTP {0}")]
    HttpStatus(u16),
    #[error("could not parse FHIR server response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, FhirClientError>;

/// One page of a `resourceType?_count&_offset` search.
#[derive(Debug, Clone, Default)]
pub struct ResourcePage {
    pub resources: Vec<(String, Value)>, // (resource.id, resource body)
    pub total: Option<u64>,
}

#[async_trait]
pub trait FhirServerClient: Send + Sync {
    /// Resource types advertised by `GET /metadata`'s `CapabilityStatement`.
    async fn resource_types(&self) -> Result<Vec<String>>;

    /// `GET /{type}?_count=0&_total=accurate`, returning the declared total.
    async fn count(&self, resource_type: &str) -> Result<u64>;

    /// `GET /{type}?_count&_offset`.
    async fn search_page(&self, resource_type: &str, offset: u64, count: u32) -> Result<ResourcePage>;

    /// `GET /{type}/{id}` (§6 "read"). Used by the `validate-by-ids` API path,
    /// which fetches each resource fresh before handing it to the pipeline.
    async fn read(&self, resource_type: &str, id: &str) -> Result<Value>;
}

pub struct ReqwestFhirServerClient {
    http: reqwest::Client,
    base_url: String,
}

impl ReqwestFhirServerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder().timeout(timeout).build().unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self.http.get(url).header("Accept", "application/fhir+json").send().await.map_err(|e| {
            if e.is_timeout() {
                FhirClientError::Timeout
            } else {
                FhirClientError::NetworkError(e.to_string())
            }
        })?;
        if !response.status().is_success() {
            return Err(FhirClientError::HttpStatus(response.status().as_u16()));
        }
        response.json::<Value>().await.map_err(|e| FhirClientError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl FhirServerClient for ReqwestFhirServerClient {
    async fn resource_types(&self) -> Result<Vec<String>> {
        let body = self.get_json(&format!("{}/metadata", self.base_url)).await?;
        let types = body
            .get("rest")
            .and_then(|r| r.as_array())
            .and_then(|rest| rest.first())
            .and_then(|r| r.get("resource"))
            .and_then(|r| r.as_array())
            .map(|resources| {
                resources
                    .iter()
                    .filter_map(|r| r.get("type").and_then(|t| t.as_str()).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(types)
    }

    async fn count(&self, resource_type: &str) -> Result<u64> {
        let url = format!("{}/{resource_type}?_count=0&_total=accurate", self.base_url);
        let body = self.get_json(&url).await?;
        Ok(body.get("total").and_then(|t| t.as_u64()).unwrap_or(0))
    }

    async fn search_page(&self, resource_type: &str, offset: u64, count: u32) -> Result<ResourcePage> {
        let url = format!("{}/{resource_type}?_count={count}&_offset={offset}&_total=accurate", self.base_url);
        let body = self.get_json(&url).await?;
        let total = body.get("total").and_then(|t| t.as_u64());
        let resources = body
            .get("entry")
            .and_then(|e| e.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let resource = entry.get("resource")?;
                        let id = resource.get("id").and_then(|i| i.as_str())?.to_string();
                        Some((id, resource.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(ResourcePage { resources, total })
    }

    async fn read(&self, resource_type: &str, id: &str) -> Result<Value> {
        let url = format!("{}/{resource_type}/{id}", self.base_url);
        self.get_json(&url).await
    }
}
