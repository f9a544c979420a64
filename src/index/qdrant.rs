//! Qdrant REST adapter for the index store contract

use std::time::Duration;

use reqwest::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;
use tracing::debug;

use super::IndexStore;
use super::Point;
use super::ScoredPoint;
use super::ScrollPoint;
use crate::errors::MarktRagError;
use crate::errors::Result;

/// HTTP client for a Qdrant cluster.
pub struct QdrantStore {
    client: Client,
    base_url: String,
}

impl QdrantStore {
    /// Create a new store client
    ///
    /// # Errors
    /// - HTTP client build errors (invalid configuration)
    /// - Invalid API key characters
    pub fn new(url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(key) = api_key {
            let value = reqwest::header::HeaderValue::from_str(key.trim())
                .map_err(|e| MarktRagError::Config(format!("invalid index API key: {e}")))?;
            headers.insert("api-key", value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| MarktRagError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
        })
    }

    /// Create from application config
    pub fn from_config(config: &crate::config::AppConfig) -> Result<Self> {
        Self::new(
            config.index_url(),
            config.index_api_key(),
            Duration::from_secs(config.index_timeout_secs()),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn check(response: reqwest::Response, operation: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(MarktRagError::ProviderFailure(format!(
            "Qdrant {operation} error ({status}): {error_text}"
        )))
    }
}

/// Transport-level error classification: deadline overruns become
/// `ProviderTimeout` so the reconciliation upsert loop can retry them.
fn transport_error(err: reqwest::Error) -> MarktRagError {
    if err.is_timeout() {
        MarktRagError::ProviderTimeout(format!("index store: {err}"))
    } else {
        MarktRagError::Http(err.to_string())
    }
}

#[async_trait::async_trait]
impl IndexStore for QdrantStore {
    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        offset: Option<Value>,
        filter: Option<Value>,
    ) -> Result<(Vec<ScrollPoint>, Option<Value>)> {
        #[derive(Serialize)]
        struct ScrollRequest {
            limit: usize,
            #[serde(skip_serializing_if = "Option::is_none")]
            offset: Option<Value>,
            #[serde(skip_serializing_if = "Option::is_none")]
            filter: Option<Value>,
            with_payload: bool,
            with_vector: bool,
        }

        #[derive(Deserialize)]
        struct ScrollResponse {
            result: ScrollResult,
        }

        #[derive(Deserialize)]
        struct ScrollResult {
            points: Vec<ScrollPoint>,
            #[serde(default)]
            next_page_offset: Option<Value>,
        }

        let url = self.url(&format!("/collections/{collection}/points/scroll"));
        debug!("Scrolling {} (limit {})", collection, limit);

        let request = ScrollRequest {
            limit,
            offset,
            filter,
            with_payload: true,
            with_vector: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        let response = Self::check(response, "scroll").await?;

        let body: ScrollResponse = response
            .json()
            .await
            .map_err(|e| MarktRagError::ProviderFailure(format!("scroll response: {e}")))?;

        Ok((body.result.points, body.result.next_page_offset))
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: Option<Value>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        #[derive(Serialize)]
        struct SearchRequest<'a> {
            vector: &'a [f32],
            #[serde(skip_serializing_if = "Option::is_none")]
            filter: Option<Value>,
            limit: usize,
            with_payload: bool,
        }

        #[derive(Deserialize)]
        struct SearchResponse {
            result: Vec<ScoredPoint>,
        }

        let url = self.url(&format!("/collections/{collection}/points/search"));
        debug!("Searching {} (limit {})", collection, limit);

        let request = SearchRequest {
            vector,
            filter,
            limit,
            with_payload: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        let response = Self::check(response, "search").await?;

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| MarktRagError::ProviderFailure(format!("search response: {e}")))?;

        Ok(body.result)
    }

    async fn upsert(&self, collection: &str, points: &[Point]) -> Result<()> {
        let url = self.url(&format!("/collections/{collection}/points?wait=true"));
        debug!("Upserting {} points into {}", points.len(), collection);

        let response = self
            .client
            .put(&url)
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(response, "upsert").await?;

        Ok(())
    }

    async fn set_payload(
        &self,
        collection: &str,
        payload: Value,
        point_ids: &[u64],
    ) -> Result<()> {
        let url = self.url(&format!("/collections/{collection}/points/payload?wait=true"));
        debug!(
            "Patching payload on {} points in {}",
            point_ids.len(),
            collection
        );

        let response = self
            .client
            .post(&url)
            .json(&json!({ "payload": payload, "points": point_ids }))
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(response, "set_payload").await?;

        Ok(())
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let url = self.url(&format!("/collections/{collection}"));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::check(response, "get_collection").await?;

        Ok(true)
    }

    async fn create_collection(&self, collection: &str, vector_size: usize) -> Result<()> {
        let url = self.url(&format!("/collections/{collection}"));
        debug!("Creating collection {} (size {})", collection, vector_size);

        let response = self
            .client
            .put(&url)
            .json(&json!({ "vectors": { "size": vector_size, "distance": "Cosine" } }))
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(response, "create_collection").await?;

        Ok(())
    }
}
