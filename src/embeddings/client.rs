//! Embedding API clients for the supported providers

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::EmbeddingProvider;
use super::MAX_BATCH_SIZE;
use crate::errors::MarktRagError;
use crate::errors::Result;

/// Supported embedding backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// OpenAI-compatible embeddings API
    OpenAi,
    /// Ollama local embeddings
    Ollama,
}

impl EmbeddingBackend {
    /// Parse a backend name from configuration
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(MarktRagError::Config(format!(
                "unknown embedding provider '{other}' (expected 'openai' or 'ollama')"
            ))),
        }
    }
}

/// Client for generating embeddings from the configured backend
pub struct EmbeddingClient {
    backend: EmbeddingBackend,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl EmbeddingClient {
    /// Create a new embedding client
    ///
    /// # Errors
    /// - HTTP client build errors (invalid configuration)
    pub fn new(
        backend: EmbeddingBackend,
        model: String,
        endpoint: String,
        api_key: Option<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .pool_max_idle_per_host(100)
            .pool_idle_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MarktRagError::Http(e.to_string()))?;

        Ok(Self {
            backend,
            model,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// Create from application config
    pub fn from_config(config: &crate::config::AppConfig) -> Result<Self> {
        Self::new(
            EmbeddingBackend::from_name(&config.embeddings.provider)?,
            config.embeddings.model.clone(),
            config.embeddings.endpoint.clone(),
            config.embeddings.api_key.clone(),
        )
    }

    /// Generate embedding using an OpenAI-compatible API
    async fn embed_openai(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            MarktRagError::Config("embeddings API key not provided".to_string())
        })?;

        #[derive(Serialize)]
        struct OpenAiRequest<'a> {
            input: &'a [String],
            model: &'a str,
        }

        #[derive(Deserialize)]
        struct OpenAiResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
        }

        let url = format!("{}/embeddings", self.endpoint);
        debug!("Calling embeddings API: {} ({} items)", url, texts.len());

        let request = OpenAiRequest {
            input: texts,
            model: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MarktRagError::ProviderFailure(format!(
                "embeddings API error ({status}): {error_text}"
            )));
        }

        let result: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| MarktRagError::ProviderFailure(format!("Failed to parse response: {e}")))?;

        if result.data.len() != texts.len() {
            return Err(MarktRagError::ProviderFailure(format!(
                "embeddings API returned {} vectors for {} inputs",
                result.data.len(),
                texts.len()
            )));
        }

        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Generate embedding using Ollama API
    async fn embed_ollama(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct OllamaRequest<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            embedding: Vec<f32>,
        }

        let url = format!("{}/api/embeddings", self.endpoint);
        debug!("Calling Ollama embeddings API: {}", url);

        let request = OllamaRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MarktRagError::ProviderFailure(format!(
                "Ollama API error ({status}): {error_text}"
            )));
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| MarktRagError::ProviderFailure(format!("Failed to parse response: {e}")))?;

        Ok(result.embedding)
    }

    /// Ollama has no batch endpoint; fan out with bounded concurrency
    async fn embed_many_ollama(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use futures::stream::StreamExt;
        use futures::stream::{
            self,
        };

        let concurrency = std::cmp::min(texts.len().max(1), 16);
        let results: Vec<Result<Vec<f32>>> = stream::iter(texts.iter().cloned())
            .map(|text| async move { self.embed_ollama(&text).await })
            .buffered(concurrency)
            .collect()
            .await;

        let mut embeddings = Vec::with_capacity(results.len());
        for result in results {
            embeddings.push(result?);
        }

        Ok(embeddings)
    }
}

/// Deadline overruns map to `ProviderTimeout`, everything else to `Http`.
fn classify_transport_error(err: reqwest::Error) -> MarktRagError {
    if err.is_timeout() {
        MarktRagError::ProviderTimeout(format!("embedding provider: {err}"))
    } else {
        MarktRagError::Http(err.to_string())
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self.backend {
            EmbeddingBackend::OpenAi => {
                let input = [text.to_string()];
                let mut vectors = self.embed_openai(&input).await?;
                vectors.pop().ok_or_else(|| {
                    MarktRagError::ProviderFailure("No embedding in response".to_string())
                })
            }
            EmbeddingBackend::Ollama => self.embed_ollama(text).await,
        }
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        match self.backend {
            EmbeddingBackend::OpenAi => {
                if texts.len() <= MAX_BATCH_SIZE {
                    return self.embed_openai(texts).await;
                }
                // Split into chunks
                let mut all_embeddings = Vec::with_capacity(texts.len());
                for chunk in texts.chunks(MAX_BATCH_SIZE) {
                    let chunk_embeddings = self.embed_openai(chunk).await?;
                    all_embeddings.extend(chunk_embeddings);
                }
                Ok(all_embeddings)
            }
            EmbeddingBackend::Ollama => self.embed_many_ollama(texts).await,
        }
    }
}
