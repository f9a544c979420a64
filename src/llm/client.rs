//! Generation API clients for the supported providers

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::GenerationOptions;
use super::GenerationProvider;
use crate::errors::MarktRagError;
use crate::errors::Result;

/// Supported generation backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationBackend {
    /// OpenAI-compatible chat completions API
    OpenAi,
    /// Ollama local generation
    Ollama,
}

/// Client for the configured generation backend
pub struct GenerationClient {
    backend: GenerationBackend,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl GenerationClient {
    /// Create a new generation client
    ///
    /// # Errors
    /// - HTTP client build errors (invalid configuration)
    pub fn new(
        backend: GenerationBackend,
        model: String,
        endpoint: String,
        api_key: Option<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
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
    ///
    /// The backend is inferred from the configured key: the literal key
    /// "ollama" selects the Ollama API, anything else an OpenAI-compatible
    /// chat endpoint.
    pub fn from_config(config: &crate::config::AppConfig) -> Result<Self> {
        let backend = if config.llm_key() == "ollama" {
            GenerationBackend::Ollama
        } else {
            GenerationBackend::OpenAi
        };

        let api_key = match backend {
            GenerationBackend::OpenAi => Some(config.llm_key().to_string()),
            GenerationBackend::Ollama => None,
        };

        Self::new(
            backend,
            config.llm_model().to_string(),
            config.llm_endpoint().to_string(),
            api_key,
        )
    }

    /// Generate via an OpenAI-compatible chat completions API
    async fn generate_openai(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| MarktRagError::Config("LLM API key not provided".to_string()))?;

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ChatMessage,
        }

        #[derive(Deserialize)]
        struct ChatMessage {
            content: String,
        }

        let url = format!("{}/chat/completions", self.endpoint);
        debug!("Calling chat completions API: {}", url);

        let mut request = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": options.temperature,
        });
        if options.json_output {
            request["response_format"] = json!({ "type": "json_object" });
        }

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
                "chat API error ({status}): {error_text}"
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| MarktRagError::ProviderFailure(format!("Failed to parse response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| MarktRagError::ProviderFailure("No choices in response".to_string()))
    }

    /// Generate via the Ollama API
    async fn generate_ollama(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        #[derive(Serialize)]
        struct OllamaRequest<'a> {
            model: &'a str,
            prompt: &'a str,
            stream: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            format: Option<&'a str>,
            options: OllamaOptions,
        }

        #[derive(Serialize)]
        struct OllamaOptions {
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            response: String,
        }

        let url = format!("{}/api/generate", self.endpoint);
        debug!("Calling Ollama generate API: {}", url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: options.json_output.then_some("json"),
            options: OllamaOptions {
                temperature: options.temperature,
            },
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

        Ok(result.response)
    }
}

/// Deadline overruns map to `ProviderTimeout`, everything else to `Http`.
fn classify_transport_error(err: reqwest::Error) -> MarktRagError {
    if err.is_timeout() {
        MarktRagError::ProviderTimeout(format!("generation provider: {err}"))
    } else {
        MarktRagError::Http(err.to_string())
    }
}

#[async_trait]
impl GenerationProvider for GenerationClient {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        match self.backend {
            GenerationBackend::OpenAi => self.generate_openai(prompt, options).await,
            GenerationBackend::Ollama => self.generate_ollama(prompt, options).await,
        }
    }
}
