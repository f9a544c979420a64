use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_index_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_index_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub backtrace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// Backend kind: "openai" or "ollama".
    pub provider: String,
    pub model: String,
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Collection holding indexed offers for this embedding backend.
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Backend-specific salt mixed into deterministic point identifiers so
    /// two backends sharing a store never collide.
    #[serde(default)]
    pub id_salt: String,
}

fn default_collection() -> String {
    "offers".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub llm_endpoint: String,
    pub llm_key: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
}

fn default_llm_model() -> String {
    "qwen3:4b".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Upsert chunk size for new points.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Page size for the exhaustive catalog scan.
    #[serde(default = "default_scroll_page_size")]
    pub scroll_page_size: usize,
    /// Candidates retrieved per requested item.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

fn default_chunk_size() -> usize {
    100
}

fn default_scroll_page_size() -> usize {
    200
}

fn default_search_limit() -> usize {
    4
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            scroll_page_size: default_scroll_page_size(),
            search_limit: default_search_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub index: IndexConfig,
    pub logging: LoggingConfig,
    pub embeddings: EmbeddingsConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(crate::MarktRagError::Io)?;

        let config: AppConfig =
            toml::from_str(&content).map_err(crate::MarktRagError::TomlParsing)?;

        Ok(config)
    }

    /// Load configuration from default config file path
    pub fn load() -> crate::Result<Self> {
        // Try to load from config.toml first, then fall back to config.example.toml
        if Path::new("config.toml").exists() {
            Self::from_file("config.toml")
        } else if Path::new("config.example.toml").exists() {
            println!(
                "Warning: Using config.example.toml. Please create config.toml for production use."
            );
            Self::from_file("config.example.toml")
        } else {
            Err(crate::MarktRagError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config file found. Please create config.toml or config.example.toml",
            )))
        }
    }

    /// Get index store URL
    pub fn index_url(&self) -> &str {
        &self.index.url
    }

    /// Get index store API key
    pub fn index_api_key(&self) -> Option<&str> {
        self.index.api_key.as_deref()
    }

    /// Get index store request timeout in seconds
    pub fn index_timeout_secs(&self) -> u64 {
        self.index.timeout_secs
    }

    /// Get offers collection name
    pub fn collection(&self) -> &str {
        &self.embeddings.collection
    }

    /// Get embedding model name
    pub fn embedding_model(&self) -> &str {
        &self.embeddings.model
    }

    /// Get point identifier salt for the configured embedding backend
    pub fn id_salt(&self) -> &str {
        &self.embeddings.id_salt
    }

    /// Get LLM endpoint
    pub fn llm_endpoint(&self) -> &str {
        &self.llm.llm_endpoint
    }

    /// Get LLM key
    pub fn llm_key(&self) -> &str {
        &self.llm.llm_key
    }

    /// Get LLM model
    pub fn llm_model(&self) -> &str {
        &self.llm.llm_model
    }

    /// Get upsert chunk size
    pub fn chunk_size(&self) -> usize {
        self.ingest.chunk_size
    }

    /// Get catalog scan page size
    pub fn scroll_page_size(&self) -> usize {
        self.ingest.scroll_page_size
    }

    /// Get per-item candidate limit
    pub fn search_limit(&self) -> usize {
        self.ingest.search_limit
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            index: IndexConfig {
                url: "http://localhost:6333".to_string(),
                api_key: None,
                timeout_secs: default_index_timeout_secs(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                backtrace: true,
            },
            embeddings: EmbeddingsConfig {
                provider: "ollama".to_string(),
                model: "qwen3-embedding:4b".to_string(),
                endpoint: "http://localhost:11434".to_string(),
                api_key: None,
                collection: default_collection(),
                id_salt: String::new(),
            },
            llm: LlmConfig {
                llm_endpoint: "http://localhost:11434".to_string(),
                llm_key: "ollama".to_string(),
                llm_model: default_llm_model(),
            },
            ingest: IngestConfig::default(),
        }
    }
}
