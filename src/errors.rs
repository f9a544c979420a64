use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarktRagError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Provider timeout: {0}")]
    ProviderTimeout(String),

    #[error("Provider failure: {0}")]
    ProviderFailure(String),

    #[error("Parse failure: {0}")]
    ParseFailure(String),

    #[error("Partial ingestion: {committed} points committed before failure: {source}")]
    PartialIngestion {
        committed: usize,
        #[source]
        source: Box<MarktRagError>,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MarktRagError {
    /// Whether this error was classified as a provider deadline overrun.
    /// Only the reconciliation upsert loop treats timeouts as retryable.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::ProviderTimeout(_))
    }
}

pub type Result<T> = std::result::Result<T, MarktRagError>;
