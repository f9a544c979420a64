//! Generation provider module
//!
//! The generation capability behind query decomposition and offer selection.
//! Output is free text with no determinism guarantee across calls; callers
//! that need structure ask for JSON output and run the extraction fallback
//! chain over the response.

pub mod client;

pub use client::GenerationBackend;
pub use client::GenerationClient;

use async_trait::async_trait;

use crate::errors::Result;

/// Sampling options for one generation call.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub temperature: f32,
    /// Ask the backend for structured JSON output where supported.
    pub json_output: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            json_output: false,
        }
    }
}

/// Capability interface for text generation backends.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;
}
