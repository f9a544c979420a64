//! Embeddings generation module
//!
//! This module provides the embedding capability used to vectorize offers and
//! query terms, with two HTTP backends:
//! - OpenAI-compatible endpoints (native batch support)
//! - Ollama (local models, batched client-side)
//!
//! # Examples
//!
//! ```rust,no_run
//! use marktrag::embeddings::{EmbeddingClient, EmbeddingProvider};
//! use marktrag::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let client = EmbeddingClient::from_config(&config)?;
//!
//!     let embedding = client.embed("chocolate ice cream").await?;
//!     println!("Generated embedding with {} dimensions", embedding.len());
//!
//!     Ok(())
//! }
//! ```

pub mod client;

pub use client::EmbeddingBackend;
pub use client::EmbeddingClient;

use async_trait::async_trait;

use crate::errors::Result;

/// Maximum batch size per embedding request
pub const MAX_BATCH_SIZE: usize = 100;

/// Capability interface for embedding backends. The backing model determines
/// the vector dimension; callers probe it with a one-text call when they need
/// it (e.g. to size a new collection).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, preserving input order
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
