//! RAG (Retrieval-Augmented Generation) module
//!
//! This module turns one free-text product query into a set of best-matching
//! offers, one per requested item:
//! - Query decomposition into product search terms
//! - Per-term candidate retrieval using vector embeddings
//! - LLM-based selection of at most one offer per term plus a rationale
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use marktrag::config::AppConfig;
//! use marktrag::embeddings::EmbeddingClient;
//! use marktrag::index::QdrantStore;
//! use marktrag::llm::GenerationClient;
//! use marktrag::rag::{RagService, Retriever};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let store = Arc::new(QdrantStore::from_config(&config)?);
//!     let embedder = Arc::new(EmbeddingClient::from_config(&config)?);
//!     let llm = Arc::new(GenerationClient::from_config(&config)?);
//!
//!     let retriever = Retriever::new(store, embedder, config.collection());
//!     let service = RagService::new(retriever, llm, config.search_limit());
//!
//!     let result = service.query("banana and cheap cereal", "10115").await?;
//!     println!("{}", result.recommendation);
//!
//!     Ok(())
//! }
//! ```

pub mod extract;
pub mod pipeline;
pub mod prompts;
pub mod retriever;

pub use pipeline::RagService;
pub use retriever::Retriever;

use crate::models::Offer;

/// Per-query candidate sets: one ordered list of offers per decomposed term,
/// in decomposed-term order. Never persisted.
pub type CandidateSet = Vec<(String, Vec<Offer>)>;
