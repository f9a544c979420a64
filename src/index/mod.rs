//! Index store capability
//!
//! This module defines the contract over the vector store's
//! scroll/search/upsert/set-payload primitives that the catalog and the
//! retrieval pipeline depend on, plus the Qdrant REST adapter implementing it.
//! The trait is injected (`Arc<dyn IndexStore>`) so components stay testable
//! with in-memory fakes.

pub mod qdrant;

pub use qdrant::QdrantStore;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;

use crate::errors::Result;

/// A point to persist: identifier, embedding vector, and JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: Value,
}

/// A stored point returned by a paginated scan.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrollPoint {
    pub id: u64,
    pub payload: Value,
}

/// A point returned by similarity search.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    pub id: u64,
    pub score: f32,
    pub payload: Value,
}

/// Contract over the vector store primitives.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// One page of a paginated scan. Exhaustive pagination terminates when
    /// the returned page is empty or the next cursor is absent.
    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        offset: Option<Value>,
        filter: Option<Value>,
    ) -> Result<(Vec<ScrollPoint>, Option<Value>)>;

    /// Similarity search, highest similarity first; ties break in the store's
    /// native order.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: Option<Value>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>>;

    async fn upsert(&self, collection: &str, points: &[Point]) -> Result<()>;

    /// Merge a payload patch into the given points.
    async fn set_payload(
        &self,
        collection: &str,
        payload: Value,
        point_ids: &[u64],
    ) -> Result<()>;

    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    /// Create a collection with the given vector size and cosine distance.
    async fn create_collection(&self, collection: &str, vector_size: usize) -> Result<()>;
}

/// Filter requiring `key` to equal any of `values`.
#[must_use]
pub fn match_any_filter(key: &str, values: &[&str]) -> Value {
    json!({ "must": [{ "key": key, "match": { "any": values } }] })
}

/// Filter requiring `key` to equal exactly `value`.
#[must_use]
pub fn match_value_filter(key: &str, value: &str) -> Value {
    json!({ "must": [{ "key": key, "match": { "value": value } }] })
}
