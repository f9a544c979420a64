//! In-memory fakes of the capability interfaces, used to drive the catalog
//! and retrieval pipelines without live backends.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use marktrag::embeddings::EmbeddingProvider;
use marktrag::errors::MarktRagError;
use marktrag::errors::Result;
use marktrag::index::IndexStore;
use marktrag::index::Point;
use marktrag::index::ScoredPoint;
use marktrag::index::ScrollPoint;
use marktrag::llm::GenerationOptions;
use marktrag::llm::GenerationProvider;
use marktrag::models::RawOfferRow;
use marktrag::models::RawPrice;
use serde_json::json;
use serde_json::Value;

/// Build a raw scraper row with a numeric price.
pub fn raw_row(name: &str, price: f64, store: &str) -> RawOfferRow {
    RawOfferRow {
        category: Some("test".to_string()),
        product_name: Some(name.to_string()),
        price: Some(RawPrice::Number(price)),
        product_url: None,
        store_name: Some(store.to_string()),
    }
}

struct Collection {
    vector_size: usize,
    points: BTreeMap<u64, (Vec<f32>, Value)>,
}

/// Vector store fake with cosine-ordered search, filtered scroll and
/// scriptable upsert failures.
#[derive(Default)]
pub struct InMemoryStore {
    collections: Mutex<HashMap<String, Collection>>,
    upsert_failures: Mutex<VecDeque<MarktRagError>>,
    upsert_sizes: Mutex<Vec<usize>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue failures returned by the next upsert calls, in order.
    pub fn fail_next_upserts(&self, failures: Vec<MarktRagError>) {
        self.upsert_failures.lock().unwrap().extend(failures);
    }

    /// Chunk sizes of every attempted upsert, including failed ones.
    pub fn upsert_sizes(&self) -> Vec<usize> {
        self.upsert_sizes.lock().unwrap().clone()
    }

    pub fn point_count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map_or(0, |c| c.points.len())
    }

    pub fn vector_size(&self, collection: &str) -> Option<usize> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|c| c.vector_size)
    }

    pub fn payloads(&self, collection: &str) -> Vec<Value> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map_or_else(Vec::new, |c| {
                c.points.values().map(|(_, payload)| payload.clone()).collect()
            })
    }
}

fn matches_filter(payload: &Value, filter: Option<&Value>) -> bool {
    let Some(filter) = filter else { return true };
    let Some(conditions) = filter.get("must").and_then(Value::as_array) else {
        return true;
    };
    conditions.iter().all(|condition| {
        let Some(key) = condition.get("key").and_then(Value::as_str) else {
            return false;
        };
        let actual = payload.get(key);
        let Some(matcher) = condition.get("match") else {
            return false;
        };
        if let Some(expected) = matcher.get("value") {
            actual == Some(expected)
        } else if let Some(any) = matcher.get("any").and_then(Value::as_array) {
            actual.is_some_and(|value| any.contains(value))
        } else {
            false
        }
    })
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl IndexStore for InMemoryStore {
    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        offset: Option<Value>,
        filter: Option<Value>,
    ) -> Result<(Vec<ScrollPoint>, Option<Value>)> {
        let collections = self.collections.lock().unwrap();
        let coll = collections.get(collection).ok_or_else(|| {
            MarktRagError::ProviderFailure(format!("collection {collection} not found"))
        })?;

        let matching: Vec<ScrollPoint> = coll
            .points
            .iter()
            .filter(|(_, (_, payload))| matches_filter(payload, filter.as_ref()))
            .map(|(id, (_, payload))| ScrollPoint {
                id: *id,
                payload: payload.clone(),
            })
            .collect();

        let start = offset
            .and_then(|v| v.as_u64())
            .map_or(0, |v| v as usize);
        let end = usize::min(start + limit, matching.len());
        let page = matching[start.min(matching.len())..end].to_vec();
        let next = (end < matching.len()).then(|| json!(end));

        Ok((page, next))
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: Option<Value>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.lock().unwrap();
        let coll = collections.get(collection).ok_or_else(|| {
            MarktRagError::ProviderFailure(format!("collection {collection} not found"))
        })?;

        let mut scored: Vec<ScoredPoint> = coll
            .points
            .iter()
            .filter(|(_, (_, payload))| matches_filter(payload, filter.as_ref()))
            .map(|(id, (point_vector, payload))| ScoredPoint {
                id: *id,
                score: cosine(vector, point_vector),
                payload: payload.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        scored.truncate(limit);

        Ok(scored)
    }

    async fn upsert(&self, collection: &str, points: &[Point]) -> Result<()> {
        self.upsert_sizes.lock().unwrap().push(points.len());

        if let Some(failure) = self.upsert_failures.lock().unwrap().pop_front() {
            return Err(failure);
        }

        let mut collections = self.collections.lock().unwrap();
        let coll = collections.get_mut(collection).ok_or_else(|| {
            MarktRagError::ProviderFailure(format!("collection {collection} not found"))
        })?;
        for point in points {
            coll.points
                .insert(point.id, (point.vector.clone(), point.payload.clone()));
        }
        Ok(())
    }

    async fn set_payload(
        &self,
        collection: &str,
        payload: Value,
        point_ids: &[u64],
    ) -> Result<()> {
        let mut collections = self.collections.lock().unwrap();
        let coll = collections.get_mut(collection).ok_or_else(|| {
            MarktRagError::ProviderFailure(format!("collection {collection} not found"))
        })?;
        let patch = payload
            .as_object()
            .ok_or_else(|| MarktRagError::ProviderFailure("payload patch not an object".into()))?
            .clone();
        for id in point_ids {
            if let Some((_, existing)) = coll.points.get_mut(id) {
                if let Some(object) = existing.as_object_mut() {
                    for (key, value) in &patch {
                        object.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        Ok(())
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.lock().unwrap().contains_key(collection))
    }

    async fn create_collection(&self, collection: &str, vector_size: usize) -> Result<()> {
        self.collections.lock().unwrap().insert(
            collection.to_string(),
            Collection {
                vector_size,
                points: BTreeMap::new(),
            },
        );
        Ok(())
    }
}

/// Deterministic bag-of-tokens embedder: texts sharing tokens get similar
/// vectors, which is enough to drive cosine retrieval in tests.
pub struct FakeEmbedder {
    pub dimension: usize,
}

impl Default for FakeEmbedder {
    fn default() -> Self {
        Self { dimension: 16 }
    }
}

impl FakeEmbedder {
    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
            for byte in token.bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
            vector[(hash % self.dimension as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}

/// Generation fake replaying scripted responses and recording every prompt.
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompt_log(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(MarktRagError::ProviderFailure(
                    "no scripted response left".to_string(),
                ))
            })
    }
}
