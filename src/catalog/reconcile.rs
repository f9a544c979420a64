//! Catalog reconciliation: merge scraped offer batches into the indexed
//! catalog without duplicating previously seen offers.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::embeddings::EmbeddingProvider;
use crate::errors::MarktRagError;
use crate::errors::Result;
use crate::index::IndexStore;
use crate::index::Point;
use crate::models::Offer;
use crate::models::RawOfferRow;
use crate::models::REGION_ALL;
use crate::normalizer;

/// Default number of points per upsert request.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Chunk size floor below which a timed-out upsert is no longer retried.
pub const MIN_CHUNK_SIZE: usize = 20;

/// Fixed text used to probe the embedding backend's vector dimension when a
/// collection has to be created.
const DIMENSION_PROBE_TEXT: &str = "dimension probe";

/// Point identifiers stay within a 12-digit range.
const POINT_ID_RANGE: u64 = 1_000_000_000_000;

/// Counters for one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Rows that survived normalization.
    pub accepted: usize,
    /// Rows dropped by validation.
    pub rejected: usize,
    /// Rows dropped because their dedup key already appeared earlier in the
    /// same batch.
    pub batch_duplicates: usize,
    /// Accepted offers whose dedup key was already in the catalog.
    pub known: usize,
    /// Known entries whose region was promoted to `ALL`.
    pub broadened: usize,
    /// Newly indexed entries.
    pub inserted: usize,
}

/// Merges a batch of scraped offers for one region into one collection.
pub struct ReconcileEngine {
    store: Arc<dyn IndexStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    collection: String,
    id_salt: String,
    chunk_size: usize,
    scroll_page_size: usize,
}

impl ReconcileEngine {
    /// Create a new engine for one collection
    pub fn new(
        store: Arc<dyn IndexStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        collection: impl Into<String>,
        id_salt: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            collection: collection.into(),
            id_salt: id_salt.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            scroll_page_size: 200,
        }
    }

    /// Create from application config
    pub fn from_config(
        config: &crate::config::AppConfig,
        store: Arc<dyn IndexStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self::new(store, embedder, config.collection(), config.id_salt())
            .with_chunk_size(config.chunk_size())
            .with_scroll_page_size(config.scroll_page_size())
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    #[must_use]
    pub fn with_scroll_page_size(mut self, page_size: usize) -> Self {
        self.scroll_page_size = page_size.max(1);
        self
    }

    /// Merge one scraped batch for `region_code` into the catalog.
    ///
    /// At completion every accepted offer's dedup key is present in the
    /// collection with a region covering at least `region_code`, and no entry
    /// is ever created twice for the same dedup key across repeated runs.
    ///
    /// # Errors
    /// - Provider and store failures before the upsert phase are surfaced
    ///   as-is; a region promotion may already have been applied, which is
    ///   idempotent and safe to re-run.
    /// - Upsert-phase failures are surfaced as `PartialIngestion` carrying
    ///   the number of committed points. Committed chunks are not rolled
    ///   back; callers must treat the collection as possibly-partially
    ///   updated.
    pub async fn reconcile(
        &self,
        rows: &[RawOfferRow],
        region_code: &str,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        // Normalize, dropping invalid rows and in-batch duplicate keys
        // (first occurrence wins).
        let mut seen_keys: HashSet<String> = HashSet::new();
        let mut batch: Vec<(String, Offer)> = Vec::new();
        for row in rows {
            match normalizer::normalize(row, region_code) {
                Ok(offer) => {
                    report.accepted += 1;
                    let key = normalizer::dedup_key(&offer);
                    if seen_keys.insert(key.clone()) {
                        batch.push((key, offer));
                    } else {
                        report.batch_duplicates += 1;
                    }
                }
                Err(err) => {
                    debug!("Dropping row: {}", err);
                    report.rejected += 1;
                }
            }
        }

        if batch.is_empty() {
            info!(
                "Nothing to reconcile for region {} ({} rows rejected)",
                region_code, report.rejected
            );
            return Ok(report);
        }

        self.ensure_collection().await?;

        // Exhaustive scan of the existing catalog; dedup correctness requires
        // seeing every prior entry.
        let existing = self.existing_entries().await?;

        // Partition into known and new offers.
        let mut broaden_ids: Vec<u64> = Vec::new();
        let mut new_offers: Vec<(String, Offer)> = Vec::new();
        for (key, offer) in batch {
            match existing.get(&key) {
                Some((id, existing_region)) => {
                    report.known += 1;
                    if existing_region != REGION_ALL {
                        broaden_ids.push(*id);
                    }
                }
                None => new_offers.push((key, offer)),
            }
        }

        info!(
            "Region {}: {} new offers, {} region promotions",
            region_code,
            new_offers.len(),
            broaden_ids.len()
        );

        // Promote previously region-bound entries to ALL in one patch.
        if !broaden_ids.is_empty() {
            self.store
                .set_payload(
                    &self.collection,
                    serde_json::json!({ "region_code": REGION_ALL }),
                    &broaden_ids,
                )
                .await?;
            report.broadened = broaden_ids.len();
        }

        if new_offers.is_empty() {
            return Ok(report);
        }

        // Embed all new offers in one batch request.
        let texts: Vec<String> = new_offers
            .iter()
            .map(|(_, offer)| page_content(offer))
            .collect();
        debug!("Embedding {} new offer texts", texts.len());
        let embeddings = self.embedder.embed_many(&texts).await?;
        if embeddings.len() != new_offers.len() {
            return Err(MarktRagError::ProviderFailure(format!(
                "embedding provider returned {} vectors for {} offers",
                embeddings.len(),
                new_offers.len()
            )));
        }

        let points: Vec<Point> = new_offers
            .iter()
            .zip(embeddings)
            .map(|((key, offer), vector)| {
                let mut payload = serde_json::to_value(offer)?;
                payload["etl_version"] = serde_json::json!(1);
                Ok(Point {
                    id: point_id(key, &self.id_salt),
                    vector,
                    payload,
                })
            })
            .collect::<Result<_>>()?;

        report.inserted = self.upsert_chunked(&points).await?;
        info!(
            "Upserted {} new entries into {}",
            report.inserted, self.collection
        );

        Ok(report)
    }

    /// Create the collection lazily, sizing it by probing the embedding
    /// backend with one text.
    async fn ensure_collection(&self) -> Result<()> {
        if self.store.collection_exists(&self.collection).await? {
            return Ok(());
        }
        let probe = self.embedder.embed(DIMENSION_PROBE_TEXT).await?;
        if probe.is_empty() {
            return Err(MarktRagError::ProviderFailure(
                "embedding probe returned an empty vector".to_string(),
            ));
        }
        info!(
            "Creating collection {} (vector size {})",
            self.collection,
            probe.len()
        );
        self.store
            .create_collection(&self.collection, probe.len())
            .await
    }

    /// Map of dedup key to (point id, stored region) over the whole catalog.
    async fn existing_entries(&self) -> Result<HashMap<String, (u64, String)>> {
        let mut entries = HashMap::new();
        let mut offset = None;

        loop {
            let (points, next_offset) = self
                .store
                .scroll(&self.collection, self.scroll_page_size, offset, None)
                .await?;
            if points.is_empty() {
                break;
            }
            for point in points {
                match serde_json::from_value::<Offer>(point.payload) {
                    Ok(offer) => {
                        let key = normalizer::dedup_key(&offer);
                        entries.insert(key, (point.id, offer.region_code));
                    }
                    Err(err) => {
                        // Undecodable payloads cannot match any dedup key.
                        warn!("Skipping undecodable entry {}: {}", point.id, err);
                    }
                }
            }
            match next_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        debug!("Catalog scan found {} existing entries", entries.len());
        Ok(entries)
    }

    /// Sequential chunked upsert with one size-halving retry per chunk.
    ///
    /// A timed-out chunk above the size floor is retried once at half size,
    /// re-sliced from the same offset; the reduced size then applies to the
    /// remaining chunks. Any other failure, or a timeout at the floor, aborts
    /// with the committed count.
    async fn upsert_chunked(&self, points: &[Point]) -> Result<usize> {
        let mut chunk_size = self.chunk_size;
        let mut offset = 0;
        let mut committed = 0;

        while offset < points.len() {
            let end = usize::min(offset + chunk_size, points.len());
            match self.store.upsert(&self.collection, &points[offset..end]).await {
                Ok(()) => {
                    committed += end - offset;
                    offset = end;
                }
                Err(err) if err.is_timeout() && chunk_size > MIN_CHUNK_SIZE => {
                    chunk_size = usize::max(MIN_CHUNK_SIZE, chunk_size / 2);
                    warn!(
                        "Upsert timed out, retrying once at chunk size {}",
                        chunk_size
                    );
                    let retry_end = usize::min(offset + chunk_size, points.len());
                    match self
                        .store
                        .upsert(&self.collection, &points[offset..retry_end])
                        .await
                    {
                        Ok(()) => {
                            committed += retry_end - offset;
                            offset = retry_end;
                        }
                        Err(err) => {
                            return Err(MarktRagError::PartialIngestion {
                                committed,
                                source: Box::new(err),
                            })
                        }
                    }
                }
                Err(err) => {
                    return Err(MarktRagError::PartialIngestion {
                        committed,
                        source: Box::new(err),
                    })
                }
            }
        }

        Ok(committed)
    }
}

/// Descriptive text embedded for one offer.
fn page_content(offer: &Offer) -> String {
    format!(
        "{} at {} for {} EUR | category: {} | region: {}",
        offer.product_name, offer.store_name, offer.price, offer.category, offer.region_code
    )
}

/// Deterministic point identifier: dedup key plus backend salt, hashed and
/// reduced to the catalog's id range. Repeated runs against the same backend
/// always produce the same id for the same offer.
fn point_id(dedup_key: &str, salt: &str) -> u64 {
    let digest = Sha256::digest(format!("{dedup_key}{salt}").as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes) % POINT_ID_RANGE
}
