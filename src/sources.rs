//! Offer sources: the handoff point from external scrapers.
//!
//! Scrapers produce unordered raw offer rows for one region; everything
//! downstream of that handoff (normalization, dedup, indexing) lives in the
//! catalog module. DOM scraping itself is not this crate's concern.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::MarktRagError;
use crate::errors::Result;
use crate::models::RawOfferRow;

/// Capability interface for fetching one region's raw offer rows.
#[async_trait]
pub trait OfferSource: Send + Sync {
    async fn fetch(&self, region_code: &str) -> Result<Vec<RawOfferRow>>;
}

/// Reads a scraper dump: a JSON array of raw offer rows.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl OfferSource for JsonFileSource {
    async fn fetch(&self, _region_code: &str) -> Result<Vec<RawOfferRow>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Placeholder source for deployments where no scraper dump is wired up;
/// always fails with an explanatory error.
pub struct UnconfiguredSource;

#[async_trait]
impl OfferSource for UnconfiguredSource {
    async fn fetch(&self, region_code: &str) -> Result<Vec<RawOfferRow>> {
        Err(MarktRagError::Validation(format!(
            "no offer source configured for region {region_code}; ingest a scraper dump first"
        )))
    }
}
