//! Region registry: which regions hold a completed catalog snapshot.
//!
//! Region records live in an auxiliary collection with a degenerate
//! single-dimension vector; they are only ever queried by payload filter,
//! never by similarity.

use std::sync::Arc;

use chrono::Utc;
use sha2::Digest;
use sha2::Sha256;
use tracing::debug;
use tracing::info;

use crate::errors::Result;
use crate::index::match_value_filter;
use crate::index::IndexStore;
use crate::index::Point;
use crate::models::RegionRecord;
use crate::models::REGION_ALL;

/// Default name of the region registry collection.
pub const REGIONS_COLLECTION: &str = "regions";

const STATUS_COMPLETED: &str = "completed";

/// Registry of per-region catalog snapshots.
pub struct RegionRegistry {
    store: Arc<dyn IndexStore>,
    collection: String,
}

impl RegionRegistry {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self::with_collection(store, REGIONS_COLLECTION)
    }

    pub fn with_collection(store: Arc<dyn IndexStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Whether retrieval can run for `region_code` without reconciling first.
    ///
    /// `ALL` is always available; any other region requires a completed
    /// record for exactly that code (point lookup, no prefix logic).
    pub async fn is_available(&self, region_code: &str) -> Result<bool> {
        if region_code == REGION_ALL {
            return Ok(true);
        }

        let filter = match_value_filter("region_code", region_code);
        let (points, _) = self
            .store
            .scroll(&self.collection, 1, None, Some(filter))
            .await?;

        debug!(
            "Region {} availability: {}",
            region_code,
            !points.is_empty()
        );
        Ok(!points.is_empty())
    }

    /// Record a completed snapshot for `region_code`, overwriting any prior
    /// record for that region.
    pub async fn mark_completed(&self, region_code: &str, product_count: usize) -> Result<()> {
        if !self.store.collection_exists(&self.collection).await? {
            self.store.create_collection(&self.collection, 1).await?;
        }

        let record = RegionRecord {
            region_code: region_code.to_string(),
            last_scraped_at: Utc::now(),
            status: STATUS_COMPLETED.to_string(),
            product_count,
        };

        let point = Point {
            id: region_point_id(region_code),
            vector: vec![0.0],
            payload: serde_json::to_value(&record)?,
        };
        self.store.upsert(&self.collection, &[point]).await?;

        info!(
            "Recorded completed snapshot for region {} ({} products)",
            region_code, product_count
        );
        Ok(())
    }
}

/// One stable point id per region code.
fn region_point_id(region_code: &str) -> u64 {
    let digest = Sha256::digest(region_code.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes) % (i64::MAX as u64)
}
