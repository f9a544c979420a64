//! Candidate retrieval: one search term to ranked candidate offers

use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use crate::embeddings::EmbeddingProvider;
use crate::errors::Result;
use crate::index::match_any_filter;
use crate::index::IndexStore;
use crate::models::Offer;
use crate::models::REGION_ALL;

/// Retriever for per-term similarity search over the offer catalog.
pub struct Retriever {
    store: Arc<dyn IndexStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    collection: String,
}

impl Retriever {
    /// Create a new retriever over one collection
    pub fn new(
        store: Arc<dyn IndexStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            collection: collection.into(),
        }
    }

    /// Up to `k` candidate offers for one item term, in the store's
    /// similarity order.
    ///
    /// A failure is caught and converted to an empty result for this term
    /// only; it never aborts retrieval for sibling terms.
    pub async fn retrieve(&self, item_term: &str, region_code: &str, k: usize) -> Vec<Offer> {
        match self.try_retrieve(item_term, region_code, k).await {
            Ok(offers) => offers,
            Err(err) => {
                warn!("Search failed for '{}': {}", item_term, err);
                Vec::new()
            }
        }
    }

    async fn try_retrieve(&self, item_term: &str, region_code: &str, k: usize) -> Result<Vec<Offer>> {
        debug!("Retrieving candidates for '{}'", item_term);

        let vector = self.embedder.embed(item_term).await?;

        // Region-bound queries accept region-bound and universal entries;
        // an ALL query is unfiltered.
        let filter = (region_code != REGION_ALL)
            .then(|| match_any_filter("region_code", &[REGION_ALL, region_code]));

        let hits = self
            .store
            .search(&self.collection, &vector, filter, k)
            .await?;

        let offers = hits
            .into_iter()
            .filter_map(|hit| match serde_json::from_value::<Offer>(hit.payload) {
                Ok(offer) => Some(offer),
                Err(err) => {
                    warn!("Skipping undecodable hit {}: {}", hit.id, err);
                    None
                }
            })
            .collect();

        Ok(offers)
    }
}
