//! Top-level query flow: availability gate, synchronous catalog refresh on
//! miss, then retrieval and selection.

use std::sync::Arc;

use tracing::info;
use tracing::warn;

use crate::catalog::ReconcileEngine;
use crate::catalog::ReconcileReport;
use crate::catalog::RegionRegistry;
use crate::errors::Result;
use crate::models::QueryOutcome;
use crate::rag::RagService;
use crate::sources::OfferSource;

/// Assembles the full query path over the injected services. Every query
/// resolves to a well-formed [`QueryOutcome`]; provider failures degrade to
/// an error payload, never a crash.
pub struct OfferAssistant {
    registry: RegionRegistry,
    engine: ReconcileEngine,
    rag: RagService,
    source: Arc<dyn OfferSource>,
}

impl OfferAssistant {
    /// Create from existing services
    pub fn from_services(
        registry: RegionRegistry,
        engine: ReconcileEngine,
        rag: RagService,
        source: Arc<dyn OfferSource>,
    ) -> Self {
        Self {
            registry,
            engine,
            rag,
            source,
        }
    }

    /// Answer one product query for one region.
    pub async fn answer(&self, query: &str, region_code: &str) -> QueryOutcome {
        if query.trim().is_empty() {
            return QueryOutcome::error("Please enter a product-related query.");
        }

        let available = match self.registry.is_available(region_code).await {
            Ok(available) => available,
            Err(err) => {
                warn!(
                    "Availability check for region {} failed, treating as missing: {}",
                    region_code, err
                );
                false
            }
        };

        if !available {
            if let Err(err) = self.refresh_region(region_code).await {
                return QueryOutcome::error(format!("Error during product search: {err}"));
            }
        }

        match self.rag.query(query, region_code).await {
            Ok(selection) => QueryOutcome::Selection(selection),
            Err(err) => QueryOutcome::error(format!("Error during product search: {err}")),
        }
    }

    /// Fetch the region's offers from the source and reconcile them into the
    /// catalog, recording the completed snapshot afterwards.
    ///
    /// # Errors
    /// - Offer source failures
    /// - Reconciliation failures (the collection may be partially updated)
    ///
    /// A failure to write the region record is logged and tolerated: the
    /// next query simply reconciles again.
    pub async fn refresh_region(&self, region_code: &str) -> Result<ReconcileReport> {
        info!("No catalog snapshot for region {}, ingesting now", region_code);

        let rows = self.source.fetch(region_code).await?;
        let report = self.engine.reconcile(&rows, region_code).await?;

        if let Err(err) = self.registry.mark_completed(region_code, report.accepted).await {
            warn!(
                "Failed to record snapshot for region {}: {}",
                region_code, err
            );
        }

        Ok(report)
    }
}
