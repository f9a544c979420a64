//! Catalog persistence
//!
//! This module keeps the indexed offer catalog consistent across repeated
//! scrapes:
//! - Reconciliation of freshly scraped offer batches into the collection
//!   without duplicating previously seen offers
//! - The region registry recording which regions hold a completed snapshot
//!
//! The catalog collection is mutated only here. Concurrent reconciliation
//! runs against the same (region, collection) pair race on the
//! existing-entries snapshot and must be serialized by the caller.

pub mod reconcile;
pub mod regions;

pub use reconcile::ReconcileEngine;
pub use reconcile::ReconcileReport;
pub use regions::RegionRegistry;
