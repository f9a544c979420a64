use chrono::DateTime;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Serialize;

/// Region sentinel matching every query region.
pub const REGION_ALL: &str = "ALL";

/// One row as produced by a scraper, before normalization.
///
/// Scrapers give no guarantee on field presence; every field is optional
/// here and validated in the normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOfferRow {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub price: Option<RawPrice>,
    #[serde(default)]
    pub product_url: Option<String>,
    #[serde(default)]
    pub store_name: Option<String>,
}

/// Scrapers emit prices either as numbers or as display strings ("2,99 €").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPrice {
    Number(f64),
    Text(String),
}

/// A canonical offer: one retailer's advertised product at one point in time.
///
/// `product_name`, `store_name` and `price` together form the offer's dedup
/// identity; `category` and `product_url` are descriptive only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub category: String,
    pub product_name: String,
    pub price: Decimal,
    pub product_url: Option<String>,
    pub region_code: String,
    pub store_name: String,
}

/// Registry record for one region ever scraped. A completed record implies
/// the catalog holds a best-effort-complete snapshot for that region at
/// `last_scraped_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionRecord {
    pub region_code: String,
    pub last_scraped_at: DateTime<Utc>,
    pub status: String,
    pub product_count: usize,
}

/// One product chosen by the selection step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedProduct {
    pub product_name: String,
    pub price: Decimal,
    pub store: String,
    #[serde(default)]
    pub product_url: Option<String>,
    #[serde(default)]
    pub region_code: Option<String>,
}

/// Final result of one query: at most one product per requested item plus a
/// short natural-language rationale. A requested item with no suitable match
/// is simply absent from `products`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResult {
    pub products: Vec<SelectedProduct>,
    #[serde(default)]
    pub recommendation: String,
}

/// Query-level error descriptor surfaced to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryError {
    pub error: String,
}

/// What a query always resolves to: a selection or a well-formed error
/// payload, never a crash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    Selection(SelectionResult),
    Error(QueryError),
}

impl QueryOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(QueryError {
            error: message.into(),
        })
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}
