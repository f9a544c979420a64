//! Offer row canonicalization and dedup identity.
//!
//! Pure functions over one scraped row at a time; no side effects. Rows that
//! cannot be canonicalized are rejected with a `Validation` error and the
//! batch continues without them.

use rust_decimal::Decimal;

use crate::errors::MarktRagError;
use crate::errors::Result;
use crate::models::Offer;
use crate::models::RawOfferRow;
use crate::models::RawPrice;

/// Parse a scraped price into an exact decimal.
///
/// Numeric values pass through as-is. String values are stripped of currency
/// markers, have the decimal comma converted to a decimal point, and are then
/// parsed. Returns `None` when no number can be recovered.
#[must_use]
pub fn clean_price(raw: &RawPrice) -> Option<Decimal> {
    match raw {
        RawPrice::Number(value) => Decimal::try_from(*value).ok(),
        RawPrice::Text(text) => {
            let cleaned = text.replace('€', "").replace("EUR", "").replace(',', ".");
            cleaned.trim().parse::<Decimal>().ok()
        }
    }
}

/// Canonicalize one raw row into an [`Offer`] scoped to the ingesting region.
///
/// Rejects rows with a missing or empty `product_name` or `store_name` after
/// trimming, and rows whose price is absent, unparseable, or negative.
pub fn normalize(row: &RawOfferRow, region_code: &str) -> Result<Offer> {
    let product_name = row.product_name.as_deref().map_or("", str::trim);
    if product_name.is_empty() {
        return Err(MarktRagError::Validation(
            "row has no product name".to_string(),
        ));
    }

    let store_name = row.store_name.as_deref().map_or("", str::trim);
    if store_name.is_empty() {
        return Err(MarktRagError::Validation(format!(
            "row '{product_name}' has no store name"
        )));
    }

    let price = row
        .price
        .as_ref()
        .and_then(clean_price)
        .ok_or_else(|| {
            MarktRagError::Validation(format!("row '{product_name}' has an unparseable price"))
        })?;
    if price.is_sign_negative() {
        return Err(MarktRagError::Validation(format!(
            "row '{product_name}' has a negative price"
        )));
    }

    Ok(Offer {
        category: row.category.clone().unwrap_or_default(),
        product_name: product_name.to_string(),
        price,
        product_url: row.product_url.clone(),
        region_code: region_code.to_string(),
        store_name: store_name.to_string(),
    })
}

/// The offer's dedup identity: product name, store name and exact price.
///
/// Two offers with the same key are the same commercial offer re-observed,
/// regardless of region. Trailing zeros are dropped from the price so the key
/// is stable across the string and float forms a price passes through.
#[must_use]
pub fn dedup_key(offer: &Offer) -> String {
    format!(
        "{}_{}_{}",
        offer.product_name,
        offer.store_name,
        offer.price.normalize()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, price: RawPrice, store: &str) -> RawOfferRow {
        RawOfferRow {
            category: Some("test".to_string()),
            product_name: Some(name.to_string()),
            price: Some(price),
            product_url: None,
            store_name: Some(store.to_string()),
        }
    }

    #[test]
    fn test_price_with_currency_and_comma() {
        let price = clean_price(&RawPrice::Text("2,99 €".to_string())).unwrap();
        assert_eq!(price.to_string(), "2.99");
    }

    #[test]
    fn test_numeric_price_passes_through() {
        let price = clean_price(&RawPrice::Number(3.5)).unwrap();
        assert_eq!(price.to_string(), "3.5");
    }

    #[test]
    fn test_unparseable_price_rejected() {
        assert!(clean_price(&RawPrice::Text("abc".to_string())).is_none());
        let result = normalize(&row("Milch", RawPrice::Text("abc".to_string()), "REWE"), "10115");
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_product_name_rejected() {
        let result = normalize(&row("   ", RawPrice::Number(1.0), "REWE"), "10115");
        assert!(result.is_err());

        let mut no_name = row("x", RawPrice::Number(1.0), "REWE");
        no_name.product_name = None;
        assert!(normalize(&no_name, "10115").is_err());
    }

    #[test]
    fn test_negative_price_rejected() {
        let result = normalize(&row("Milch", RawPrice::Number(-0.5), "REWE"), "10115");
        assert!(result.is_err());
    }

    #[test]
    fn test_dedup_key_ignores_category_and_url() {
        let mut a = normalize(&row("Bananen", RawPrice::Number(0.39), "ALDI"), "10115").unwrap();
        let mut b = a.clone();
        b.category = "Obst".to_string();
        b.product_url = Some("https://example.com/bananen".to_string());
        assert_eq!(dedup_key(&a), dedup_key(&b));

        a.price = Decimal::new(49, 2); // 0.49
        assert_ne!(dedup_key(&a), dedup_key(&b));
    }

    #[test]
    fn test_dedup_key_stable_across_price_forms() {
        let from_text = normalize(&row("Milch", RawPrice::Text("3,50".to_string()), "REWE"), "ALL")
            .unwrap();
        let from_number = normalize(&row("Milch", RawPrice::Number(3.5), "REWE"), "ALL").unwrap();
        assert_eq!(dedup_key(&from_text), dedup_key(&from_number));
    }
}
