//! Prompt templates and candidate context rendering

use std::fmt::Write;

use crate::models::Offer;
use crate::rag::CandidateSet;

/// Instruction for extracting product search terms from a raw user query.
#[must_use]
pub fn extraction_prompt(query: &str) -> String {
    format!(
        r#"You extract grocery product search terms.
Return ONLY one line: comma-separated product items (with essential modifiers: flavor, brand if stated, form like fresh/frozen, size only if critical).
Singularize plurals (bananas -> banana). Merge flavor + product (chocolate ice cream).
Remove filler (I want, please, can you).
Order terms as they appear. No duplicates. Keep brand capitalization.
If no clear product terms, just return the original query.
Examples:
I want banana and apple -> banana, apple
I like chocolate ice creams -> chocolate ice cream
Need organic whole milk and unsalted butter -> organic whole milk, unsalted butter
Show deals on Coca Cola 1.5L and Pepsi Max -> Coca Cola 1.5L, Pepsi Max
Looking for cheap cereals -> cereal
User request: "{query}"
Products:"#
    )
}

/// One textual block per requested item: either the numbered candidate list
/// or an explicit no-candidates marker.
#[must_use]
pub fn render_candidates(candidates: &CandidateSet) -> String {
    let mut sections = Vec::with_capacity(candidates.len());
    for (item, offers) in candidates {
        if offers.is_empty() {
            sections.push(format!("Requested item: {item}\n  (No candidates found)\n"));
            continue;
        }
        let mut section = format!("Requested item: {item}");
        for (idx, offer) in offers.iter().enumerate() {
            let _ = write!(section, "\n{}", candidate_line(idx + 1, offer));
        }
        sections.push(section);
    }
    sections.join("\n\n")
}

fn candidate_line(number: usize, offer: &Offer) -> String {
    format!(
        "Candidate {}: {} | Store: {} | Price: €{:.2} | Category: {} | URL: {}",
        number,
        offer.product_name,
        offer.store_name,
        offer.price,
        offer.category,
        offer.product_url.as_deref().unwrap_or("N/A")
    )
}

/// Instruction for choosing at most one product per requested item.
#[must_use]
pub fn selection_prompt(query: &str, items: &[String], context: &str) -> String {
    format!(
        r#"Pick ONE best product per requested item. Skip items with no suitable match.
Original query: "{query}"
Refined items: {items:?}

Candidates:
{context}

Rules:
1. Max one product per item.
2. Must semantically match item (consider flavor/brand/modifier).
3. Tie -> choose cheaper.
4. Do not fabricate missing products.
5. Recommendation: up to 3 short sentences, simple tone.
- State why each chosen product was selected (cheapest, brand match, better value).
- Optional: mention one pricier alternative not chosen ("Also at REWE for €2.10 but higher").
- Last sentence lists any missing items like: onion not found.
- Do NOT start with generic phrases.
Return ONLY JSON:
{{
  "products": [
    {{"product_name": "name", "price": 0, "store": "store", "product_url": "url or null", "region_code": "region"}}
  ],
  "recommendation": "Up to 3 short sentences as described."
}}
IMPORTANT: Strict JSON only."#
    )
}
