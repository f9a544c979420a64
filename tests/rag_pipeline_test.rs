mod common;

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use common::raw_row;
use common::FakeEmbedder;
use common::InMemoryStore;
use common::ScriptedGenerator;
use marktrag::catalog::ReconcileEngine;
use marktrag::catalog::RegionRegistry;
use marktrag::errors::Result;
use marktrag::models::RawOfferRow;
use marktrag::rag::RagService;
use marktrag::rag::Retriever;
use marktrag::service::OfferAssistant;
use marktrag::sources::OfferSource;
use marktrag::MarktRagError;

const COLLECTION: &str = "offers";
const SEARCH_LIMIT: usize = 4;

fn embedder() -> Arc<FakeEmbedder> {
    Arc::new(FakeEmbedder::default())
}

async fn seed(store: &Arc<InMemoryStore>, rows: &[RawOfferRow], region: &str) {
    ReconcileEngine::new(store.clone(), embedder(), COLLECTION, "")
        .reconcile(rows, region)
        .await
        .unwrap();
}

fn rag(store: &Arc<InMemoryStore>, llm: &Arc<ScriptedGenerator>) -> RagService {
    let retriever = Retriever::new(store.clone(), embedder(), COLLECTION);
    RagService::new(retriever, llm.clone(), SEARCH_LIMIT)
}

#[tokio::test]
async fn test_retrieval_respects_region_filter() {
    let store = Arc::new(InMemoryStore::new());
    seed(&store, &[raw_row("Wurst vom Grill", 3.99, "EDEKA")], "80331").await;
    seed(&store, &[raw_row("Wurst Premium", 2.99, "NETTO")], "10115").await;
    seed(&store, &[raw_row("Wurst Klassik", 2.49, "ALDI")], "ALL").await;

    let retriever = Retriever::new(store.clone(), embedder(), COLLECTION);

    let regional = retriever.retrieve("wurst", "80331", 10).await;
    assert!(!regional.is_empty());
    assert!(regional
        .iter()
        .all(|offer| offer.region_code == "80331" || offer.region_code == "ALL"));
    assert!(regional.iter().any(|offer| offer.region_code == "80331"));

    let universal = retriever.retrieve("wurst", "ALL", 10).await;
    assert_eq!(universal.len(), 3);
}

#[tokio::test]
async fn test_retrieval_failure_yields_empty_result() {
    // No collection was ever created, so every search fails; the retriever
    // must swallow that per term.
    let store = Arc::new(InMemoryStore::new());
    let retriever = Retriever::new(store.clone(), embedder(), COLLECTION);

    assert!(retriever.retrieve("banana", "ALL", 4).await.is_empty());
}

#[tokio::test]
async fn test_end_to_end_banana_and_cheap_cereal() {
    let store = Arc::new(InMemoryStore::new());
    seed(
        &store,
        &[
            raw_row("Banana", 0.39, "ALDI"),
            raw_row("Crunchy Cereal", 1.99, "REWE"),
            raw_row("Choco Cereal", 2.49, "EDEKA"),
        ],
        "10115",
    )
    .await;

    let selection = r#"{
        "products": [
            {"product_name": "Banana", "price": 0.39, "store": "ALDI", "product_url": null, "region_code": "10115"},
            {"product_name": "Crunchy Cereal", "price": 1.99, "store": "REWE", "product_url": null, "region_code": "10115"}
        ],
        "recommendation": "Banana at ALDI is a direct match. Crunchy Cereal at REWE is the cheaper cereal; Choco Cereal at EDEKA costs €2.49."
    }"#;
    let llm = Arc::new(ScriptedGenerator::new(vec![
        Ok("banana, cheap cereal".to_string()),
        Ok(selection.to_string()),
    ]));

    let result = rag(&store, &llm)
        .query("banana, cheap cereal", "10115")
        .await
        .unwrap();

    assert_eq!(result.products.len(), 2);
    assert_eq!(result.products[0].product_name, "Banana");
    assert_eq!(result.products[1].product_name, "Crunchy Cereal");
    assert_eq!(result.products[1].price.to_string(), "1.99");
    assert!(result.recommendation.contains("cheaper"));

    // The selection step saw both cereal candidates and the banana.
    let prompts = llm.prompt_log();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("Requested item: cheap cereal"));
    assert!(prompts[1].contains("Crunchy Cereal | Store: REWE | Price: €1.99"));
    assert!(prompts[1].contains("Choco Cereal | Store: EDEKA | Price: €2.49"));
    assert!(prompts[1].contains("Banana | Store: ALDI | Price: €0.39"));
}

#[tokio::test]
async fn test_term_without_candidates_is_omitted() {
    let store = Arc::new(InMemoryStore::new());
    seed(&store, &[raw_row("Banana", 0.39, "ALDI")], "10115").await;

    let selection = r#"{
        "products": [
            {"product_name": "Banana", "price": 0.39, "store": "ALDI", "product_url": null, "region_code": "10115"}
        ],
        "recommendation": "Banana at ALDI is the only match. onion not found."
    }"#;
    let llm = Arc::new(ScriptedGenerator::new(vec![
        Ok("banana, onion".to_string()),
        Ok(selection.to_string()),
    ]));

    let result = rag(&store, &llm)
        .query("banana and onions", "10115")
        .await
        .unwrap();

    assert_eq!(result.products.len(), 1);
    assert!(result
        .products
        .iter()
        .all(|product| product.product_name != "onion"));
    assert!(result.recommendation.ends_with("onion not found."));

    // The empty term was rendered explicitly for the selection step.
    let prompts = llm.prompt_log();
    assert!(prompts[1].contains("Requested item: onion\n  (No candidates found)"));
}

#[tokio::test]
async fn test_decomposition_failure_falls_back_to_raw_query() {
    let store = Arc::new(InMemoryStore::new());
    seed(&store, &[raw_row("Banana", 0.39, "ALDI")], "10115").await;

    let selection = r#"{"products": [], "recommendation": "banana not found."}"#;
    let llm = Arc::new(ScriptedGenerator::new(vec![
        Err(MarktRagError::ProviderFailure("down".to_string())),
        Ok(selection.to_string()),
    ]));

    rag(&store, &llm).query("banana", "10115").await.unwrap();

    let prompts = llm.prompt_log();
    assert!(prompts[1].contains(r#"Refined items: ["banana"]"#));
}

#[tokio::test]
async fn test_fenced_selection_response_still_parses() {
    let store = Arc::new(InMemoryStore::new());
    seed(&store, &[raw_row("Banana", 0.39, "ALDI")], "10115").await;

    let fenced = "```json\n{\"products\": [], \"recommendation\": \"banana not found.\"}\n```";
    let llm = Arc::new(ScriptedGenerator::new(vec![
        Ok("banana".to_string()),
        Ok(fenced.to_string()),
    ]));

    let result = rag(&store, &llm).query("banana", "10115").await.unwrap();
    assert!(result.products.is_empty());
    assert_eq!(result.recommendation, "banana not found.");
}

#[tokio::test]
async fn test_undecodable_selection_response_is_a_parse_failure() {
    let store = Arc::new(InMemoryStore::new());
    seed(&store, &[raw_row("Banana", 0.39, "ALDI")], "10115").await;

    let llm = Arc::new(ScriptedGenerator::new(vec![
        Ok("banana".to_string()),
        Ok("I could not decide, sorry!".to_string()),
    ]));

    let err = rag(&store, &llm)
        .query("banana", "10115")
        .await
        .unwrap_err();
    assert!(matches!(err, MarktRagError::ParseFailure(_)));
}

/// Offer source fake counting how often scraping was triggered.
struct CountingSource {
    rows: Vec<RawOfferRow>,
    calls: AtomicUsize,
}

#[async_trait]
impl OfferSource for CountingSource {
    async fn fetch(&self, _region_code: &str) -> Result<Vec<RawOfferRow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.clone())
    }
}

fn assistant(
    store: &Arc<InMemoryStore>,
    llm: &Arc<ScriptedGenerator>,
    source: Arc<CountingSource>,
) -> OfferAssistant {
    let engine = ReconcileEngine::new(store.clone(), embedder(), COLLECTION, "");
    let registry = RegionRegistry::new(store.clone());
    OfferAssistant::from_services(registry, engine, rag(store, llm), source)
}

#[tokio::test]
async fn test_assistant_ingests_missing_region_once() {
    let store = Arc::new(InMemoryStore::new());
    let source = Arc::new(CountingSource {
        rows: vec![raw_row("Banana", 0.39, "ALDI")],
        calls: AtomicUsize::new(0),
    });

    let selection = r#"{"products": [], "recommendation": "banana not found."}"#;
    let llm = Arc::new(ScriptedGenerator::new(vec![
        Ok("banana".to_string()),
        Ok(selection.to_string()),
        Ok("banana".to_string()),
        Ok(selection.to_string()),
    ]));

    let service = assistant(&store, &llm, source.clone());

    let first = service.answer("banana", "10115").await;
    assert!(!first.is_error());
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.point_count(COLLECTION), 1);

    // The completed region record suppresses a second scrape.
    let second = service.answer("banana", "10115").await;
    assert!(!second.is_error());
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_assistant_rejects_empty_queries() {
    let store = Arc::new(InMemoryStore::new());
    let source = Arc::new(CountingSource {
        rows: Vec::new(),
        calls: AtomicUsize::new(0),
    });
    let llm = Arc::new(ScriptedGenerator::new(Vec::new()));

    let outcome = assistant(&store, &llm, source.clone()).answer("   ", "10115").await;
    assert!(outcome.is_error());
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    assert!(llm.prompt_log().is_empty());
}

#[tokio::test]
async fn test_assistant_surfaces_source_failures_as_error_outcome() {
    let store = Arc::new(InMemoryStore::new());
    let llm = Arc::new(ScriptedGenerator::new(Vec::new()));

    let engine = ReconcileEngine::new(store.clone(), embedder(), COLLECTION, "");
    let registry = RegionRegistry::new(store.clone());
    let service = OfferAssistant::from_services(
        registry,
        engine,
        rag(&store, &llm),
        Arc::new(marktrag::sources::UnconfiguredSource),
    );

    let outcome = service.answer("banana", "10115").await;
    assert!(outcome.is_error());
}
