//! Complete RAG pipeline: Decompose -> Retrieve -> Select

use std::sync::Arc;

use futures::stream;
use futures::stream::StreamExt;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::errors::MarktRagError;
use crate::errors::Result;
use crate::llm::GenerationOptions;
use crate::llm::GenerationProvider;
use crate::models::SelectionResult;
use crate::rag::extract::extract_json_object;
use crate::rag::prompts;
use crate::rag::CandidateSet;
use crate::rag::Retriever;

/// Sampling temperature for query decomposition.
const DECOMPOSE_TEMPERATURE: f32 = 0.2;

/// Sampling temperature for offer selection.
const SELECT_TEMPERATURE: f32 = 0.15;

/// Retrieval and selection over one query, terminal on success or on an
/// explicit error.
pub struct RagService {
    retriever: Retriever,
    llm: Arc<dyn GenerationProvider>,
    search_limit: usize,
}

impl RagService {
    /// Create a new RAG service
    pub fn new(retriever: Retriever, llm: Arc<dyn GenerationProvider>, search_limit: usize) -> Self {
        Self {
            retriever,
            llm,
            search_limit,
        }
    }

    /// Answer one product query for one region.
    ///
    /// # Errors
    /// - Generation provider failures during selection
    /// - `ParseFailure` when the selection response carries no decodable
    ///   structure
    ///
    /// Decomposition failures never error: they fall back to treating the
    /// whole query as a single term. Per-term retrieval failures yield empty
    /// candidate lists for the affected terms only.
    pub async fn query(&self, query: &str, region_code: &str) -> Result<SelectionResult> {
        info!("Processing query: {}", query);

        // Step 1: decompose the query into product terms
        let terms = self.decompose(query).await;
        debug!("Requested items: {:?}", terms);

        // Step 2: retrieve candidates per term, independently
        let candidates = self.retrieve_all(&terms, region_code).await;

        // Step 3: have the LLM pick at most one offer per term
        let result = self.select(query, &terms, &candidates).await?;

        info!(
            "Query completed: {} products selected",
            result.products.len()
        );
        Ok(result)
    }

    /// Split the raw query into singular, de-duplicated product terms,
    /// preserving first-appearance order. Best-effort: any provider failure
    /// or unusable output falls back to the raw query as one term.
    async fn decompose(&self, query: &str) -> Vec<String> {
        let prompt = prompts::extraction_prompt(query);
        let options = GenerationOptions {
            temperature: DECOMPOSE_TEMPERATURE,
            json_output: false,
        };

        let raw = match self.llm.generate(&prompt, &options).await {
            Ok(text) => text,
            Err(err) => {
                warn!("Query decomposition failed, using original: {}", err);
                return vec![query.to_string()];
            }
        };

        let terms = parse_terms(&raw);
        if terms.is_empty() {
            return vec![query.to_string()];
        }
        terms
    }

    /// Run retrieval once per term. The calls are independent and
    /// side-effect-free, so they run concurrently; results keep term order.
    async fn retrieve_all(&self, terms: &[String], region_code: &str) -> CandidateSet {
        let concurrency = terms.len().max(1);
        stream::iter(terms.iter().cloned())
            .map(|term| async move {
                let offers = self
                    .retriever
                    .retrieve(&term, region_code, self.search_limit)
                    .await;
                (term, offers)
            })
            .buffered(concurrency)
            .collect()
            .await
    }

    /// Ask the generation provider for at most one offer per term plus the
    /// rationale, then decode its response.
    async fn select(
        &self,
        query: &str,
        terms: &[String],
        candidates: &CandidateSet,
    ) -> Result<SelectionResult> {
        let context = prompts::render_candidates(candidates);
        let prompt = prompts::selection_prompt(query, terms, &context);
        let options = GenerationOptions {
            temperature: SELECT_TEMPERATURE,
            json_output: true,
        };

        let raw = self.llm.generate(&prompt, &options).await?;
        debug!("Raw selection response: {}", raw);

        let cleaned = extract_json_object(&raw).ok_or_else(|| {
            MarktRagError::ParseFailure("no JSON object in selection response".to_string())
        })?;

        serde_json::from_str(&cleaned).map_err(|err| {
            MarktRagError::ParseFailure(format!("selection response not decodable: {err}"))
        })
    }
}

/// First line of the model output, split on commas, trimmed, de-duplicated
/// preserving order.
fn parse_terms(raw: &str) -> Vec<String> {
    let first_line = raw
        .trim()
        .trim_matches('"')
        .lines()
        .next()
        .unwrap_or_default();

    let mut terms: Vec<String> = Vec::new();
    for term in first_line.split(',') {
        let term = term.trim();
        if term.is_empty() {
            continue;
        }
        if !terms.iter().any(|seen| seen.eq_ignore_ascii_case(term)) {
            terms.push(term.to_string());
        }
    }
    terms
}
