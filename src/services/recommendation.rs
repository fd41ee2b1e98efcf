use crate::error::{ApiError, Result};
use crate::ml::TextGenerator;
use crate::models::{
    CatalogSchema, ProductRecommendation, ProductRecord, RecommendationRequest,
};
use crate::services::resolver::NameResolver;
use crate::services::snapshot::SnapshotStore;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// Drives one recommendation request end to end: structural validation,
/// per-item name resolution, per-item generation, assembly.
///
/// The failure policy is asymmetric: a structurally invalid request aborts
/// before any resolution or adapter work, a request where nothing resolves
/// fails as a whole, and anything in between is best-effort. Unresolved or
/// generation-failed items are dropped and the rest are returned in their
/// original request order.
pub struct RecommendationService {
    snapshots: Arc<SnapshotStore>,
    generator: Arc<dyn TextGenerator>,
    item_count: usize,
    token_overlap_threshold: f32,
}

impl RecommendationService {
    pub fn new(
        snapshots: Arc<SnapshotStore>,
        generator: Arc<dyn TextGenerator>,
        item_count: usize,
        token_overlap_threshold: f32,
    ) -> Self {
        Self {
            snapshots,
            generator,
            item_count,
            token_overlap_threshold,
        }
    }

    pub async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> Result<Vec<ProductRecommendation>> {
        self.validate(request)?;

        let snapshot = self.snapshots.current();
        let resolver = NameResolver::new(snapshot.catalog(), self.token_overlap_threshold);

        // Items resolve independently; a miss never affects its neighbors.
        let mut resolved = Vec::new();
        for item in &request.recommendation {
            match resolver.resolve(&item.product_name) {
                Some(record) => resolved.push((item.score, record)),
                None => warn!("Product '{}' not found in catalog", item.product_name),
            }
        }

        if resolved.is_empty() {
            return Err(ApiError::AllItemsUnresolved);
        }

        info!(
            "Resolved {} of {} requested items",
            resolved.len(),
            request.recommendation.len()
        );

        let schema = snapshot.catalog().schema();
        let generations = resolved
            .iter()
            .map(|&(score, record)| self.generate_one(&request.context, score, record, schema));
        let results: Vec<ProductRecommendation> =
            join_all(generations).await.into_iter().flatten().collect();

        info!("Generated {} recommendations", results.len());
        Ok(results)
    }

    /// Structural validation; failing here aborts the request before any
    /// resolution or adapter call happens.
    fn validate(&self, request: &RecommendationRequest) -> Result<()> {
        if request.recommendation.len() != self.item_count {
            return Err(ApiError::ValidationError(format!(
                "Exactly {} recommendation items are required, got {}",
                self.item_count,
                request.recommendation.len()
            )));
        }

        for item in &request.recommendation {
            if !(0..=100).contains(&item.score) {
                return Err(ApiError::ValidationError(format!(
                    "Score for '{}' must be between 0 and 100, got {}",
                    item.product_name, item.score
                )));
            }
        }

        Ok(())
    }

    /// One generation attempt. Any failure here drops the item, never the
    /// whole batch.
    async fn generate_one(
        &self,
        context: &str,
        score: i64,
        record: &ProductRecord,
        schema: &CatalogSchema,
    ) -> Option<ProductRecommendation> {
        let prompt = build_prompt(
            context,
            score,
            enthusiasm_phrase(score),
            &record.field_summary(schema),
        );

        let reply = match self.generator.generate(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Generation failed for '{}': {}", record.name(), e);
                return None;
            }
        };

        match parse_reply(&reply) {
            Some((label, reason)) => Some(ProductRecommendation {
                product_name: record.name().to_string(),
                label,
                reason,
            }),
            None => {
                warn!(
                    "Generation reply for '{}' is missing LABEL/REASON markers",
                    record.name()
                );
                None
            }
        }
    }
}

/// Qualitative tone for the prompt, from fixed ascending score thresholds.
pub fn enthusiasm_phrase(score: i64) -> &'static str {
    match score {
        s if s >= 95 => "extremely enthusiastic and confident",
        s if s >= 85 => "very positive and encouraging",
        s if s >= 75 => "moderately positive",
        s if s >= 60 => "balanced and informative",
        _ => "measured and candid",
    }
}

fn build_prompt(context: &str, score: i64, enthusiasm: &str, product_info: &str) -> String {
    format!(
        "You are an expert product recommendation specialist. Recommend this specific product.\n\
         Customer Context: {context}\n\
         Recommendation Score: {score}\n\
         Tone: Be {enthusiasm} about this recommendation.\n\
         \n\
         Product Information:\n\
         {product_info}\n\
         \n\
         Create the recommendation with:\n\
         1. A short label naming this product's standout strength (2-4 words, no quotes or special characters)\n\
         2. A detailed reason (80-120 words explaining why this product fits the customer context)\n\
         \n\
         IMPORTANT: Reply in EXACTLY this format:\n\
         LABEL: [your 2-4 word label here]\n\
         REASON: [your detailed explanation here]\n\
         Do not include any other text, formatting, or extra characters."
    )
}

/// Pulls the `LABEL:` and `REASON:` lines out of a reply. A reply missing
/// either marker is a generation failure for that item.
fn parse_reply(reply: &str) -> Option<(String, String)> {
    let mut label = None;
    let mut reason = None;

    for line in reply.lines() {
        let line = line.trim();
        if let Some(rest) = strip_marker(line, "LABEL:") {
            label = Some(rest.replace(['"', '\''], ""));
        } else if let Some(rest) = strip_marker(line, "REASON:") {
            reason = Some(rest.to_string());
        }
    }

    Some((label?, reason?))
}

fn strip_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let prefix = line.get(..marker.len())?;
    if prefix.eq_ignore_ascii_case(marker) {
        Some(line[marker.len()..].trim())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CatalogSchema, RecommendationItem};
    use crate::services::catalog::CatalogStore;
    use crate::services::snapshot::{CatalogSnapshot, SnapshotStore};
    use crate::services::vector_index::VectorIndex;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedGenerator {
        calls: AtomicUsize,
        reply: Option<String>,
    }

    impl ScriptedGenerator {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply: Some(reply.to_string()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply: None,
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Some(reply) => Ok(reply.clone()),
                None => Err(ApiError::GenerationUnavailable("scripted failure".into())),
            }
        }
    }

    const GOOD_REPLY: &str = "LABEL: Great Pick\nREASON: Fits the customer context well.";

    fn snapshot_store(names: &[&str]) -> Arc<SnapshotStore> {
        let csv = format!("name,type\n{}\n", names.join(",Sedan\n") + ",Sedan");
        let (catalog, _) =
            CatalogStore::load(CatalogSchema::standard(), csv.as_bytes()).unwrap();
        let vectors = (0..names.len()).map(|i| vec![i as f32, 1.0]).collect();
        let index = VectorIndex::build(vectors, (0..names.len()).collect()).unwrap();
        Arc::new(SnapshotStore::new(
            CatalogSnapshot::new(catalog, index).unwrap(),
        ))
    }

    fn service(
        names: &[&str],
        generator: Arc<ScriptedGenerator>,
    ) -> RecommendationService {
        RecommendationService::new(snapshot_store(names), generator, 3, 0.34)
    }

    fn request(items: &[(&str, i64)]) -> RecommendationRequest {
        RecommendationRequest {
            context: "The customer works in retail".to_string(),
            recommendation: items
                .iter()
                .map(|&(name, score)| RecommendationItem {
                    product_name: name.to_string(),
                    score,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_wrong_item_count_rejected_before_any_generation() {
        let generator = ScriptedGenerator::replying(GOOD_REPLY);
        let service = service(&["Camry", "Accord", "Model 3"], generator.clone());

        let result = service
            .recommend(&request(&[("Camry", 90), ("Accord", 80)]))
            .await;

        assert!(matches!(result, Err(ApiError::ValidationError(_))));
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_score_rejected_before_any_generation() {
        let generator = ScriptedGenerator::replying(GOOD_REPLY);
        let service = service(&["Camry", "Accord", "Model 3"], generator.clone());

        let result = service
            .recommend(&request(&[
                ("Camry", 90),
                ("Accord", 101),
                ("Model 3", 60),
            ]))
            .await;

        assert!(matches!(result, Err(ApiError::ValidationError(_))));
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_all_items_unresolved_fails_whole_request() {
        let generator = ScriptedGenerator::replying(GOOD_REPLY);
        let service = service(&["Camry", "Accord", "Model 3"], generator.clone());

        let result = service
            .recommend(&request(&[
                ("zzz", 90),
                ("qqq", 80),
                ("xxx", 70),
            ]))
            .await;

        assert!(matches!(result, Err(ApiError::AllItemsUnresolved)));
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_single_resolved_item_yields_single_recommendation() {
        let generator = ScriptedGenerator::replying(GOOD_REPLY);
        let service = service(&["Camry", "Accord", "Model 3"], generator.clone());

        let results = service
            .recommend(&request(&[
                ("zzz", 90),
                ("camry", 80),
                ("qqq", 70),
            ]))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].product_name, "Camry");
        assert_eq!(results[0].label, "Great Pick");
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_results_keep_original_request_order() {
        let generator = ScriptedGenerator::replying(GOOD_REPLY);
        let service = service(&["Camry", "Accord", "Model 3"], generator.clone());

        let results = service
            .recommend(&request(&[
                ("Model 3", 60),
                ("missing", 95),
                ("Camry", 90),
            ]))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].product_name, "Model 3");
        assert_eq!(results[1].product_name, "Camry");
    }

    #[tokio::test]
    async fn test_generation_failure_drops_item_not_batch() {
        let generator = ScriptedGenerator::failing();
        let service = service(&["Camry", "Accord", "Model 3"], generator.clone());

        let results = service
            .recommend(&request(&[
                ("Camry", 90),
                ("Accord", 80),
                ("Model 3", 70),
            ]))
            .await
            .unwrap();

        assert!(results.is_empty());
        assert_eq!(generator.call_count(), 3);
    }

    #[tokio::test]
    async fn test_reply_without_markers_drops_item() {
        let generator = ScriptedGenerator::replying("I cannot answer in that format.");
        let service = service(&["Camry", "Accord", "Model 3"], generator.clone());

        let results = service
            .recommend(&request(&[
                ("Camry", 90),
                ("Accord", 80),
                ("Model 3", 70),
            ]))
            .await
            .unwrap();

        assert!(results.is_empty());
    }

    #[test]
    fn test_enthusiasm_bucket_boundaries() {
        assert_eq!(enthusiasm_phrase(100), "extremely enthusiastic and confident");
        assert_eq!(enthusiasm_phrase(95), "extremely enthusiastic and confident");
        assert_eq!(enthusiasm_phrase(94), "very positive and encouraging");
        assert_eq!(enthusiasm_phrase(85), "very positive and encouraging");
        assert_eq!(enthusiasm_phrase(84), "moderately positive");
        assert_eq!(enthusiasm_phrase(75), "moderately positive");
        assert_eq!(enthusiasm_phrase(74), "balanced and informative");
        assert_eq!(enthusiasm_phrase(60), "balanced and informative");
        assert_eq!(enthusiasm_phrase(59), "measured and candid");
        assert_eq!(enthusiasm_phrase(0), "measured and candid");
    }

    #[test]
    fn test_prompt_embeds_context_score_tone_and_summary() {
        let prompt = build_prompt(
            "hauls cargo daily",
            88,
            enthusiasm_phrase(88),
            "Name: Atlas 300\nPrice: 30000",
        );

        assert!(prompt.contains("Customer Context: hauls cargo daily"));
        assert!(prompt.contains("Recommendation Score: 88"));
        assert!(prompt.contains("Be very positive and encouraging"));
        assert!(prompt.contains("Name: Atlas 300"));
        assert!(prompt.contains("LABEL:"));
        assert!(prompt.contains("REASON:"));
    }

    #[test]
    fn test_parse_reply_accepts_mixed_case_and_strips_quotes() {
        let reply = "label: \"Family Hauler\"\nReason: Plenty of space.";
        let (label, reason) = parse_reply(reply).unwrap();
        assert_eq!(label, "Family Hauler");
        assert_eq!(reason, "Plenty of space.");
    }

    #[test]
    fn test_parse_reply_requires_both_markers() {
        assert!(parse_reply("LABEL: Good").is_none());
        assert!(parse_reply("REASON: Because.").is_none());
        assert!(parse_reply("nothing structured").is_none());
    }
}
