//! Builds a pattern store by asking the completion provider to classify
//! each raw/refined document pair.

use golden_rule_llm::{CompletionProvider, CompletionRequest, CLASSIFY_TEMPERATURE};
use golden_rule_patterns::{classification_prompt, parse_classification, DocumentPair, PatternStore};

use crate::redact::sanitize_sensitive;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MineReport {
    pub processed: usize,
    pub classified: usize,
    /// File names whose classification failed, in processing order.
    pub failed: Vec<String>,
}

/// Classifies every pair in order. A pair that fails is logged and skipped;
/// the rest still contribute to the store.
pub async fn mine_patterns(
    pairs: &[DocumentPair],
    provider: &dyn CompletionProvider,
) -> (PatternStore, MineReport) {
    let mut store = PatternStore::default();
    let mut report = MineReport::default();
    for pair in pairs {
        report.processed += 1;
        tracing::info!(file = %pair.filename, "classifying document pair");
        let request = CompletionRequest::user(classification_prompt(pair))
            .with_temperature(CLASSIFY_TEMPERATURE);
        let outcome = match provider.complete(request).await {
            Ok(response) => parse_classification(&response.text).map_err(|e| e.to_string()),
            Err(err) => Err(sanitize_sensitive(&err.to_string())),
        };
        match outcome {
            Ok(classification) => {
                let (category, example) = classification.into_example(pair);
                tracing::info!(file = %pair.filename, %category, "classified");
                store.insert(category, example);
                report.classified += 1;
            }
            Err(reason) => {
                tracing::warn!(file = %pair.filename, error = %reason, "skipping document pair");
                report.failed.push(pair.filename.clone());
            }
        }
    }
    (store, report)
}
