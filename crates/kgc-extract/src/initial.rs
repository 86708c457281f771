//! Initial extraction
//!
//! One grounded LM call against the domain's extraction prompt. The record
//! is injected into the template literally (`{{record_json}}`), responses
//! are validated and deduplicated, and the survivors are tagged
//! `iteration_source = 0`.

use serde_json::json;

use kgc_core::{
    dedup_triples, ExtractionMode, ExtractionPhase, GroundedRequest, LmClient, Result, Triple,
    TripleValidator,
};
use kgc_domain::Domain;

/// Outcome of the initial extraction call.
#[derive(Debug, Clone, Default)]
pub struct InitialExtraction {
    /// Validated, deduplicated triples in model order
    pub triples: Vec<Triple>,
    /// Items dropped by validation
    pub dropped: usize,
}

/// Run the initial extraction for one text.
///
/// A model that returns zero items produces an empty extraction, not an
/// error; a backend failure here propagates, since there is no partial
/// result to preserve yet.
pub async fn extract_initial(
    client: &dyn LmClient,
    domain: &Domain,
    text: &str,
    record_id: Option<&str>,
    mode: ExtractionMode,
    temperature: f32,
) -> Result<InitialExtraction> {
    let template = domain.prompt(mode)?;

    let record = match record_id {
        Some(id) => json!({ "id": id, "text": text }),
        None => json!({ "text": text }),
    };
    let record_json =
        serde_json::to_string_pretty(&record).unwrap_or_else(|_| record.to_string());
    let prompt = template.replace("{{record_json}}", &record_json);

    let raw = client
        .extract_grounded(GroundedRequest {
            prompt: &prompt,
            examples: domain.examples(),
            schema: domain.schema(),
            temperature,
        })
        .await?;

    let report = TripleValidator::new(ExtractionPhase::Initial, Some(text)).validate_all(raw);
    if report.dropped > 0 {
        tracing::warn!(
            dropped = report.dropped,
            record_id,
            "initial extraction dropped invalid items"
        );
    }

    let triples = dedup_triples(report.triples);
    tracing::info!(
        triples = triples.len(),
        record_id,
        "initial extraction complete"
    );

    Ok(InitialExtraction {
        triples,
        dropped: report.dropped,
    })
}
