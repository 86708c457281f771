//! Pipeline orchestrator
//!
//! Drives one record at a time: initial extraction, refinement, metadata
//! assembly. The orchestrator performs no I/O; persistence belongs to the
//! caller. Records are independent, so callers may run several pipelines
//! concurrently against the same domain and client.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use kgc_core::{ExtractionConfig, LmClient, Result, Triple};
use kgc_domain::Domain;

use crate::initial::extract_initial;
use crate::metadata::{assemble_metadata, ExtractionMetadata, MetadataInputs};
use crate::refine::{CancelFlag, ConnectivityRefiner, RefineOptions};

// ============================================================================
// Records and results
// ============================================================================

/// An input record. Fields beyond `id` and `text` are preserved untouched
/// for downstream consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub text: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// The per-record output of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub record_id: String,
    pub triples: Vec<Triple>,
    pub metadata: ExtractionMetadata,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Composes extraction, refinement, and metadata assembly for one domain.
pub struct Pipeline {
    client: Arc<dyn LmClient>,
    domain: Arc<Domain>,
    config: ExtractionConfig,
}

impl Pipeline {
    pub fn new(client: Arc<dyn LmClient>, domain: Arc<Domain>, config: ExtractionConfig) -> Self {
        Self {
            client,
            domain,
            config,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Process a single record end to end.
    ///
    /// Empty or whitespace-only text short-circuits with an empty triple set
    /// and `empty_input = true`. A backend failure during the initial call
    /// propagates; failures during refinement are absorbed into the trace
    /// with the accumulated triples preserved.
    pub async fn process_record(
        &self,
        record: &Record,
        cancel: Option<CancelFlag>,
    ) -> Result<ExtractionResult> {
        if record.text.trim().is_empty() {
            tracing::warn!(record_id = %record.id, "skipping record with empty text");
            let metadata = assemble_metadata(MetadataInputs {
                record_id: &record.id,
                text: &record.text,
                domain: &self.domain,
                config: &self.config,
                model_identifier: self.client.model_name(),
                initial_count: 0,
                triples: &[],
                trace: None,
                invalid_items_dropped: 0,
                empty_input: true,
            });
            return Ok(ExtractionResult {
                record_id: record.id.clone(),
                triples: Vec::new(),
                metadata,
            });
        }

        let initial = extract_initial(
            self.client.as_ref(),
            &self.domain,
            &record.text,
            Some(&record.id),
            self.config.mode,
            self.config.temperature,
        )
        .await?;
        let initial_count = initial.triples.len();

        let refiner = ConnectivityRefiner::new(self.client.as_ref());
        let options = RefineOptions {
            max_disconnected: self.config.max_disconnected,
            max_iterations: self.config.max_iterations,
            temperature: self.config.temperature,
            cancel,
        };
        let (triples, trace) = refiner
            .refine(&record.text, &self.domain, initial.triples, &options)
            .await;

        let metadata = assemble_metadata(MetadataInputs {
            record_id: &record.id,
            text: &record.text,
            domain: &self.domain,
            config: &self.config,
            model_identifier: self.client.model_name(),
            initial_count,
            triples: &triples,
            trace: Some(&trace),
            invalid_items_dropped: initial.dropped + trace.items_dropped,
            empty_input: false,
        });

        Ok(ExtractionResult {
            record_id: record.id.clone(),
            triples,
            metadata,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
