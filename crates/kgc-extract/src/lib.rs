//! KGC Extract - Connectivity-aware knowledge graph extraction
//!
//! The extraction engine proper: a one-shot initial extraction against a
//! domain prompt bundle, followed by an iterative refinement loop that asks
//! the model for bridging triples until the induced graph is connected to
//! within tolerance, the iteration budget runs out, or the loop stops making
//! progress. Every run produces an audit record describing exactly what
//! happened.

pub mod initial;
pub mod metadata;
pub mod pipeline;
pub mod refine;

pub use initial::{extract_initial, InitialExtraction};
pub use metadata::{
    EntityAnalysis, ExtractionCounts, ExtractionMetadata, ExtractionMethod, FinalState,
    InitialSnapshot, InputStats, IterativeExtraction, PromptIds, RelationAnalysis, RelationCount,
};
pub use pipeline::{ExtractionResult, Pipeline, Record};
pub use refine::{
    CancelFlag, ConnectivityRefiner, IterationRecord, IterationStatus, RefineOptions,
    RefinementTrace, StopReason,
};
