//! System messages shared by the client implementations

use kgc_core::{DomainSchema, FewShotExample};

/// System message for the grounded extraction operation.
///
/// Few-shot examples are rendered as JSON so the model can copy the output
/// shape; the schema, when present, constrains entity and relation types.
pub fn grounded_system_message(
    examples: &[FewShotExample],
    schema: Option<&DomainSchema>,
) -> String {
    let mut message = String::from(
        "You extract knowledge graph triples from text. Respond with a JSON array of \
         objects with fields: head, relation, tail, inference (\"explicit\" or \
         \"contextual\"), justification, char_start, char_end, extraction_text. \
         Ground each triple in the source text with character offsets when possible. \
         Do not include any preamble or extra explanation.",
    );

    if let Some(schema) = schema.filter(|s| !s.is_empty()) {
        message.push_str("\n\nAllowed entity types: ");
        message.push_str(&join(&schema.entity_types));
        message.push_str("\nAllowed relation types: ");
        message.push_str(&join(&schema.relation_types));
    }

    if !examples.is_empty() {
        message.push_str("\n\nExamples of texts and their extractions:\n");
        if let Ok(rendered) = serde_json::to_string_pretty(examples) {
            message.push_str(&rendered);
        }
    }

    message
}

/// System message for the ungrounded JSON generation operation.
pub fn generate_system_message(schema: Option<&DomainSchema>) -> String {
    let mut message = String::from(
        "You are a helpful assistant that returns structured JSON. Respond with a JSON \
         array of objects with fields: head, relation, tail, inference, justification. \
         Respond with ONLY valid JSON, no additional text or markdown.",
    );

    if let Some(schema) = schema.filter(|s| !s.is_empty()) {
        message.push_str("\n\nAllowed entity types: ");
        message.push_str(&join(&schema.entity_types));
        message.push_str("\nAllowed relation types: ");
        message.push_str(&join(&schema.relation_types));
    }

    message
}

fn join(set: &std::collections::BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(", ")
}
