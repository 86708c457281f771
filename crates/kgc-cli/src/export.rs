//! Graph export
//!
//! Transcribes extracted triple sets into serialized graph formats:
//! GraphML for graph tooling, and node-link JSON for web consumers.
//! Nodes are deduplicated on the normalized entity label; the first-seen
//! spelling is what gets written.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde_json::json;

use kgc_core::{normalize, Triple};

/// Render a triple set as a GraphML document.
pub fn to_graphml(triples: &[Triple]) -> String {
    let (nodes, edges) = collect(triples);

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n");
    out.push_str("  <key id=\"label\" for=\"node\" attr.name=\"label\" attr.type=\"string\"/>\n");
    out.push_str("  <key id=\"relation\" for=\"edge\" attr.name=\"relation\" attr.type=\"string\"/>\n");
    out.push_str("  <key id=\"inference\" for=\"edge\" attr.name=\"inference\" attr.type=\"string\"/>\n");
    out.push_str("  <graph edgedefault=\"directed\">\n");

    for (key, label) in &nodes {
        let _ = writeln!(
            out,
            "    <node id=\"{}\"><data key=\"label\">{}</data></node>",
            escape_xml(key),
            escape_xml(label)
        );
    }
    for (source, target, relation, inference) in &edges {
        let _ = writeln!(
            out,
            "    <edge source=\"{}\" target=\"{}\"><data key=\"relation\">{}</data><data key=\"inference\">{}</data></edge>",
            escape_xml(source),
            escape_xml(target),
            escape_xml(relation),
            escape_xml(inference)
        );
    }

    out.push_str("  </graph>\n");
    out.push_str("</graphml>\n");
    out
}

/// Render a triple set as node-link JSON.
pub fn to_node_link_json(triples: &[Triple]) -> serde_json::Value {
    let (nodes, edges) = collect(triples);

    json!({
        "directed": true,
        "nodes": nodes
            .iter()
            .map(|(key, label)| json!({ "id": key, "label": label }))
            .collect::<Vec<_>>(),
        "links": edges
            .iter()
            .map(|(source, target, relation, inference)| {
                json!({
                    "source": source,
                    "target": target,
                    "relation": relation,
                    "inference": inference,
                })
            })
            .collect::<Vec<_>>(),
    })
}

type Edges = Vec<(String, String, String, String)>;

/// Deduplicated nodes (normalized key, display label) and edges.
fn collect(triples: &[Triple]) -> (Vec<(String, String)>, Edges) {
    let mut node_labels: HashMap<String, String> = HashMap::new();
    let mut node_order: Vec<String> = Vec::new();
    let mut seen_edges = std::collections::HashSet::new();
    let mut edges = Vec::new();

    for triple in triples {
        for label in [&triple.head, &triple.tail] {
            let key = normalize(label);
            node_labels.entry(key.clone()).or_insert_with(|| {
                node_order.push(key.clone());
                label.trim().to_string()
            });
        }
        if seen_edges.insert(triple.key()) {
            edges.push((
                normalize(&triple.head),
                normalize(&triple.tail),
                triple.relation.clone(),
                triple.inference.to_string(),
            ));
        }
    }

    let nodes = node_order
        .into_iter()
        .map(|key| {
            let label = node_labels.get(&key).cloned().unwrap_or_else(|| key.clone());
            (key, label)
        })
        .collect();
    (nodes, edges)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
