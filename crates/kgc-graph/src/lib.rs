//! KGC Graph - Graph view over an extracted triple set
//!
//! Builds a directed graph from triples, decomposes it into weakly connected
//! components, and renders a stable, LM-readable description of those
//! components for the bridging prompt. The graph is rebuilt from the triple
//! set each refinement iteration; component indices are only meaningful
//! within a single snapshot.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use kgc_core::{normalize, Triple};

/// Cap on components rendered into the bridging prompt.
const MAX_COMPONENTS_SHOWN: usize = 30;

/// Cap on representative entities rendered per component.
const MAX_NODES_SHOWN: usize = 10;

// ============================================================================
// Graph
// ============================================================================

/// Directed graph induced by a triple set.
///
/// Nodes are keyed by the normalized entity label; the stored weight is the
/// first-seen original spelling, which is what prompts and exports display.
/// Edges are deduplicated on triple identity.
pub struct TripleGraph {
    graph: DiGraph<String, String>,
    index: HashMap<String, NodeIndex>,
}

impl TripleGraph {
    /// Build the graph view for a triple set. Linear in `|triples|`.
    pub fn build(triples: &[Triple]) -> Self {
        let mut graph = DiGraph::new();
        let mut index: HashMap<String, NodeIndex> = HashMap::new();
        let mut seen_edges = std::collections::HashSet::new();

        for triple in triples {
            if !seen_edges.insert(triple.key()) {
                continue;
            }
            let head = intern_node(&mut graph, &mut index, &triple.head);
            let tail = intern_node(&mut graph, &mut index, &triple.tail);
            graph.add_edge(head, tail, triple.relation.clone());
        }

        Self { graph, index }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Undirected degree of an entity, 0 if absent.
    pub fn degree(&self, label: &str) -> usize {
        self.index
            .get(&normalize(label))
            .map(|&node| {
                self.graph
                    .edges_directed(node, petgraph::Direction::Outgoing)
                    .count()
                    + self
                        .graph
                        .edges_directed(node, petgraph::Direction::Incoming)
                        .count()
            })
            .unwrap_or(0)
    }

    /// Display labels of all nodes, in lexicographic order.
    pub fn node_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .graph
            .node_indices()
            .map(|n| self.graph[n].clone())
            .collect();
        labels.sort();
        labels
    }

    /// Weakly connected components, largest first.
    ///
    /// Ties on size break toward the component whose lexicographically
    /// smallest node label sorts first, so the decomposition is stable for
    /// equivalent graphs.
    pub fn components(&self) -> Vec<Component> {
        let mut union = UnionFind::new(self.graph.node_count());
        for edge in self.graph.edge_references() {
            union.union(edge.source().index(), edge.target().index());
        }

        let mut groups: HashMap<usize, Vec<NodeIndex>> = HashMap::new();
        for node in self.graph.node_indices() {
            groups.entry(union.find(node.index())).or_default().push(node);
        }

        let mut components: Vec<Component> = groups
            .into_values()
            .map(|nodes| {
                let mut labels: Vec<String> =
                    nodes.iter().map(|&n| self.graph[n].clone()).collect();
                labels.sort();
                Component { index: 0, nodes: labels }
            })
            .collect();

        components.sort_by(|a, b| {
            b.size()
                .cmp(&a.size())
                .then_with(|| a.nodes.first().cmp(&b.nodes.first()))
        });
        for (i, component) in components.iter_mut().enumerate() {
            component.index = i;
        }
        components
    }

    /// Number of weakly connected components.
    pub fn component_count(&self) -> usize {
        self.components().len()
    }

    /// Structural statistics over the current snapshot.
    pub fn stats(&self) -> GraphStats {
        let nodes = self.node_count();
        let edges = self.edge_count();
        let disconnected_components = self.component_count();
        GraphStats {
            nodes,
            edges,
            disconnected_components,
            is_connected: disconnected_components == 1,
            avg_degree: if nodes == 0 {
                0.0
            } else {
                2.0 * edges as f64 / nodes as f64
            },
        }
    }

    /// Render components for the bridging prompt.
    ///
    /// One line per component: index, size, and up to [`MAX_NODES_SHOWN`]
    /// representative entities chosen by descending degree, then
    /// lexicographic label. At most [`MAX_COMPONENTS_SHOWN`] components are
    /// rendered, keeping the prompt inside the model's context.
    pub fn format_components(&self, components: &[Component]) -> String {
        let mut lines = Vec::new();

        for component in components.iter().take(MAX_COMPONENTS_SHOWN) {
            let mut nodes: Vec<&String> = component.nodes.iter().collect();
            nodes.sort_by(|a, b| {
                self.degree(b)
                    .cmp(&self.degree(a))
                    .then_with(|| a.cmp(b))
            });

            let shown: Vec<&str> = nodes
                .iter()
                .take(MAX_NODES_SHOWN)
                .map(|s| s.as_str())
                .collect();
            let mut line = format!(
                "Component {} ({} nodes): {}",
                component.index + 1,
                component.size(),
                shown.join(", ")
            );
            if component.size() > MAX_NODES_SHOWN {
                line.push_str(" ...");
            }
            lines.push(line);
        }

        if components.len() > MAX_COMPONENTS_SHOWN {
            lines.push(format!(
                "... and {} more components",
                components.len() - MAX_COMPONENTS_SHOWN
            ));
        }

        lines.join("\n")
    }
}

fn intern_node(
    graph: &mut DiGraph<String, String>,
    index: &mut HashMap<String, NodeIndex>,
    label: &str,
) -> NodeIndex {
    let key = normalize(label);
    match index.get(&key) {
        Some(&node) => node,
        None => {
            let node = graph.add_node(label.trim().to_string());
            index.insert(key, node);
            node
        }
    }
}

// ============================================================================
// Components and stats
// ============================================================================

/// A maximal set of mutually reachable nodes under undirected traversal.
///
/// The index is stable for a given snapshot only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Position in the snapshot's size-ordered decomposition
    pub index: usize,
    /// Display labels, lexicographically sorted
    pub nodes: Vec<String>,
}

impl Component {
    pub fn size(&self) -> usize {
        self.nodes.len()
    }
}

/// Structural statistics computed on a graph snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub disconnected_components: usize,
    pub is_connected: bool,
    pub avg_degree: f64,
}

// ============================================================================
// Tests
// ============================================================================
