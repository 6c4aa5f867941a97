//! Flow graph model
//!
//! Flows, nodes, and edges addressed by stable string identifiers in flat
//! collections. Nodes and edges are looked up by id rather than held as an
//! in-memory pointer graph, so the naturally cyclic structure (edges refer
//! to nodes in both directions) stays ownership-friendly.

use std::cmp::Reverse;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// The rule by which a flow is selected to start for an unattached message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Matches when any configured keyword appears in the message
    Keyword,
    /// Matches only the customer's very first inbound message
    FirstMessage,
    /// Matches every message
    All,
}

/// A selectable option presented by a `choice` node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChoiceOption {
    /// Stable selection identifier carried back by the customer's reply
    pub id: String,
    /// Display label shown to the customer
    pub label: String,
}

/// What a node does when executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Entry point; produces no output of its own
    Start,
    /// Send a text message and auto-advance
    Message {
        /// The text to send
        text: String,
    },
    /// Present options and wait for a selection
    Choice {
        /// Prompt text sent with the options
        prompt: String,
        /// The selectable options, in display order
        options: Vec<ChoiceOption>,
    },
    /// Prompt for free text and wait for the reply
    Input {
        /// Prompt text sent to the customer
        prompt: String,
        /// Session-context key the reply is stored under, if any
        capture: Option<String>,
    },
    /// Terminate the flow, optionally with a closing message
    End {
        /// Closing text; empty means no outbound send
        text: String,
    },
}

/// A single step in a flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Identifier, unique within the owning flow
    pub id: String,
    /// Type-specific behavior and payload
    pub kind: NodeKind,
}

/// A directed transition between two nodes in the same flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Source node id
    pub from: String,
    /// Target node id
    pub to: String,
    /// Selection id that must match for this edge to be taken, if any
    pub when: Option<String>,
    /// Diagnostic label
    pub label: Option<String>,
}

/// A named, prioritized conversational script composed of nodes and edges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
    /// Unique flow name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Inactive flows are never matched
    pub active: bool,
    /// How this flow is selected to start
    pub trigger: Trigger,
    /// Keywords for the `keyword` trigger (case-insensitive substrings)
    pub keywords: Vec<String>,
    /// Matching precedence; higher wins, ties break by definition order
    pub priority: i32,
    /// Nodes in definition order
    pub nodes: Vec<Node>,
    /// Edges in definition order
    pub edges: Vec<Edge>,
}

impl Flow {
    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The flow's entry node: the first `start` node in definition order.
    ///
    /// Duplicate start nodes are a data-integrity warning, not an error;
    /// the first one found wins (see [`FlowGraph::integrity_warnings`]).
    #[must_use]
    pub fn start_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind == NodeKind::Start)
    }

    /// Outgoing edges of a node, in definition order.
    #[must_use]
    pub fn outgoing_edges(&self, node_id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.from == node_id).collect()
    }
}

/// An immutable set of flow definitions
///
/// Read-only from the engine's perspective; authored by external admin
/// tooling and swapped wholesale through [`FlowStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowGraph {
    flows: Vec<Flow>,
}

impl FlowGraph {
    /// Create a graph from flows in definition order.
    #[must_use]
    pub fn new(flows: Vec<Flow>) -> Self {
        Self { flows }
    }

    /// Look up a flow by name.
    #[must_use]
    pub fn flow(&self, name: &str) -> Option<&Flow> {
        self.flows.iter().find(|f| f.name == name)
    }

    /// All flows in definition order, active or not.
    #[must_use]
    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    /// Active flows in matching order: descending priority, ties broken
    /// by definition order (the sort is stable).
    #[must_use]
    pub fn active_flows_by_priority(&self) -> Vec<&Flow> {
        let mut flows: Vec<&Flow> = self.flows.iter().filter(|f| f.active).collect();
        flows.sort_by_key(|f| Reverse(f.priority));
        flows
    }

    /// Data-integrity warnings for tolerated-but-suspect definitions.
    ///
    /// These do not prevent loading: missing start nodes make a flow
    /// unmatchable at runtime (reported as unhandled), duplicate start
    /// nodes fall back to the first one, orphan nodes are unreachable.
    #[must_use]
    pub fn integrity_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for flow in &self.flows {
            let start_count = flow
                .nodes
                .iter()
                .filter(|n| n.kind == NodeKind::Start)
                .count();
            if start_count == 0 {
                warnings.push(format!("flow '{}' has no start node", flow.name));
            } else if start_count > 1 {
                warnings.push(format!(
                    "flow '{}' has {start_count} start nodes; the first one is used",
                    flow.name
                ));
            }

            for node in &flow.nodes {
                let has_incoming = flow.edges.iter().any(|e| e.to == node.id);
                if node.kind != NodeKind::Start && !has_incoming {
                    warnings.push(format!(
                        "flow '{}': node '{}' has no incoming edges and is unreachable",
                        flow.name, node.id
                    ));
                }
            }

            if flow.trigger == Trigger::Keyword && flow.keywords.is_empty() {
                warnings.push(format!(
                    "flow '{}' has a keyword trigger but no keywords; it never matches",
                    flow.name
                ));
            }
        }

        warnings
    }
}

/// Snapshot-consistent holder for the current flow graph
///
/// Readers take an `Arc` snapshot once per processing pass and never
/// observe a half-updated graph; the admin path replaces the whole graph
/// atomically.
#[derive(Debug)]
pub struct FlowStore {
    current: RwLock<Arc<FlowGraph>>,
}

impl FlowStore {
    /// Create a store holding the given graph.
    #[must_use]
    pub fn new(graph: FlowGraph) -> Self {
        Self {
            current: RwLock::new(Arc::new(graph)),
        }
    }

    /// The current graph. Cheap; clones only the `Arc`.
    #[must_use]
    pub fn snapshot(&self) -> Arc<FlowGraph> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the entire graph. In-flight passes keep their old snapshot.
    pub fn replace(&self, graph: FlowGraph) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(graph);
    }
}
