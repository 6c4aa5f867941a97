//! Transition resolver — picks the outgoing edge to follow
//!
//! Deliberately permissive: flows authored with a single outgoing edge per
//! node behave as a linear script, while branching flows must put
//! selection-id conditions on their edges to disambiguate.

use crate::flow::graph::Flow;

/// Resolve the next node to execute after `node_id`, given the user's input.
///
/// Policy, in order:
/// 1. A provided selection id is matched against edge `when` conditions;
///    the first conditioned edge that matches wins.
/// 2. A single outgoing edge is followed unconditionally (free text is
///    accepted as "anything advances").
/// 3. Multiple edges with no matching condition fall back to the first
///    edge in definition order. This mirrors the legacy behavior and is
///    configuration-fragile; branching nodes should condition every edge.
///
/// Returns `None` when the node has no outgoing edges.
#[must_use]
pub fn resolve_next<'a>(flow: &'a Flow, node_id: &str, selection: Option<&str>) -> Option<&'a str> {
    let edges = flow.outgoing_edges(node_id);

    if let Some(selection) = selection {
        if let Some(edge) = edges.iter().find(|e| e.when.as_deref() == Some(selection)) {
            return Some(edge.to.as_str());
        }
    }

    edges.first().map(|e| e.to.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::graph::{Edge, Node, NodeKind, Trigger};

    fn edge(from: &str, to: &str, when: Option<&str>) -> Edge {
        Edge {
            from: from.to_string(),
            to: to.to_string(),
            when: when.map(ToString::to_string),
            label: None,
        }
    }

    fn flow_with_edges(edges: Vec<Edge>) -> Flow {
        let mut node_ids: Vec<String> = edges
            .iter()
            .flat_map(|e| [e.from.clone(), e.to.clone()])
            .collect();
        node_ids.sort();
        node_ids.dedup();

        Flow {
            name: "test".to_string(),
            description: String::new(),
            active: true,
            trigger: Trigger::All,
            keywords: vec![],
            priority: 0,
            nodes: node_ids
                .into_iter()
                .map(|id| Node {
                    id,
                    kind: NodeKind::Start,
                })
                .collect(),
            edges,
        }
    }

    #[test]
    fn test_selection_follows_matching_condition() {
        let flow = flow_with_edges(vec![
            edge("pick", "a_target", Some("A")),
            edge("pick", "b_target", Some("B")),
        ]);

        assert_eq!(resolve_next(&flow, "pick", Some("B")), Some("b_target"));
        assert_eq!(resolve_next(&flow, "pick", Some("A")), Some("a_target"));
    }

    #[test]
    fn test_selection_wins_regardless_of_edge_order() {
        let flow = flow_with_edges(vec![
            edge("pick", "a_target", Some("A")),
            edge("pick", "b_target", Some("B")),
        ]);

        // "B" resolves to b_target even though a_target's edge comes first.
        assert_eq!(resolve_next(&flow, "pick", Some("B")), Some("b_target"));
    }

    #[test]
    fn test_single_edge_advances_without_selection() {
        let flow = flow_with_edges(vec![edge("msg", "next", None)]);
        assert_eq!(resolve_next(&flow, "msg", None), Some("next"));
    }

    #[test]
    fn test_single_edge_advances_with_irrelevant_selection() {
        let flow = flow_with_edges(vec![edge("msg", "next", None)]);
        assert_eq!(resolve_next(&flow, "msg", Some("whatever")), Some("next"));
    }

    #[test]
    fn test_unmatched_selection_falls_back_to_first_edge() {
        let flow = flow_with_edges(vec![
            edge("pick", "a_target", Some("A")),
            edge("pick", "b_target", Some("B")),
        ]);

        assert_eq!(resolve_next(&flow, "pick", Some("C")), Some("a_target"));
    }

    #[test]
    fn test_no_selection_multi_edge_falls_back_to_first() {
        let flow = flow_with_edges(vec![
            edge("pick", "a_target", Some("A")),
            edge("pick", "b_target", Some("B")),
        ]);

        assert_eq!(resolve_next(&flow, "pick", None), Some("a_target"));
    }

    #[test]
    fn test_no_outgoing_edges_returns_none() {
        let flow = flow_with_edges(vec![edge("a", "b", None)]);
        assert_eq!(resolve_next(&flow, "b", None), None);
        assert_eq!(resolve_next(&flow, "b", Some("A")), None);
    }

    #[test]
    fn test_unknown_node_returns_none() {
        let flow = flow_with_edges(vec![edge("a", "b", None)]);
        assert_eq!(resolve_next(&flow, "missing", None), None);
    }
}
