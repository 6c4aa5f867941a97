//! Flow matcher — selects which flow, if any, starts for an unattached message
//!
//! Runs only when the customer has no active session. Active flows are
//! evaluated in descending priority (ties by definition order) and the
//! first matching trigger wins. Matching has no side effects.

use crate::channel::MessageHistory;
use crate::flow::graph::{Flow, FlowGraph, Trigger};

/// Normalize message text for trigger comparison: trim and lowercase.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Check whether a single flow's trigger matches the normalized message.
async fn flow_matches(
    flow: &Flow,
    history: &dyn MessageHistory,
    customer: &str,
    normalized: &str,
) -> bool {
    match flow.trigger {
        Trigger::All => true,
        Trigger::Keyword => flow
            .keywords
            .iter()
            .any(|k| normalized.contains(&k.to_lowercase())),
        // The current message is already recorded, so a count of 1 means
        // this is the customer's first contact.
        Trigger::FirstMessage => history.count_inbound(customer).await <= 1,
    }
}

/// Find the flow that should start for this message, if any.
///
/// Returns the highest-priority matching active flow, or `None` when
/// nothing matches.
pub async fn match_flow<'a>(
    graph: &'a FlowGraph,
    history: &dyn MessageHistory,
    customer: &str,
    text: &str,
) -> Option<&'a Flow> {
    let normalized = normalize(text);
    for flow in graph.active_flows_by_priority() {
        if flow_matches(flow, history, customer, &normalized).await {
            return Some(flow);
        }
    }
    None
}
