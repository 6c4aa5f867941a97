//! Flow engine — node execution and session continuation
//!
//! The sole entry point for the transport layer is
//! [`Engine::process_inbound_message`]. One pass runs to completion per
//! customer at a time; cross-customer passes are independent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::channel::{ChannelSender, MessageHistory, NotificationSink};
use crate::engine::session::{Session, SessionStore, CTX_LAST_INPUT, CTX_SELECTION};
use crate::flow::graph::{ChoiceOption, Flow, FlowGraph, FlowStore, NodeKind};
use crate::flow::matcher::match_flow;
use crate::flow::resolver::resolve_next;

/// Cap on nodes executed within a single processing pass.
///
/// Converts an infinite-loop flow configuration into a detectable,
/// reportable condition instead of unbounded recursion.
const AUTO_ADVANCE_LIMIT: usize = 25;

/// The result of processing one inbound message
///
/// Carries only the last executed node's output; intermediate
/// auto-advanced message nodes send as a side effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Whether any flow handled the message
    pub handled: bool,
    /// The flow involved in this pass, if any
    pub flow: Option<String>,
    /// Outbound text produced by the final node
    pub response_text: Option<String>,
    /// Options presented by a `choice` node
    pub options: Option<Vec<ChoiceOption>>,
    /// Whether the session is now waiting for the customer's reply
    pub awaiting_input: bool,
    /// Whether the flow reached an `end` node
    pub ended: bool,
    /// Whether any outbound send failed during the pass
    pub delivery_failed: bool,
    /// Configuration and delivery problems observed during the pass
    pub warnings: Vec<String>,
}

impl Outcome {
    /// An outcome for a message no flow handled.
    #[must_use]
    pub fn unhandled() -> Self {
        Self::default()
    }
}

/// Render a choice prompt with numbered option labels, the way the
/// plain-text channel fallback presents buttons.
#[must_use]
pub fn render_choice_prompt(prompt: &str, options: &[ChoiceOption]) -> String {
    let lines: Vec<String> = options
        .iter()
        .enumerate()
        .map(|(i, o)| format!("{}. {}", i + 1, o.label))
        .collect();
    format!("{prompt}\n\n{}", lines.join("\n"))
}

/// The flow engine
///
/// Constructed with its collaborators injected, so tests can run
/// isolated instances against in-memory implementations.
pub struct Engine {
    flows: Arc<FlowStore>,
    sessions: Arc<SessionStore>,
    sender: Arc<dyn ChannelSender>,
    history: Arc<dyn MessageHistory>,
    notifier: Arc<dyn NotificationSink>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Engine {
    /// Create an engine over the given graph store, session store, and
    /// channel collaborators.
    #[must_use]
    pub fn new(
        flows: Arc<FlowStore>,
        sessions: Arc<SessionStore>,
        sender: Arc<dyn ChannelSender>,
        history: Arc<dyn MessageHistory>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            flows,
            sessions,
            sender,
            history,
            notifier,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Process one inbound message to completion.
    ///
    /// Continues the customer's active session if one exists; otherwise
    /// runs the matcher and starts the matched flow. Passes for the same
    /// customer are serialized; passes for different customers run in
    /// parallel against a shared graph snapshot.
    pub async fn process_inbound_message(
        &self,
        customer: &str,
        text: &str,
        selection: Option<&str>,
    ) -> Outcome {
        let lock = self.customer_lock(customer);
        let _guard = lock.lock().await;

        let graph = self.flows.snapshot();
        if let Some(session) = self.sessions.active(customer) {
            return self.continue_session(&graph, session, text, selection).await;
        }

        let Some(flow) = match_flow(&graph, self.history.as_ref(), customer, text).await else {
            return Outcome::unhandled();
        };
        self.start_flow(flow, customer, text).await
    }

    /// Start the matched flow at its start node.
    async fn start_flow(&self, flow: &Flow, customer: &str, text: &str) -> Outcome {
        let Some(start) = flow.start_node() else {
            let mut outcome = Outcome::unhandled();
            outcome.flow = Some(flow.name.clone());
            outcome
                .warnings
                .push(format!("flow '{}' has no start node", flow.name));
            return outcome;
        };

        let start_id = start.id.clone();
        let session = self.sessions.start(customer, &flow.name, &start_id, text);
        self.execute_chain(flow, session, &start_id).await
    }

    /// Continue an active session with the customer's reply.
    async fn continue_session(
        &self,
        graph: &FlowGraph,
        mut session: Session,
        text: &str,
        selection: Option<&str>,
    ) -> Outcome {
        let mut outcome = Outcome::unhandled();
        outcome.flow = Some(session.flow.clone());

        let Some(flow) = graph.flow(&session.flow) else {
            outcome.warnings.push(format!(
                "session for '{}' references missing flow '{}'",
                session.customer, session.flow
            ));
            self.deactivate(&mut session);
            return outcome;
        };
        let Some(current) = session.current_node.clone() else {
            self.deactivate(&mut session);
            return outcome;
        };
        let Some(node) = flow.node(&current) else {
            outcome.warnings.push(format!(
                "flow '{}' no longer contains node '{current}'",
                flow.name
            ));
            self.deactivate(&mut session);
            return outcome;
        };

        session
            .context
            .insert(CTX_LAST_INPUT.to_string(), text.to_string());
        if let Some(selection) = selection {
            session
                .context
                .insert(CTX_SELECTION.to_string(), selection.to_string());
        }
        if let NodeKind::Input {
            capture: Some(key), ..
        } = &node.kind
        {
            session.context.insert(key.clone(), text.to_string());
        }
        self.sessions.save(&session);

        match resolve_next(flow, &current, selection) {
            Some(next) => {
                let next = next.to_string();
                self.advance(&mut session, &next);
                self.execute_chain(flow, session, &next).await
            }
            None => {
                // No valid transition: tear the session down and report
                // the message as unhandled.
                self.deactivate(&mut session);
                outcome
            }
        }
    }

    /// Execute the node at `start_at` and auto-advance through any chain
    /// of `start`/`message` nodes until a node needs external interaction
    /// or the flow ends.
    async fn execute_chain(&self, flow: &Flow, mut session: Session, start_at: &str) -> Outcome {
        let mut outcome = Outcome {
            flow: Some(flow.name.clone()),
            ..Outcome::default()
        };
        let mut node_id = start_at.to_string();

        for _ in 0..AUTO_ADVANCE_LIMIT {
            let Some(node) = flow.node(&node_id) else {
                outcome.handled = false;
                outcome.warnings.push(format!(
                    "flow '{}' references missing node '{node_id}'",
                    flow.name
                ));
                self.deactivate(&mut session);
                return outcome;
            };

            match &node.kind {
                NodeKind::Start => {
                    let Some(next) = resolve_next(flow, &node_id, None) else {
                        outcome.handled = false;
                        outcome.warnings.push(format!(
                            "flow '{}': start node '{node_id}' has no outgoing edge",
                            flow.name
                        ));
                        self.deactivate(&mut session);
                        return outcome;
                    };
                    let next = next.to_string();
                    self.advance(&mut session, &next);
                    node_id = next;
                }

                NodeKind::Message { text } => {
                    self.deliver(&session.customer, text, &mut outcome).await;
                    outcome.handled = true;
                    outcome.response_text = Some(text.clone());
                    outcome.options = None;
                    match resolve_next(flow, &node_id, None) {
                        Some(next) => {
                            let next = next.to_string();
                            self.advance(&mut session, &next);
                            node_id = next;
                        }
                        // Dead end: the session stays parked at this node;
                        // the next inbound message finds no transition and
                        // tears it down.
                        None => return outcome,
                    }
                }

                NodeKind::Choice { prompt, options } => {
                    let rendered = render_choice_prompt(prompt, options);
                    self.deliver(&session.customer, &rendered, &mut outcome)
                        .await;
                    session.awaiting_input = true;
                    self.sessions.save(&session);
                    outcome.handled = true;
                    outcome.response_text = Some(prompt.clone());
                    outcome.options = Some(options.clone());
                    outcome.awaiting_input = true;
                    return outcome;
                }

                NodeKind::Input { prompt, .. } => {
                    self.deliver(&session.customer, prompt, &mut outcome).await;
                    session.awaiting_input = true;
                    self.sessions.save(&session);
                    outcome.handled = true;
                    outcome.response_text = Some(prompt.clone());
                    outcome.options = None;
                    outcome.awaiting_input = true;
                    return outcome;
                }

                NodeKind::End { text } => {
                    if !text.is_empty() {
                        self.deliver(&session.customer, text, &mut outcome).await;
                        outcome.response_text = Some(text.clone());
                    }
                    self.deactivate(&mut session);
                    let note = format!("Flow completed: {}", flow.name);
                    if let Err(err) = self.notifier.notify(&session.customer, &note).await {
                        outcome
                            .warnings
                            .push(format!("admin notification failed: {err:#}"));
                    }
                    outcome.handled = true;
                    outcome.ended = true;
                    return outcome;
                }
            }
        }

        outcome.handled = false;
        outcome.warnings.push(format!(
            "flow '{}': auto-advance limit ({AUTO_ADVANCE_LIMIT}) reached at node '{node_id}'; deactivating session",
            flow.name
        ));
        self.deactivate(&mut session);
        outcome
    }

    /// Send text to the customer and, only after a successful send,
    /// append the matching outbound record to conversation history.
    async fn deliver(&self, customer: &str, text: &str, outcome: &mut Outcome) {
        match self.sender.send(customer, text).await {
            Ok(_message_id) => {
                self.history.record_outbound(customer, text).await;
            }
            Err(err) => {
                outcome.delivery_failed = true;
                outcome
                    .warnings
                    .push(format!("outbound send failed: {err:#}"));
            }
        }
    }

    fn advance(&self, session: &mut Session, next: &str) {
        session.current_node = Some(next.to_string());
        session.awaiting_input = false;
        self.sessions.save(session);
    }

    fn deactivate(&self, session: &mut Session) {
        session.active = false;
        session.awaiting_input = false;
        self.sessions.save(session);
    }

    fn customer_lock(&self, customer: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(customer.to_string()).or_default().clone()
    }
}
