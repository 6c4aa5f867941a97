//! Flow definition parser
//!
//! Parses `flows.toml` into validated flow definitions and builds the
//! runtime [`FlowGraph`].

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::flow::graph::{ChoiceOption, Edge, Flow, FlowGraph, Node, NodeKind, Trigger};

/// Node type discriminator as written in `flows.toml`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Flow entry point
    Start,
    /// Send a message and auto-advance
    Message,
    /// Present options and wait
    Choice,
    /// Prompt for free text and wait
    Input,
    /// Terminate the flow
    End,
}

/// A node as written in `flows.toml`
///
/// Payload fields are optional at the serde level; `validate` enforces
/// the ones each node type requires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeDef {
    /// Identifier, unique within the flow
    pub id: String,
    /// Node type
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Message/closing text (`message`, `end`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Prompt text (`choice`, `input`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Selectable options (`choice`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,
    /// Session-context key the reply is stored under (`input`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<String>,
}

impl NodeDef {
    fn build(&self) -> Node {
        let kind = match self.node_type {
            NodeType::Start => NodeKind::Start,
            NodeType::Message => NodeKind::Message {
                text: self.text.clone().unwrap_or_default(),
            },
            NodeType::Choice => NodeKind::Choice {
                prompt: self.prompt.clone().unwrap_or_default(),
                options: self.options.clone(),
            },
            NodeType::Input => NodeKind::Input {
                prompt: self.prompt.clone().unwrap_or_default(),
                capture: self.capture.clone(),
            },
            NodeType::End => NodeKind::End {
                text: self.text.clone().unwrap_or_default(),
            },
        };
        Node {
            id: self.id.clone(),
            kind,
        }
    }
}

/// An edge as written in `flows.toml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EdgeDef {
    /// Source node id
    pub from: String,
    /// Target node id
    pub to: String,
    /// Selection id condition, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    /// Diagnostic label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A single flow definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlowDef {
    /// Unique flow name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Whether the flow participates in matching
    #[serde(default = "default_active")]
    pub active: bool,
    /// Trigger kind (default: keyword)
    #[serde(default = "default_trigger")]
    pub trigger: Trigger,
    /// Keywords for the keyword trigger
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Matching precedence; higher wins
    #[serde(default)]
    pub priority: i32,
    /// Nodes in definition order
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeDef>,
    /// Edges in definition order
    #[serde(default, rename = "edge")]
    pub edges: Vec<EdgeDef>,
}

const fn default_active() -> bool {
    true
}

const fn default_trigger() -> Trigger {
    Trigger::Keyword
}

/// Top-level `flows.toml` contents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlowsFile {
    /// Flow definitions in file order
    #[serde(rename = "flow")]
    pub flows: Vec<FlowDef>,
}

impl FlowsFile {
    /// Parse a flows.toml file from a path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read flows file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse flows.toml content from a string
    pub fn parse(content: &str) -> Result<Self> {
        let file: Self = toml::from_str(content).context("Failed to parse flows.toml")?;
        file.validate()?;
        Ok(file)
    }

    /// Build the runtime flow graph from the parsed definitions.
    #[must_use]
    pub fn build(&self) -> FlowGraph {
        let flows = self
            .flows
            .iter()
            .map(|def| Flow {
                name: def.name.clone(),
                description: def.description.clone(),
                active: def.active,
                trigger: def.trigger,
                keywords: def.keywords.clone(),
                priority: def.priority,
                nodes: def.nodes.iter().map(NodeDef::build).collect(),
                edges: def
                    .edges
                    .iter()
                    .map(|e| Edge {
                        from: e.from.clone(),
                        to: e.to.clone(),
                        when: e.when.clone(),
                        label: e.label.clone(),
                    })
                    .collect(),
            })
            .collect();
        FlowGraph::new(flows)
    }

    /// Validate the definitions.
    ///
    /// Rejects structural errors (duplicate names, dangling edges, missing
    /// payloads). Tolerated oddities like duplicate start nodes are left to
    /// [`FlowGraph::integrity_warnings`].
    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for flow in &self.flows {
            if flow.name.trim().is_empty() {
                bail!("Flow name cannot be empty");
            }
            if !seen.insert(&flow.name) {
                bail!("Duplicate flow name: '{}'", flow.name);
            }
            validate_flow(flow).with_context(|| format!("in flow '{}'", flow.name))?;
        }
        Ok(())
    }
}

fn validate_flow(flow: &FlowDef) -> Result<()> {
    let mut node_ids = HashSet::new();
    for node in &flow.nodes {
        if node.id.trim().is_empty() {
            bail!("Node id cannot be empty");
        }
        if !node_ids.insert(node.id.as_str()) {
            bail!("Duplicate node id: '{}'", node.id);
        }
        validate_node(node).with_context(|| format!("in node '{}'", node.id))?;
    }

    for edge in &flow.edges {
        if !node_ids.contains(edge.from.as_str()) {
            bail!("Edge references unknown node '{}' in 'from'", edge.from);
        }
        if !node_ids.contains(edge.to.as_str()) {
            bail!("Edge references unknown node '{}' in 'to'", edge.to);
        }
    }

    Ok(())
}

fn validate_node(node: &NodeDef) -> Result<()> {
    match node.node_type {
        NodeType::Message => {
            if node.text.as_deref().is_none_or(str::is_empty) {
                bail!("Message node requires non-empty 'text'");
            }
        }
        NodeType::Choice => {
            if node.prompt.as_deref().is_none_or(str::is_empty) {
                bail!("Choice node requires non-empty 'prompt'");
            }
            if node.options.is_empty() {
                bail!("Choice node requires at least one option");
            }
            let mut option_ids = HashSet::new();
            for option in &node.options {
                if option.id.trim().is_empty() {
                    bail!("Choice option id cannot be empty");
                }
                if !option_ids.insert(option.id.as_str()) {
                    bail!("Duplicate choice option id: '{}'", option.id);
                }
            }
        }
        NodeType::Input => {
            if node.prompt.as_deref().is_none_or(str::is_empty) {
                bail!("Input node requires non-empty 'prompt'");
            }
        }
        NodeType::Start | NodeType::End => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_FLOWS: &str = r#"
[[flow]]
name = "welcome"
description = "Greets new customers"
trigger = "first_message"
priority = 10

[[flow.node]]
id = "start"
type = "start"

[[flow.node]]
id = "greet"
type = "message"
text = "Welcome! Reply 'menu' to see our services."

[[flow.node]]
id = "done"
type = "end"

[[flow.edge]]
from = "start"
to = "greet"

[[flow.edge]]
from = "greet"
to = "done"

[[flow]]
name = "services"
description = "Service menu"
trigger = "keyword"
keywords = ["menu", "services", "help"]
priority = 5

[[flow.node]]
id = "start"
type = "start"

[[flow.node]]
id = "pick"
type = "choice"
prompt = "What do you need?"
options = [
  { id = "docs", label = "Required documents" },
  { id = "agent", label = "Talk to an agent" },
]

[[flow.node]]
id = "docs_info"
type = "message"
text = "Bring your ID card and two photos."

[[flow.node]]
id = "ask_topic"
type = "input"
prompt = "Briefly describe your issue:"
capture = "issue"

[[flow.node]]
id = "done"
type = "end"
text = "Thanks, an agent will reach out."

[[flow.edge]]
from = "start"
to = "pick"

[[flow.edge]]
from = "pick"
to = "docs_info"
when = "docs"

[[flow.edge]]
from = "pick"
to = "ask_topic"
when = "agent"

[[flow.edge]]
from = "docs_info"
to = "done"

[[flow.edge]]
from = "ask_topic"
to = "done"
"#;

    #[test]
    fn test_parse_valid_flows() {
        let file = FlowsFile::parse(VALID_FLOWS).unwrap();
        assert_eq!(file.flows.len(), 2);
        assert_eq!(file.flows[0].name, "welcome");
        assert_eq!(file.flows[1].keywords, vec!["menu", "services", "help"]);
    }

    #[test]
    fn test_parse_trigger_kinds() {
        let file = FlowsFile::parse(VALID_FLOWS).unwrap();
        assert_eq!(file.flows[0].trigger, Trigger::FirstMessage);
        assert_eq!(file.flows[1].trigger, Trigger::Keyword);
    }

    #[test]
    fn test_defaults_active_and_keyword_trigger() {
        let toml = r#"
[[flow]]
name = "fallback"

[[flow.node]]
id = "start"
type = "start"
"#;
        let file = FlowsFile::parse(toml).unwrap();
        assert!(file.flows[0].active);
        assert_eq!(file.flows[0].trigger, Trigger::Keyword);
        assert_eq!(file.flows[0].priority, 0);
    }

    #[test]
    fn test_build_graph_preserves_definition_order() {
        let graph = FlowsFile::parse(VALID_FLOWS).unwrap().build();
        let names: Vec<&str> = graph.flows().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["welcome", "services"]);
    }

    #[test]
    fn test_build_graph_node_kinds() {
        let graph = FlowsFile::parse(VALID_FLOWS).unwrap().build();
        let services = graph.flow("services").unwrap();
        match &services.node("pick").unwrap().kind {
            NodeKind::Choice { prompt, options } => {
                assert_eq!(prompt, "What do you need?");
                assert_eq!(options.len(), 2);
                assert_eq!(options[0].id, "docs");
            }
            other => panic!("expected choice node, got {other:?}"),
        }
        match &graph.flow("services").unwrap().node("ask_topic").unwrap().kind {
            NodeKind::Input { capture, .. } => {
                assert_eq!(capture.as_deref(), Some("issue"));
            }
            other => panic!("expected input node, got {other:?}"),
        }
    }

    #[test]
    fn test_build_graph_end_without_text_is_empty() {
        let graph = FlowsFile::parse(VALID_FLOWS).unwrap().build();
        let welcome = graph.flow("welcome").unwrap();
        assert_eq!(
            welcome.node("done").unwrap().kind,
            NodeKind::End {
                text: String::new()
            }
        );
    }

    #[test]
    fn test_build_graph_edge_conditions() {
        let graph = FlowsFile::parse(VALID_FLOWS).unwrap().build();
        let services = graph.flow("services").unwrap();
        let edges = services.outgoing_edges("pick");
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].when.as_deref(), Some("docs"));
        assert_eq!(edges[1].when.as_deref(), Some("agent"));
    }

    #[test]
    fn test_reject_duplicate_flow_names() {
        let toml = r#"
[[flow]]
name = "dup"

[[flow]]
name = "dup"
"#;
        let err = FlowsFile::parse(toml).unwrap_err();
        assert!(
            err.to_string().contains("Duplicate flow name"),
            "Expected duplicate-name error, got: {err}"
        );
    }

    #[test]
    fn test_reject_empty_flow_name() {
        let toml = r#"
[[flow]]
name = ""
"#;
        let err = FlowsFile::parse(toml).unwrap_err();
        assert!(
            err.to_string().contains("empty"),
            "Expected empty-name error, got: {err}"
        );
    }

    #[test]
    fn test_reject_duplicate_node_ids() {
        let toml = r#"
[[flow]]
name = "broken"

[[flow.node]]
id = "start"
type = "start"

[[flow.node]]
id = "start"
type = "end"
"#;
        let err = FlowsFile::parse(toml).unwrap_err();
        let msg = format!("{err:?}");
        assert!(
            msg.contains("Duplicate node id"),
            "Expected duplicate-node error, got: {msg}"
        );
        assert!(
            msg.contains("in flow 'broken'"),
            "Expected flow context, got: {msg}"
        );
    }

    #[test]
    fn test_reject_edge_to_unknown_node() {
        let toml = r#"
[[flow]]
name = "broken"

[[flow.node]]
id = "start"
type = "start"

[[flow.edge]]
from = "start"
to = "missing"
"#;
        let err = FlowsFile::parse(toml).unwrap_err();
        assert!(
            format!("{err:?}").contains("unknown node 'missing'"),
            "Expected dangling-edge error, got: {err:?}"
        );
    }

    #[test]
    fn test_reject_message_without_text() {
        let toml = r#"
[[flow]]
name = "broken"

[[flow.node]]
id = "msg"
type = "message"
"#;
        let err = FlowsFile::parse(toml).unwrap_err();
        assert!(
            format!("{err:?}").contains("non-empty 'text'"),
            "Expected missing-text error, got: {err:?}"
        );
    }

    #[test]
    fn test_reject_choice_without_options() {
        let toml = r#"
[[flow]]
name = "broken"

[[flow.node]]
id = "pick"
type = "choice"
prompt = "Pick one"
"#;
        let err = FlowsFile::parse(toml).unwrap_err();
        assert!(
            format!("{err:?}").contains("at least one option"),
            "Expected missing-options error, got: {err:?}"
        );
    }

    #[test]
    fn test_reject_duplicate_option_ids() {
        let toml = r#"
[[flow]]
name = "broken"

[[flow.node]]
id = "pick"
type = "choice"
prompt = "Pick one"
options = [
  { id = "a", label = "First" },
  { id = "a", label = "Second" },
]
"#;
        let err = FlowsFile::parse(toml).unwrap_err();
        assert!(
            format!("{err:?}").contains("Duplicate choice option id"),
            "Expected duplicate-option error, got: {err:?}"
        );
    }

    #[test]
    fn test_reject_input_without_prompt() {
        let toml = r#"
[[flow]]
name = "broken"

[[flow.node]]
id = "ask"
type = "input"
"#;
        let err = FlowsFile::parse(toml).unwrap_err();
        assert!(
            format!("{err:?}").contains("non-empty 'prompt'"),
            "Expected missing-prompt error, got: {err:?}"
        );
    }

    #[test]
    fn test_reject_invalid_toml() {
        let err = FlowsFile::parse("not valid toml {{{").unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = FlowsFile::from_path("/nonexistent/flows.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_from_path_valid_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("flows.toml");
        std::fs::write(&path, VALID_FLOWS).unwrap();

        let file = FlowsFile::from_path(&path).unwrap();
        assert_eq!(file.flows.len(), 2);
    }

    #[test]
    fn test_multiline_message_text() {
        let toml = r#"
[[flow]]
name = "welcome"

[[flow.node]]
id = "greet"
type = "message"
text = """
Line one.
Line two.
"""
"#;
        let file = FlowsFile::parse(toml).unwrap();
        let text = file.flows[0].nodes[0].text.as_deref().unwrap();
        assert!(text.contains("Line one."));
        assert!(text.contains("Line two."));
    }
}
