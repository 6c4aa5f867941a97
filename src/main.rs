//! botflow - Chat flow engine
//!
//! Console entry point: drives a single-customer conversation over stdin
//! against the flow engine, the way a webhook transport would drive it
//! with real channel messages.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use botflow::cli::ChatDisplay;
use botflow::engine::executor::Engine;
use botflow::engine::session::SessionStore;
use botflow::flow::config::FlowsFile;
use botflow::flow::graph::{ChoiceOption, FlowStore, NodeKind};
use botflow::log::{JsonlLogger, PassRecord};
use botflow::InMemoryChannel;

/// Chat flow engine
///
/// Loads flow definitions from a TOML file and runs scripted conversations:
/// trigger matching for new messages, session continuation for replies, and
/// choice/input handling with per-session context.
#[derive(Parser, Debug)]
#[command(name = "botflow", version, about)]
struct Cli {
    /// Path to the flows.toml configuration file
    #[arg(long, default_value = "flows.toml")]
    flows: PathBuf,

    /// Directory for log files (.botflow by default)
    #[arg(long, default_value = ".botflow")]
    log_dir: PathBuf,

    /// Customer id to converse as
    #[arg(long, default_value = "console")]
    customer: String,

    /// Validate the flow configuration and exit
    #[arg(long)]
    check: bool,
}

/// Interpret console input as a choice selection when the session is
/// parked at a choice node: either the option id or its 1-based number.
fn parse_selection(options: &[ChoiceOption], text: &str) -> Option<String> {
    let trimmed = text.trim();
    if let Ok(number) = trimmed.parse::<usize>() {
        if number >= 1 {
            return options.get(number - 1).map(|o| o.id.clone());
        }
    }
    options
        .iter()
        .find(|o| o.id.eq_ignore_ascii_case(trimmed))
        .map(|o| o.id.clone())
}

/// The options of the choice node the customer's active session is
/// waiting at, if any.
fn pending_options(
    store: &FlowStore,
    sessions: &SessionStore,
    customer: &str,
) -> Option<Vec<ChoiceOption>> {
    let session = sessions.active(customer)?;
    if !session.awaiting_input {
        return None;
    }
    let graph = store.snapshot();
    let node = graph
        .flow(&session.flow)?
        .node(session.current_node.as_deref()?)?;
    match &node.kind {
        NodeKind::Choice { options, .. } => Some(options.clone()),
        _ => None,
    }
}

/// Load flows, report integrity warnings, and return the graph store.
fn load_flows(path: &Path) -> Result<FlowStore> {
    let graph = FlowsFile::from_path(path)
        .with_context(|| format!("Failed to load flows from '{}'", path.display()))?
        .build();

    for warning in graph.integrity_warnings() {
        eprintln!("warning: {warning}");
    }

    Ok(FlowStore::new(graph))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let store = Arc::new(load_flows(&cli.flows)?);
    let flow_count = store.snapshot().flows().len();

    if cli.check {
        eprintln!(
            "{}: {flow_count} flow(s) loaded successfully",
            cli.flows.display()
        );
        return Ok(());
    }

    let channel = Arc::new(InMemoryChannel::new());
    let sessions = Arc::new(SessionStore::new());
    let engine = Engine::new(
        store.clone(),
        sessions.clone(),
        channel.clone(),
        channel.clone(),
        channel.clone(),
    );
    let logger = JsonlLogger::new(&cli.log_dir).context("Failed to initialize JSONL logger")?;
    let display = ChatDisplay::new(&cli.customer);

    display.print_header(flow_count);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "quit" || text == "exit" {
            break;
        }

        let selection = pending_options(&store, &sessions, &cli.customer)
            .and_then(|options| parse_selection(&options, text));

        channel.record_inbound(&cli.customer, text);
        let outcome = engine
            .process_inbound_message(&cli.customer, text, selection.as_deref())
            .await;

        logger
            .append(&PassRecord::from_outcome(
                &cli.customer,
                text,
                selection.as_deref(),
                &outcome,
            ))
            .context("Failed to write to JSONL log")?;

        display.render_outcome(&outcome);
    }

    Ok(())
}
