//! botflow - Chat flow engine
//!
//! botflow drives scripted conversations over a messaging channel. Flows are
//! directed graphs of nodes; inbound messages either continue a customer's
//! active session or are matched against flow triggers to start a new one.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

pub mod channel;
pub mod cli;
pub mod engine;
pub mod flow;
pub mod log;

// Re-export commonly used types
pub use channel::{ChannelSender, InMemoryChannel, MessageHistory, NotificationSink};
pub use cli::ChatDisplay;
pub use engine::executor::{Engine, Outcome};
pub use engine::session::{Session, SessionStore};
pub use flow::config::FlowsFile;
pub use flow::graph::{Flow, FlowGraph, FlowStore, Node, NodeKind, Trigger};
pub use flow::matcher::match_flow;
pub use log::{JsonlLogger, PassRecord};
