//! Flow definitions and matching
//!
//! This module holds the flow graph model, the `flows.toml` parser,
//! trigger matching, and transition resolution.

pub mod config;
pub mod graph;
pub mod matcher;
pub mod resolver;
