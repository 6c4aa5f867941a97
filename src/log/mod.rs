//! Logging and observability
//!
//! This module provides logging functionality for botflow, including
//! JSONL logging of message-processing history.

pub mod jsonl;

pub use jsonl::{JsonlLogger, PassRecord};
