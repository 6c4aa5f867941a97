//! Engine runtime
//!
//! Session state and the node executor that advances a customer through
//! a flow one inbound message at a time.

pub mod executor;
pub mod session;
