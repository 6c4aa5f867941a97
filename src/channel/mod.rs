//! Collaborator interfaces to the surrounding messaging system
//!
//! The engine never talks to the outside world directly; the webhook
//! transport injects these narrow interfaces at construction. Real
//! implementations (WhatsApp API client, database-backed history) live
//! outside this crate.

use anyhow::Result;
use async_trait::async_trait;

pub mod memory;

pub use memory::{ChannelEvent, InMemoryChannel};

/// Outbound channel sender
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Deliver `text` to the customer. Returns the provider message id.
    ///
    /// Failures are transient delivery errors: the engine surfaces them on
    /// the outcome but never rolls back session state. Retries, if any,
    /// are the implementation's responsibility.
    async fn send(&self, customer: &str, text: &str) -> Result<String>;
}

/// Customer message history store
#[async_trait]
pub trait MessageHistory: Send + Sync {
    /// Number of inbound messages recorded for the customer.
    ///
    /// The transport records the current message before invoking the
    /// engine, so a count of 1 means this is the customer's very first
    /// contact.
    async fn count_inbound(&self, customer: &str) -> u64;

    /// Append an outbound record to the conversation history.
    async fn record_outbound(&self, customer: &str, text: &str);
}

/// Admin notification sink
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Fire-and-forget notification. Failures are reported as outcome
    /// warnings, never as engine errors.
    async fn notify(&self, customer: &str, text: &str) -> Result<()>;
}
