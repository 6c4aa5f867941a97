//! In-memory collaborator implementation
//!
//! Backs the console driver and the test suite. Records every side effect
//! in a single ordered event log so tests can assert on sequencing, not
//! just counts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{ChannelSender, MessageHistory, NotificationSink};

/// A single recorded side effect, in the order it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// An outbound message was handed to the channel
    Sent {
        /// Recipient customer id
        customer: String,
        /// Message text
        text: String,
    },
    /// An inbound message was recorded to history
    InboundRecorded {
        /// Sender customer id
        customer: String,
        /// Message text
        text: String,
    },
    /// An outbound message was recorded to history
    OutboundRecorded {
        /// Recipient customer id
        customer: String,
        /// Message text
        text: String,
    },
    /// An admin notification was emitted
    Notified {
        /// Customer the notification concerns
        customer: String,
        /// Notification text
        text: String,
    },
}

#[derive(Debug, Default)]
struct ChannelLog {
    events: Vec<ChannelEvent>,
    inbound_counts: HashMap<String, u64>,
    next_message_id: u64,
}

/// In-memory channel, history, and notification sink in one value
///
/// Clone an `Arc` of it into each collaborator slot of the engine.
#[derive(Debug, Default)]
pub struct InMemoryChannel {
    log: Mutex<ChannelLog>,
    fail_sends: AtomicBool,
}

impl InMemoryChannel {
    /// Create an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inbound message, as the webhook transport would before
    /// handing the message to the engine.
    pub fn record_inbound(&self, customer: &str, text: &str) {
        let mut log = self.lock();
        *log.inbound_counts.entry(customer.to_string()).or_insert(0) += 1;
        log.events.push(ChannelEvent::InboundRecorded {
            customer: customer.to_string(),
            text: text.to_string(),
        });
    }

    /// All recorded events in order.
    #[must_use]
    pub fn events(&self) -> Vec<ChannelEvent> {
        self.lock().events.clone()
    }

    /// Texts sent to a customer, in order.
    #[must_use]
    pub fn sent_texts(&self, customer: &str) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                ChannelEvent::Sent { customer: c, text } if c == customer => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Notification texts emitted for a customer, in order.
    #[must_use]
    pub fn notifications(&self, customer: &str) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                ChannelEvent::Notified { customer: c, text } if c == customer => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Make subsequent sends fail, to exercise delivery-error paths.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChannelLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChannelSender for InMemoryChannel {
    async fn send(&self, customer: &str, text: &str) -> Result<String> {
        if self.fail_sends.load(Ordering::SeqCst) {
            bail!("simulated delivery failure");
        }
        let mut log = self.lock();
        log.next_message_id += 1;
        let id = format!("msg-{}", log.next_message_id);
        log.events.push(ChannelEvent::Sent {
            customer: customer.to_string(),
            text: text.to_string(),
        });
        Ok(id)
    }
}

#[async_trait]
impl MessageHistory for InMemoryChannel {
    async fn count_inbound(&self, customer: &str) -> u64 {
        self.lock()
            .inbound_counts
            .get(customer)
            .copied()
            .unwrap_or(0)
    }

    async fn record_outbound(&self, customer: &str, text: &str) {
        self.lock().events.push(ChannelEvent::OutboundRecorded {
            customer: customer.to_string(),
            text: text.to_string(),
        });
    }
}

#[async_trait]
impl NotificationSink for InMemoryChannel {
    async fn notify(&self, customer: &str, text: &str) -> Result<()> {
        self.lock().events.push(ChannelEvent::Notified {
            customer: customer.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}
