//! JSONL (JSON Lines) logging of message-processing history
//!
//! Provides append-only logging of processing passes to `.botflow/log.jsonl`

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

use crate::engine::executor::Outcome;

/// One processing pass: an inbound message and what the engine did with it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PassRecord {
    /// ISO 8601 timestamp of when the pass completed
    pub timestamp: DateTime<Utc>,
    /// Customer the inbound message came from
    pub customer: String,
    /// The inbound message text
    pub message: String,
    /// Selection id carried by the message, if any
    pub selection: Option<String>,
    /// Whether any flow handled the message
    pub handled: bool,
    /// Name of the flow involved, if any
    pub flow: Option<String>,
    /// Outbound text produced by the final node, if any
    pub response: Option<String>,
    /// Whether the flow reached an end node during this pass
    pub ended: bool,
    /// Whether any outbound send failed
    pub delivery_failed: bool,
    /// Warnings raised during the pass
    pub warnings: Vec<String>,
}

impl PassRecord {
    /// Build a record from an inbound message and the resulting outcome.
    #[must_use]
    pub fn from_outcome(
        customer: &str,
        message: &str,
        selection: Option<&str>,
        outcome: &Outcome,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            customer: customer.to_string(),
            message: message.to_string(),
            selection: selection.map(ToString::to_string),
            handled: outcome.handled,
            flow: outcome.flow.clone(),
            response: outcome.response_text.clone(),
            ended: outcome.ended,
            delivery_failed: outcome.delivery_failed,
            warnings: outcome.warnings.clone(),
        }
    }
}

/// JSONL logger for message-processing history
///
/// Provides append-only logging to `.botflow/log.jsonl`.
/// Each line is a JSON object representing a single processing pass.
pub struct JsonlLogger {
    log_path: PathBuf,
}

impl JsonlLogger {
    /// Create a new JSONL logger
    ///
    /// # Arguments
    /// * `log_dir` - Directory where log.jsonl will be stored (typically `.botflow`)
    ///
    /// # Errors
    /// Returns an error if the log directory cannot be created
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Result<Self> {
        let log_dir = log_dir.as_ref();

        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

        let log_path = log_dir.join("log.jsonl");

        Ok(Self { log_path })
    }

    /// Append a processing pass to the log
    ///
    /// # Errors
    /// Returns an error if:
    /// - The log file cannot be opened or created
    /// - The record cannot be serialized to JSON
    /// - Writing to the file fails
    pub fn append(&self, record: &PassRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open log file: {}", self.log_path.display()))?;

        let json =
            serde_json::to_string(record).context("Failed to serialize pass record to JSON")?;

        writeln!(file, "{json}").context("Failed to write to log file")?;

        Ok(())
    }

    /// Read all processing passes from the log
    ///
    /// # Returns
    /// A vector of all pass records, in chronological order
    ///
    /// # Errors
    /// Returns an error if:
    /// - The log file cannot be read
    /// - Any line cannot be parsed as valid JSON
    pub fn read_all(&self) -> Result<Vec<PassRecord>> {
        // If log file doesn't exist yet, return empty vector
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.log_path)
            .with_context(|| format!("Failed to read log file: {}", self.log_path.display()))?;

        let mut records = Vec::new();

        for (line_num, line) in content.lines().enumerate() {
            // Skip empty lines
            if line.trim().is_empty() {
                continue;
            }

            let record: PassRecord = serde_json::from_str(line)
                .with_context(|| format!("Failed to parse line {} as JSON", line_num + 1))?;

            records.push(record);
        }

        Ok(records)
    }

    /// Get the path to the log file
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}
