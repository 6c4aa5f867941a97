//! Rich CLI display for the console chat driver
//!
//! Renders engine outcomes as human-readable terminal output.
//! All output goes to stderr so stdout remains clean for piping.

use colored::Colorize;

use crate::engine::executor::Outcome;
use crate::flow::graph::ChoiceOption;

/// Display handler for the console conversation
pub struct ChatDisplay {
    customer: String,
}

impl ChatDisplay {
    /// Create a new display handler for the given customer id
    #[must_use]
    pub fn new(customer: &str) -> Self {
        Self {
            customer: customer.to_string(),
        }
    }

    /// Print the session header at startup
    pub fn print_header(&self, flow_count: usize) {
        eprintln!(
            "\n{} {}",
            "===".bold().cyan(),
            format!("botflow console ({})", self.customer).bold().cyan()
        );
        eprintln!(
            "  {} {flow_count} flow(s) loaded; type a message, or 'quit' to exit",
            "Info:".dimmed()
        );
        eprintln!("{}", "─".repeat(50).dimmed());
    }

    /// Render the outcome of one processing pass to stderr
    pub fn render_outcome(&self, outcome: &Outcome) {
        if !outcome.handled {
            eprintln!("  {} no flow handled this message", "·".dimmed());
        }

        if let Some(text) = &outcome.response_text {
            eprintln!("  {} {}", "bot:".green().bold(), text);
        }

        if let Some(options) = &outcome.options {
            eprint!("{}", format_options(options));
        }

        if outcome.awaiting_input {
            eprintln!("  {}", "(waiting for your reply)".dimmed());
        }

        if outcome.ended {
            let flow = outcome.flow.as_deref().unwrap_or("unknown");
            eprintln!("  {} {}", "ENDED".green().bold(), flow.bold());
        }

        if outcome.delivery_failed {
            eprintln!("  {} outbound delivery failed", "✗".red().bold());
        }

        for warning in &outcome.warnings {
            eprintln!("  {} {}", "⚠".yellow().bold(), warning.yellow());
        }
    }
}

/// Format choice options as numbered lines for terminal display
#[must_use]
pub fn format_options(options: &[ChoiceOption]) -> String {
    let mut out = String::new();
    for (i, option) in options.iter().enumerate() {
        out.push_str(&format!(
            "      {}. {} [{}]\n",
            i + 1,
            option.label,
            option.id
        ));
    }
    out
}
