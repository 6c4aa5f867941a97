//! CLI output formatting
//!
//! Provides human-readable terminal display for the console chat driver,
//! with formatted, colored output on stderr.

pub mod display;

pub use display::format_options;
pub use display::ChatDisplay;
