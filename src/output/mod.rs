//! Output formatting module
//!
//! Provides console diagnostics and report formats for probe results.

mod formatter;

pub use formatter::{write_summary_to_file, OutputFormat, ResultFormatter};
