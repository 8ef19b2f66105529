//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying enforcement
//! outcomes and probe replies in text or JSON form.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::device::ProbeReply;
use crate::enforce::EnforceOutcome;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Drifted command row for table display.
#[derive(Tabled)]
struct DriftRow {
    #[tabled(rename = "Command")]
    command: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Expected")]
    expected: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats an enforcement outcome for display.
    #[must_use]
    pub fn format_outcome(&self, outcome: &EnforceOutcome) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(outcome).unwrap_or_default(),
            OutputFormat::Text => Self::format_outcome_text(outcome),
        }
    }

    /// Formats an outcome as text.
    fn format_outcome_text(outcome: &EnforceOutcome) -> String {
        let mut output = String::new();

        let status = match outcome.result {
            Some(true) => format!("{} {}", "✓".green(), outcome.comment),
            Some(false) => format!("{} {}", "✗".red(), outcome.comment),
            None => format!("{} {}", "~".yellow(), outcome.comment),
        };
        let _ = writeln!(output, "{status}");

        if let (Some(old), Some(new)) = (&outcome.changes.old, &outcome.changes.new) {
            let rows: Vec<DriftRow> = new
                .iter()
                .map(|(cmd, expected)| DriftRow {
                    command: Self::truncate(cmd, 40),
                    current: Self::truncate(
                        old.get(cmd).map_or("<absent>", String::as_str),
                        40,
                    ),
                    expected: Self::truncate(expected, 40),
                })
                .collect();

            if !rows.is_empty() {
                let table = Table::new(rows).to_string();
                output.push('\n');
                output.push_str(&table);
                output.push('\n');
            }
        }

        output
    }

    /// Formats a probe reply for display.
    #[must_use]
    pub fn format_reply(&self, reply: &ProbeReply) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(reply).unwrap_or_default(),
            OutputFormat::Text => {
                let marker = if reply.ok {
                    "✓".green()
                } else {
                    "✗".red()
                };
                format!("{marker} {}", reply.message.trim())
            }
        }
    }

    /// Truncates a string for table display.
    fn truncate(s: &str, max: usize) -> String {
        if s.chars().count() <= max {
            s.to_string()
        } else {
            let prefix: String = s.chars().take(max.saturating_sub(3)).collect();
            format!("{prefix}...")
        }
    }
}
