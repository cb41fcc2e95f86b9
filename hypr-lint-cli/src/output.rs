//! Report rendering: colored terminal lines or a JSON array.

use anyhow::{Context, Result};
use colored::Colorize;
use hypr_lint_core::{Failure, LintReport, Severity};
use serde::Serialize;

/// Report of one linted file, keyed by the name it was given on the command line.
pub struct FileReport {
    pub file: String,
    pub report: LintReport,
}

#[derive(Serialize)]
struct JsonFailure<'a> {
    file: &'a str,
    line: usize,
    column: Option<usize>,
    code: &'static str,
    level: Severity,
    message: &'a str,
}

fn paint_level(severity: Severity) -> String {
    let level = severity.as_str();
    match severity {
        Severity::Error => level.red().bold().to_string(),
        Severity::Warning => level.yellow().bold().to_string(),
        Severity::Info => level.cyan().to_string(),
        Severity::Style => level.dimmed().to_string(),
        Severity::Ignore => level.to_string(),
    }
}

fn tty_line(file: &str, failure: &Failure, color: bool) -> String {
    if color {
        format!(
            "{}:{} {} {}: {}",
            file.bold(),
            failure.line,
            failure.code.bold(),
            paint_level(failure.severity),
            failure.message
        )
    } else {
        format!(
            "{}:{} {} {}: {}",
            file, failure.line, failure.code, failure.severity, failure.message
        )
    }
}

/// One `path:line CODE level: message` line per failure.
pub fn render_tty(reports: &[FileReport], color: bool) -> String {
    let mut out = String::new();
    for report in reports {
        for failure in &report.report.failures {
            out.push_str(&tty_line(&report.file, failure, color));
            out.push('\n');
        }
    }
    out
}

/// A single JSON array holding the failures of every file.
pub fn render_json(reports: &[FileReport]) -> Result<String> {
    let failures: Vec<JsonFailure<'_>> = reports
        .iter()
        .flat_map(|report| {
            report.report.failures.iter().map(|failure| JsonFailure {
                file: &report.file,
                line: failure.line,
                column: failure.column,
                code: failure.code,
                level: failure.severity,
                message: &failure.message,
            })
        })
        .collect();
    serde_json::to_string_pretty(&failures).context("Failed to serialize lint results")
}
