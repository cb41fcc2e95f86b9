//! `hypr-lint rules`: print the rule catalog.

use anyhow::{Context, Result};
use clap::Args;
use hypr_lint_core::{Config, RuleMetadata, RuleSet};
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};

#[derive(Debug, Args)]
pub struct RulesArgs {
    /// Configuration file (label schema rules depend on it)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the catalog as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "CODE")]
    code: &'static str,
    #[tabled(rename = "SEVERITY")]
    severity: String,
    #[tabled(rename = "DESCRIPTION")]
    message: &'static str,
}

/// Catalog rows sorted by code.
fn catalog(config: &Config) -> Vec<RuleMetadata> {
    let mut rules = RuleSet::standard(config).metadata();
    rules.sort_by_key(|m| m.code);
    rules
}

pub fn rules(args: RulesArgs) -> Result<()> {
    let working_dir = std::env::current_dir().context("Failed to resolve working directory")?;
    let config = Config::discover(args.config.as_deref(), &working_dir)
        .context("Failed to load configuration")?;
    let rules = catalog(&config);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rules)?);
        return Ok(());
    }

    let rows: Vec<RuleRow> = rules
        .iter()
        .map(|m| RuleRow { code: m.code, severity: m.severity.to_string(), message: m.message })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{}", table);
    Ok(())
}
