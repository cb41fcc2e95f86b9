//! `hypr-lint check`: lint Dockerfiles and report failures.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use hypr_lint_core::{Config, LintReport, Linter, Severity};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::output::{render_json, render_tty, FileReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Tty,
    Json,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Dockerfiles to lint (`-` reads stdin)
    #[arg(required = true)]
    pub files: Vec<String>,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "tty")]
    pub format: Format,

    /// Lowest severity that fails the run (error, warning, info, style, ignore)
    #[arg(short = 't', long)]
    pub failure_threshold: Option<Severity>,

    /// Always exit successfully
    #[arg(long)]
    pub no_fail: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Rule code to ignore
    #[arg(long = "ignore", value_name = "CODE")]
    pub ignore: Vec<String>,

    /// Registry FROM images may be pulled from
    #[arg(long = "trusted-registry", value_name = "HOST")]
    pub trusted_registries: Vec<String>,

    /// Label the final image must carry (LABEL:TYPE)
    #[arg(long = "require-label", value_name = "LABEL:TYPE")]
    pub require_labels: Vec<String>,

    /// Report labels not in the label schema
    #[arg(long)]
    pub strict_labels: bool,

    /// Ignore inline `# hypr-lint ignore=` comments
    #[arg(long)]
    pub disable_ignore_pragma: bool,

    /// Report rule CODE as an error
    #[arg(long = "error", value_name = "CODE")]
    pub error: Vec<String>,

    /// Report rule CODE as a warning
    #[arg(long = "warning", value_name = "CODE")]
    pub warning: Vec<String>,

    /// Report rule CODE as info
    #[arg(long = "info", value_name = "CODE")]
    pub info: Vec<String>,

    /// Report rule CODE as style
    #[arg(long = "style", value_name = "CODE")]
    pub style: Vec<String>,
}

impl CheckArgs {
    /// Layers the command line options over a loaded configuration.
    pub fn merge_into(&self, mut config: Config) -> Result<Config> {
        config.ignored.extend(self.ignore.iter().cloned());
        config.trusted_registries.extend(self.trusted_registries.iter().cloned());
        for spec in &self.require_labels {
            let (label, kind) = Config::parse_label_requirement(spec)?;
            config.label_schema.insert(label, kind);
        }
        config.strict_labels |= self.strict_labels;
        config.disable_ignore_pragma |= self.disable_ignore_pragma;
        config.no_fail |= self.no_fail;
        config.no_color |= self.no_color;
        if let Some(threshold) = self.failure_threshold {
            config.failure_threshold = threshold;
        }
        config.overrides.error.extend(self.error.iter().cloned());
        config.overrides.warning.extend(self.warning.iter().cloned());
        config.overrides.info.extend(self.info.iter().cloned());
        config.overrides.style.extend(self.style.iter().cloned());
        Ok(config)
    }
}

fn lint_one(linter: &Linter, file: &str) -> Result<LintReport> {
    if file == "-" {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content).context("Failed to read stdin")?;
        return Ok(linter.lint_str(&content)?);
    }
    Ok(linter.lint_file(Path::new(file))?)
}

/// Lints every file. Returns `false` when the run should exit with a failure status.
pub fn check(args: CheckArgs) -> Result<bool> {
    let working_dir = std::env::current_dir().context("Failed to resolve working directory")?;
    let loaded = Config::discover(args.config.as_deref(), &working_dir)
        .context("Failed to load configuration")?;
    let config = args.merge_into(loaded)?;
    debug!(?config, "Resolved configuration");

    let threshold = config.failure_threshold;
    let no_fail = config.no_fail;
    let color = !config.no_color;
    if !color {
        colored::control::set_override(false);
    }

    let linter = Linter::new(config);
    let mut reports = Vec::with_capacity(args.files.len());
    let mut had_errors = false;

    for file in &args.files {
        match lint_one(&linter, file) {
            Ok(report) => reports.push(FileReport { file: file.clone(), report }),
            Err(e) => {
                had_errors = true;
                eprintln!("{} {}: {:#}", "error:".red().bold(), file, e);
            }
        }
    }

    match args.format {
        Format::Tty => print!("{}", render_tty(&reports, color)),
        Format::Json => println!("{}", render_json(&reports)?),
    }

    let exceeded = reports.iter().any(|r| r.report.exceeds(threshold));
    Ok(!had_errors && (no_fail || !exceeded))
}
