//! Linter facade: one configuration, one rule set, many Dockerfiles.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::dockerfile::{parse_dockerfile, InstructionPos};
use crate::error::{LintError, Result};
use crate::pragma::Pragmas;
use crate::rules::{Failure, RuleSet};
use crate::severity::Severity;

/// Failures of one Dockerfile, in rule-by-rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LintReport {
    pub failures: Vec<Failure>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether any failure is at least as severe as `threshold`. An `ignore` threshold
    /// never fails.
    pub fn exceeds(&self, threshold: Severity) -> bool {
        threshold != Severity::Ignore && self.failures.iter().any(|f| f.severity >= threshold)
    }

    /// The most severe failure level, if any.
    pub fn worst(&self) -> Option<Severity> {
        self.failures.iter().map(|f| f.severity).max()
    }
}

pub struct Linter {
    config: Config,
    rules: RuleSet,
    parallel: bool,
}

impl Linter {
    pub fn new(config: Config) -> Self {
        let rules = RuleSet::standard(&config);
        Self { config, rules, parallel: true }
    }

    /// Evaluate rules on the calling thread only.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Lints Dockerfile text.
    pub fn lint_str(&self, content: &str) -> Result<LintReport> {
        let instructions = parse_dockerfile(content)?;
        Ok(self.lint_instructions(&instructions))
    }

    /// Lints a Dockerfile on disk.
    #[instrument(skip(self))]
    pub fn lint_file(&self, path: &Path) -> Result<LintReport> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| LintError::FileReadError { path: path.to_path_buf(), source })?;
        let instructions = parse_dockerfile(&content).map_err(|e| LintError::at_path(path, e))?;
        Ok(self.lint_instructions(&instructions))
    }

    /// Runs the rule set over a parsed instruction stream and post-processes the failures.
    pub fn lint_instructions(&self, instructions: &[InstructionPos]) -> LintReport {
        let raw = if self.parallel {
            self.rules.evaluate_parallel(instructions)
        } else {
            self.rules.evaluate(instructions)
        };

        let pragmas = if self.config.disable_ignore_pragma {
            Pragmas::default()
        } else {
            Pragmas::collect(instructions)
        };

        let total = raw.len();
        let failures: Vec<Failure> = raw
            .into_iter()
            .filter(|f| !pragmas.suppresses(f))
            .map(|mut f| {
                f.severity = self.config.severity_for(f.code, f.severity);
                f
            })
            .filter(|f| f.severity != Severity::Ignore && !self.config.is_ignored(f.code))
            .collect();

        debug!(
            instructions = instructions.len(),
            raw = total,
            reported = failures.len(),
            "Linted Dockerfile"
        );
        LintReport { failures }
    }
}
