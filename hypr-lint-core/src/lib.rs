//! HYPR Dockerfile Linter
//!
//! Static analysis of Dockerfiles: a shell command model for RUN instructions, a rule engine
//! that folds every rule independently over the instruction stream, and the rule catalog.
//!
//! ```
//! use hypr_lint_core::{Config, Linter};
//!
//! let linter = Linter::new(Config::default());
//! let report = linter.lint_str("FROM debian\nRUN cd /app\n").unwrap();
//! let codes: Vec<_> = report.failures.iter().map(|f| f.code).collect();
//! assert!(codes.contains(&"DL3006"));
//! assert!(codes.contains(&"DL3003"));
//! ```

pub mod config;
pub mod dockerfile;
pub mod error;
pub mod linter;
pub mod pragma;
pub mod rules;
pub mod severity;
pub mod shell;

// Re-export commonly used items
pub use config::{Config, LabelType, SeverityOverrides};
pub use dockerfile::{parse_dockerfile, Instruction, InstructionPos};
pub use error::{LintError, Result};
pub use linter::{LintReport, Linter};
pub use rules::{DynRule, Failure, Rule, RuleMetadata, RuleSet, RuleState};
pub use severity::Severity;
