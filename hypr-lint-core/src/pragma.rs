//! Inline ignore pragmas.
//!
//! ```text
//! # hypr-lint ignore=DL3008,DL3015
//! RUN apt-get install -y curl
//! # hypr-lint global ignore=DL3059
//! ```
//!
//! The `hadolint` prefix is accepted in place of `hypr-lint`. A line pragma applies to the
//! next instruction that is not a comment. Consecutive pragma comments accumulate.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dockerfile::{Instruction, InstructionPos};
use crate::rules::Failure;

static PRAGMA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:hypr-lint|hadolint)\s+(global\s+)?ignore\s*=\s*(.+)$").expect("Invalid pragma regex")
});

/// A parsed pragma comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pragma {
    pub global: bool,
    pub codes: Vec<String>,
}

impl Pragma {
    /// Parses the text of a comment (without the leading `#`).
    pub fn parse(comment: &str) -> Option<Self> {
        let caps = PRAGMA.captures(comment.trim())?;
        let codes: Vec<String> = caps[2]
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string)
            .collect();
        if codes.is_empty() {
            return None;
        }
        Some(Self { global: caps.get(1).is_some(), codes })
    }
}

/// Suppressions collected from a Dockerfile's comments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pragmas {
    global: HashSet<String>,
    lines: HashMap<usize, HashSet<String>>,
}

impl Pragmas {
    pub fn collect(instructions: &[InstructionPos]) -> Self {
        let mut pragmas = Self::default();
        let mut pending: HashSet<String> = HashSet::new();

        for pos in instructions {
            match &pos.instruction {
                Instruction::Comment(text) => {
                    let Some(pragma) = Pragma::parse(text) else {
                        continue;
                    };
                    if pragma.global {
                        pragmas.global.extend(pragma.codes);
                    } else {
                        pending.extend(pragma.codes);
                    }
                }
                _ => {
                    if !pending.is_empty() {
                        pragmas.lines.entry(pos.line).or_default().extend(pending.drain());
                    }
                }
            }
        }
        pragmas
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.lines.is_empty()
    }

    pub fn suppresses(&self, failure: &Failure) -> bool {
        self.global.contains(failure.code)
            || self.lines.get(&failure.line).is_some_and(|codes| codes.contains(failure.code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dockerfile::parse_dockerfile;
    use crate::severity::Severity;

    fn failure(code: &'static str, line: usize) -> Failure {
        Failure { code, severity: Severity::Warning, message: String::new(), line, column: None }
    }

    #[test]
    fn test_parse_pragma() {
        assert_eq!(
            Pragma::parse(" hypr-lint ignore=DL3008, DL3015"),
            Some(Pragma { global: false, codes: vec!["DL3008".into(), "DL3015".into()] })
        );
        assert_eq!(
            Pragma::parse("hadolint global ignore=DL3059"),
            Some(Pragma { global: true, codes: vec!["DL3059".into()] })
        );
        assert_eq!(Pragma::parse("just a comment"), None);
        assert_eq!(Pragma::parse("hypr-lint ignore="), None);
    }

    #[test]
    fn test_line_pragma_targets_next_instruction() {
        let instructions = parse_dockerfile(
            "FROM debian:12\n# hypr-lint ignore=DL3008\n# a regular comment\nRUN apt-get install -y curl\nRUN apt-get install -y wget\n",
        )
        .unwrap();
        let pragmas = Pragmas::collect(&instructions);
        assert!(pragmas.suppresses(&failure("DL3008", 4)));
        assert!(!pragmas.suppresses(&failure("DL3015", 4)));
        assert!(!pragmas.suppresses(&failure("DL3008", 5)));
    }

    #[test]
    fn test_global_pragma() {
        let instructions =
            parse_dockerfile("# hypr-lint global ignore=DL3059\nFROM debian:12\nRUN a\nRUN b\n").unwrap();
        let pragmas = Pragmas::collect(&instructions);
        assert!(pragmas.suppresses(&failure("DL3059", 4)));
        assert!(pragmas.suppresses(&failure("DL3059", 2)));
        assert!(!pragmas.suppresses(&failure("DL3003", 3)));
    }

    #[test]
    fn test_no_pragmas() {
        let instructions = parse_dockerfile("FROM debian:12\n# nothing to see\n").unwrap();
        assert!(Pragmas::collect(&instructions).is_empty());
    }
}
