//! Label schema rules, registered only when a label schema is configured.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{Failure, Rule, RuleMetadata, RuleSet, RuleState};
use crate::config::{Config, LabelType};
use crate::dockerfile::Instruction;
use crate::severity::Severity;

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://[^\s/?#@]+(?:@[^\s/?#]+)?(?:[/?#]\S*)?$")
        .expect("Invalid url regex")
});

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("Invalid email regex")
});

static GIT_HASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{7,40}$").expect("Invalid git hash regex"));

static SEMVER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^v?(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$",
    )
    .expect("Invalid semver regex")
});

static SPDX_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:DocumentRef-[A-Za-z0-9.-]+:)?LicenseRef-[A-Za-z0-9.-]+|[A-Za-z0-9][A-Za-z0-9.-]*\+?)$")
        .expect("Invalid SPDX identifier regex")
});

/// Whether `value` is well-formed for `kind`. Free text is always valid.
pub fn value_matches(kind: LabelType, value: &str) -> bool {
    match kind {
        LabelType::Text => true,
        LabelType::Url => URL.is_match(value),
        LabelType::Email => EMAIL.is_match(value),
        LabelType::Hash => GIT_HASH.is_match(value),
        LabelType::Rfc3339 => DateTime::parse_from_rfc3339(value).is_ok(),
        LabelType::Semver => SEMVER.is_match(value),
        LabelType::Spdx => is_spdx_expression(value),
    }
}

/// Syntax check of an SPDX license expression: identifiers joined by `AND`/`OR`,
/// an optional `WITH` exception and parentheses.
pub fn is_spdx_expression(value: &str) -> bool {
    let spaced = value.replace('(', " ( ").replace(')', " ) ");
    let tokens: Vec<&str> = spaced.split_whitespace().collect();
    let mut pos = 0;
    spdx_or(&tokens, &mut pos) && pos == tokens.len()
}

fn spdx_or(tokens: &[&str], pos: &mut usize) -> bool {
    if !spdx_and(tokens, pos) {
        return false;
    }
    while tokens.get(*pos).is_some_and(|t| t.eq_ignore_ascii_case("OR")) {
        *pos += 1;
        if !spdx_and(tokens, pos) {
            return false;
        }
    }
    true
}

fn spdx_and(tokens: &[&str], pos: &mut usize) -> bool {
    if !spdx_with(tokens, pos) {
        return false;
    }
    while tokens.get(*pos).is_some_and(|t| t.eq_ignore_ascii_case("AND")) {
        *pos += 1;
        if !spdx_with(tokens, pos) {
            return false;
        }
    }
    true
}

fn spdx_with(tokens: &[&str], pos: &mut usize) -> bool {
    if !spdx_primary(tokens, pos) {
        return false;
    }
    if tokens.get(*pos).is_some_and(|t| t.eq_ignore_ascii_case("WITH")) {
        *pos += 1;
        return spdx_identifier(tokens, pos);
    }
    true
}

fn spdx_primary(tokens: &[&str], pos: &mut usize) -> bool {
    if tokens.get(*pos) == Some(&"(") {
        *pos += 1;
        if !spdx_or(tokens, pos) || tokens.get(*pos) != Some(&")") {
            return false;
        }
        *pos += 1;
        return true;
    }
    spdx_identifier(tokens, pos)
}

fn spdx_identifier(tokens: &[&str], pos: &mut usize) -> bool {
    let Some(token) = tokens.get(*pos) else {
        return false;
    };
    let keyword = ["AND", "OR", "WITH"].iter().any(|k| token.eq_ignore_ascii_case(k));
    if keyword || !SPDX_ID.is_match(token) {
        return false;
    }
    *pos += 1;
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelCheck {
    NotInSchema,
    Empty,
    Format(LabelType),
}

/// One label schema check applied to every LABEL instruction. Failures name the label.
pub struct LabelRule {
    metadata: RuleMetadata,
    check: LabelCheck,
    schema: Arc<BTreeMap<String, LabelType>>,
}

impl LabelRule {
    fn new(metadata: RuleMetadata, check: LabelCheck, schema: Arc<BTreeMap<String, LabelType>>) -> Self {
        Self { metadata, check, schema }
    }

    fn offends(&self, key: &str, value: &str) -> bool {
        let kind = self.schema.get(key).copied();
        match self.check {
            LabelCheck::NotInSchema => kind.is_none(),
            LabelCheck::Empty => kind.is_some() && value.is_empty(),
            LabelCheck::Format(expected) => {
                kind == Some(expected) && !value.is_empty() && !value_matches(expected, value)
            }
        }
    }
}

impl Rule for LabelRule {
    type State = ();

    fn metadata(&self) -> RuleMetadata {
        self.metadata
    }

    fn initial_state(&self) -> RuleState<()> {
        RuleState::default()
    }

    fn check(&self, line: usize, state: RuleState<()>, instruction: &Instruction) -> RuleState<()> {
        let Instruction::Label(pairs) = instruction else {
            return state;
        };
        pairs
            .iter()
            .filter(|(key, value)| self.offends(key, value))
            .map(|(key, _)| Failure {
                message: format!("{} Label `{}`", self.metadata.message, key),
                ..self.metadata.failure(line)
            })
            .fold(state, RuleState::add_failure)
    }
}

fn format_metadata(kind: LabelType) -> Option<RuleMetadata> {
    let (code, message) = match kind {
        LabelType::Text => return None,
        LabelType::Url => ("DL3052", "Label value is not a valid URL."),
        LabelType::Rfc3339 => ("DL3053", "Label value is not a valid RFC 3339 time."),
        LabelType::Spdx => ("DL3054", "Label value is not a valid SPDX license identifier."),
        LabelType::Hash => ("DL3055", "Label value is not a valid git hash."),
        LabelType::Semver => ("DL3056", "Label value does not conform to semantic versioning."),
        LabelType::Email => ("DL3058", "Label value is not a valid email address."),
    };
    Some(RuleMetadata::new(code, Severity::Warning, message))
}

const FORMAT_ORDER: [LabelType; 6] = [
    LabelType::Url,
    LabelType::Rfc3339,
    LabelType::Spdx,
    LabelType::Hash,
    LabelType::Semver,
    LabelType::Email,
];

/// Adds the label schema rules for `config` to `set`. Format rules are only added for
/// types the schema uses.
pub fn register(set: &mut RuleSet, config: &Config) {
    let schema = Arc::new(config.label_schema.clone());

    if config.strict_labels {
        set.push(LabelRule::new(
            RuleMetadata::new("DL3050", Severity::Info, "Superfluous label(s) present."),
            LabelCheck::NotInSchema,
            schema.clone(),
        ));
    }
    set.push(LabelRule::new(
        RuleMetadata::new("DL3051", Severity::Warning, "Label is empty."),
        LabelCheck::Empty,
        schema.clone(),
    ));

    for kind in FORMAT_ORDER {
        if !schema.values().any(|t| *t == kind) {
            continue;
        }
        if let Some(metadata) = format_metadata(kind) {
            set.push(LabelRule::new(metadata, LabelCheck::Format(kind), schema.clone()));
        }
    }
}
