//! Stage naming and referencing: FROM aliases, `COPY --from`, base image origin.

use std::collections::HashSet;

use crate::config::registry_allowed;
use crate::dockerfile::Instruction;
use crate::rules::{Rule, RuleMetadata, RuleState};
use crate::severity::Severity;

/// DL3006: always tag the version of an image explicitly.
pub struct UntaggedImage;

const DL3006: RuleMetadata =
    RuleMetadata::new("DL3006", Severity::Warning, "Always tag the version of an image explicitly");

impl Rule for UntaggedImage {
    /// Aliases declared so far
    type State = HashSet<String>;

    fn metadata(&self) -> RuleMetadata {
        DL3006
    }

    fn initial_state(&self) -> RuleState<Self::State> {
        RuleState::default()
    }

    fn check(
        &self,
        line: usize,
        mut state: RuleState<Self::State>,
        instruction: &Instruction,
    ) -> RuleState<Self::State> {
        let Instruction::From(base) = instruction else {
            return state;
        };

        let untagged = base.tag.is_none()
            && base.digest.is_none()
            && !base.is_variable()
            && !base.is_scratch()
            && !state.data.contains(&base.base_key());
        if let Some(alias) = base.stage_name() {
            state.data.insert(alias);
        }

        if untagged {
            state.add_failure(DL3006.failure(line))
        } else {
            state
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageRefs {
    aliases: HashSet<String>,
    stage_count: usize,
}

/// DL3022: `COPY --from` should reference a previously defined FROM alias.
pub struct CopyFromKnownStage;

const DL3022: RuleMetadata = RuleMetadata::new(
    "DL3022",
    Severity::Warning,
    "COPY --from should reference a previously defined FROM alias",
);

impl Rule for CopyFromKnownStage {
    type State = StageRefs;

    fn metadata(&self) -> RuleMetadata {
        DL3022
    }

    fn initial_state(&self) -> RuleState<StageRefs> {
        RuleState::default()
    }

    fn check(
        &self,
        line: usize,
        mut state: RuleState<StageRefs>,
        instruction: &Instruction,
    ) -> RuleState<StageRefs> {
        match instruction {
            Instruction::From(base) => {
                state.data.stage_count += 1;
                if let Some(alias) = base.stage_name() {
                    state.data.aliases.insert(alias);
                }
                state
            }
            Instruction::Copy(copy) => match copy.from.as_deref() {
                Some(source) if !references_known_stage(&state.data, source) => {
                    state.add_failure(DL3022.failure(line))
                }
                _ => state,
            },
            _ => state,
        }
    }
}

/// An image reference (`registry/img:tag`), an earlier stage index or an earlier alias.
fn references_known_stage(refs: &StageRefs, source: &str) -> bool {
    if source.contains(':') {
        return true;
    }
    match stage_index(source) {
        Some(index) => index < refs.stage_count,
        None => refs.aliases.contains(&source.to_ascii_lowercase()),
    }
}

/// A `--from` value made only of ASCII digits names a stage by position.
fn stage_index(source: &str) -> Option<usize> {
    if source.is_empty() || !source.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    source.parse().ok()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentStage {
    index: Option<usize>,
    alias: Option<String>,
}

/// DL3023: `COPY --from` cannot reference its own FROM alias.
pub struct CopyFromOtherStage;

const DL3023: RuleMetadata =
    RuleMetadata::new("DL3023", Severity::Error, "COPY --from cannot reference its own FROM alias");

impl Rule for CopyFromOtherStage {
    type State = CurrentStage;

    fn metadata(&self) -> RuleMetadata {
        DL3023
    }

    fn initial_state(&self) -> RuleState<CurrentStage> {
        RuleState::default()
    }

    fn check(
        &self,
        line: usize,
        state: RuleState<CurrentStage>,
        instruction: &Instruction,
    ) -> RuleState<CurrentStage> {
        match instruction {
            Instruction::From(base) => state.modify(|current| CurrentStage {
                index: Some(current.index.map_or(0, |i| i + 1)),
                alias: base.stage_name(),
            }),
            Instruction::Copy(copy) => {
                let Some(source) = copy.from.as_deref() else {
                    return state;
                };
                let own = match stage_index(source) {
                    Some(index) => state.data.index == Some(index),
                    None => {
                        state.data.alias.as_deref() == Some(source.to_ascii_lowercase().as_str())
                    }
                };
                if own {
                    state.add_failure(DL3023.failure(line))
                } else {
                    state
                }
            }
            _ => state,
        }
    }
}

/// DL3024: FROM aliases must be unique.
pub struct UniqueStageAliases;

const DL3024: RuleMetadata =
    RuleMetadata::new("DL3024", Severity::Error, "FROM aliases (stage names) must be unique");

impl Rule for UniqueStageAliases {
    type State = HashSet<String>;

    fn metadata(&self) -> RuleMetadata {
        DL3024
    }

    fn initial_state(&self) -> RuleState<Self::State> {
        RuleState::default()
    }

    fn check(
        &self,
        line: usize,
        mut state: RuleState<Self::State>,
        instruction: &Instruction,
    ) -> RuleState<Self::State> {
        match instruction {
            Instruction::From(base) => match base.stage_name() {
                Some(alias) if state.data.contains(&alias) => state.add_failure(DL3024.failure(line)),
                Some(alias) => {
                    state.data.insert(alias);
                    state
                }
                None => state,
            },
            _ => state,
        }
    }
}

/// DL3026: use only an allowed registry in the FROM image.
pub struct TrustedRegistries {
    registries: Vec<String>,
}

impl TrustedRegistries {
    /// An empty list disables the rule.
    pub fn new(registries: Vec<String>) -> Self {
        Self { registries }
    }
}

const DL3026: RuleMetadata =
    RuleMetadata::new("DL3026", Severity::Error, "Use only an allowed registry in the FROM image");

impl Rule for TrustedRegistries {
    type State = HashSet<String>;

    fn metadata(&self) -> RuleMetadata {
        DL3026
    }

    fn initial_state(&self) -> RuleState<Self::State> {
        RuleState::default()
    }

    fn check(
        &self,
        line: usize,
        mut state: RuleState<Self::State>,
        instruction: &Instruction,
    ) -> RuleState<Self::State> {
        let Instruction::From(base) = instruction else {
            return state;
        };

        let untrusted = !self.registries.is_empty()
            && !base.is_variable()
            && !base.is_scratch()
            && !state.data.contains(&base.base_key())
            && !registry_allowed(&self.registries, base.image.registry.as_deref());
        if let Some(alias) = base.stage_name() {
            state.data.insert(alias);
        }

        if untrusted {
            state.add_failure(DL3026.failure(line))
        } else {
            state
        }
    }
}

/// DL3061: a Dockerfile must begin with FROM, ARG or a comment.
pub struct FromFirst;

const DL3061: RuleMetadata = RuleMetadata::new(
    "DL3061",
    Severity::Error,
    "Invalid instruction order. Dockerfile must begin with `FROM`, `ARG` or comment.",
);

impl Rule for FromFirst {
    /// Whether a FROM has been seen
    type State = bool;

    fn metadata(&self) -> RuleMetadata {
        DL3061
    }

    fn initial_state(&self) -> RuleState<bool> {
        RuleState::new(false)
    }

    fn check(&self, line: usize, state: RuleState<bool>, instruction: &Instruction) -> RuleState<bool> {
        if state.data {
            return state;
        }
        match instruction {
            Instruction::From(_) => state.with_data(true),
            Instruction::Arg { .. } | Instruction::Comment(_) => state,
            _ => state.add_failure(DL3061.failure(line)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dockerfile::parse_dockerfile;
    use crate::rules::DynRule;

    fn lines(rule: &dyn DynRule, dockerfile: &str) -> Vec<usize> {
        rule.run(&parse_dockerfile(dockerfile).unwrap()).iter().map(|f| f.line).collect()
    }

    #[test]
    fn test_untagged_image() {
        assert_eq!(lines(&UntaggedImage, "FROM debian"), vec![1]);
        assert!(lines(&UntaggedImage, "FROM debian:12").is_empty());
        assert!(lines(&UntaggedImage, "FROM debian@sha256:abc").is_empty());
        assert!(lines(&UntaggedImage, "FROM scratch").is_empty());
        assert!(lines(&UntaggedImage, "ARG BASE=x\nFROM ${BASE}").is_empty());
        assert!(lines(&UntaggedImage, "FROM golang:1.21 AS Build\nFROM build").is_empty());
        // An alias only counts once declared
        assert_eq!(lines(&UntaggedImage, "FROM build\nFROM golang:1.21 AS build"), vec![1]);
    }

    #[test]
    fn test_copy_from_known_stage() {
        let before = "FROM alpine:3\nCOPY --from=build /a /b\nFROM golang:1 AS build\n";
        assert_eq!(lines(&CopyFromKnownStage, before), vec![2]);

        let after = "FROM golang:1 AS build\nFROM alpine:3\nCOPY --from=build /a /b\n";
        assert!(lines(&CopyFromKnownStage, after).is_empty());

        assert_eq!(lines(&CopyFromKnownStage, "COPY --from=0 /a /b\nFROM alpine:3"), vec![1]);
        assert!(lines(&CopyFromKnownStage, "FROM a:1\nFROM b:1\nCOPY --from=0 /a /b").is_empty());
        assert!(lines(&CopyFromKnownStage, "COPY --from=registry.example/img:tag /a /b").is_empty());
        assert!(lines(&CopyFromKnownStage, "FROM a:1 AS Build\nCOPY --from=BUILD /a /b").is_empty());
        assert_eq!(lines(&CopyFromKnownStage, "FROM a:1\nCOPY --from=${STAGE} /a /b"), vec![2]);
    }

    #[test]
    fn test_signed_stage_index_is_an_alias() {
        let dockerfile = "FROM debian:12\nCOPY --from=+0 /a /b";
        assert_eq!(lines(&CopyFromKnownStage, dockerfile), vec![2]);
        assert!(lines(&CopyFromOtherStage, dockerfile).is_empty());
        assert_eq!(stage_index("0"), Some(0));
        assert_eq!(stage_index("+0"), None);
        assert_eq!(stage_index(""), None);
    }

    #[test]
    fn test_copy_from_own_stage() {
        assert_eq!(lines(&CopyFromOtherStage, "FROM a:1 AS build\nCOPY --from=build /a /b"), vec![2]);
        assert_eq!(lines(&CopyFromOtherStage, "FROM a:1\nFROM b:1\nCOPY --from=1 /a /b"), vec![3]);
        assert!(lines(&CopyFromOtherStage, "FROM a:1\nFROM b:1\nCOPY --from=0 /a /b").is_empty());
        assert!(lines(&CopyFromOtherStage, "FROM a:1 AS x\nFROM b:1 AS y\nCOPY --from=x /a /b")
            .is_empty());
    }

    #[test]
    fn test_unique_aliases() {
        assert_eq!(lines(&UniqueStageAliases, "FROM a:1 AS x\nFROM b:1 AS X\nFROM c:1 AS y"), vec![2]);
        assert!(lines(&UniqueStageAliases, "FROM a:1 AS x\nFROM x").is_empty());
        assert_eq!(
            lines(&UniqueStageAliases, "FROM a:1 AS x\nFROM b:1 AS x\nFROM c:1 AS x"),
            vec![2, 3]
        );
    }

    #[test]
    fn test_trusted_registries() {
        let rule = TrustedRegistries::new(vec!["docker.io".into(), "*.corp.example".into()]);
        assert!(lines(&rule, "FROM debian:12").is_empty());
        assert!(lines(&rule, "FROM registry.corp.example/app:1").is_empty());
        assert_eq!(lines(&rule, "FROM quay.io/org/app:1"), vec![1]);
        assert!(lines(&rule, "FROM quay.io/org/app:1 AS base\nFROM base").len() == 1);
        assert!(lines(&TrustedRegistries::new(Vec::new()), "FROM quay.io/org/app:1").is_empty());
    }

    #[test]
    fn test_from_first() {
        assert!(lines(&FromFirst, "# syntax\nARG V=1\nFROM a:$V\nRUN x").is_empty());
        assert_eq!(lines(&FromFirst, "LABEL a=b\nRUN x\nFROM a:1"), vec![1, 2]);
    }
}
