//! Rules whose stage state is inherited through `FROM <alias>`.

use std::collections::BTreeSet;

use super::StageChain;
use crate::dockerfile::{Healthcheck, Instruction};
use crate::rules::instructions::is_absolute_path;
use crate::rules::packages::{is_apt_get_install, is_pip_install, removes};
use crate::rules::{parse_run, Failure, Rule, RuleMetadata, RuleState};
use crate::severity::Severity;

const APT_LISTS: &str = "/var/lib/apt/lists";
const PIP_CACHE: &str = "/root/.cache/pip";

/// DL3009: apt lists left behind in a stage that ends up in the image.
pub struct AptListsCleanup;

const DL3009: RuleMetadata =
    RuleMetadata::new("DL3009", Severity::Info, "Delete the apt-get lists after installing something");

impl Rule for AptListsCleanup {
    /// Offending RUN lines per stage
    type State = StageChain<Vec<usize>>;

    fn metadata(&self) -> RuleMetadata {
        DL3009
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
            Instruction::From(base) => state.data.enter(line, base),
            Instruction::Run(run) => {
                let Some(shell) = parse_run(run) else {
                    return state;
                };
                let installs = shell.commands.iter().any(is_apt_get_install);
                let cleaned = removes(&shell, APT_LISTS) || run.flags.has_cache_mount(APT_LISTS);
                if installs && !cleaned {
                    if let Some(lines) = state.data.current_mut() {
                        lines.push(line);
                    }
                }
            }
            _ => {}
        }
        state
    }

    fn finalize(&self, state: RuleState<Self::State>) -> RuleState<Self::State> {
        // Inherited payloads repeat the parent's lines.
        let lines: BTreeSet<usize> = state
            .data
            .shipping()
            .into_iter()
            .flat_map(|index| state.data.stages()[index].data.iter().copied())
            .collect();
        lines.into_iter().fold(state, |state, line| state.add_failure(DL3009.failure(line)))
    }
}

/// DL3042: pip caches packages unless told not to.
pub struct PipNoCacheDir;

const DL3042: RuleMetadata = RuleMetadata::new(
    "DL3042",
    Severity::Warning,
    "Avoid use of cache directory with pip. Use `pip install --no-cache-dir <package>`",
);

impl Rule for PipNoCacheDir {
    /// Whether `PIP_NO_CACHE_DIR` is set in the stage
    type State = StageChain<bool>;

    fn metadata(&self) -> RuleMetadata {
        DL3042
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
            Instruction::From(base) => state.data.enter(line, base),
            Instruction::Env(pairs) => {
                if pairs.iter().any(|(name, _)| name == "PIP_NO_CACHE_DIR") {
                    if let Some(set) = state.data.current_mut() {
                        *set = true;
                    }
                }
            }
            Instruction::Arg { name, default: Some(_) } if name == "PIP_NO_CACHE_DIR" => {
                if let Some(set) = state.data.current_mut() {
                    *set = true;
                }
            }
            Instruction::Run(run) => {
                if state.data.current() == Some(&true) || run.flags.has_cache_mount(PIP_CACHE) {
                    return state;
                }
                let Some(shell) = parse_run(run) else {
                    return state;
                };
                let caches = shell
                    .commands
                    .iter()
                    .any(|cmd| is_pip_install(cmd) && !cmd.has_flag("no-cache-dir"));
                if caches {
                    return state.add_failure(DL3042.failure(line));
                }
            }
            _ => {}
        }
        state
    }
}

/// DL3045: COPY to a relative path depends on a WORKDIR.
pub struct CopyRelativeWorkdir;

const DL3045: RuleMetadata = RuleMetadata::new(
    "DL3045",
    Severity::Warning,
    "`COPY` to a relative destination without `WORKDIR` set.",
);

impl Rule for CopyRelativeWorkdir {
    /// Whether a WORKDIR is in effect
    type State = StageChain<bool>;

    fn metadata(&self) -> RuleMetadata {
        DL3045
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
            Instruction::From(base) => state.data.enter(line, base),
            Instruction::Workdir(_) => {
                if let Some(set) = state.data.current_mut() {
                    *set = true;
                }
            }
            Instruction::Copy(copy) => {
                let workdir = state.data.current() == Some(&true);
                if !workdir && !is_absolute_path(&copy.target) {
                    return state.add_failure(DL3045.failure(line));
                }
            }
            _ => {}
        }
        state
    }
}

/// DL3049: labels the schema requires must be present in the final image.
pub struct RequiredLabels {
    labels: Vec<String>,
}

const DL3049: RuleMetadata = RuleMetadata::new("DL3049", Severity::Info, "Label is missing.");

impl RequiredLabels {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }
}

impl Rule for RequiredLabels {
    /// Labels defined in the stage
    type State = StageChain<BTreeSet<String>>;

    fn metadata(&self) -> RuleMetadata {
        DL3049
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
            Instruction::From(base) => state.data.enter(line, base),
            Instruction::Label(pairs) => {
                if let Some(defined) = state.data.current_mut() {
                    defined.extend(pairs.iter().map(|(key, _)| key.clone()));
                }
            }
            _ => {}
        }
        state
    }

    fn finalize(&self, state: RuleState<Self::State>) -> RuleState<Self::State> {
        let Some(last) = state.data.last() else {
            return state;
        };
        let line = last.line;
        let missing: Vec<Failure> = self
            .labels
            .iter()
            .filter(|label| !last.data.contains(label.as_str()))
            .map(|label| Failure {
                message: format!("Label `{}` is missing.", label),
                ..DL3049.failure(line)
            })
            .collect();
        missing.into_iter().fold(state, RuleState::add_failure)
    }
}

/// DL3057: the final image should declare a HEALTHCHECK.
pub struct HealthcheckPresent;

const DL3057: RuleMetadata =
    RuleMetadata::new("DL3057", Severity::Ignore, "`HEALTHCHECK` instruction missing.");

impl Rule for HealthcheckPresent {
    /// Whether a HEALTHCHECK (including `NONE`) was declared
    type State = StageChain<bool>;

    fn metadata(&self) -> RuleMetadata {
        DL3057
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
            Instruction::From(base) => state.data.enter(line, base),
            Instruction::Healthcheck(Healthcheck::None | Healthcheck::Check(_)) => {
                if let Some(declared) = state.data.current_mut() {
                    *declared = true;
                }
            }
            _ => {}
        }
        state
    }

    fn finalize(&self, state: RuleState<Self::State>) -> RuleState<Self::State> {
        let missing = state.data.last().filter(|stage| !stage.data).map(|stage| stage.line);
        match missing {
            Some(line) => state.add_failure(DL3057.failure(line)),
            None => state,
        }
    }
}
