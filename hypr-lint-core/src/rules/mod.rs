//! Rule evaluation engine and rule catalog.
//!
//! Every rule is an independent fold over the instruction stream:
//! `initial_state -> check* -> finalize`. Rules carry their own typed state and never see
//! each other's failures. A [`RuleSet`] erases the state types so heterogeneous rules can be
//! evaluated together, sequentially or on the rayon thread pool, with identical output.

pub mod commands;
pub mod instructions;
pub mod labels;
pub mod packages;
pub mod simple;
pub mod stages;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::Config;
use crate::dockerfile::{Instruction, InstructionPos, RunArgs};
use crate::severity::Severity;
use crate::shell::{self, ParsedShellScript};

pub use simple::SimpleRule;

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

/// Static description of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleMetadata {
    pub code: &'static str,
    pub severity: Severity,
    pub message: &'static str,
}

impl RuleMetadata {
    pub const fn new(code: &'static str, severity: Severity, message: &'static str) -> Self {
        Self { code, severity, message }
    }

    /// A failure of this rule at `line`, with the rule's message.
    pub fn failure(&self, line: usize) -> Failure {
        Failure {
            code: self.code,
            severity: self.severity,
            message: self.message.to_string(),
            line,
            column: None,
        }
    }
}

/// Accumulator threaded through one rule's fold.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleState<T> {
    pub failures: Vec<Failure>,
    pub data: T,
}

impl<T> RuleState<T> {
    pub fn new(data: T) -> Self {
        Self { failures: Vec::new(), data }
    }

    pub fn add_failure(mut self, failure: Failure) -> Self {
        self.failures.push(failure);
        self
    }

    pub fn with_data(self, data: T) -> Self {
        Self { failures: self.failures, data }
    }

    pub fn modify(self, f: impl FnOnce(T) -> T) -> Self {
        Self { failures: self.failures, data: f(self.data) }
    }
}

impl<T: Default> Default for RuleState<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// A lint rule with its own fold state.
pub trait Rule: Send + Sync {
    type State: Send;

    fn metadata(&self) -> RuleMetadata;

    fn code(&self) -> &'static str {
        self.metadata().code
    }

    fn severity(&self) -> Severity {
        self.metadata().severity
    }

    fn message(&self) -> &'static str {
        self.metadata().message
    }

    fn initial_state(&self) -> RuleState<Self::State>;

    /// Fold step. Instructions a rule does not care about leave the state untouched.
    fn check(
        &self,
        line: usize,
        state: RuleState<Self::State>,
        instruction: &Instruction,
    ) -> RuleState<Self::State>;

    /// Called once after the last instruction.
    fn finalize(&self, state: RuleState<Self::State>) -> RuleState<Self::State> {
        state
    }
}

/// Object-safe view of a [`Rule`], implemented for every rule.
pub trait DynRule: Send + Sync {
    fn describe(&self) -> RuleMetadata;

    /// Runs the whole fold and returns the failures in the order they were recorded.
    fn run(&self, instructions: &[InstructionPos]) -> Vec<Failure>;
}

impl<R: Rule> DynRule for R {
    fn describe(&self) -> RuleMetadata {
        self.metadata()
    }

    fn run(&self, instructions: &[InstructionPos]) -> Vec<Failure> {
        let state = instructions
            .iter()
            .fold(self.initial_state(), |state, pos| self.check(pos.line, state, &pos.instruction));
        self.finalize(state).failures
    }
}

/// Ordered collection of rules. Failures come out rule by rule, in registration order.
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<Box<dyn DynRule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: impl DynRule + 'static) {
        self.rules.push(Box::new(rule));
    }

    pub fn with(mut self, rule: impl DynRule + 'static) -> Self {
        self.push(rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn metadata(&self) -> Vec<RuleMetadata> {
        self.rules.iter().map(|rule| rule.describe()).collect()
    }

    /// Evaluates every rule one after the other.
    pub fn evaluate(&self, instructions: &[InstructionPos]) -> Vec<Failure> {
        self.rules.iter().flat_map(|rule| run_logged(rule.as_ref(), instructions)).collect()
    }

    /// Evaluates rules on the rayon thread pool. Output is identical to [`RuleSet::evaluate`].
    pub fn evaluate_parallel(&self, instructions: &[InstructionPos]) -> Vec<Failure> {
        let per_rule: Vec<Vec<Failure>> =
            self.rules.par_iter().map(|rule| run_logged(rule.as_ref(), instructions)).collect();
        per_rule.into_iter().flatten().collect()
    }

    /// The rule catalog for a configuration.
    pub fn standard(config: &Config) -> Self {
        let mut set = RuleSet::new();

        // Stage-aware rules
        set.push(stages::NoRootUser);
        set.push(stages::UntaggedImage);
        set.push(stages::AptListsCleanup);
        set.push(stages::OncePerStage::healthcheck());
        set.push(stages::CopyFromKnownStage);
        set.push(stages::CopyFromOtherStage);
        set.push(stages::UniqueStageAliases);
        set.push(stages::TrustedRegistries::new(config.trusted_registries.clone()));
        set.push(stages::PipNoCacheDir);
        set.push(stages::EnvSelfReference);
        set.push(stages::CopyRelativeWorkdir);
        set.push(stages::RequiredLabels::new(config.label_schema.keys().cloned().collect()));
        set.push(stages::HealthcheckPresent);
        set.push(stages::ConsecutiveRun);
        set.push(stages::FromFirst);
        set.push(stages::WgetOrCurl);
        set.push(stages::OncePerStage::cmd());
        set.push(stages::OncePerStage::entrypoint());
        set.push(stages::PipefailBeforePipe);

        for rule in commands::rules().into_iter().chain(packages::rules()) {
            set.push(rule);
        }
        for rule in instructions::rules() {
            set.push(rule);
        }
        if !config.label_schema.is_empty() {
            labels::register(&mut set, config);
        }

        debug!(rules = set.len(), "Built rule set");
        set
    }
}

fn run_logged(rule: &dyn DynRule, instructions: &[InstructionPos]) -> Vec<Failure> {
    let failures = rule.run(instructions);
    debug!(rule = rule.describe().code, failures = failures.len(), "Evaluated rule");
    failures
}

/// Shell analysis of a RUN instruction. Unparseable shell text yields `None` so callers
/// skip the instruction.
pub(crate) fn parse_run(run: &RunArgs) -> Option<ParsedShellScript> {
    match shell::parse(&run.command.as_script()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            trace!(error = %e, "Skipping RUN with unparseable shell");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dockerfile::parse_dockerfile;

    /// Counts instructions; reports one failure per RUN and a summary at the end.
    struct CountingRule;

    impl Rule for CountingRule {
        type State = usize;

        fn metadata(&self) -> RuleMetadata {
            RuleMetadata::new("T001", Severity::Info, "counting")
        }

        fn initial_state(&self) -> RuleState<usize> {
            RuleState::new(0)
        }

        fn check(&self, line: usize, state: RuleState<usize>, instruction: &Instruction) -> RuleState<usize> {
            let state = state.modify(|n| n + 1);
            match instruction {
                Instruction::Run(_) => state.add_failure(self.metadata().failure(line)),
                _ => state,
            }
        }

        fn finalize(&self, state: RuleState<usize>) -> RuleState<usize> {
            let line = state.data;
            state.add_failure(self.metadata().failure(line))
        }
    }

    #[test]
    fn test_fold_and_finalize() {
        let instructions = parse_dockerfile("FROM a\nRUN x\nUSER u\nRUN y\n").unwrap();
        let failures = CountingRule.run(&instructions);
        assert_eq!(failures.iter().map(|f| f.line).collect::<Vec<_>>(), vec![2, 4, 4]);
    }

    #[test]
    fn test_rule_order_is_registration_order() {
        let set = RuleSet::new()
            .with(SimpleRule::new(
                RuleMetadata::new("T002", Severity::Error, "no users"),
                |i| !matches!(i, Instruction::User(_)),
            ))
            .with(CountingRule);
        let instructions = parse_dockerfile("FROM a\nRUN x\nUSER u\n").unwrap();
        let codes: Vec<_> = set.evaluate(&instructions).iter().map(|f| f.code).collect();
        assert_eq!(codes, vec!["T002", "T001", "T001"]);
        assert_eq!(set.evaluate(&instructions), set.evaluate_parallel(&instructions));
    }

    #[test]
    fn test_standard_set_depends_on_label_schema() {
        let plain = RuleSet::standard(&Config::default());
        let mut config = Config::default();
        config.label_schema.insert("version".into(), crate::config::LabelType::Semver);
        let with_labels = RuleSet::standard(&config);
        assert!(with_labels.len() > plain.len());
        assert!(!plain.metadata().iter().any(|m| m.code == "DL3051"));
        assert!(with_labels.metadata().iter().any(|m| m.code == "DL3051"));
    }

    #[test]
    fn test_parse_run_fails_open() {
        let run = RunArgs {
            command: crate::dockerfile::Arguments::Shell("echo 'broken".into()),
            flags: Default::default(),
        };
        assert!(parse_run(&run).is_none());
    }
}
