//! Stateless rules: one predicate per instruction.

use super::{parse_run, Rule, RuleMetadata, RuleState};
use crate::dockerfile::{Instruction, RunFlags};
use crate::shell::ParsedShellScript;

/// What a [`SimpleRule`] inspects. Predicates return `true` when the instruction is fine.
#[derive(Clone, Copy)]
enum Check {
    Instruction(fn(&Instruction) -> bool),
    /// Applied to the parsed shell of RUN instructions only.
    Shell(fn(&RunFlags, &ParsedShellScript) -> bool),
}

/// A rule that judges each instruction on its own, including instructions wrapped in ONBUILD.
#[derive(Clone, Copy)]
pub struct SimpleRule {
    metadata: RuleMetadata,
    check: Check,
}

impl SimpleRule {
    pub fn new(metadata: RuleMetadata, predicate: fn(&Instruction) -> bool) -> Self {
        Self { metadata, check: Check::Instruction(predicate) }
    }

    /// A rule over RUN shell commands. RUN instructions whose shell text does not parse pass.
    pub fn shell(metadata: RuleMetadata, predicate: fn(&RunFlags, &ParsedShellScript) -> bool) -> Self {
        Self { metadata, check: Check::Shell(predicate) }
    }

    fn passes(&self, instruction: &Instruction) -> bool {
        let own = match self.check {
            Check::Instruction(predicate) => predicate(instruction),
            Check::Shell(predicate) => match instruction {
                Instruction::Run(run) => {
                    parse_run(run).map_or(true, |parsed| predicate(&run.flags, &parsed))
                }
                _ => true,
            },
        };
        own && match instruction {
            Instruction::Onbuild(inner) => self.passes(inner),
            _ => true,
        }
    }
}

impl Rule for SimpleRule {
    type State = ();

    fn metadata(&self) -> RuleMetadata {
        self.metadata
    }

    fn initial_state(&self) -> RuleState<()> {
        RuleState::new(())
    }

    fn check(&self, line: usize, state: RuleState<()>, instruction: &Instruction) -> RuleState<()> {
        if self.passes(instruction) {
            state
        } else {
            state.add_failure(self.metadata.failure(line))
        }
    }
}
