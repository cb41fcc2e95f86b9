//! Rules scoped to a single stage: state resets (or is keyed) at every FROM.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

use crate::dockerfile::{Arguments, Instruction, RunFlags};
use crate::rules::{parse_run, Rule, RuleMetadata, RuleState};
use crate::severity::Severity;

/// `root`, `0`, or a `root:`/`0:` user:group pair.
fn is_root_user(user: &str) -> bool {
    let name = user.split(':').next().unwrap_or(user);
    name == "root" || name == "0"
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootUsers {
    current_stage_line: usize,
    /// Stage FROM line -> line of the last USER switching to root
    root_users: BTreeMap<usize, usize>,
}

/// DL3002: the last USER of a stage should not be root.
pub struct NoRootUser;

const DL3002: RuleMetadata =
    RuleMetadata::new("DL3002", Severity::Warning, "Last USER should not be root");

impl Rule for NoRootUser {
    type State = RootUsers;

    fn metadata(&self) -> RuleMetadata {
        DL3002
    }

    fn initial_state(&self) -> RuleState<RootUsers> {
        RuleState::default()
    }

    fn check(
        &self,
        line: usize,
        mut state: RuleState<RootUsers>,
        instruction: &Instruction,
    ) -> RuleState<RootUsers> {
        match instruction {
            Instruction::From(_) => state.data.current_stage_line = line,
            Instruction::User(user) => {
                let stage = state.data.current_stage_line;
                if is_root_user(user) {
                    state.data.root_users.insert(stage, line);
                } else {
                    state.data.root_users.remove(&stage);
                }
            }
            _ => {}
        }
        state
    }

    fn finalize(&self, state: RuleState<RootUsers>) -> RuleState<RootUsers> {
        let lines: Vec<usize> = state.data.root_users.values().copied().collect();
        lines.into_iter().fold(state, |state, line| state.add_failure(DL3002.failure(line)))
    }
}

/// DL3012, DL4003, DL4004: an instruction that may appear once per stage.
pub struct OncePerStage {
    metadata: RuleMetadata,
    matches: fn(&Instruction) -> bool,
}

impl OncePerStage {
    pub fn healthcheck() -> Self {
        Self {
            metadata: RuleMetadata::new(
                "DL3012",
                Severity::Error,
                "Multiple `HEALTHCHECK` instructions",
            ),
            matches: |i| matches!(i, Instruction::Healthcheck(_)),
        }
    }

    pub fn cmd() -> Self {
        Self {
            metadata: RuleMetadata::new(
                "DL4003",
                Severity::Warning,
                "Multiple `CMD` instructions found. If you list more than one `CMD` then only the last `CMD` will take effect",
            ),
            matches: |i| matches!(i, Instruction::Cmd(_)),
        }
    }

    pub fn entrypoint() -> Self {
        Self {
            metadata: RuleMetadata::new(
                "DL4004",
                Severity::Error,
                "Multiple `ENTRYPOINT` instructions found. If you list more than one `ENTRYPOINT` then only the last `ENTRYPOINT` will take effect",
            ),
            matches: |i| matches!(i, Instruction::Entrypoint(_)),
        }
    }
}

impl Rule for OncePerStage {
    /// Whether the current stage already has the instruction
    type State = bool;

    fn metadata(&self) -> RuleMetadata {
        self.metadata
    }

    fn initial_state(&self) -> RuleState<bool> {
        RuleState::new(false)
    }

    fn check(&self, line: usize, state: RuleState<bool>, instruction: &Instruction) -> RuleState<bool> {
        if let Instruction::From(_) = instruction {
            return state.with_data(false);
        }
        if !(self.matches)(instruction) {
            return state;
        }
        if state.data {
            state.add_failure(self.metadata.failure(line))
        } else {
            state.with_data(true)
        }
    }
}

/// DL3059: consecutive RUN instructions with the same flags could be one layer.
pub struct ConsecutiveRun;

const DL3059: RuleMetadata = RuleMetadata::new(
    "DL3059",
    Severity::Info,
    "Multiple consecutive `RUN` instructions. Consider consolidation.",
);

impl Rule for ConsecutiveRun {
    /// Flags of the previous instruction when it was a RUN
    type State = Option<RunFlags>;

    fn metadata(&self) -> RuleMetadata {
        DL3059
    }

    fn initial_state(&self) -> RuleState<Self::State> {
        RuleState::new(None)
    }

    fn check(
        &self,
        line: usize,
        state: RuleState<Self::State>,
        instruction: &Instruction,
    ) -> RuleState<Self::State> {
        match instruction {
            Instruction::Run(run) => {
                let repeated = state.data.as_ref() == Some(&run.flags);
                let state = state.with_data(Some(run.flags.clone()));
                if repeated {
                    state.add_failure(DL3059.failure(line))
                } else {
                    state
                }
            }
            Instruction::Comment(_) => state,
            _ => state.with_data(None),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DownloadTools {
    wget: bool,
    curl: bool,
}

/// DL4001: use either wget or curl in a stage, not both.
pub struct WgetOrCurl;

const DL4001: RuleMetadata =
    RuleMetadata::new("DL4001", Severity::Warning, "Either use Wget or Curl but not both");

impl Rule for WgetOrCurl {
    type State = DownloadTools;

    fn metadata(&self) -> RuleMetadata {
        DL4001
    }

    fn initial_state(&self) -> RuleState<DownloadTools> {
        RuleState::default()
    }

    fn check(
        &self,
        line: usize,
        state: RuleState<DownloadTools>,
        instruction: &Instruction,
    ) -> RuleState<DownloadTools> {
        match instruction {
            Instruction::From(_) => state.with_data(DownloadTools::default()),
            Instruction::Run(run) => {
                let Some(parsed) = parse_run(run) else {
                    return state;
                };
                let wget = parsed.using_program("wget");
                let curl = parsed.using_program("curl");
                let seen = state.data;
                let mixed = (wget && (curl || seen.curl)) || (curl && seen.wget);
                let state = state.with_data(DownloadTools {
                    wget: seen.wget || wget,
                    curl: seen.curl || curl,
                });
                if mixed {
                    state.add_failure(DL4001.failure(line))
                } else {
                    state
                }
            }
            _ => state,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShellSettings {
    pipefail: bool,
    /// SHELL switched to PowerShell or cmd
    non_posix: bool,
}

impl ShellSettings {
    fn from_shell(args: &[String]) -> Self {
        let program = args.first().map(|p| {
            let name = p.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(p).to_ascii_lowercase();
            name.trim_end_matches(".exe").to_string()
        });
        let non_posix = matches!(program.as_deref(), Some("pwsh" | "powershell" | "cmd"));
        let pipefail = args.windows(2).any(|pair| {
            let option = pair[0].as_str();
            option.starts_with('-')
                && !option.starts_with("--")
                && option.ends_with('o')
                && pair[1] == "pipefail"
        });
        Self { pipefail, non_posix }
    }
}

/// DL4006: set `pipefail` before RUN commands that use a pipe.
pub struct PipefailBeforePipe;

const DL4006: RuleMetadata = RuleMetadata::new(
    "DL4006",
    Severity::Warning,
    "Set the SHELL option -o pipefail before RUN with a pipe in it. If you are using /bin/sh in an alpine image or if your shell is symlinked to busybox then consider explicitly setting your SHELL to /bin/ash, or disable this check",
);

impl Rule for PipefailBeforePipe {
    type State = ShellSettings;

    fn metadata(&self) -> RuleMetadata {
        DL4006
    }

    fn initial_state(&self) -> RuleState<ShellSettings> {
        RuleState::default()
    }

    fn check(
        &self,
        line: usize,
        state: RuleState<ShellSettings>,
        instruction: &Instruction,
    ) -> RuleState<ShellSettings> {
        match instruction {
            Instruction::From(_) => state.with_data(ShellSettings::default()),
            Instruction::Shell(Arguments::Exec(args)) => {
                state.with_data(ShellSettings::from_shell(args))
            }
            // Exec form does not go through a shell
            Instruction::Run(run) if matches!(run.command, Arguments::Shell(_)) => {
                if state.data.pipefail || state.data.non_posix {
                    return state;
                }
                let Some(parsed) = parse_run(run) else {
                    return state;
                };
                let inline_pipefail = parsed
                    .commands_named("set")
                    .any(|set| set.flag_values("o").contains(&"pipefail"));
                if parsed.has_pipes() && !inline_pipefail {
                    state.add_failure(DL4006.failure(line))
                } else {
                    state
                }
            }
            _ => state,
        }
    }
}

static VARIABLE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)").expect("Invalid variable reference regex")
});

/// DL3044: an ENV value must not refer to a variable defined in the same ENV statement.
pub struct EnvSelfReference;

const DL3044: RuleMetadata = RuleMetadata::new(
    "DL3044",
    Severity::Error,
    "Do not refer to an environment variable within the same `ENV` statement where it is defined.",
);

impl Rule for EnvSelfReference {
    /// Variables defined by earlier ENV and ARG instructions
    type State = HashSet<String>;

    fn metadata(&self) -> RuleMetadata {
        DL3044
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
            Instruction::Arg { name, .. } => {
                state.data.insert(name.clone());
                state
            }
            Instruction::Env(pairs) => {
                let mut in_statement: Vec<&str> = Vec::new();
                let mut self_reference = false;
                for (key, value) in pairs {
                    self_reference |= VARIABLE_REFERENCE.captures_iter(value).any(|c| {
                        let name = &c[1];
                        in_statement.contains(&name) && !state.data.contains(name)
                    });
                    in_statement.push(key);
                }
                state.data.extend(pairs.iter().map(|(key, _)| key.clone()));
                if self_reference {
                    state.add_failure(DL3044.failure(line))
                } else {
                    state
                }
            }
            _ => state,
        }
    }
}
