//! Rules about individual shell commands in RUN.

use super::{RuleMetadata, SimpleRule};
use crate::severity::Severity;
use crate::shell::VARIABLE_PLACEHOLDER;

/// Commands that make no sense in a container.
const INTERACTIVE_OR_SYSTEM: [&str; 10] =
    ["ssh", "vim", "shutdown", "service", "ps", "free", "top", "kill", "mount", "ifconfig"];

/// UIDs longer than this many digits bloat `/var/log/lastlog` unless `-l` is passed.
const MAX_UID_DIGITS: usize = 5;

pub fn rules() -> Vec<SimpleRule> {
    vec![
        SimpleRule::shell(
            RuleMetadata::new(
                "DL3001",
                Severity::Info,
                "For some bash commands it makes no sense running them in a Docker container like `ssh`, `vim`, `shutdown`, `service`, `ps`, `free`, `top`, `kill`, `mount`, `ifconfig`",
            ),
            |_, shell| !INTERACTIVE_OR_SYSTEM.iter().any(|program| shell.using_program(program)),
        ),
        SimpleRule::shell(
            RuleMetadata::new("DL3003", Severity::Warning, "Use WORKDIR to switch to a directory"),
            |_, shell| !shell.using_program("cd"),
        ),
        SimpleRule::shell(
            RuleMetadata::new(
                "DL3004",
                Severity::Error,
                "Do not use sudo as it leads to unpredictable behavior. Use a tool like gosu to enforce root",
            ),
            |_, shell| !shell.using_program("sudo"),
        ),
        SimpleRule::shell(
            RuleMetadata::new(
                "DL3046",
                Severity::Warning,
                "`useradd` without flag `-l` and high UID will result in excessively large Image.",
            ),
            |_, shell| {
                shell.commands_named("useradd").all(|cmd| {
                    cmd.has_any_flag(&["l", "no-log-init"])
                        || cmd
                            .flag_values("u")
                            .into_iter()
                            .chain(cmd.flag_values("uid"))
                            .all(|uid| uid.contains(VARIABLE_PLACEHOLDER) || uid.len() <= MAX_UID_DIGITS)
                })
            },
        ),
        SimpleRule::shell(
            RuleMetadata::new(
                "DL3047",
                Severity::Info,
                "Avoid use of wget without progress bar. Use `wget --progress=dot:giga <url>`. Or consider using `-q` or `-nv` (shorthands for `--quiet` or `--no-verbose`).",
            ),
            |_, shell| {
                shell.commands_named("wget").all(|cmd| {
                    cmd.has_any_flag(&["progress", "q", "quiet", "no-verbose", "o", "output-file", "a", "append-output"])
                        || cmd.has_arg("-nv")
                })
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dockerfile::parse_dockerfile;
    use crate::rules::{DynRule, Rule};

    fn fails(code: &str, run: &str) -> bool {
        let rule = rules().into_iter().find(|r| r.code() == code).expect("rule exists");
        let instructions = parse_dockerfile(&format!("FROM debian:12\nRUN {}\n", run)).unwrap();
        !rule.run(&instructions).is_empty()
    }

    #[test]
    fn test_container_unfriendly_commands() {
        assert!(fails("DL3001", "service nginx start"));
        assert!(fails("DL3001", "ps aux | grep x"));
        assert!(!fails("DL3001", "apt-get install -y procps"));
    }

    #[test]
    fn test_cd() {
        assert!(fails("DL3003", "cd /app && make"));
        assert!(fails("DL3003", "if true; then cd /tmp; fi"));
        assert!(!fails("DL3003", "make -C /app"));
    }

    #[test]
    fn test_sudo() {
        assert!(fails("DL3004", "sudo apt-get update"));
        assert!(fails("DL3004", "echo $(sudo id)"));
        assert!(!fails("DL3004", "echo sudo"));
        assert!(!fails("DL3004", "[[ -f /x && sudo ]]"));
        assert!(fails("DL3004", "select x in a b; do echo; done | sudo tee /etc/choice"));
    }

    #[test]
    fn test_useradd_high_uid() {
        assert!(fails("DL3046", "useradd -u 123456 app"));
        assert!(fails("DL3046", "useradd --uid 123456 app"));
        assert!(!fails("DL3046", "useradd -l -u 123456 app"));
        assert!(!fails("DL3046", "useradd -u 1000 app"));
        assert!(!fails("DL3046", "useradd -u ${APP_UID} app"));
        assert!(!fails("DL3046", "useradd app"));
    }

    #[test]
    fn test_wget_progress() {
        assert!(fails("DL3047", "wget https://example.com/a.tgz"));
        assert!(!fails("DL3047", "wget -q https://example.com/a.tgz"));
        assert!(!fails("DL3047", "wget -nv https://example.com/a.tgz"));
        assert!(!fails("DL3047", "wget --progress=dot:giga https://example.com/a.tgz"));
        assert!(!fails("DL3047", "curl -fsSL https://example.com/a.tgz"));
    }
}
