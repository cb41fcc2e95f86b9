//! Package manager rules: version pinning, non-interactive installs and cache hygiene.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{RuleMetadata, SimpleRule};
use crate::dockerfile::RunFlags;
use crate::severity::Severity;
use crate::shell::{Command, ParsedShellScript, VARIABLE_PLACEHOLDER};

/// apt-get options that take a separate value.
const APT_VALUE_FLAGS: [&str; 6] = ["o", "option", "t", "target-release", "c", "config-file"];

pub(crate) fn is_apt_get_install(cmd: &Command) -> bool {
    cmd.is("apt-get") && cmd.has_arg("install")
}

/// Packages named by an `apt-get install`.
fn apt_packages(cmd: &Command) -> Vec<&str> {
    cmd.args_after("install", &APT_VALUE_FLAGS)
}

static PIP_PROGRAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^pip(\d+(\.\d+)*)?$").expect("Invalid pip program regex"));
static PYTHON_PROGRAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^python(\d+(\.\d+)*)?$").expect("Invalid python program regex"));

/// `pip install ...`, `pip3.11 install ...` or `python -m pip install ...`.
pub(crate) fn is_pip_install(cmd: &Command) -> bool {
    let pip = PIP_PROGRAM.is_match(&cmd.name)
        || (PYTHON_PROGRAM.is_match(&cmd.name) && cmd.flag_values("m").contains(&"pip"));
    pip && cmd.has_arg("install")
}

const PIP_VALUE_FLAGS: [&str; 22] = [
    "r",
    "requirement",
    "c",
    "constraint",
    "e",
    "editable",
    "i",
    "index-url",
    "extra-index-url",
    "f",
    "find-links",
    "t",
    "target",
    "prefix",
    "root",
    "src",
    "trusted-host",
    "platform",
    "python-version",
    "implementation",
    "abi",
    "m",
];

fn pip_packages(cmd: &Command) -> Vec<&str> {
    cmd.args_after("install", &PIP_VALUE_FLAGS)
}

fn is_variable(package: &str) -> bool {
    package.contains(VARIABLE_PLACEHOLDER)
}

fn apt_version_pinned(package: &str) -> bool {
    package.contains('=') || package.contains('/') || package.ends_with(".deb") || is_variable(package)
}

fn pip_version_pinned(package: &str) -> bool {
    const SPECIFIERS: [&str; 7] = ["==", ">=", "<=", "~=", "!=", "<", ">"];
    SPECIFIERS.iter().any(|s| package.contains(s))
        || package.contains('@')
        || package.contains("://")
        || package.starts_with('.')
        || package.starts_with('/')
        || package.starts_with("git+")
        || [".whl", ".tar.gz", ".zip"].iter().any(|ext| package.ends_with(ext))
        || is_variable(package)
}

fn npm_version_pinned(package: &str) -> bool {
    // `@scope/name` starts with '@', the version comes after a later '@'
    package.rfind('@').is_some_and(|at| at > 0)
        || ["git", "http", "file:", ".", "/", "~"].iter().any(|p| package.starts_with(p))
        || [".tgz", ".tar.gz", ".tar"].iter().any(|ext| package.ends_with(ext))
        || package.contains('#')
        || is_variable(package)
}

fn apk_version_pinned(package: &str) -> bool {
    package.contains('=') || package.ends_with(".apk") || is_variable(package)
}

static RPM_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-\d").expect("Invalid rpm version regex"));

fn rpm_version_pinned(package: &str) -> bool {
    RPM_VERSION.is_match(package)
        || package.contains(':')
        || package.ends_with(".rpm")
        || is_variable(package)
}

fn zypper_version_pinned(package: &str) -> bool {
    package.contains(&['=', '<', '>'][..]) || package.ends_with(".rpm") || is_variable(package)
}

/// `rm` of a path under `dir`.
pub(crate) fn removes(shell: &ParsedShellScript, dir: &str) -> bool {
    shell.commands_named("rm").any(|rm| rm.positional_args().iter().any(|p| p.starts_with(dir)))
}

/// An RPM-style package manager: yum, dnf and zypper share their rule shapes.
struct RpmFamily {
    programs: &'static [&'static str],
    install: &'static [&'static str],
    confirm_flags: &'static [&'static str],
    clean: &'static [&'static str],
    cache_dir: &'static str,
    pinned: fn(&str) -> bool,
}

const YUM: RpmFamily = RpmFamily {
    programs: &["yum"],
    install: &["install", "groupinstall", "localinstall"],
    confirm_flags: &["y", "assumeyes"],
    clean: &["clean"],
    cache_dir: "/var/cache/yum",
    pinned: rpm_version_pinned,
};

const DNF: RpmFamily = RpmFamily {
    programs: &["dnf", "microdnf"],
    install: &["install", "groupinstall", "localinstall"],
    confirm_flags: &["y", "assumeyes"],
    clean: &["clean"],
    cache_dir: "/var/cache/dnf",
    pinned: rpm_version_pinned,
};

const ZYPPER: RpmFamily = RpmFamily {
    programs: &["zypper"],
    install: &["install", "in"],
    confirm_flags: &["n", "non-interactive", "y", "no-confirm"],
    clean: &["clean", "cc"],
    cache_dir: "/var/cache/zypp",
    pinned: zypper_version_pinned,
};

const RPM_VALUE_FLAGS: [&str; 8] =
    ["c", "config", "x", "exclude", "setopt", "releasever", "installroot", "r"];

impl RpmFamily {
    fn installs<'a>(&'a self, shell: &'a ParsedShellScript) -> impl Iterator<Item = &'a Command> {
        shell.commands.iter().filter(move |cmd| {
            self.programs.iter().any(|p| cmd.is(p))
                && cmd
                    .args_skipping_flag_values(&RPM_VALUE_FLAGS)
                    .iter()
                    .any(|arg| self.install.contains(arg))
        })
    }

    fn packages<'a>(&self, cmd: &'a Command) -> Vec<&'a str> {
        let args = cmd.args_skipping_flag_values(&RPM_VALUE_FLAGS);
        match args.iter().position(|arg| self.install.contains(arg)) {
            Some(index) => args[index + 1..].to_vec(),
            None => Vec::new(),
        }
    }

    fn non_interactive(&self, shell: &ParsedShellScript) -> bool {
        self.installs(shell).all(|cmd| cmd.has_any_flag(self.confirm_flags))
    }

    fn cleans_cache(&self, flags: &RunFlags, shell: &ParsedShellScript) -> bool {
        if self.installs(shell).next().is_none() || flags.has_cache_mount(self.cache_dir) {
            return true;
        }
        let cleaned = shell.commands.iter().any(|cmd| {
            self.programs.iter().any(|p| cmd.is(p)) && cmd.has_subcommand(self.clean)
        });
        cleaned || removes(shell, self.cache_dir)
    }

    fn pinned(&self, shell: &ParsedShellScript) -> bool {
        self.installs(shell).all(|cmd| self.packages(cmd).iter().all(|p| (self.pinned)(p)))
    }
}

/// Package manager rules in catalog order.
pub fn rules() -> Vec<SimpleRule> {
    vec![
        SimpleRule::shell(
            RuleMetadata::new(
                "DL3008",
                Severity::Warning,
                "Pin versions in apt get install. Instead of `apt-get install <package>` use `apt-get install <package>=<version>`",
            ),
            |_, shell| {
                shell.commands.iter().filter(|c| is_apt_get_install(c)).all(|cmd| {
                    apt_packages(cmd).iter().all(|p| apt_version_pinned(p))
                })
            },
        ),
        SimpleRule::shell(
            RuleMetadata::new(
                "DL3013",
                Severity::Warning,
                "Pin versions in pip. Instead of `pip install <package>` use `pip install <package>==<version>` or `pip install --requirement <requirements file>`",
            ),
            |_, shell| {
                shell.commands.iter().filter(|c| is_pip_install(c)).all(|cmd| {
                    pip_packages(cmd).iter().all(|p| pip_version_pinned(p))
                })
            },
        ),
        SimpleRule::shell(
            RuleMetadata::new("DL3014", Severity::Warning, "Use the `-y` switch to avoid manual input `apt-get -y install <package>`"),
            |_, shell| {
                shell.commands.iter().filter(|c| is_apt_get_install(c)).all(|cmd| {
                    cmd.has_any_flag(&["y", "yes", "assume-yes"])
                        || cmd.count_flag("q") >= 2
                        || cmd.has_any_arg(&["-q=2", "--quiet=2"])
                })
            },
        ),
        SimpleRule::shell(
            RuleMetadata::new("DL3015", Severity::Info, "Avoid additional packages by specifying `--no-install-recommends`"),
            |_, shell| {
                shell.commands.iter().filter(|c| is_apt_get_install(c)).all(|cmd| {
                    cmd.has_flag("no-install-recommends")
                        || cmd.flag_values("o").contains(&"APT::Install-Recommends=false")
                })
            },
        ),
        SimpleRule::shell(
            RuleMetadata::new(
                "DL3016",
                Severity::Warning,
                "Pin versions in npm. Instead of `npm install <package>` use `npm install <package>@<version>`",
            ),
            |_, shell| {
                shell.commands_named("npm").all(|cmd| {
                    let args = cmd.args_skipping_flag_values(&["prefix", "registry", "cache", "C"]);
                    match args.split_first() {
                        Some((sub, packages)) if ["install", "i", "add"].contains(sub) => {
                            packages.iter().all(|p| npm_version_pinned(p))
                        }
                        _ => true,
                    }
                })
            },
        ),
        SimpleRule::shell(
            RuleMetadata::new(
                "DL3018",
                Severity::Warning,
                "Pin versions in apk add. Instead of `apk add <package>` use `apk add <package>=<version>`",
            ),
            |_, shell| {
                shell.commands_named("apk").all(|cmd| {
                    cmd.args_after("add", &["t", "virtual", "repository", "X", "p", "root", "keys-dir"])
                        .iter()
                        .all(|p| apk_version_pinned(p))
                })
            },
        ),
        SimpleRule::shell(
            RuleMetadata::new(
                "DL3019",
                Severity::Info,
                "Use the `--no-cache` switch to avoid the need to use `--update` and remove `/var/cache/apk/*` when done installing packages",
            ),
            |flags, shell| {
                flags.has_cache_mount("/var/cache/apk")
                    || shell
                        .commands_named("apk")
                        .filter(|cmd| cmd.has_arg("add"))
                        .all(|cmd| cmd.has_flag("no-cache"))
            },
        ),
        SimpleRule::shell(
            RuleMetadata::new("DL3027", Severity::Warning, "Do not use apt as it is meant to be an end-user tool, use apt-get or apt-cache instead"),
            |_, shell| !shell.using_program("apt"),
        ),
        SimpleRule::shell(
            RuleMetadata::new(
                "DL3028",
                Severity::Warning,
                "Pin versions in gem install. Instead of `gem install <gem>` use `gem install <gem>:<version>`",
            ),
            |_, shell| {
                shell.commands_named("gem").all(|cmd| {
                    cmd.has_any_flag(&["v", "version"])
                        || cmd
                            .args_after("install", &["i", "install-dir", "n", "bindir", "source", "s", "platform"])
                            .iter()
                            .all(|p| p.contains(':') || is_variable(p))
                })
            },
        ),
        SimpleRule::shell(
            RuleMetadata::new("DL3030", Severity::Warning, "Use the `-y` switch to avoid manual input `yum install -y <package>`"),
            |_, shell| YUM.non_interactive(shell),
        ),
        SimpleRule::shell(
            RuleMetadata::new("DL3032", Severity::Warning, "`yum clean all` missing after yum command."),
            |flags, shell| YUM.cleans_cache(flags, shell),
        ),
        SimpleRule::shell(
            RuleMetadata::new(
                "DL3033",
                Severity::Warning,
                "Specify version with `yum install -y <package>-<version>`.",
            ),
            |_, shell| YUM.pinned(shell),
        ),
        SimpleRule::shell(
            RuleMetadata::new("DL3034", Severity::Warning, "Non-interactive switch missing from `zypper` command: `zypper install -y`"),
            |_, shell| ZYPPER.non_interactive(shell),
        ),
        SimpleRule::shell(
            RuleMetadata::new("DL3036", Severity::Warning, "`zypper clean` missing after zypper use."),
            |flags, shell| ZYPPER.cleans_cache(flags, shell),
        ),
        SimpleRule::shell(
            RuleMetadata::new(
                "DL3037",
                Severity::Warning,
                "Specify version with `zypper install -y <package>=<version>`.",
            ),
            |_, shell| ZYPPER.pinned(shell),
        ),
        SimpleRule::shell(
            RuleMetadata::new("DL3038", Severity::Warning, "Use the -y switch to avoid manual input `dnf install -y <package>`"),
            |_, shell| DNF.non_interactive(shell),
        ),
        SimpleRule::shell(
            RuleMetadata::new("DL3040", Severity::Warning, "`dnf clean all` missing after dnf command."),
            |flags, shell| DNF.cleans_cache(flags, shell),
        ),
        SimpleRule::shell(
            RuleMetadata::new(
                "DL3041",
                Severity::Warning,
                "Specify version with `dnf install -y <package>-<version>`.",
            ),
            |_, shell| DNF.pinned(shell),
        ),
        SimpleRule::shell(
            RuleMetadata::new("DL3060", Severity::Info, "`yarn cache clean` missing after `yarn install` was run."),
            |flags, shell| {
                let installs = shell.commands_named("yarn").any(|cmd| cmd.has_subcommand(&["install"]));
                !installs
                    || flags.has_cache_mount("/usr/local/share/.cache/yarn")
                    || shell.commands_named("yarn").any(|cmd| {
                        cmd.positional_args().starts_with(&["cache", "clean"])
                    })
            },
        ),
    ]
}

#[cfg(test)]
#[path = "packages_tests.rs"]
mod tests;
