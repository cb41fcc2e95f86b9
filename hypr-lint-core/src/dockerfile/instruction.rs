//! Dockerfile instruction model.
//!
//! The instruction set is closed: every rule matches on [`Instruction`] and the compiler
//! checks that new variants are handled wherever it matters.

use std::fmt;

/// One instruction together with the line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionPos {
    /// 1-based line number of the first physical line of the instruction
    pub line: usize,
    pub instruction: Instruction,
}

impl InstructionPos {
    pub fn new(line: usize, instruction: Instruction) -> Self {
        Self { line, instruction }
    }
}

/// A single Dockerfile instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// FROM [--platform=<platform>] <image> [AS <name>]
    From(BaseImage),

    /// RUN [--mount=...] command
    Run(RunArgs),

    /// COPY [--from=<stage>] [--chown=<user>:<group>] src... dest
    Copy(CopyArgs),

    /// ADD [--chown=<user>:<group>] src... dest
    Add(AddArgs),

    /// ENV key=value ... or ENV key value
    Env(Vec<(String, String)>),

    /// LABEL key=value ...
    Label(Vec<(String, String)>),

    /// WORKDIR /path
    Workdir(String),

    /// USER user[:group]
    User(String),

    /// EXPOSE port[/protocol] ...
    Expose(Vec<PortSpec>),

    /// VOLUME ["/data"] or VOLUME /data /var/log
    Volume(Vec<String>),

    /// CMD ["exec", "form"] or CMD command
    Cmd(Arguments),

    /// ENTRYPOINT ["exec", "form"] or ENTRYPOINT command
    Entrypoint(Arguments),

    /// HEALTHCHECK NONE or HEALTHCHECK [options] CMD command
    Healthcheck(Healthcheck),

    /// MAINTAINER name (deprecated)
    Maintainer(String),

    /// ARG name[=default]
    Arg { name: String, default: Option<String> },

    /// STOPSIGNAL signal
    Stopsignal(String),

    /// SHELL ["executable", "parameters"]
    Shell(Arguments),

    /// ONBUILD <instruction>
    Onbuild(Box<Instruction>),

    /// # comment (text after the `#`, trimmed)
    Comment(String),
}

impl Instruction {
    /// Upper-case keyword of the instruction, as written in a Dockerfile.
    pub fn keyword(&self) -> &'static str {
        match self {
            Instruction::From(_) => "FROM",
            Instruction::Run(_) => "RUN",
            Instruction::Copy(_) => "COPY",
            Instruction::Add(_) => "ADD",
            Instruction::Env(_) => "ENV",
            Instruction::Label(_) => "LABEL",
            Instruction::Workdir(_) => "WORKDIR",
            Instruction::User(_) => "USER",
            Instruction::Expose(_) => "EXPOSE",
            Instruction::Volume(_) => "VOLUME",
            Instruction::Cmd(_) => "CMD",
            Instruction::Entrypoint(_) => "ENTRYPOINT",
            Instruction::Healthcheck(_) => "HEALTHCHECK",
            Instruction::Maintainer(_) => "MAINTAINER",
            Instruction::Arg { .. } => "ARG",
            Instruction::Stopsignal(_) => "STOPSIGNAL",
            Instruction::Shell(_) => "SHELL",
            Instruction::Onbuild(_) => "ONBUILD",
            Instruction::Comment(_) => "#",
        }
    }
}

/// CMD/ENTRYPOINT/SHELL/RUN argument format.
#[derive(Debug, Clone, PartialEq)]
pub enum Arguments {
    /// Shell form: RUN apt-get update
    Shell(String),
    /// Exec form: RUN ["apt-get", "update"]
    Exec(Vec<String>),
}

impl Arguments {
    /// Text handed to the shell analyzer. Exec form is joined with spaces.
    pub fn as_script(&self) -> String {
        match self {
            Arguments::Shell(text) => text.clone(),
            Arguments::Exec(args) => args.join(" "),
        }
    }

    pub fn is_exec(&self) -> bool {
        matches!(self, Arguments::Exec(_))
    }
}

/// Image reference used by FROM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Registry host (`quay.io`, `localhost:5000`), when the reference names one
    pub registry: Option<String>,
    /// Repository path without registry, tag or digest
    pub name: String,
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.registry {
            Some(registry) => write!(f, "{}/{}", registry, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// FROM arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseImage {
    pub image: Image,
    pub tag: Option<String>,
    pub digest: Option<String>,
    /// Stage name (from `FROM ... AS name`)
    pub alias: Option<String>,
    pub platform: Option<String>,
}

impl BaseImage {
    /// Whether the image reference is an unresolved build variable (`FROM ${BASE}`).
    pub fn is_variable(&self) -> bool {
        self.image.registry.is_none() && self.image.name.starts_with('$')
    }

    pub fn is_scratch(&self) -> bool {
        self.image.registry.is_none() && self.image.name.eq_ignore_ascii_case("scratch")
    }

    /// Lower-cased alias, as stage names are matched case-insensitively.
    pub fn stage_name(&self) -> Option<String> {
        self.alias.as_deref().map(str::to_ascii_lowercase)
    }

    /// Lower-cased image reference as another stage would see it, used to match
    /// `FROM <alias>` against earlier stages.
    pub fn base_key(&self) -> String {
        self.image.to_string().to_ascii_lowercase()
    }
}

/// RUN flags that precede the command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunFlags {
    /// Raw `--mount` values, e.g. `type=cache,target=/var/cache/apt`
    pub mounts: Vec<String>,
    pub network: Option<String>,
    pub security: Option<String>,
}

impl RunFlags {
    /// Whether a cache or tmpfs mount covers `path` (or a parent of it).
    pub fn has_cache_mount(&self, path: &str) -> bool {
        self.mounts.iter().any(|mount| {
            let mut kind = None;
            let mut target = None;
            for option in mount.split(',') {
                match option.split_once('=') {
                    Some(("type", value)) => kind = Some(value),
                    Some(("target" | "dst" | "destination", value)) => target = Some(value),
                    _ => {}
                }
            }
            let cached = matches!(kind, Some("cache" | "tmpfs"));
            cached
                && target.is_some_and(|t| {
                    let t = t.trim_end_matches('/');
                    !t.is_empty() && (path == t || path.starts_with(&format!("{}/", t)))
                })
        })
    }
}

/// RUN arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct RunArgs {
    pub command: Arguments,
    pub flags: RunFlags,
}

/// COPY arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CopyArgs {
    pub sources: Vec<String>,
    pub target: String,
    pub from: Option<String>,
    pub chown: Option<String>,
    pub chmod: Option<String>,
    pub link: bool,
}

/// ADD arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddArgs {
    pub sources: Vec<String>,
    pub target: String,
    pub chown: Option<String>,
    pub chmod: Option<String>,
    pub checksum: Option<String>,
    pub link: bool,
}

/// Port specification for EXPOSE instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSpec {
    Port { number: u32, protocol: Protocol },
    Range { start: u32, end: u32, protocol: Protocol },
    /// Unexpanded variable, e.g. `${PORT}`
    Variable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

/// HEALTHCHECK arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Healthcheck {
    /// HEALTHCHECK NONE disables any check inherited from the base image
    None,
    Check(HealthcheckConfig),
}

/// Healthcheck configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthcheckConfig {
    pub command: Arguments,
    pub interval: Option<String>,
    pub timeout: Option<String>,
    pub start_period: Option<String>,
    pub start_interval: Option<String>,
    pub retries: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_flags(mount: &str) -> RunFlags {
        RunFlags { mounts: vec![mount.to_string()], ..RunFlags::default() }
    }

    #[test]
    fn test_cache_mount_covers_subdirectories() {
        let flags = run_flags("type=cache,target=/var/lib/apt");
        assert!(flags.has_cache_mount("/var/lib/apt"));
        assert!(flags.has_cache_mount("/var/lib/apt/lists"));
        assert!(!flags.has_cache_mount("/var/lib/aptitude"));
    }

    #[test]
    fn test_bind_mount_is_not_a_cache() {
        let flags = run_flags("type=bind,target=/var/lib/apt/lists");
        assert!(!flags.has_cache_mount("/var/lib/apt/lists"));
        assert!(run_flags("type=tmpfs,dst=/var/cache/apk").has_cache_mount("/var/cache/apk"));
    }

    #[test]
    fn test_base_image_helpers() {
        let base = BaseImage {
            image: Image { registry: None, name: "Builder".into() },
            tag: None,
            digest: None,
            alias: Some("Final".into()),
            platform: None,
        };
        assert_eq!(base.base_key(), "builder");
        assert_eq!(base.stage_name().as_deref(), Some("final"));
        assert!(!base.is_scratch());
        assert!(!base.is_variable());
    }
}
