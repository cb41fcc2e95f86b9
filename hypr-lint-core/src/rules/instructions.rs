//! Rules that judge a single instruction's arguments.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{RuleMetadata, SimpleRule};
use crate::dockerfile::{Arguments, Instruction, PortSpec};
use crate::severity::Severity;

const MAX_PORT: u32 = 65535;

const ARCHIVE_EXTENSIONS: [&str; 14] = [
    ".tar", ".tar.gz", ".tgz", ".tar.bz2", ".tbz2", ".tbz", ".tar.xz", ".txz", ".tar.zst", ".tzst",
    ".gz", ".bz2", ".xz", ".zst",
];

static WINDOWS_ABSOLUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]:[\\/]").expect("Invalid windows path regex"));

/// Label keys: lower-case alphanumerics separated by single `.` or `-`.
static LABEL_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[.-][a-z0-9]+)*$").expect("Invalid label key regex")
});

const RESERVED_LABEL_NAMESPACES: [&str; 3] = ["com.docker.", "io.docker.", "org.dockerproject."];

fn is_url(source: &str) -> bool {
    ["http://", "https://", "ftp://", "git@"].iter().any(|scheme| source.starts_with(scheme))
}

fn is_archive(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    ARCHIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

pub(crate) fn is_absolute_path(path: &str) -> bool {
    let path = path.trim_matches(|c| c == '"' || c == '\'');
    path.starts_with('/') || path.starts_with('$') || WINDOWS_ABSOLUTE.is_match(path)
}

pub(crate) fn is_valid_label_key(key: &str) -> bool {
    LABEL_KEY.is_match(key) && !RESERVED_LABEL_NAMESPACES.iter().any(|ns| key.starts_with(ns))
}

pub fn rules() -> Vec<SimpleRule> {
    vec![
        SimpleRule::new(
            RuleMetadata::new("DL3000", Severity::Error, "Use absolute WORKDIR"),
            |i| match i {
                Instruction::Workdir(path) => is_absolute_path(path),
                _ => true,
            },
        ),
        SimpleRule::new(
            RuleMetadata::new(
                "DL3007",
                Severity::Warning,
                "Using latest is prone to errors if the image will ever update. Pin the version explicitly to a release tag",
            ),
            |i| match i {
                Instruction::From(base) => base.tag.as_deref() != Some("latest"),
                _ => true,
            },
        ),
        SimpleRule::new(
            RuleMetadata::new("DL3011", Severity::Error, "Valid UNIX ports range from 0 to 65535"),
            |i| match i {
                Instruction::Expose(ports) => ports.iter().all(|port| match port {
                    PortSpec::Port { number, .. } => *number <= MAX_PORT,
                    PortSpec::Range { start, end, .. } => *start <= MAX_PORT && *end <= MAX_PORT,
                    PortSpec::Variable(_) => true,
                }),
                _ => true,
            },
        ),
        SimpleRule::new(
            RuleMetadata::new(
                "DL3020",
                Severity::Error,
                "Use COPY instead of ADD for files and folders",
            ),
            |i| match i {
                Instruction::Add(add) => {
                    add.sources.iter().all(|source| is_url(source) || is_archive(source))
                }
                _ => true,
            },
        ),
        SimpleRule::new(
            RuleMetadata::new(
                "DL3021",
                Severity::Error,
                "COPY with more than 2 arguments requires the last argument to end with /",
            ),
            |i| match i {
                Instruction::Copy(copy) => copy.sources.len() < 2 || copy.target.ends_with('/'),
                _ => true,
            },
        ),
        SimpleRule::new(
            RuleMetadata::new(
                "DL3025",
                Severity::Warning,
                "Use arguments JSON notation for CMD and ENTRYPOINT arguments",
            ),
            |i| !matches!(i, Instruction::Cmd(Arguments::Shell(_)) | Instruction::Entrypoint(Arguments::Shell(_))),
        ),
        SimpleRule::new(
            RuleMetadata::new("DL3029", Severity::Warning, "Do not use --platform flag with FROM"),
            |i| match i {
                Instruction::From(base) => {
                    base.platform.as_deref().map_or(true, |platform| platform.starts_with('$'))
                }
                _ => true,
            },
        ),
        SimpleRule::new(
            RuleMetadata::new(
                "DL3043",
                Severity::Error,
                "`ONBUILD`, `FROM` or `MAINTAINER` triggered from within `ONBUILD` instruction.",
            ),
            |i| match i {
                Instruction::Onbuild(inner) => !matches!(
                    **inner,
                    Instruction::Onbuild(_) | Instruction::From(_) | Instruction::Maintainer(_)
                ),
                _ => true,
            },
        ),
        SimpleRule::new(
            RuleMetadata::new("DL3048", Severity::Style, "Invalid label key."),
            |i| match i {
                Instruction::Label(pairs) => pairs.iter().all(|(key, _)| is_valid_label_key(key)),
                _ => true,
            },
        ),
        SimpleRule::new(
            RuleMetadata::new("DL4000", Severity::Error, "MAINTAINER is deprecated"),
            |i| !matches!(i, Instruction::Maintainer(_)),
        ),
    ]
}
