//! Linter configuration.
//!
//! Loaded from YAML (`.hypr-lint.yaml` in the working directory, or the user config
//! directory) and merged with command line options by the CLI. Immutable once a
//! [`crate::Linter`] is built from it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, instrument};

use crate::error::{LintError, Result};
use crate::severity::Severity;

/// File names looked up in the working directory, in order.
pub const LOCAL_CONFIG_FILES: [&str; 2] = [".hypr-lint.yaml", ".hypr-lint.yml"];

/// Value format expected for a label of the label schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelType {
    Text,
    Url,
    Email,
    Hash,
    Rfc3339,
    Semver,
    Spdx,
}

impl LabelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelType::Text => "text",
            LabelType::Url => "url",
            LabelType::Email => "email",
            LabelType::Hash => "hash",
            LabelType::Rfc3339 => "rfc3339",
            LabelType::Semver => "semver",
            LabelType::Spdx => "spdx",
        }
    }
}

impl fmt::Display for LabelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LabelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LabelType::Text),
            "url" => Ok(LabelType::Url),
            "email" => Ok(LabelType::Email),
            "hash" => Ok(LabelType::Hash),
            "rfc3339" => Ok(LabelType::Rfc3339),
            "semver" => Ok(LabelType::Semver),
            "spdx" => Ok(LabelType::Spdx),
            _ => Err(s.to_string()),
        }
    }
}

/// Per-code severity overrides (`override:` in YAML).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityOverrides {
    pub error: Vec<String>,
    pub warning: Vec<String>,
    pub info: Vec<String>,
    pub style: Vec<String>,
}

impl SeverityOverrides {
    /// Overridden severity of a rule code. A code listed more than once gets the least
    /// severe level.
    pub fn severity_of(&self, code: &str) -> Option<Severity> {
        [
            (&self.style, Severity::Style),
            (&self.info, Severity::Info),
            (&self.warning, Severity::Warning),
            (&self.error, Severity::Error),
        ]
        .into_iter()
        .find(|(codes, _)| codes.iter().any(|c| c == code))
        .map(|(_, severity)| severity)
    }

    pub fn is_empty(&self) -> bool {
        self.error.is_empty()
            && self.warning.is_empty()
            && self.info.is_empty()
            && self.style.is_empty()
    }
}

/// Linter configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Rule codes never reported.
    pub ignored: Vec<String>,
    /// Registries FROM images may come from. Empty allows any registry.
    pub trusted_registries: Vec<String>,
    /// Labels every final image must carry, with their value format.
    pub label_schema: BTreeMap<String, LabelType>,
    /// Report labels that are not part of the schema.
    pub strict_labels: bool,
    /// Ignore `# hypr-lint ignore=` comments.
    pub disable_ignore_pragma: bool,
    /// Lowest severity that makes the lint fail.
    pub failure_threshold: Severity,
    /// Always exit successfully.
    pub no_fail: bool,
    pub no_color: bool,
    #[serde(rename = "override")]
    pub overrides: SeverityOverrides,
}

impl Config {
    /// Parse configuration from YAML text. An empty document yields the defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| LintError::InvalidConfig {
            reason: format!("Failed to parse config: {}", e),
        })
    }

    /// Load configuration from a YAML file.
    #[instrument]
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LintError::InvalidConfigFile {
            path: path.to_path_buf(),
            reason: format!("Failed to read config: {}", e),
        })?;
        let config = Self::from_yaml(&content).map_err(|e| match e {
            LintError::InvalidConfig { reason } => {
                LintError::InvalidConfigFile { path: path.to_path_buf(), reason }
            }
            other => other,
        })?;
        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Path of the per-user configuration file, if the platform has a config directory.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hypr-lint").join("config.yaml"))
    }

    /// Resolve the configuration to use.
    ///
    /// Resolution order:
    /// 1. `explicit` path (must exist)
    /// 2. `.hypr-lint.yaml` / `.hypr-lint.yml` in `working_dir`
    /// 3. `<config dir>/hypr-lint/config.yaml`
    /// 4. Defaults
    pub fn discover(explicit: Option<&Path>, working_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        let local = LOCAL_CONFIG_FILES.iter().map(|name| working_dir.join(name));
        for candidate in local.chain(Self::user_config_path()) {
            if candidate.is_file() {
                return Self::load_file(&candidate);
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Severity a rule reports with, after overrides.
    pub fn severity_for(&self, code: &str, default: Severity) -> Severity {
        self.overrides.severity_of(code).unwrap_or(default)
    }

    pub fn is_ignored(&self, code: &str) -> bool {
        self.ignored.iter().any(|c| c == code)
    }

    /// Whether `registry` is allowed by `trusted-registries`.
    pub fn is_trusted_registry(&self, registry: Option<&str>) -> bool {
        registry_allowed(&self.trusted_registries, registry)
    }

    /// Parse a `LABEL:TYPE` requirement as given on the command line.
    pub fn parse_label_requirement(spec: &str) -> Result<(String, LabelType)> {
        let (label, kind) = spec.split_once(':').ok_or_else(|| LintError::InvalidConfig {
            reason: format!("Label requirement '{}' must look like LABEL:TYPE", spec),
        })?;
        let kind = kind
            .parse()
            .map_err(|value| LintError::UnknownLabelType { label: label.to_string(), value })?;
        Ok((label.to_string(), kind))
    }
}

/// Whether an image registry matches a trusted list. An empty list trusts everything;
/// images without a registry come from Docker Hub (`docker.io`). `*.example.com` matches
/// subdomains.
pub fn registry_allowed(trusted: &[String], registry: Option<&str>) -> bool {
    if trusted.is_empty() {
        return true;
    }
    let registry = registry.unwrap_or("docker.io");
    trusted.iter().any(|allowed| {
        allowed == registry
            || (registry == "docker.io" && allowed == "hub.docker.com")
            || allowed
                .strip_prefix("*.")
                .is_some_and(|suffix| registry.ends_with(&format!(".{}", suffix)))
    })
}
