//! Dockerfile parser for the HYPR linter.
//!
//! Turns Dockerfile text into a flat, line-numbered instruction stream. Unlike a build
//! front end it keeps comments, does not group instructions into stages and accepts any
//! instruction order: judging the file is left to the rules. Supports:
//! - All standard Dockerfile instructions, including ONBUILD and MAINTAINER
//! - Line continuations and comment lines
//! - BuildKit-style heredocs on RUN

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::Path;

use super::instruction::*;

/// Heredoc marker on a RUN line: `<<EOF`, `<<-EOF`, `<<'EOF'`, `<<"EOF"`.
static HEREDOC_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[^<])<<(-?)\s*(?:'([A-Za-z0-9_.-]+)'|"([A-Za-z0-9_.-]+)"|([A-Za-z0-9_.-]+))"#)
        .expect("heredoc marker pattern is valid")
});

/// Dockerfile parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
    pub hint: Option<String>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n  Hint: {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Parses a Dockerfile from a string.
///
/// # Arguments
/// * `content` - The Dockerfile content as a string
///
/// # Returns
/// * `Ok(Vec<InstructionPos>)` - Instructions in file order
/// * `Err(ParseError)` - Parse error with line number and message
///
/// # Examples
/// ```
/// use hypr_lint_core::dockerfile::parse_dockerfile;
///
/// let dockerfile = r#"
/// FROM alpine:3.19
/// RUN apk add --no-cache nginx
/// CMD ["nginx", "-g", "daemon off;"]
/// "#;
///
/// let instructions = parse_dockerfile(dockerfile).unwrap();
/// assert_eq!(instructions.len(), 3);
/// assert_eq!(instructions[0].line, 2);
/// ```
pub fn parse_dockerfile(content: &str) -> Result<Vec<InstructionPos>, ParseError> {
    let parser = DockerfileParser::new(content);
    parser.parse()
}

/// Parses a Dockerfile from a file.
pub fn parse_dockerfile_file(path: &Path) -> Result<Vec<InstructionPos>, ParseError> {
    let content = std::fs::read_to_string(path).map_err(|e| ParseError {
        line: 0,
        message: format!("Failed to read Dockerfile: {}", e),
        hint: Some(format!("Check that {} exists and is readable", path.display())),
    })?;

    parse_dockerfile(&content)
}

/// Internal parser state.
struct DockerfileParser {
    lines: Vec<(usize, String)>, // (line_number, content)
}

impl DockerfileParser {
    fn new(content: &str) -> Self {
        Self { lines: Self::preprocess(content) }
    }

    /// Preprocess Dockerfile: join continuation lines, collect heredoc bodies and keep
    /// comment lines as their own entries.
    fn preprocess(content: &str) -> Vec<(usize, String)> {
        let mut result = Vec::new();
        let mut current_line = String::new();
        let mut current_line_num = 0;
        let mut continuation = false;
        // Pending heredoc delimiters: (delimiter, strip leading tabs)
        let mut heredocs: Vec<(String, bool)> = Vec::new();

        for (line_num, line) in content.lines().enumerate() {
            let line_num = line_num + 1; // 1-based line numbers

            if let Some((delimiter, strip_tabs)) = heredocs.first().cloned() {
                current_line.push('\n');
                current_line.push_str(line);
                let candidate = if strip_tabs { line.trim_start_matches('\t') } else { line };
                if candidate == delimiter {
                    heredocs.remove(0);
                    if heredocs.is_empty() {
                        result.push((current_line_num, std::mem::take(&mut current_line)));
                    }
                }
                continue;
            }

            let trimmed = line.trim();

            if continuation {
                // Docker drops blank lines and comment lines inside a continuation
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                current_line.push(' ');
                current_line.push_str(trimmed.trim_end_matches('\\').trim_end());
            } else {
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed.starts_with('#') {
                    result.push((line_num, trimmed.to_string()));
                    continue;
                }
                current_line_num = line_num;
                current_line = trimmed.trim_end_matches('\\').trim_end().to_string();
            }

            continuation = trimmed.ends_with('\\');

            if !continuation && !current_line.is_empty() {
                heredocs = Self::heredoc_delimiters(&current_line);
                if heredocs.is_empty() {
                    result.push((current_line_num, std::mem::take(&mut current_line)));
                }
            }
        }

        // Handle final line if it was a continuation or an unterminated heredoc
        if !current_line.is_empty() {
            result.push((current_line_num, current_line));
        }

        result
    }

    /// Heredoc delimiters opened by a RUN line, in order of appearance.
    fn heredoc_delimiters(line: &str) -> Vec<(String, bool)> {
        if !Self::extract_instruction(line).eq_ignore_ascii_case("RUN") {
            return Vec::new();
        }
        HEREDOC_MARKER
            .captures_iter(line)
            .filter_map(|caps| {
                let strip_tabs = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
                caps.get(2)
                    .or_else(|| caps.get(3))
                    .or_else(|| caps.get(4))
                    .map(|word| (word.as_str().to_string(), strip_tabs))
            })
            .collect()
    }

    fn parse(&self) -> Result<Vec<InstructionPos>, ParseError> {
        let mut instructions = Vec::with_capacity(self.lines.len());
        for (line_num, line) in &self.lines {
            let instruction = Self::parse_instruction(*line_num, line)?;
            instructions.push(InstructionPos::new(*line_num, instruction));
        }
        Ok(instructions)
    }

    fn parse_instruction(line_num: usize, line: &str) -> Result<Instruction, ParseError> {
        if let Some(comment) = line.strip_prefix('#') {
            return Ok(Instruction::Comment(comment.trim().to_string()));
        }

        let instruction = Self::extract_instruction(line);
        let rest = Self::extract_rest(line);

        match instruction.as_str() {
            "FROM" => Self::parse_from(line_num, rest),
            "RUN" => Self::parse_run(line_num, rest),
            "COPY" => Self::parse_copy(line_num, rest),
            "ADD" => Self::parse_add(line_num, rest),
            "ENV" => Self::parse_env(line_num, rest),
            "ARG" => Self::parse_arg(line_num, rest),
            "LABEL" => Self::parse_label(line_num, rest),
            "EXPOSE" => Self::parse_expose(line_num, rest),
            "WORKDIR" => Ok(Instruction::Workdir(dequote(rest))),
            "USER" => Ok(Instruction::User(dequote(rest))),
            "VOLUME" => Self::parse_volume(line_num, rest),
            "ENTRYPOINT" => Ok(Instruction::Entrypoint(Self::parse_arguments(rest))),
            "CMD" => Ok(Instruction::Cmd(Self::parse_arguments(rest))),
            "HEALTHCHECK" => Self::parse_healthcheck(line_num, rest),
            "STOPSIGNAL" => Ok(Instruction::Stopsignal(rest.to_string())),
            "SHELL" => Self::parse_shell(line_num, rest),
            "MAINTAINER" => Ok(Instruction::Maintainer(rest.to_string())),
            "ONBUILD" => Self::parse_onbuild(line_num, rest),
            _ => Err(ParseError {
                line: line_num,
                message: format!("Unknown instruction: {}", instruction),
                hint: None,
            }),
        }
    }

    fn parse_from(line_num: usize, rest: &str) -> Result<Instruction, ParseError> {
        // FROM [--platform=<platform>] <image> [AS <name>]
        let (flags, remaining) = split_leading_flags(rest);
        let platform = flags.into_iter().find(|(name, _)| name == "platform").and_then(|(_, v)| v);

        let args = tokenize(remaining);
        let Some(image_ref) = args.first() else {
            return Err(ParseError {
                line: line_num,
                message: "FROM instruction requires an image reference".into(),
                hint: Some("Usage: FROM <image> [AS <name>]".into()),
            });
        };

        let alias = match args.get(1) {
            Some(keyword) if keyword.eq_ignore_ascii_case("AS") => match args.get(2) {
                Some(name) => Some(name.clone()),
                None => {
                    return Err(ParseError {
                        line: line_num,
                        message: "FROM ... AS requires a stage name".into(),
                        hint: None,
                    })
                }
            },
            _ => None,
        };

        let (image, tag, digest) = parse_image_ref(&dequote(image_ref));
        Ok(Instruction::From(BaseImage { image, tag, digest, alias, platform }))
    }

    fn parse_run(line_num: usize, rest: &str) -> Result<Instruction, ParseError> {
        let (flags, command_text) = split_leading_flags(rest);

        let mut run_flags = RunFlags::default();
        for (name, value) in flags {
            match (name.as_str(), value) {
                ("mount", Some(value)) => run_flags.mounts.push(value),
                ("network", value) => run_flags.network = value,
                ("security", value) => run_flags.security = value,
                _ => {}
            }
        }

        if command_text.trim().is_empty() {
            return Err(ParseError {
                line: line_num,
                message: "RUN instruction requires a command".into(),
                hint: Some("Usage: RUN <command> or RUN [\"executable\", \"arg1\"]".into()),
            });
        }

        let command = match heredoc_script(command_text) {
            Some(body) => Arguments::Shell(body),
            None => Self::parse_arguments(command_text),
        };

        Ok(Instruction::Run(RunArgs { command, flags: run_flags }))
    }

    fn parse_arguments(text: &str) -> Arguments {
        let text = text.trim();
        // Check if it's JSON array format
        if text.starts_with('[') {
            if let Ok(exec_args) = serde_json::from_str::<Vec<String>>(text) {
                return Arguments::Exec(exec_args);
            }
        }

        // Shell form
        Arguments::Shell(text.to_string())
    }

    /// Sources and destination of COPY/ADD, in either whitespace or JSON form.
    fn parse_paths(
        line_num: usize,
        keyword: &str,
        text: &str,
    ) -> Result<(Vec<String>, String), ParseError> {
        let text = text.trim();
        let mut paths = if text.starts_with('[') {
            serde_json::from_str::<Vec<String>>(text).map_err(|_| ParseError {
                line: line_num,
                message: format!("Invalid JSON array for {}", keyword),
                hint: None,
            })?
        } else {
            tokenize(text).iter().map(|token| dequote(token)).collect()
        };

        if paths.len() < 2 {
            return Err(ParseError {
                line: line_num,
                message: format!("{} requires at least source and destination", keyword),
                hint: Some(format!("Usage: {} <src>... <dest>", keyword)),
            });
        }

        let target = paths.pop().unwrap_or_default();
        Ok((paths, target))
    }

    fn parse_copy(line_num: usize, rest: &str) -> Result<Instruction, ParseError> {
        // COPY [--from=<stage>] [--chown=<user>:<group>] [--chmod=<perms>] [--link] <src>... <dest>
        let (flags, remaining) = split_leading_flags(rest);
        let (sources, target) = Self::parse_paths(line_num, "COPY", remaining)?;

        let mut args = CopyArgs { sources, target, ..CopyArgs::default() };
        for (name, value) in flags {
            match name.as_str() {
                "from" => args.from = value,
                "chown" => args.chown = value,
                "chmod" => args.chmod = value,
                "link" => args.link = value.as_deref().map_or(true, |v| v != "false"),
                _ => {}
            }
        }

        Ok(Instruction::Copy(args))
    }

    fn parse_add(line_num: usize, rest: &str) -> Result<Instruction, ParseError> {
        // ADD [--chown=<user>:<group>] [--chmod=<perms>] [--checksum=<hash>] <src>... <dest>
        let (flags, remaining) = split_leading_flags(rest);
        let (sources, target) = Self::parse_paths(line_num, "ADD", remaining)?;

        let mut args = AddArgs { sources, target, ..AddArgs::default() };
        for (name, value) in flags {
            match name.as_str() {
                "chown" => args.chown = value,
                "chmod" => args.chmod = value,
                "checksum" => args.checksum = value,
                "link" => args.link = value.as_deref().map_or(true, |v| v != "false"),
                _ => {}
            }
        }

        Ok(Instruction::Add(args))
    }

    /// `key=value ...` pairs, or the legacy single `key value` form.
    fn parse_pairs(
        line_num: usize,
        keyword: &str,
        rest: &str,
    ) -> Result<Vec<(String, String)>, ParseError> {
        let args = tokenize(rest);
        if args.is_empty() {
            return Err(ParseError {
                line: line_num,
                message: format!("{} requires at least one key=value pair", keyword),
                hint: None,
            });
        }

        if args[0].contains('=') {
            let mut pairs = Vec::with_capacity(args.len());
            for arg in &args {
                let Some((key, value)) = arg.split_once('=') else {
                    return Err(ParseError {
                        line: line_num,
                        message: format!("{} expects key=value pairs, found '{}'", keyword, arg),
                        hint: None,
                    });
                };
                pairs.push((dequote(key), dequote(value)));
            }
            Ok(pairs)
        } else {
            // key value format (only supports one pair)
            let key = dequote(&args[0]);
            let value = rest.trim_start()[args[0].len()..].trim();
            if value.is_empty() {
                return Err(ParseError {
                    line: line_num,
                    message: format!("{} requires a value", keyword),
                    hint: None,
                });
            }
            Ok(vec![(key, dequote(value))])
        }
    }

    fn parse_env(line_num: usize, rest: &str) -> Result<Instruction, ParseError> {
        Self::parse_pairs(line_num, "ENV", rest).map(Instruction::Env)
    }

    fn parse_label(line_num: usize, rest: &str) -> Result<Instruction, ParseError> {
        Self::parse_pairs(line_num, "LABEL", rest).map(Instruction::Label)
    }

    fn parse_arg(line_num: usize, rest: &str) -> Result<Instruction, ParseError> {
        let args = tokenize(rest);
        let Some(first) = args.first() else {
            return Err(ParseError {
                line: line_num,
                message: "ARG requires a name".into(),
                hint: Some("Usage: ARG <name>[=<default>]".into()),
            });
        };

        let (name, default) = match first.split_once('=') {
            Some((name, default)) => (name.to_string(), Some(dequote(default))),
            None => (first.clone(), None),
        };

        Ok(Instruction::Arg { name, default })
    }

    fn parse_expose(line_num: usize, rest: &str) -> Result<Instruction, ParseError> {
        let mut ports = Vec::new();

        for arg in tokenize(rest) {
            let arg = dequote(&arg);
            if arg.starts_with('$') {
                ports.push(PortSpec::Variable(arg));
                continue;
            }

            let (port_str, protocol) = match arg.split_once('/') {
                Some((port, protocol)) => (port, protocol),
                None => (arg.as_str(), "tcp"),
            };

            let protocol = match protocol.to_lowercase().as_str() {
                "tcp" => Protocol::Tcp,
                "udp" => Protocol::Udp,
                _ => {
                    return Err(ParseError {
                        line: line_num,
                        message: format!("Unknown protocol: {}", protocol),
                        hint: Some("Protocol must be 'tcp' or 'udp'".into()),
                    })
                }
            };

            let parse_port = |s: &str| {
                s.parse::<u32>().map_err(|_| ParseError {
                    line: line_num,
                    message: format!("Invalid port number: {}", s),
                    hint: None,
                })
            };

            let spec = match port_str.split_once('-') {
                Some((start, end)) => {
                    PortSpec::Range { start: parse_port(start)?, end: parse_port(end)?, protocol }
                }
                None => PortSpec::Port { number: parse_port(port_str)?, protocol },
            };
            ports.push(spec);
        }

        Ok(Instruction::Expose(ports))
    }

    fn parse_volume(line_num: usize, rest: &str) -> Result<Instruction, ParseError> {
        // VOLUME ["/data"] or VOLUME /data /var/log
        let rest = rest.trim();
        let paths = if rest.starts_with('[') {
            serde_json::from_str::<Vec<String>>(rest).map_err(|_| ParseError {
                line: line_num,
                message: "Invalid JSON array for VOLUME".into(),
                hint: None,
            })?
        } else {
            tokenize(rest).iter().map(|token| dequote(token)).collect()
        };

        Ok(Instruction::Volume(paths))
    }

    fn parse_healthcheck(line_num: usize, rest: &str) -> Result<Instruction, ParseError> {
        // HEALTHCHECK NONE | HEALTHCHECK [OPTIONS] CMD command
        if rest.trim().eq_ignore_ascii_case("NONE") {
            return Ok(Instruction::Healthcheck(Healthcheck::None));
        }

        let (flags, remaining) = split_leading_flags(rest);
        let mut config = HealthcheckConfig {
            command: Arguments::Shell(String::new()),
            interval: None,
            timeout: None,
            start_period: None,
            start_interval: None,
            retries: None,
        };

        for (name, value) in flags {
            match name.as_str() {
                "interval" => config.interval = value,
                "timeout" => config.timeout = value,
                "start-period" => config.start_period = value,
                "start-interval" => config.start_interval = value,
                "retries" => {
                    let retries_str = value.unwrap_or_default();
                    config.retries = Some(retries_str.parse().map_err(|_| ParseError {
                        line: line_num,
                        message: format!("Invalid retries value: {}", retries_str),
                        hint: None,
                    })?);
                }
                _ => {}
            }
        }

        let remaining = remaining.trim_start();
        let keyword = remaining.split_whitespace().next().unwrap_or("");
        if !keyword.eq_ignore_ascii_case("CMD") {
            return Err(ParseError {
                line: line_num,
                message: "HEALTHCHECK requires CMD or NONE".into(),
                hint: Some("Usage: HEALTHCHECK [OPTIONS] CMD <command>".into()),
            });
        }

        config.command = Self::parse_arguments(&remaining[keyword.len()..]);
        Ok(Instruction::Healthcheck(Healthcheck::Check(config)))
    }

    fn parse_shell(line_num: usize, rest: &str) -> Result<Instruction, ParseError> {
        // SHELL ["executable", "parameters"]
        let shell = serde_json::from_str::<Vec<String>>(rest.trim()).map_err(|_| ParseError {
            line: line_num,
            message: "SHELL requires JSON array format".into(),
            hint: Some("Usage: SHELL [\"executable\", \"arg1\", \"arg2\"]".into()),
        })?;

        Ok(Instruction::Shell(Arguments::Exec(shell)))
    }

    fn parse_onbuild(line_num: usize, rest: &str) -> Result<Instruction, ParseError> {
        if rest.trim().is_empty() {
            return Err(ParseError {
                line: line_num,
                message: "ONBUILD requires an instruction".into(),
                hint: Some("Usage: ONBUILD <INSTRUCTION>".into()),
            });
        }
        let inner = Self::parse_instruction(line_num, rest.trim())?;
        Ok(Instruction::Onbuild(Box::new(inner)))
    }

    fn extract_instruction(line: &str) -> String {
        line.split_whitespace().next().unwrap_or("").to_uppercase()
    }

    /// Everything after the instruction keyword, untouched apart from leading whitespace.
    fn extract_rest(line: &str) -> &str {
        let line = line.trim_start();
        match line.find(char::is_whitespace) {
            Some(idx) => line[idx..].trim_start(),
            None => "",
        }
    }
}

/// Splits `--name[=value]` flags off the front of an instruction's arguments.
fn split_leading_flags(text: &str) -> (Vec<(String, Option<String>)>, &str) {
    let mut flags = Vec::new();
    let mut remaining = text.trim_start();

    while let Some(flag) = remaining.strip_prefix("--") {
        if flag.is_empty() || flag.starts_with(char::is_whitespace) {
            break;
        }
        let end = flag.find(char::is_whitespace).unwrap_or(flag.len());
        let token = &flag[..end];
        match token.split_once('=') {
            Some((name, value)) => flags.push((name.to_string(), Some(dequote(value)))),
            None => flags.push((token.to_string(), None)),
        }
        remaining = flag[end..].trim_start();
    }

    (flags, remaining)
}

/// Body of a `RUN <<EOF` script: the whole command is the heredoc itself.
fn heredoc_script(command_text: &str) -> Option<String> {
    let (first_line, body) = command_text.split_once('\n')?;
    let caps = HEREDOC_MARKER.captures(first_line.trim())?;
    if caps.get(0).map(|m| m.as_str()) != Some(first_line.trim()) {
        return None;
    }
    let delimiter = caps.get(2).or_else(|| caps.get(3)).or_else(|| caps.get(4))?.as_str();
    let lines: Vec<&str> = body.lines().collect();
    let end = lines
        .iter()
        .rposition(|l| l.trim_start_matches('\t') == delimiter)
        .unwrap_or(lines.len());
    Some(lines[..end].join("\n"))
}

/// Parses `registry/name:tag@digest`.
fn parse_image_ref(s: &str) -> (Image, Option<String>, Option<String>) {
    // Parse image:tag@digest format
    let (name_tag, digest) = match s.split_once('@') {
        Some((name_tag, digest)) => (name_tag, Some(digest.to_string())),
        None => (s, None),
    };

    // A colon is a tag separator only after the last path separator (`localhost:5000/app`)
    let last_slash = name_tag.rfind('/').map_or(0, |idx| idx + 1);
    let (name, tag) = match name_tag[last_slash..].rfind(':') {
        Some(idx) => {
            let idx = last_slash + idx;
            (&name_tag[..idx], Some(name_tag[idx + 1..].to_string()))
        }
        None => (name_tag, None),
    };

    let image = match name.split_once('/') {
        Some((first, path))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            Image { registry: Some(first.to_string()), name: path.to_string() }
        }
        _ => Image { registry: None, name: name.to_string() },
    };

    (image, tag, digest)
}

/// Simple tokenizer that respects quotes and JSON arrays.
fn tokenize(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_json = 0;
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' if quote != Some('\'') => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '"' | '\'' if in_json == 0 => {
                match quote {
                    Some(open) if open == c => quote = None,
                    None => quote = Some(c),
                    _ => {}
                }
                current.push(c);
            }
            '[' if (quote.is_none() && current.is_empty()) || in_json > 0 => {
                in_json += 1;
                current.push(c);
            }
            ']' if quote.is_none() && in_json > 0 => {
                in_json -= 1;
                current.push(c);
                if in_json == 0 {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c if c.is_whitespace() && quote.is_none() && in_json == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

/// Removes shell-style quoting: `"a b"` -> `a b`, `key="v"` -> `key=v`, `\"` -> `"`.
fn dequote(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut quote: Option<char> = None;
    let mut chars = s.trim().chars();

    while let Some(c) = chars.next() {
        match (c, quote) {
            ('\\', Some('\'')) => out.push(c),
            ('\\', _) => match chars.next() {
                Some(next) => out.push(next),
                None => out.push(c),
            },
            ('"' | '\'', None) => quote = Some(c),
            (c, Some(open)) if c == open => quote = None,
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
