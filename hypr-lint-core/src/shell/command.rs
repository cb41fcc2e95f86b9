//! Structured command model extracted from RUN shell text.
//!
//! Every simple command becomes a [`Command`] whose arguments carry stable position ids.
//! Flags are a derived view over the arguments: a flag token shares the id of the argument it
//! came from, so `-xzf` yields three flags with one id, and the token after a flag is its value.

use std::collections::HashSet;

use tracing::trace;

use tree_sitter::Node;

use super::parser::{parse_tree, walk, ShellParseError};

/// Placeholder for any expansion the analyzer does not evaluate.
pub const VARIABLE_PLACEHOLDER: &str = "${VAR}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// Position among the command's arguments (the command name is not counted)
    pub id: usize,
}

impl Token {
    pub fn new(text: impl Into<String>, id: usize) -> Self {
        Self { text: text.into(), id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub arguments: Vec<Token>,
    pub flags: Vec<Token>,
}

impl Command {
    /// Builds a command from already simplified words, deriving the flag view.
    pub fn new(name: impl Into<String>, arguments: Vec<String>) -> Self {
        let arguments: Vec<Token> =
            arguments.into_iter().enumerate().map(|(id, text)| Token::new(text, id)).collect();
        let flags = derive_flags(&arguments);
        Self { name: name.into(), arguments, flags }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.arguments.iter().any(|t| t.text == arg)
    }

    pub fn has_any_arg(&self, args: &[&str]) -> bool {
        args.iter().any(|arg| self.has_arg(arg))
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|t| t.text == flag)
    }

    pub fn has_any_flag(&self, flags: &[&str]) -> bool {
        flags.iter().any(|flag| self.has_flag(flag))
    }

    /// Number of times a flag occurs, counting repeats inside combined short flags (`-qq`).
    pub fn count_flag(&self, flag: &str) -> usize {
        self.flags.iter().filter(|t| t.text == flag).count()
    }

    /// Values given to `flag`: the `--flag=value` suffix, or else the argument right after it.
    pub fn flag_values(&self, flag: &str) -> Vec<&str> {
        self.flags
            .iter()
            .filter(|t| t.text == flag)
            .filter_map(|t| self.value_of(t.id))
            .collect()
    }

    fn value_of(&self, flag_id: usize) -> Option<&str> {
        let argument = self.arguments.get(flag_id)?;
        match argument.text.split_once('=') {
            Some((_, value)) if argument.text.starts_with("--") => Some(value),
            _ => self.arguments.get(flag_id + 1).map(|t| t.text.as_str()),
        }
    }

    /// Ids of the arguments consumed as the separate value of one of `flags`.
    fn value_ids(&self, flags: &[&str]) -> HashSet<usize> {
        self.flags
            .iter()
            .filter(|t| flags.contains(&t.text.as_str()))
            .filter(|t| self.arguments.get(t.id).is_some_and(|a| !a.text.contains('=')))
            .map(|t| t.id + 1)
            .collect()
    }

    /// Arguments that are not flags, in original order.
    pub fn positional_args(&self) -> Vec<&str> {
        let flag_ids: HashSet<usize> = self.flags.iter().map(|t| t.id).collect();
        self.arguments
            .iter()
            .filter(|t| !flag_ids.contains(&t.id))
            .map(|t| t.text.as_str())
            .collect()
    }

    /// Positional arguments, leaving out the values of the given flags
    /// (`pip install -r requirements.txt flask` with `["r"]` gives `["install", "flask"]`).
    pub fn args_skipping_flag_values(&self, flags: &[&str]) -> Vec<&str> {
        let flag_ids: HashSet<usize> = self.flags.iter().map(|t| t.id).collect();
        let value_ids = self.value_ids(flags);
        self.arguments
            .iter()
            .filter(|t| !flag_ids.contains(&t.id) && !value_ids.contains(&t.id))
            .map(|t| t.text.as_str())
            .collect()
    }

    /// Positional arguments after the first occurrence of `subcommand`
    /// (`apt-get -y install curl` with `"install"` gives `["curl"]`).
    pub fn args_after(&self, subcommand: &str, skip_values_of: &[&str]) -> Vec<&str> {
        let mut args = self.args_skipping_flag_values(skip_values_of).into_iter();
        if args.by_ref().any(|a| a == subcommand) {
            args.collect()
        } else {
            Vec::new()
        }
    }

    /// Whether the first positional argument is one of `subcommands`.
    pub fn has_subcommand(&self, subcommands: &[&str]) -> bool {
        self.positional_args().first().is_some_and(|first| subcommands.contains(first))
    }
}

fn derive_flags(arguments: &[Token]) -> Vec<Token> {
    let mut flags = Vec::new();
    for argument in arguments {
        let text = argument.text.as_str();
        if text == "-" || text == "--" {
            continue;
        }
        if let Some(long) = text.strip_prefix("--") {
            let name = long.split_once('=').map_or(long, |(name, _)| name);
            flags.push(Token::new(name, argument.id));
        } else if let Some(short) = text.strip_prefix('-') {
            flags.extend(short.chars().map(|c| Token::new(c.to_string(), argument.id)));
        }
    }
    flags
}

/// Commands of one shell script, plus the structural facts rules ask about.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedShellScript {
    pub commands: Vec<Command>,
    /// Number of pipelines (`a | b`, `a |& b`), including those inside substitutions
    pub pipelines: usize,
}

impl ParsedShellScript {
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn commands_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Command> + 'a {
        self.commands.iter().filter(move |c| c.is(name))
    }

    pub fn using_program(&self, name: &str) -> bool {
        self.commands.iter().any(|c| c.is(name))
    }

    pub fn has_pipes(&self) -> bool {
        self.pipelines > 0
    }
}

/// Parses shell text into its commands.
///
/// ```
/// use hypr_lint_core::shell;
///
/// let parsed = shell::parse("tar -xzf app.tgz && rm app.tgz").unwrap();
/// assert_eq!(parsed.command_count(), 2);
/// assert!(parsed.commands[0].has_flag("z"));
/// ```
pub fn parse(text: &str) -> Result<ParsedShellScript, ShellParseError> {
    let tree = parse_tree(text)?;
    let mut parsed = ParsedShellScript::default();
    walk(tree.root_node(), |node| match node.kind() {
        "command" => {
            if let Some(command) = to_command(node, text) {
                parsed.commands.push(command);
            }
        }
        "declaration_command" | "unset_command" => parsed.commands.push(to_builtin(node, text)),
        "pipeline" => parsed.pipelines += 1,
        _ => {}
    });
    trace!(commands = parsed.commands.len(), "Analyzed shell script");
    Ok(parsed)
}

/// Assignment-only commands (`FOO=bar`) have no name and are skipped.
fn to_command(node: Node<'_>, source: &str) -> Option<Command> {
    let name = node.child_by_field_name("name")?;
    let mut cursor = node.walk();
    let arguments = node
        .children_by_field_name("argument", &mut cursor)
        .map(|argument| simplify(argument, source))
        .collect();
    Some(Command::new(simplify(name, source), arguments))
}

/// `export`, `declare`, `local`, `readonly`, `typeset` and `unset` have their own node kinds.
fn to_builtin(node: Node<'_>, source: &str) -> Command {
    let name = node.child(0).map_or("", |keyword| &source[keyword.byte_range()]);
    let mut cursor = node.walk();
    let arguments =
        node.named_children(&mut cursor).map(|argument| simplify(argument, source)).collect();
    Command::new(name, arguments)
}

/// Collapses every expansion inside a word node into [`VARIABLE_PLACEHOLDER`], keeping
/// literal text with quotes and escapes removed.
pub fn simplify(node: Node<'_>, source: &str) -> String {
    let mut text = String::new();
    push_simplified(node, source, &mut text);
    text
}

fn push_simplified(node: Node<'_>, source: &str, out: &mut String) {
    let raw = &source[node.byte_range()];
    match node.kind() {
        "command_name" | "concatenation" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                push_simplified(child, source, out);
            }
        }
        "word" => unescape(raw, out),
        "raw_string" => out.push_str(unquote(raw, "'")),
        "ansi_c_string" => out.push_str(unquote(raw, "$'")),
        "variable_assignment" => {
            if let Some(name) = node.child_by_field_name("name") {
                out.push_str(&source[name.byte_range()]);
            }
            out.push('=');
            if let Some(value) = node.child_by_field_name("value") {
                push_simplified(value, source, out);
            }
        }
        "string" => push_double_quoted(node, source, out),
        "simple_expansion" | "expansion" | "command_substitution" | "arithmetic_expansion"
        | "process_substitution" => out.push_str(VARIABLE_PLACEHOLDER),
        _ => out.push_str(raw),
    }
}

/// Literal text of a double-quoted string, with each embedded expansion replaced.
fn push_double_quoted(node: Node<'_>, source: &str, out: &mut String) {
    let range = node.byte_range();
    let end = range.end.saturating_sub(1).max(range.start);
    let mut position = (range.start + 1).min(end);
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "string_content" {
            continue;
        }
        out.push_str(&source[position..child.start_byte().max(position)]);
        out.push_str(VARIABLE_PLACEHOLDER);
        position = child.end_byte();
    }
    if position < end {
        out.push_str(&source[position..end]);
    }
}

fn unquote<'a>(raw: &'a str, open: &str) -> &'a str {
    let inner = raw.strip_prefix(open).unwrap_or(raw);
    inner.strip_suffix('\'').unwrap_or(inner)
}

fn unescape(raw: &str, out: &mut String) {
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
