//! Bash parsing on top of `tree-sitter-bash`.
//!
//! tree-sitter always produces a tree and marks the parts it could not make sense of with
//! `ERROR` or `MISSING` nodes. Rules need a yes/no answer, so any such node turns the whole
//! script into a [`ShellParseError`] and callers skip it.

use std::cell::RefCell;

use thiserror::Error;
use tracing::trace;
use tree_sitter::{Node, Parser, Tree};

/// Shell syntax error. Offsets are byte positions in the script text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShellParseError {
    #[error("syntax error at offset {offset} near {found:?}")]
    Syntax { found: String, offset: usize },

    #[error("missing {expected} at offset {offset}")]
    Missing { expected: String, offset: usize },

    #[error("bash grammar unavailable: {0}")]
    Grammar(String),

    #[error("parser produced no tree")]
    NoTree,
}

impl ShellParseError {
    pub fn offset(&self) -> Option<usize> {
        match self {
            ShellParseError::Syntax { offset, .. } | ShellParseError::Missing { offset, .. } => {
                Some(*offset)
            }
            ShellParseError::Grammar(_) | ShellParseError::NoTree => None,
        }
    }
}

type Result<T> = std::result::Result<T, ShellParseError>;

thread_local! {
    // Rules parse on rayon workers; one parser per thread.
    static BASH: RefCell<Option<Parser>> = const { RefCell::new(None) };
}

fn bash_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_bash::LANGUAGE.into())
        .map_err(|e| ShellParseError::Grammar(e.to_string()))?;
    Ok(parser)
}

/// Parses shell text into a syntax tree, rejecting scripts with syntax errors.
///
/// # Example
///
/// ```
/// use hypr_lint_core::shell::parse_tree;
///
/// let tree = parse_tree("apt-get update && apt-get install -y curl | tee log").unwrap();
/// assert_eq!(tree.root_node().kind(), "program");
/// assert!(parse_tree("echo 'oops").is_err());
/// ```
pub fn parse_tree(text: &str) -> Result<Tree> {
    let tree = BASH.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(bash_parser()?);
        }
        match slot.as_mut() {
            Some(parser) => parser.parse(text, None).ok_or(ShellParseError::NoTree),
            None => Err(ShellParseError::NoTree),
        }
    })?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(first_error(root, text));
    }
    trace!(bytes = text.len(), "Parsed shell script");
    Ok(tree)
}

/// Locates the first `ERROR` or `MISSING` node in document order.
fn first_error(root: Node<'_>, text: &str) -> ShellParseError {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_missing() {
            return ShellParseError::Missing {
                expected: node.kind().to_string(),
                offset: node.start_byte(),
            };
        }
        if node.is_error() {
            let found = node.utf8_text(text.as_bytes()).unwrap_or_default();
            return ShellParseError::Syntax {
                found: found.chars().take(20).collect(),
                offset: node.start_byte(),
            };
        }

        // Only descend into subtrees that contain the error
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        if cursor.goto_next_sibling() {
            continue;
        }
        loop {
            if !cursor.goto_parent() {
                return ShellParseError::Syntax { found: String::new(), offset: root.start_byte() };
            }
            if cursor.goto_next_sibling() {
                break;
            }
        }
    }
}

/// Visits every node of the tree in document order.
pub(crate) fn walk<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();
    loop {
        visit(cursor.node());

        if cursor.goto_first_child() {
            continue;
        }
        if cursor.goto_next_sibling() {
            continue;
        }
        loop {
            if !cursor.goto_parent() {
                return;
            }
            if cursor.goto_next_sibling() {
                break;
            }
        }
    }
}
