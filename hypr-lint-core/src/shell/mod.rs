//! Shell analysis for RUN instructions.
//!
//! [`parse`] turns shell text into a [`ParsedShellScript`]: every simple command with its
//! name, arguments and derived flags, plus structural facts such as pipe detection.
//! Parsing is done by tree-sitter's bash grammar (see [`parser`]).

pub mod command;
pub mod parser;

pub use command::{parse, simplify, Command, ParsedShellScript, Token, VARIABLE_PLACEHOLDER};
pub use parser::{parse_tree, ShellParseError};
