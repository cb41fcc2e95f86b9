//! Dockerfile front end.
//!
//! This module turns Dockerfile text into the ordered, line-numbered instruction
//! stream every rule folds over.

pub mod instruction;
pub mod parser;

pub use instruction::{
    AddArgs, Arguments, BaseImage, CopyArgs, Healthcheck, HealthcheckConfig, Image, Instruction,
    InstructionPos, PortSpec, Protocol, RunArgs, RunFlags,
};
pub use parser::{parse_dockerfile, parse_dockerfile_file, ParseError};
