//! CLI support for stencil-lang
//!
//! Provides programmatic access to the stencil CLI commands for embedding
//! in other tools.

mod check;
mod compile;
mod convert;
mod render;

pub use check::execute_check;
pub use compile::execute_compile;
pub use convert::{json_to_value, value_to_json};
pub use render::{execute_render, RenderOptions};

use std::io;

use crate::evaluator::RenderError;
use crate::parser::ParseError;
use crate::registry::RegistrationError;

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Template source failed to parse
    Parse(ParseError),
    /// Rendering failed
    Render(RenderError),
    /// Duplicate template name
    Registration(RegistrationError),
    /// JSON data failed to parse
    Json(serde_json::Error),
    /// IO error
    Io(io::Error),
    /// No data provided
    NoInput,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Parse(e) => write!(f, "Parse error: {}", e),
            CliError::Render(e) => write!(f, "Render error: {}", e),
            CliError::Registration(e) => write!(f, "Registration error: {}", e),
            CliError::Json(e) => write!(f, "Invalid JSON: {}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoInput => {
                write!(f, "No data provided. Use --data or pipe JSON to stdin.")
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Parse(e) => Some(e),
            CliError::Render(e) => Some(e),
            CliError::Registration(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::NoInput => None,
        }
    }
}

impl From<ParseError> for CliError {
    fn from(e: ParseError) -> Self {
        CliError::Parse(e)
    }
}

impl From<RenderError> for CliError {
    fn from(e: RenderError) -> Self {
        CliError::Render(e)
    }
}

impl From<RegistrationError> for CliError {
    fn from(e: RegistrationError) -> Self {
        CliError::Registration(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
