//! Syntax-only validation of template sources

use super::CliError;
use crate::template::parse_namespace;

/// Parse a namespace source without compiling it. Returns the namespace
/// name on success.
pub fn execute_check(source: &str) -> Result<String, CliError> {
    let namespace = parse_namespace(source)?;
    Ok(namespace.name)
}
