//! Compile template sources to a JavaScript module

use super::CliError;
use crate::codegen::compile_namespace_to_js;
use crate::template::parse_namespace;

/// Compile one or more namespace sources into a single JavaScript module
/// string, in input order.
pub fn execute_compile(sources: &[String]) -> Result<String, CliError> {
    let mut out = String::new();
    for source in sources {
        let namespace = parse_namespace(source)?;
        out.push_str(&compile_namespace_to_js(&namespace));
    }
    Ok(out)
}
