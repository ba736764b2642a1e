//! Render one template against JSON data

use std::collections::HashMap;

use super::{json_to_value, CliError};
use crate::evaluator::compile_namespace;
use crate::registry::Registry;
use crate::template::parse_namespace;
use crate::value::Value;

/// Options for the render command
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Namespace source text
    pub source: String,
    /// Template name to render
    pub template: String,
    /// JSON data string; an empty object when absent
    pub data: Option<String>,
}

/// Parse, compile and render one template.
pub fn execute_render(options: &RenderOptions) -> Result<String, CliError> {
    let namespace = parse_namespace(&options.source)?;
    let registry = Registry::new();
    compile_namespace(&namespace, &registry, false)?;

    let data = match &options.data {
        Some(text) => json_to_value(serde_json::from_str(text)?),
        None => Value::Object(HashMap::new()),
    };

    Ok(registry.render(&options.template, &data)?)
}
