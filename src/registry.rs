//! The template registry: compiled templates by name, with a prototype
//! fallback chain and supersede-guarded registration.
//!
//! Registration is rare and cheap, so it serializes on a write lock;
//! renders only read and run concurrently. A registry may layer over a
//! prototype registry: lookups that miss locally fall through to it, which
//! lets one compiled module override another without merging tables.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

use crate::env::Env;
use crate::evaluator::{CommandFn, RenderError};
use crate::value::Value;

/// Registering a template name that already exists without asking for
/// supersede.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    Duplicate(String),
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::Duplicate(name) => {
                write!(f, "Template {} has already been registered", name)
            }
        }
    }
}

impl std::error::Error for RegistrationError {}

/// One compiled template: its name, visibility and render closure.
pub struct CompiledTemplate {
    name: String,
    private: bool,
    render: CommandFn,
}

impl CompiledTemplate {
    pub(crate) fn new(name: String, private: bool, render: CommandFn) -> Self {
        CompiledTemplate {
            name,
            private,
            render,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_private(&self) -> bool {
        self.private
    }
}

#[derive(Default)]
pub struct Registry {
    templates: RwLock<HashMap<String, Arc<CompiledTemplate>>>,
    prototype: Option<Arc<Registry>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// A registry that falls back to `prototype` on local lookup misses.
    pub fn with_prototype(prototype: Arc<Registry>) -> Self {
        Registry {
            templates: RwLock::new(HashMap::new()),
            prototype: Some(prototype),
        }
    }

    fn read_templates(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<CompiledTemplate>>> {
        self.templates
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_templates(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<CompiledTemplate>>> {
        self.templates
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a compiled template. Fails on a duplicate name unless
    /// `supersede` is set, in which case the new template replaces the old.
    pub fn register(
        &self,
        template: CompiledTemplate,
        supersede: bool,
    ) -> Result<(), RegistrationError> {
        let mut templates = self.write_templates();
        let name = template.name.clone();
        if !supersede && templates.contains_key(&name) {
            return Err(RegistrationError::Duplicate(name));
        }
        debug!("registering template {}", name);
        templates.insert(name, Arc::new(template));
        Ok(())
    }

    /// Look a template up locally, then through the prototype chain.
    pub fn find(&self, name: &str) -> Option<Arc<CompiledTemplate>> {
        if let Some(template) = self.read_templates().get(name) {
            return Some(Arc::clone(template));
        }
        self.prototype
            .as_ref()
            .and_then(|prototype| prototype.find(name))
    }

    /// All registered template names, including the prototype chain,
    /// sorted.
    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_templates().keys().cloned().collect();
        if let Some(prototype) = &self.prototype {
            names.extend(prototype.template_names());
        }
        names.sort();
        names.dedup();
        names
    }

    /// Template-to-template dispatch. Always dispatches through `self`,
    /// the registry the render started from, so templates found in a
    /// prototype still call back into local overrides. No privacy check:
    /// private templates may call each other freely.
    pub(crate) fn call_template(
        &self,
        name: &str,
        env: &Env<'_>,
        out: &mut dyn fmt::Write,
    ) -> Result<(), RenderError> {
        let template = self
            .find(name)
            .ok_or_else(|| RenderError::TemplateNotFound(name.to_string()))?;
        (template.render)(env, out, self)
    }

    /// Render into a caller-supplied sink. Output is written in production
    /// order; on failure the sink may already hold partial output.
    pub fn render_to(
        &self,
        name: &str,
        data: &Value,
        out: &mut dyn fmt::Write,
    ) -> Result<(), RenderError> {
        let template = self
            .find(name)
            .ok_or_else(|| RenderError::TemplateNotFound(name.to_string()))?;
        if template.private {
            return Err(RenderError::PrivateTemplate(name.to_string()));
        }
        let env = Env::from_data(data);
        (template.render)(&env, out, self)
    }

    /// Render to a buffered string.
    pub fn render(&self, name: &str, data: &Value) -> Result<String, RenderError> {
        let mut out = String::new();
        self.render_to(name, data, &mut out)?;
        Ok(out)
    }
}
