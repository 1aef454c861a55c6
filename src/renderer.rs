//! Section executor and rendering functionality for sectional.
//! Section bodies are MiniJinja templates; other sections of the same
//! template are reachable from a body through `{% include "name" %}`.
use crate::artifact::{section_key, SectionBody};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use minijinja::{Environment, ErrorKind};
use std::error::Error as StdError;
use std::path::{Path, PathBuf};

/// Everything an executor needs to run one section.
pub struct SectionCall<'a> {
    /// Map key of the section to run, also its template name
    pub name: &'a str,
    /// Compiled body of that section
    pub location: &'a Path,
    /// All sections of the template, for section-to-section includes
    pub sections: &'a IndexMap<String, PathBuf>,
    /// Template values bound by `@value` directives
    pub values: &'a IndexMap<String, String>,
    /// Render context: caller variables plus a `values` object
    pub context: &'a serde_json::Value,
}

/// Trait for section rendering engines.
pub trait SectionExecutor {
    /// Runs one section and returns the produced text.
    ///
    /// # Errors
    /// * `Error::RenderError` with the engine's message on failure
    fn execute(&self, call: &SectionCall<'_>) -> Result<String>;
}

/// MiniJinja-based section executor.
pub struct MiniJinjaRenderer {
    /// MiniJinja environment instance
    env: Environment<'static>,
}

impl MiniJinjaRenderer {
    /// Creates a new MiniJinjaRenderer instance with default environment.
    pub fn new() -> Self {
        let env = Environment::new();
        Self { env }
    }
}

impl Default for MiniJinjaRenderer {
    fn default() -> Self {
        MiniJinjaRenderer::new()
    }
}

impl SectionExecutor for MiniJinjaRenderer {
    /// Renders a section using MiniJinja.
    ///
    /// Template names inside the environment are section names, so a body
    /// can pull in `{% include "sidebar" %}`. The padding comment at the top
    /// of each compiled unit is kept, which makes MiniJinja report line
    /// numbers of the original source.
    ///
    /// # Errors
    /// * `Error::RenderError` if:
    ///   - a section body cannot be read
    ///   - the section fails to parse
    ///   - rendering fails
    fn execute(&self, call: &SectionCall<'_>) -> Result<String> {
        let mut env = self.env.clone();

        let sections = call.sections.clone();
        env.set_loader(move |name| match sections.get(&*section_key(name)) {
            Some(location) => std::fs::read_to_string(location).map(Some).map_err(|e| {
                minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    format!("could not read section '{}' from {}: {}", name, location.display(), e),
                )
            }),
            None => Ok(None),
        });

        let values = call.values.clone();
        env.add_function("value", move |name: String| -> String {
            values.get(&name).cloned().unwrap_or_default()
        });

        let source = std::fs::read_to_string(call.location)?;
        if SectionBody::decode(&source).is_none() {
            return Err(Error::RenderError(format!(
                "{} is not a compiled section body",
                call.location.display()
            )));
        }
        env.add_template_owned(call.name.to_string(), source)
            .map_err(|e| Error::RenderError(describe(&e)))?;

        let tmpl = env.get_template(call.name).map_err(|e| Error::RenderError(describe(&e)))?;
        tmpl.render(call.context).map_err(|e| Error::RenderError(describe(&e)))
    }
}

/// Flattens a MiniJinja error and its causes into one line.
fn describe(err: &minijinja::Error) -> String {
    let mut message = err.to_string();
    let mut cause = StdError::source(err);
    while let Some(inner) = cause {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        cause = inner.source();
    }
    message
}
