//! Handle bound to one compiled template.

use log::debug;
use std::path::{Path, PathBuf, MAIN_SEPARATOR_STR};

use crate::artifact::{section_key, Artifact, DEFAULT_SECTION};
use crate::error::{Error, Result};
use crate::renderer::{SectionCall, SectionExecutor};

/// A compiled template plus the variables it is rendered with.
///
/// The handle never runs section bodies itself; it locates them and hands
/// them to a [`SectionExecutor`]. Anything the executor returns, output or
/// error text, has cache paths rewritten back to source paths.
#[derive(Debug, Clone)]
pub struct Template {
    artifact: Artifact,
    context: serde_json::Value,
    cache_root: PathBuf,
}

impl Template {
    /// Binds `artifact` to `vars`, which should be a JSON object.
    ///
    /// The artifact's values are exposed to sections as `values`, next to
    /// the caller's variables.
    pub fn new(artifact: Artifact, vars: serde_json::Value, cache_root: PathBuf) -> Self {
        let mut context = match vars {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                debug!("Ignoring non-object template variables: {}", other);
                serde_json::Map::new()
            }
        };
        let values = artifact
            .values
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        context.insert("values".to_string(), serde_json::Value::Object(values));

        Self {
            artifact,
            context: serde_json::Value::Object(context),
            cache_root,
        }
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn source_path(&self) -> &Path {
        &self.artifact.source_path
    }

    /// Named value, or an empty string when the template does not define it.
    pub fn value(&self, name: &str) -> &str {
        self.artifact.values.get(name).map(String::as_str).unwrap_or("")
    }

    /// Locates the compiled body of section `name`.
    ///
    /// # Errors
    /// * `Error::SectionNotFound` if the artifact has no such section or its
    ///   body file has disappeared
    pub fn resolve_section(&self, name: &str) -> Result<&Path> {
        self.locate(&section_key(name), name)
    }

    fn locate(&self, key: &str, name: &str) -> Result<&Path> {
        match self.artifact.sections.get(key) {
            Some(location) if location.is_file() => Ok(location.as_path()),
            _ => Err(Error::SectionNotFound {
                name: name.to_string(),
                source_path: self.artifact.source_path.clone(),
            }),
        }
    }

    /// Renders the default section.
    pub fn render(&self, executor: &dyn SectionExecutor) -> Result<String> {
        self.run(DEFAULT_SECTION, DEFAULT_SECTION, executor)
    }

    pub fn render_section(&self, name: &str, executor: &dyn SectionExecutor) -> Result<String> {
        self.run(&section_key(name), name, executor)
    }

    fn run(&self, key: &str, name: &str, executor: &dyn SectionExecutor) -> Result<String> {
        let location = self.locate(key, name)?;
        let call = SectionCall {
            name: key,
            location,
            sections: &self.artifact.sections,
            values: &self.artifact.values,
            context: &self.context,
        };
        match executor.execute(&call) {
            Ok(output) => Ok(self.fix_error_paths(&output)),
            Err(Error::RenderError(message)) => {
                Err(Error::RenderError(self.fix_error_paths(&message)))
            }
            Err(Error::IoError(e)) => {
                Err(Error::RenderError(self.fix_error_paths(&e.to_string())))
            }
            Err(other) => Err(other),
        }
    }

    /// Turns `<cache_root>/abs/source#section` fragments back into
    /// `/abs/source#section`.
    pub fn fix_error_paths(&self, text: &str) -> String {
        let root = self.cache_root.to_string_lossy();
        let root = root.trim_end_matches(MAIN_SEPARATOR_STR);
        if root.is_empty() {
            return text.to_string();
        }
        text.replace(&format!("{}{}", root, MAIN_SEPARATOR_STR), MAIN_SEPARATOR_STR)
    }
}
