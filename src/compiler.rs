//! Turns one template source into an [`Artifact`].
//!
//! The source is split at its directive lines. `@section` and `@main` bodies
//! are written as standalone units, `@value` lines fill the value map,
//! `@include` merges another artifact, and everything else is gathered into
//! the implicit main body.

use log::{info, warn};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::artifact::{modified_time, section_key, Artifact, SectionBody, DEFAULT_SECTION};
use crate::error::{Error, Result};
use crate::scanner::{Command, DirectiveScanner};
use crate::store::ArtifactStore;

/// Supplies the artifacts of `@include` targets.
pub trait IncludeResolver {
    /// Resolves `reference` (as written in `includer`) to a compiled artifact.
    ///
    /// Returns the canonical path of the target and its artifact, or `None`
    /// for the artifact when the target is already being compiled further
    /// up the include chain.
    ///
    /// # Errors
    /// * `Error::IncludeNotFound` if the target does not exist
    fn resolve_include(
        &mut self,
        reference: &str,
        includer: &Path,
    ) -> Result<(PathBuf, Option<Artifact>)>;
}

pub struct TemplateCompiler {
    store: ArtifactStore,
}

impl TemplateCompiler {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    /// Compiles the canonical `source` and persists the result.
    pub fn compile(&self, source: &Path, includes: &mut dyn IncludeResolver) -> Result<Artifact> {
        info!("Compiling {}", source.display());
        let source_mod_time = modified_time(source)?;
        let content = std::fs::read_to_string(source)?;
        let mut artifact = Artifact::new(source.to_path_buf(), source_mod_time);

        let mut directives = DirectiveScanner::new(&content).peekable();
        let first = directives.peek().map_or(content.len(), |d| d.offset);
        let mut main = vec![&content[..first]];
        let mut explicit_main = false;

        while let Some(directive) = directives.next() {
            let start = directive.end();
            let end = directives.peek().map_or(content.len(), |d| d.offset);
            let span = &content[start..end];
            let invalid = |message: &str| Error::InvalidDirective {
                path: source.to_path_buf(),
                line: directive.line,
                message: message.to_string(),
            };

            match directive.command {
                Command::Include => {
                    if directive.argument.is_empty() {
                        return Err(invalid("@include needs a template path"));
                    }
                    let (target, included) = includes.resolve_include(directive.argument, source)?;
                    match &included {
                        Some(included) => artifact.merge_missing(included),
                        None => artifact.cut_cycle(&target),
                    }
                    if !artifact.includes.contains(&target) {
                        artifact.includes.push(target);
                    }
                }
                Command::Value => {
                    let (name, value) = match directive.argument.split_once(char::is_whitespace) {
                        Some((name, value)) => (name.trim(), value.trim()),
                        None => (directive.argument, ""),
                    };
                    if name.is_empty() {
                        return Err(invalid("@value needs a name"));
                    }
                    artifact.values.insert(name.to_string(), value.to_string());
                }
                Command::Section | Command::Main => {
                    let key = match directive.command {
                        Command::Main => {
                            explicit_main = true;
                            Cow::Borrowed(DEFAULT_SECTION)
                        }
                        _ if directive.argument.is_empty() => {
                            return Err(invalid("@section needs a name"));
                        }
                        _ => section_key(directive.argument),
                    };

                    let padding = content[..start].matches('\n').count();
                    let location = self
                        .store
                        .write_section(source, &key, &SectionBody::new(padding, span))?;
                    artifact.sections.insert(key.into_owned(), location);
                    continue;
                }
                Command::Other(command) => {
                    warn!(
                        "Unknown directive '@{}' at {}:{}, line dropped",
                        command,
                        source.display(),
                        directive.line
                    );
                }
            }

            main.push(span);
        }

        let main = main.concat();
        if !explicit_main && !main.trim().is_empty() {
            let location = self
                .store
                .write_section(source, DEFAULT_SECTION, &SectionBody::new(0, main))?;
            artifact.sections.insert(DEFAULT_SECTION.to_string(), location);
        }

        artifact.close_cycles();
        self.store.save_sidecar(&artifact)?;
        Ok(artifact)
    }
}
