//! Request flow for templates.
//!
//! A reference is resolved to a canonical path, then served from the
//! in-process layer, then from the disk cache after recursive validation,
//! and compiled only when both miss. Every compile updates both layers.
//!
//! Inside an include cycle the member compiled last cannot see the member
//! that started the cycle. Its artifact is marked partial: it still backs
//! the includers that pulled it in, but it is never served as the answer to
//! a request for its own source, which gets a full compile instead.

use log::{debug, trace};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::artifact::Artifact;
use crate::compiler::{IncludeResolver, TemplateCompiler};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::resolver::PathResolver;
use crate::store::ArtifactStore;
use crate::template::Template;
use crate::validator::CacheValidator;

pub struct Pipeline {
    config: Config,
    resolver: PathResolver,
    store: ArtifactStore,
    memory: HashMap<PathBuf, Artifact>,
    /// Sources whose compile is on the current call stack.
    compiling: HashSet<PathBuf>,
}

impl Pipeline {
    /// Creates a pipeline for `config`.
    ///
    /// # Errors
    /// * `Error::NotFound` if the base directory does not exist
    pub fn new(config: Config) -> Result<Self> {
        let resolver = PathResolver::new(&config.base_dir)?;
        let store = ArtifactStore::new(config.cache_root());
        debug!(
            "Templates from {}, cache at {}{}",
            resolver.base_dir().display(),
            store.root().display(),
            if config.disable_cache { " (disk cache disabled)" } else { "" }
        );
        Ok(Self {
            config,
            resolver,
            store,
            memory: HashMap::new(),
            compiling: HashSet::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn base_dir(&self) -> &Path {
        self.resolver.base_dir()
    }

    /// Returns the artifact for `reference`, compiling it if needed.
    ///
    /// # Errors
    /// * `Error::NotFound` if the reference does not resolve to a file
    /// * `Error::IncludeNotFound` if an include target is missing
    pub fn load(&mut self, reference: &str) -> Result<Artifact> {
        let source = self.resolver.resolve(reference)?;
        self.load_source(source)
    }

    /// Returns a [`Template`] handle bound to `reference`.
    pub fn template(&mut self, reference: &str, vars: serde_json::Value) -> Result<Template> {
        let artifact = self.load(reference)?;
        Ok(Template::new(artifact, vars, self.store.root().to_path_buf()))
    }

    /// Drops the in-process layer so the next request revalidates on disk.
    pub fn clear_memory(&mut self) {
        self.memory.clear();
    }

    fn load_source(&mut self, source: PathBuf) -> Result<Artifact> {
        if let Some(artifact) = self.memory.get(&source) {
            trace!("Memory hit: {}", source.display());
            return Ok(artifact.clone());
        }

        if !self.config.disable_cache {
            if let Some(artifact) = CacheValidator::new(&self.store).validate(&source) {
                debug!("Disk cache hit: {}", source.display());
                self.memory.insert(source, artifact.clone());
                return Ok(artifact);
            }
        }

        self.compiling.insert(source.clone());
        let compiler = TemplateCompiler::new(self.store.clone());
        let compiled = compiler.compile(&source, &mut *self);
        self.compiling.remove(&source);

        let artifact = compiled?;
        if artifact.is_partial() {
            debug!("Not keeping {}: include cycle was cut", source.display());
        } else {
            self.memory.insert(source, artifact.clone());
        }
        Ok(artifact)
    }
}

impl IncludeResolver for Pipeline {
    fn resolve_include(
        &mut self,
        reference: &str,
        includer: &Path,
    ) -> Result<(PathBuf, Option<Artifact>)> {
        let target = self.resolver.resolve(reference).map_err(|e| match e {
            Error::NotFound { .. } => Error::IncludeNotFound {
                target: reference.to_string(),
                includer: includer.to_path_buf(),
            },
            other => other,
        })?;

        if self.compiling.contains(&target) {
            debug!(
                "Include cycle: {} is already being compiled (included in {})",
                target.display(),
                includer.display()
            );
            return Ok((target, None));
        }

        let artifact = self.load_source(target.clone())?;
        Ok((target, Some(artifact)))
    }
}
