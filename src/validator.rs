//! Freshness checks for cached artifacts.
//!
//! An artifact is fresh when its own source and every source it pulled
//! sections or values from still carry the modification time recorded in
//! their sidecars. Include graphs may be cyclic; the walk keeps a set of
//! sidecars already confirmed and treats a repeat visit as fresh.

use log::{debug, trace};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::artifact::{modified_time, Artifact};
use crate::store::{sidecar_of_section, ArtifactStore};

pub struct CacheValidator<'a> {
    store: &'a ArtifactStore,
}

impl<'a> CacheValidator<'a> {
    pub fn new(store: &'a ArtifactStore) -> Self {
        Self { store }
    }

    /// Returns the cached artifact of `source` if it and everything it
    /// depends on is still fresh.
    ///
    /// A partial artifact only ever answers for the includers that pulled it
    /// in, so it is a miss here even when fresh.
    pub fn validate(&self, source: &Path) -> Option<Artifact> {
        let mut visited = HashSet::new();
        let artifact = self.check(&self.store.sidecar_path(source), &mut visited)?;
        if artifact.is_partial() {
            debug!("Cache miss: {} was compiled inside a cycle", source.display());
            return None;
        }
        Some(artifact)
    }

    /// Loads the sidecar at `sidecar` and verifies it recursively.
    pub fn check(&self, sidecar: &Path, visited: &mut HashSet<PathBuf>) -> Option<Artifact> {
        let artifact = match self.store.load_sidecar(sidecar) {
            Ok(artifact) => artifact,
            Err(e) => {
                debug!("Cache miss: {}", e);
                return None;
            }
        };

        if self.store.sidecar_path(&artifact.source_path) != sidecar {
            debug!("Sidecar {} names a foreign source", sidecar.display());
            return None;
        }
        match modified_time(&artifact.source_path) {
            Ok(mtime) if mtime == artifact.source_mod_time => {}
            _ => {
                debug!("Stale: {} changed since compile", artifact.source_path.display());
                return None;
            }
        }
        visited.insert(sidecar.to_path_buf());

        for location in artifact.sections.values() {
            if !location.is_file() {
                debug!("Stale: section body {} is gone", location.display());
                return None;
            }
            let Some(origin) = sidecar_of_section(location) else {
                debug!("Stale: {} is not a section body", location.display());
                return None;
            };
            if !self.is_fresh(&origin, visited) {
                return None;
            }
        }
        for include in &artifact.includes {
            if !self.is_fresh(&self.store.sidecar_path(include), visited) {
                return None;
            }
        }

        trace!("Fresh: {}", artifact.source_path.display());
        Some(artifact)
    }

    fn is_fresh(&self, sidecar: &Path, visited: &mut HashSet<PathBuf>) -> bool {
        visited.contains(sidecar) || self.check(sidecar, visited).is_some()
    }
}
