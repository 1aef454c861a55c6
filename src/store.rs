//! On-disk layout of compiled artifacts.
//!
//! For a source `S` the sidecar lives at `<cache_root><S>` and each section
//! body at `<cache_root><S>#<section>`. Section names are escaped so the
//! last `#` in a body file name always separates sidecar path and section.

use log::{debug, trace};
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::artifact::{Artifact, SectionBody};
use crate::error::{Error, Result};

/// Separator between a sidecar path and a section name.
pub const SECTION_SEPARATOR: char = '#';

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Mirrors the absolute `source` path under the cache root.
    pub fn sidecar_path(&self, source: &Path) -> PathBuf {
        let mut path = self.root.clone();
        for component in source.components() {
            match component {
                Component::Prefix(prefix) => {
                    let drive = prefix
                        .as_os_str()
                        .to_string_lossy()
                        .replace(|c: char| matches!(c, ':' | '\\' | '?'), "");
                    path.push(drive);
                }
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir => {
                    path.pop();
                }
                Component::Normal(part) => path.push(part),
            }
        }
        path
    }

    /// Body file of section `name` of `source`.
    pub fn section_path(&self, source: &Path, name: &str) -> PathBuf {
        let mut file: OsString = self.sidecar_path(source).into_os_string();
        file.push(SECTION_SEPARATOR.to_string());
        file.push(escape_section_name(name));
        PathBuf::from(file)
    }

    /// Writes the compiled unit of one section and returns its location.
    pub fn write_section(&self, source: &Path, name: &str, body: &SectionBody) -> Result<PathBuf> {
        let location = self.section_path(source, name);
        ensure_parent(&location)?;
        fs::write(&location, body.encode())?;
        trace!("Wrote section '{}' to {}", name, location.display());
        Ok(location)
    }

    pub fn read_section(&self, location: &Path) -> Result<SectionBody> {
        let unit = fs::read_to_string(location)?;
        SectionBody::decode(&unit).ok_or_else(|| Error::CorruptCache {
            path: location.to_path_buf(),
            reason: "missing padding header".to_string(),
        })
    }

    pub fn save_sidecar(&self, artifact: &Artifact) -> Result<PathBuf> {
        let path = self.sidecar_path(&artifact.source_path);
        ensure_parent(&path)?;
        fs::write(&path, serde_json::to_vec_pretty(artifact)?)?;
        debug!("Saved sidecar {}", path.display());
        Ok(path)
    }

    /// Reads a sidecar back.
    ///
    /// # Errors
    /// * `Error::CorruptCache` if the file is missing, unreadable or malformed
    pub fn load_sidecar(&self, path: &Path) -> Result<Artifact> {
        let corrupt = |reason: String| Error::CorruptCache {
            path: path.to_path_buf(),
            reason,
        };
        let content = fs::read(path).map_err(|e| corrupt(e.to_string()))?;
        serde_json::from_slice(&content).map_err(|e| corrupt(e.to_string()))
    }

    /// Removes section bodies that no sidecar claims anymore.
    ///
    /// A body is kept only if the sidecar it hangs off loads and still lists
    /// the body among its own sections. Returns the number of removed files.
    pub fn prune(&self) -> Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|e| Error::IoError(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let location = entry.path();
            let Some(sidecar) = sidecar_of_section(location) else {
                continue;
            };
            // source file names may contain the separator themselves
            if self.load_sidecar(location).is_ok() {
                continue;
            }
            let claimed = self
                .load_sidecar(&sidecar)
                .map(|artifact| artifact.sections.values().any(|l| l == location))
                .unwrap_or(false);
            if !claimed {
                debug!("Pruning orphaned section {}", location.display());
                fs::remove_file(location)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Strips the section suffix from a body file path.
pub fn sidecar_of_section(location: &Path) -> Option<PathBuf> {
    let name = location.file_name()?.to_str()?;
    let (sidecar_name, _) = name.rsplit_once(SECTION_SEPARATOR)?;
    Some(location.with_file_name(sidecar_name))
}

fn escape_section_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '%' | '/' | '\\' | '#' | ':' => escaped.push_str(&format!("%{:02X}", ch as u32)),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
