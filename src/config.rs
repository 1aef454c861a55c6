//! Configuration handling for sectional.
//! The configuration is built once at startup and handed to a
//! [`Pipeline`](crate::pipeline::Pipeline); there is no process-wide state.

use crate::error::{Error, Result};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Supported configuration file names
pub const CONFIG_FILES: [&str; 3] = ["sectional.json", "sectional.yml", "sectional.yaml"];

/// Directory created under the system temp location when no cache dir is set.
const DEFAULT_CACHE_SUBDIR: &str = "sectional";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root for relative template references
    pub base_dir: PathBuf,
    /// Root for compiled artifacts
    pub cache_dir: Option<PathBuf>,
    /// Always recompile; the disk cache is still written
    pub disable_cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            cache_dir: None,
            disable_cache: false,
        }
    }
}

impl Config {
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_cache_dir<P: Into<PathBuf>>(mut self, cache_dir: P) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    pub fn with_disable_cache(mut self, disable_cache: bool) -> Self {
        self.disable_cache = disable_cache;
        self
    }

    /// Directory compiled artifacts are written under.
    pub fn cache_root(&self) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => dir.clone(),
            None => std::env::temp_dir().join(DEFAULT_CACHE_SUBDIR),
        }
    }

    /// Makes relative directories absolute against `dir`.
    fn rebase(mut self, dir: &Path) -> Self {
        if self.base_dir.is_relative() {
            self.base_dir = dir.join(&self.base_dir);
        }
        if let Some(cache_dir) = self.cache_dir.as_mut() {
            if cache_dir.is_relative() {
                *cache_dir = dir.join(&*cache_dir);
            }
        }
        self
    }
}

/// Parses configuration content, trying JSON first and YAML second.
///
/// # Errors
/// * `Error::ConfigError` if the content is neither valid JSON nor YAML
pub fn parse_config(content: &str) -> Result<Config> {
    match serde_json::from_str(content) {
        Ok(config) => Ok(config),
        Err(_) => serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration format: {}", e))),
    }
}

/// Loads configuration from `dir`, trying each of [`CONFIG_FILES`] in order.
///
/// Relative paths in the file are taken relative to `dir`. When no file is
/// present the defaults are returned, with `base_dir` set to `dir`.
pub fn load_config<P: AsRef<Path>>(dir: P) -> Result<Config> {
    let dir = dir.as_ref();
    for file in CONFIG_FILES {
        let config_path = dir.join(file);
        if config_path.exists() {
            debug!("Loading configuration from {}", config_path.display());
            let content = std::fs::read_to_string(&config_path)?;
            return Ok(parse_config(&content)?.rebase(dir));
        }
    }

    debug!("No configuration file in {}, using defaults", dir.display());
    Ok(Config::default().rebase(dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_and_yaml() {
        let json = parse_config(r#"{"base_dir": "views", "disable_cache": true}"#).unwrap();
        assert_eq!(json.base_dir, PathBuf::from("views"));
        assert!(json.disable_cache);
        assert_eq!(json.cache_dir, None);

        let yaml = parse_config("base_dir: views\ncache_dir: /var/cache/views\n").unwrap();
        assert_eq!(yaml.cache_dir, Some(PathBuf::from("/var/cache/views")));
        assert!(!yaml.disable_cache);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_config("base_dir: [unclosed"), Err(Error::ConfigError(_))));
    }

    #[test]
    fn default_cache_root_is_under_temp() {
        let config = Config::new("/srv/views");
        assert_eq!(config.cache_root(), std::env::temp_dir().join("sectional"));
        let config = config.with_cache_dir("/var/cache/views");
        assert_eq!(config.cache_root(), PathBuf::from("/var/cache/views"));
    }
}
