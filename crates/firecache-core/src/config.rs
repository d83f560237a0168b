//! Cache configuration management.
//!
//! Holds the storage-key namespace and the directory cached records are
//! written to. Configuration is stored at `~/.config/firecache/config.json`
//! and may be overridden with `FIRECACHE_NAMESPACE` / `FIRECACHE_CACHE_DIR`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_NAMESPACE;
use crate::error::StorageError;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "firecache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_NAMESPACE: &str = "FIRECACHE_NAMESPACE";
const ENV_CACHE_DIR: &str = "FIRECACHE_CACHE_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub namespace: String,
    pub cache_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            cache_dir: None,
        }
    }
}

impl CacheConfig {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self, StorageError> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, StorageError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents).map_err(|source| StorageError::Corrupt {
                path: path.to_path_buf(),
                source,
            })
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<(), StorageError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self).map_err(|source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(namespace) = lookup(ENV_NAMESPACE).filter(|s| !s.is_empty()) {
            self.namespace = namespace;
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|s| !s.is_empty()) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
    }

    fn config_path() -> Result<PathBuf, StorageError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| StorageError::Unavailable("Could not find config directory".to_string()))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for cached records: the configured one, or the platform
    /// cache directory.
    pub fn cache_dir(&self) -> Result<PathBuf, StorageError> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| StorageError::Unavailable("Could not find cache directory".to_string()))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_namespace() {
        let config = CacheConfig::default();
        assert_eq!(config.namespace, "@FirebaseLocalCache");
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = CacheConfig {
            namespace: "@Custom".to_string(),
            cache_dir: Some(dir.path().join("records")),
        };
        config.save_to(&path).unwrap();
        assert_eq!(CacheConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"cache_dir": "/tmp/records"}"#).unwrap();
        let config = CacheConfig::load_from(&path).unwrap();
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/records")));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CacheConfig::default();
        config.apply_env_overrides(|name| match name {
            ENV_NAMESPACE => Some("@FromEnv".to_string()),
            ENV_CACHE_DIR => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.namespace, "@FromEnv");
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn test_explicit_cache_dir_wins() {
        let config = CacheConfig {
            cache_dir: Some(PathBuf::from("/tmp/firecache")),
            ..Default::default()
        };
        assert_eq!(config.cache_dir().unwrap(), PathBuf::from("/tmp/firecache"));
    }
}
