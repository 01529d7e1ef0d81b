use std::path::{Path, PathBuf};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

bitflags! {
    /// When the store hands elements to its cache.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CacheMode: u8 {
        /// Cache elements after they are loaded from disk.
        const ON_GET = 1 << 0;
        /// Cache elements after their background write succeeds.
        const ON_PUT = 1 << 1;
    }
}

/// Configuration for a [`FileStore`](crate::FileStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the element files.
    pub root: PathBuf,
    /// Number of elements kept in the LRU cache. Zero disables caching.
    pub cache_capacity: usize,
    /// When elements are pushed into the cache.
    pub cache_mode: CacheMode,
    /// Permission bits for created directories (Unix only).
    pub dir_mode: u32,
    /// Permission bits for created element files (Unix only).
    pub file_mode: u32,
    /// `fsync` every element file before closing it.
    pub sync_files: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("elements"),
            cache_capacity: 0,
            cache_mode: CacheMode::empty(),
            dir_mode: 0o700,
            file_mode: 0o600,
            sync_files: false,
        }
    }
}

impl StoreConfig {
    /// Default configuration rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Enable an LRU cache of `capacity` elements.
    pub fn with_cache(mut self, capacity: usize, mode: CacheMode) -> Self {
        self.cache_capacity = capacity;
        self.cache_mode = mode;
        self
    }

    pub fn with_sync_files(mut self, sync_files: bool) -> Self {
        self.sync_files = sync_files;
        self
    }

    /// Parse a TOML document. Missing keys take their default values.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.root, PathBuf::from("elements"));
        assert_eq!(c.cache_capacity, 0);
        assert!(c.cache_mode.is_empty());
        assert_eq!(c.dir_mode, 0o700);
        assert_eq!(c.file_mode, 0o600);
        assert!(!c.sync_files);
    }

    #[test]
    fn builder_methods() {
        let c = StoreConfig::new("/tmp/x")
            .with_cache(16, CacheMode::ON_GET | CacheMode::ON_PUT)
            .with_sync_files(true);
        assert_eq!(c.root, PathBuf::from("/tmp/x"));
        assert_eq!(c.cache_capacity, 16);
        assert!(c.cache_mode.contains(CacheMode::ON_GET));
        assert!(c.cache_mode.contains(CacheMode::ON_PUT));
        assert!(c.sync_files);
    }

    #[test]
    fn toml_with_defaults() {
        let c = StoreConfig::from_toml_str(
            r#"
            root = "/var/lib/elements"
            cache_capacity = 128
            cache_mode = "ON_GET | ON_PUT"
            "#,
        )
        .unwrap();
        assert_eq!(c.root, PathBuf::from("/var/lib/elements"));
        assert_eq!(c.cache_capacity, 128);
        assert_eq!(c.cache_mode, CacheMode::all());
        assert_eq!(c.file_mode, 0o600);
    }

    #[test]
    fn toml_rejects_bad_types() {
        let err = StoreConfig::from_toml_str("cache_capacity = \"lots\"").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.toml");
        std::fs::write(&path, "sync_files = true\n").unwrap();
        let c = StoreConfig::load(&path).unwrap();
        assert!(c.sync_files);
        assert_eq!(c.root, PathBuf::from("elements"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StoreConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
