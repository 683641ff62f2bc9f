//! Store configuration
//!
//! Loaded from RON or built in code:
//!
//! ```ron
//! (
//!     name: "notes",
//!     directory: Some("/var/lib/notes"),
//! )
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Base directory used when no directory is configured
pub const DEFAULT_BASE_DIR: &str = ".tidepool";
/// Subdirectory of the base that holds store files
pub const DATA_DIR: &str = "core_data";
/// Store file extension
pub const FILE_EXTENSION: &str = "redb";

/// Where and how a store is opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store file name without extension
    #[serde(default = "default_name")]
    pub name: String,
    /// Directory holding the store file
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Keep everything in memory; nothing touches the filesystem
    #[serde(default)]
    pub in_memory: bool,
}

fn default_name() -> String {
    "store".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            directory: None,
            in_memory: false,
        }
    }
}

impl StoreConfig {
    /// On-disk store called `name` in the default location
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// In-memory store
    pub fn in_memory() -> Self {
        Self {
            in_memory: true,
            ..Self::default()
        }
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Parse a RON document
    pub fn from_ron(source: &str) -> Result<Self> {
        let config: StoreConfig = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_ron(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::Config("store name must not be empty".to_string()));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(Error::Config(format!(
                "store name must be a plain file name: {}",
                self.name
            )));
        }
        Ok(())
    }

    /// Directory the store file lives in
    pub fn data_dir(&self) -> PathBuf {
        match &self.directory {
            Some(dir) => dir.clone(),
            None => Path::new(DEFAULT_BASE_DIR).join(DATA_DIR),
        }
    }

    /// Full path of the store file
    pub fn store_path(&self) -> PathBuf {
        self.data_dir()
            .join(format!("{}.{}", self.name.trim(), FILE_EXTENSION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_location() {
        let config = StoreConfig::default();
        assert_eq!(
            config.store_path(),
            PathBuf::from(".tidepool/core_data/store.redb")
        );
        assert!(!config.in_memory);
    }

    #[test]
    fn test_custom_directory() {
        let config = StoreConfig::named("notes").with_directory("/tmp/app");
        assert_eq!(config.store_path(), PathBuf::from("/tmp/app/notes.redb"));
    }

    #[test]
    fn test_from_ron() {
        let config = StoreConfig::from_ron(r#"(name: "notes", directory: Some("data"))"#).unwrap();
        assert_eq!(config.name, "notes");
        assert_eq!(config.directory, Some(PathBuf::from("data")));

        let defaults = StoreConfig::from_ron("()").unwrap();
        assert_eq!(defaults, StoreConfig::default());

        let memory = StoreConfig::from_ron("(in_memory: true)").unwrap();
        assert!(memory.in_memory);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            StoreConfig::from_ron(r#"(name: "")"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            StoreConfig::from_ron(r#"(name: "a/b")"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(StoreConfig::from_ron("(name: "), Err(Error::Ron(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.ron");
        fs::write(&path, r#"(name: "journal")"#).unwrap();
        let config = StoreConfig::load(&path).unwrap();
        assert_eq!(config.name, "journal");

        let missing = StoreConfig::load(dir.path().join("missing.ron"));
        assert!(matches!(missing, Err(Error::Io(_))));
    }
}
