#![forbid(unsafe_code)]

//! Configuration persistence boundary.
//!
//! A program saves a flat [`Properties`] map when it exits and gets it back
//! on the next standalone start. Where the map lives is decided by a
//! [`ConfigStore`]:
//!
//! | Store | Feature | Durability |
//! |-------|---------|------------|
//! | [`MemoryConfigStore`] | always | process lifetime |
//! | [`FileConfigStore`] | `config-file` | JSON file, atomic write-rename |
//!
//! Persistence failures never stop a program. The lifecycle reports them as
//! warnings and carries on.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

/// Flat string settings saved across runs.
pub type Properties = BTreeMap<String, String>;

/// Errors raised by a [`ConfigStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Stored data is readable but not a settings file.
    #[error("storage corruption: {0}")]
    Corruption(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Where program settings are kept between runs.
pub trait ConfigStore: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Load saved settings. `Ok(None)` means nothing was saved yet.
    fn load(&self) -> StorageResult<Option<Properties>>;

    /// Replace saved settings with `properties`.
    fn save(&self, properties: &Properties) -> StorageResult<()>;
}

/// In-memory store, shared between clones.
#[derive(Debug, Default, Clone)]
pub struct MemoryConfigStore {
    data: Arc<Mutex<Option<Properties>>>,
}

impl MemoryConfigStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `properties`.
    #[must_use]
    pub fn with_properties(properties: Properties) -> Self {
        Self {
            data: Arc::new(Mutex::new(Some(properties))),
        }
    }

    /// What was last saved, if anything.
    pub fn snapshot(&self) -> Option<Properties> {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn name(&self) -> &str {
        "MemoryConfigStore"
    }

    fn load(&self) -> StorageResult<Option<Properties>> {
        Ok(self.snapshot())
    }

    fn save(&self, properties: &Properties) -> StorageResult<()> {
        *self.data.lock().unwrap_or_else(PoisonError::into_inner) = Some(properties.clone());
        Ok(())
    }
}

#[cfg(feature = "config-file")]
mod file_store {
    use super::{ConfigStore, Properties, StorageError, StorageResult};
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use std::fs::{self, File};
    use std::io::{BufReader, BufWriter, Write};
    use std::path::{Path, PathBuf};

    /// File name used by [`FileConfigStore::default_location`].
    pub const DEFAULT_FILE_NAME: &str = "stagehand-settings.json";

    #[derive(Serialize, Deserialize)]
    struct SettingsFile {
        format_version: u32,
        properties: Properties,
    }

    impl SettingsFile {
        const FORMAT_VERSION: u32 = 1;
    }

    /// JSON settings file.
    ///
    /// # File Format
    ///
    /// ```json
    /// {
    ///   "format_version": 1,
    ///   "properties": { "speed": "fast" }
    /// }
    /// ```
    ///
    /// Writes go to `{path}.tmp` first, are synced, then renamed over `path`.
    pub struct FileConfigStore {
        path: PathBuf,
    }

    impl FileConfigStore {
        /// Store at `path`. The file is created on first save.
        #[must_use]
        pub fn new(path: impl AsRef<Path>) -> Self {
            Self {
                path: path.as_ref().to_path_buf(),
            }
        }

        /// Store in the system temp directory.
        #[must_use]
        pub fn default_location() -> Self {
            Self::new(std::env::temp_dir().join(DEFAULT_FILE_NAME))
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        fn temp_path(&self) -> PathBuf {
            let mut tmp = self.path.clone();
            tmp.set_extension("json.tmp");
            tmp
        }
    }

    impl ConfigStore for FileConfigStore {
        fn name(&self) -> &str {
            "FileConfigStore"
        }

        fn load(&self) -> StorageResult<Option<Properties>> {
            if !self.path.exists() {
                return Ok(None);
            }
            let reader = BufReader::new(File::open(&self.path)?);
            let file: SettingsFile = serde_json::from_reader(reader).map_err(|e| {
                if e.is_data() {
                    StorageError::Corruption(format!("not a settings file: {e}"))
                } else {
                    StorageError::Serialization(format!("failed to parse settings: {e}"))
                }
            })?;
            if file.format_version != SettingsFile::FORMAT_VERSION {
                return Err(StorageError::Corruption(format!(
                    "format version {} (expected {})",
                    file.format_version,
                    SettingsFile::FORMAT_VERSION
                )));
            }
            Ok(Some(file.properties))
        }

        fn save(&self, properties: &Properties) -> StorageResult<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = SettingsFile {
                format_version: SettingsFile::FORMAT_VERSION,
                properties: properties.clone(),
            };
            let tmp_path = self.temp_path();
            {
                let mut writer = BufWriter::new(File::create(&tmp_path)?);
                serde_json::to_writer_pretty(&mut writer, &file).map_err(|e| {
                    StorageError::Serialization(format!("failed to serialize settings: {e}"))
                })?;
                writer.flush()?;
                writer.get_ref().sync_all()?;
            }
            fs::rename(&tmp_path, &self.path)?;
            tracing::debug!(
                path = %self.path.display(),
                entries = properties.len(),
                "saved program settings"
            );
            Ok(())
        }
    }

    impl fmt::Debug for FileConfigStore {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("FileConfigStore")
                .field("path", &self.path)
                .finish()
        }
    }
}

#[cfg(feature = "config-file")]
pub use file_store::{DEFAULT_FILE_NAME, FileConfigStore};

/// When and where settings are persisted.
#[derive(Clone)]
pub struct PersistenceConfig {
    /// Backing store. `None` disables persistence.
    pub store: Option<Arc<dyn ConfigStore>>,
    /// Load settings on standalone start. Default: true.
    pub auto_load: bool,
    /// Save settings on exit. Default: true.
    pub auto_save: bool,
}

impl Default for PersistenceConfig {
    /// The JSON file in the temp directory when `config-file` is enabled,
    /// otherwise no persistence.
    fn default() -> Self {
        #[cfg(feature = "config-file")]
        let store: Option<Arc<dyn ConfigStore>> = Some(Arc::new(FileConfigStore::default_location()));
        #[cfg(not(feature = "config-file"))]
        let store: Option<Arc<dyn ConfigStore>> = None;
        Self {
            store,
            auto_load: true,
            auto_save: true,
        }
    }
}

impl PersistenceConfig {
    /// No persistence at all.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            store: None,
            auto_load: false,
            auto_save: false,
        }
    }

    #[must_use]
    pub fn with_store(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store: Some(store),
            auto_load: true,
            auto_save: true,
        }
    }

    #[must_use]
    pub fn auto_load(mut self, enabled: bool) -> Self {
        self.auto_load = enabled;
        self
    }

    #[must_use]
    pub fn auto_save(mut self, enabled: bool) -> Self {
        self.auto_save = enabled;
        self
    }

    /// The store to load from, if loading is enabled.
    pub fn load_store(&self) -> Option<&dyn ConfigStore> {
        self.store.as_deref().filter(|_| self.auto_load)
    }

    /// The store to save to, if saving is enabled.
    pub fn save_store(&self) -> Option<&dyn ConfigStore> {
        self.store.as_deref().filter(|_| self.auto_save)
    }
}

impl std::fmt::Debug for PersistenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceConfig")
            .field("store", &self.store.as_ref().map(|s| s.name().to_owned()))
            .field("auto_load", &self.auto_load)
            .field("auto_save", &self.auto_save)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Properties {
        let mut props = Properties::new();
        props.insert("speed".into(), "fast".into());
        props.insert("level".into(), "3".into());
        props
    }

    #[test]
    fn memory_store_starts_empty_and_keeps_last_save() {
        let store = MemoryConfigStore::new();
        assert!(store.load().unwrap().is_none());
        store.save(&sample()).unwrap();
        let clone = store.clone();
        assert_eq!(clone.load().unwrap(), Some(sample()));
    }

    #[test]
    fn disabled_persistence_exposes_no_store() {
        let config = PersistenceConfig::disabled();
        assert!(config.load_store().is_none());
        assert!(config.save_store().is_none());

        let config = PersistenceConfig::with_store(Arc::new(MemoryConfigStore::new())).auto_load(false);
        assert!(config.load_store().is_none());
        assert!(config.save_store().is_some());
    }

    #[cfg(feature = "config-file")]
    mod file {
        use super::*;

        #[test]
        fn missing_file_means_nothing_to_load() {
            let dir = tempfile::tempdir().unwrap();
            let store = FileConfigStore::new(dir.path().join("settings.json"));
            assert!(store.load().unwrap().is_none());
        }

        #[test]
        fn save_then_load() {
            let dir = tempfile::tempdir().unwrap();
            let store = FileConfigStore::new(dir.path().join("nested").join("settings.json"));
            store.save(&sample()).unwrap();
            assert_eq!(store.load().unwrap(), Some(sample()));
            assert!(!dir.path().join("nested").join("settings.json.tmp").exists());
        }

        #[test]
        fn foreign_json_is_corruption() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("settings.json");
            std::fs::write(&path, r#"{"hello": "world"}"#).unwrap();
            let err = FileConfigStore::new(&path).load().unwrap_err();
            assert!(matches!(err, StorageError::Corruption(_)), "{err}");
        }

        #[test]
        fn truncated_file_is_serialization_error() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("settings.json");
            std::fs::write(&path, "{\"format_version\": 1, \"prop").unwrap();
            let err = FileConfigStore::new(&path).load().unwrap_err();
            assert!(matches!(err, StorageError::Serialization(_)), "{err}");
        }

        #[test]
        fn default_location_is_in_temp_dir() {
            let store = FileConfigStore::default_location();
            assert_eq!(store.path(), std::env::temp_dir().join(DEFAULT_FILE_NAME));
        }
    }
}
