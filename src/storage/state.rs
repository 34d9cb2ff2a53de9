//! Per-plugin state documents
//!
//! Each plugin may own one YAML document at `<state_dir>/<plugin-id>.state`.
//! The document is read once when the plugin is constructed and only written
//! back when the plugin asks for it to be persisted.

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::domain::PluginId;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("State for plugin '{0}' is not available: no state directory configured")]
    NotConfigured(PluginId),
}

/// A YAML file read once into memory
///
/// A missing file is not an error, it just yields no data. A file that
/// cannot be read or parsed is logged and also yields no data.
#[derive(Debug, Clone)]
pub struct PluginFile {
    path: PathBuf,
    data: Option<serde_yaml::Value>,
}

impl PluginFile {
    /// Reads the file at `path`
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = Self::read(&path);
        Self { path, data }
    }

    fn read(path: &Path) -> Option<serde_yaml::Value> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(file = %path.display(), "No state file yet");
                return None;
            }
            Err(e) => {
                error!(file = %path.display(), error = %e, "Failed to read state file");
                return None;
            }
        };

        match serde_yaml::from_str::<serde_yaml::Value>(&content) {
            // An empty document parses as null
            Ok(serde_yaml::Value::Null) => None,
            Ok(value) => Some(value),
            Err(e) => {
                error!(file = %path.display(), error = %e, "Error in state file");
                None
            }
        }
    }

    /// Returns the path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the in-memory data
    pub fn data(&self) -> Option<&serde_yaml::Value> {
        self.data.as_ref()
    }

    /// Replaces the in-memory data
    pub fn set_data(&mut self, data: Option<serde_yaml::Value>) {
        self.data = data;
    }

    /// Decodes the in-memory data into a typed value
    pub fn typed<T: DeserializeOwned>(&self) -> Option<T> {
        let value = self.data.clone()?;
        match serde_yaml::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                error!(file = %self.path.display(), error = %e, "State does not match expected shape");
                None
            }
        }
    }
}

/// A plugin's persisted state
#[derive(Debug, Clone)]
pub struct PluginState {
    file: PluginFile,
}

impl PluginState {
    /// Opens the state document at an explicit path
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            file: PluginFile::open(path),
        }
    }

    /// Opens the state document for a plugin inside a state directory
    pub fn for_plugin(state_dir: &Path, id: &PluginId) -> Self {
        Self::open(state_dir.join(id.state_file_name()))
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn data(&self) -> Option<&serde_yaml::Value> {
        self.file.data()
    }

    pub fn set_data(&mut self, data: Option<serde_yaml::Value>) {
        self.file.set_data(data);
    }

    /// Serializes a typed value into the in-memory data
    pub fn set<T: Serialize>(&mut self, value: &T) -> Result<(), StateError> {
        let value = serde_yaml::to_value(value)?;
        self.file.set_data(Some(value));
        Ok(())
    }

    pub fn typed<T: DeserializeOwned>(&self) -> Option<T> {
        self.file.typed()
    }

    /// Writes the in-memory data to disk, replacing the whole file
    pub fn persist(&self) -> Result<(), StateError> {
        let path = self.file.path();
        let content = match self.file.data() {
            Some(data) => serde_yaml::to_string(data)?,
            None => String::new(),
        };

        let write_err = |source: io::Error| StateError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        // Write to temp file first
        let temp_path = path.with_extension("state.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(write_err)?;

            file.lock_exclusive().map_err(write_err)?;

            let mut writer = BufWriter::new(&file);
            writer.write_all(content.as_bytes()).map_err(write_err)?;
            writer.flush().map_err(write_err)?;
        }

        // Atomic rename
        fs::rename(&temp_path, path).map_err(write_err)?;

        debug!(file = %path.display(), "State persisted");
        Ok(())
    }
}
