//! Local device preferences.
//!
//! A single small JSON file. Today it only records whether the welcome
//! flow has been shown.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PrefsError {
    #[error("Failed to access preferences at {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Preferences file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PrefsFile {
    first_launch_seen: bool,
}

/// Key-value preferences backed by a file.
#[derive(Debug, Clone)]
pub struct Preferences {
    path: Utf8PathBuf,
}

impl Preferences {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Preferences { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn read(&self) -> Result<PrefsFile, PrefsError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(PrefsFile::default()),
            Err(source) => Err(PrefsError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn write(&self, prefs: &PrefsFile) -> Result<(), PrefsError> {
        let io_error = |source: io::Error| PrefsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let content = serde_json::to_string_pretty(prefs)?;
        fs::write(&self.path, content).map_err(io_error)
    }

    /// Whether the first-launch flow has already been shown. A missing
    /// file reads as `false`.
    pub fn first_launch_seen(&self) -> Result<bool, PrefsError> {
        Ok(self.read()?.first_launch_seen)
    }

    pub fn mark_first_launch_seen(&self) -> Result<(), PrefsError> {
        let mut prefs = self.read()?;
        prefs.first_launch_seen = true;
        self.write(&prefs)?;
        debug!(path = %self.path, "first launch recorded");
        Ok(())
    }
}
