//! JSON files on disk backing [`Persistence`].

use crate::Persistence;
use crate::constants::{PROFILE_FILE, STATS_FILE, TOWERS_BACKUP_FILE, TOWERS_FILE};
use crate::data::Towers;
use crate::profile::UserProfile;
use crate::stats::PlaythroughStats;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Stats and profile live in `state_dir`; tower prices in `data_dir`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    state_dir: PathBuf,
    data_dir: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(state_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            data_dir: data_dir.into(),
        }
    }

    #[must_use]
    pub fn stats_path(&self) -> PathBuf {
        self.state_dir.join(STATS_FILE)
    }

    #[must_use]
    pub fn profile_path(&self) -> PathBuf {
        self.state_dir.join(PROFILE_FILE)
    }
}

/// Reads `path`, yielding the default value when it does not exist.
fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StorageError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            log::debug!("{} not found, starting empty", path.display());
            return Ok(T::default());
        }
        Err(source) => {
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&text).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Replaces `path` with the pretty-printed value through a sibling temp file.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let io_err = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &buf).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}

impl Persistence for JsonFileStore {
    type Error = StorageError;

    fn load_stats(&self) -> Result<PlaythroughStats, Self::Error> {
        read_or_default(&self.stats_path())
    }

    fn save_stats(&self, stats: &PlaythroughStats) -> Result<(), Self::Error> {
        write_json(&self.stats_path(), stats)
    }

    fn load_profile(&self) -> Result<UserProfile, Self::Error> {
        read_or_default(&self.profile_path())
    }

    fn save_profile(&self, profile: &UserProfile) -> Result<(), Self::Error> {
        write_json(&self.profile_path(), profile)
    }

    fn save_towers(&self, towers: &Towers, previous: &Towers) -> Result<(), Self::Error> {
        write_json(&self.data_dir.join(TOWERS_BACKUP_FILE), previous)?;
        write_json(&self.data_dir.join(TOWERS_FILE), towers)
    }
}
