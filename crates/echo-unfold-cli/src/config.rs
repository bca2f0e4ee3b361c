// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Settings for the unfold CLI: a storage port, a JSON service over it, and a
//! filesystem adapter.

use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use echo_unfold::{EquivalenceMode, PetriNet, SilentTransitions, UnfoldOptions};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Key under which the unfold settings are stored.
pub const SETTINGS_KEY: &str = "unfold";

/// Storage port for raw config blobs (keyed by logical name).
pub trait ConfigStore {
    /// Load a raw config blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw config blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// The platform config directory could not be resolved.
    #[error("could not resolve config dir")]
    NoConfigDir,
}

/// Thin service that serializes config values and delegates storage to a `ConfigStore`.
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Load and deserialize a config value for `key`. Returns `Ok(None)` if missing.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) => {
                if bytes.is_empty() {
                    return Ok(None);
                }
                let value = serde_json::from_slice(&bytes)?;
                Ok(Some(value))
            }
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist a config value for `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }
}

/// JSON files on disk: `<base>/<key>.json`, or one pinned file for every key.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    base: PathBuf,
    pinned: Option<PathBuf>,
}

impl FileConfigStore {
    /// Store rooted at the user config directory (e.g. `~/.config/Echo`).
    ///
    /// The directory is only created on the first save.
    pub fn user() -> Result<Self, ConfigError> {
        let proj =
            ProjectDirs::from("dev", "flyingrobots", "Echo").ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::with_base(proj.config_dir()))
    }

    /// Store rooted at `base`.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            pinned: None,
        }
    }

    /// Store that reads and writes `file` regardless of the key.
    pub fn pinned(file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        Self {
            base: file.parent().map(PathBuf::from).unwrap_or_default(),
            pinned: Some(file),
        }
    }

    /// File backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        match &self.pinned {
            Some(file) => file.clone(),
            None => self.base.join(format!("{key}.json")),
        }
    }
}

impl ConfigStore for FileConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}

/// Persisted unfold settings. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnfoldSettings {
    /// Equivalence mode.
    pub mode: EquivalenceMode,
    /// Lexicographic tie-break for equal-size configurations.
    pub lexicographic: bool,
    /// Event budget; `None` is unbounded.
    pub max_events: Option<usize>,
    /// Transition names treated as silent in addition to detected ones.
    pub silent: Vec<String>,
    /// Treat unnamed and `"tau "`-prefixed transitions as silent.
    pub detect_silent: bool,
}

impl Default for UnfoldSettings {
    fn default() -> Self {
        Self {
            mode: EquivalenceMode::default(),
            lexicographic: false,
            max_events: None,
            silent: Vec::new(),
            detect_silent: true,
        }
    }
}

impl UnfoldSettings {
    /// Driver options.
    pub fn options(&self) -> UnfoldOptions {
        UnfoldOptions {
            mode: self.mode,
            lexicographic: self.lexicographic,
            max_events: self.max_events,
        }
    }

    /// Silent transitions of `net` under these settings.
    pub fn silent_transitions(&self, net: &PetriNet) -> SilentTransitions {
        let mut silent = if self.detect_silent {
            SilentTransitions::detect(net)
        } else {
            SilentTransitions::none()
        };
        silent.extend(self.silent.iter().cloned());
        silent
    }
}
