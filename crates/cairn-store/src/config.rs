//! Persistence tier configuration (`[store]` section of `.cairn/config.toml`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::DurableBackend;
use crate::file_backend::FileBackend;

/// Maximum entries kept per log table.
pub const DEFAULT_MAX_LOG_SIZE: usize = 1000;

/// How long the tier waits for the durable backend at startup.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Which durable backend to replicate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// JSON files under `data_dir`.
    File,
    /// In-memory only.
    None,
}

/// Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Durable backend: "file" or "none".
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Root directory for the file backend (relative paths are resolved
    /// against the project root by [`StoreConfig::rooted`]).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Maximum entries per log table.
    #[serde(default = "default_max_log_size")]
    pub max_log_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: default_data_dir(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_log_size: default_max_log_size(),
        }
    }
}

// Serde default functions
fn default_backend() -> BackendKind {
    BackendKind::File
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".cairn/store")
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_millis() as u64
}

fn default_max_log_size() -> usize {
    DEFAULT_MAX_LOG_SIZE
}

impl StoreConfig {
    /// Config with no durable backend.
    pub fn in_memory() -> Self {
        Self {
            backend: BackendKind::None,
            ..Self::default()
        }
    }

    /// Config replicating to a file backend at `data_dir`.
    pub fn file(data_dir: impl AsRef<Path>) -> Self {
        Self {
            backend: BackendKind::File,
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Resolve a relative `data_dir` against `root`.
    pub fn rooted(mut self, root: &Path) -> Self {
        if self.data_dir.is_relative() {
            self.data_dir = root.join(&self.data_dir);
        }
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Instantiate the configured backend (not yet connected).
    pub fn durable_backend(&self) -> Option<Box<dyn DurableBackend>> {
        match self.backend {
            BackendKind::File => Some(Box::new(FileBackend::new(&self.data_dir))),
            BackendKind::None => None,
        }
    }
}
