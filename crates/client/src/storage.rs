//! Unstructured key-value storage on disk.
//!
//! The mobile build keeps credentials and small caches in the platform's
//! key-value store; here each key is a file under the configured data
//! directory. No schema versioning: values are raw strings, with JSON
//! helpers for structured entries.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::fs;

/// Errors that can occur reading or writing local storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON entry failed to encode or decode.
    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Well-known storage keys.
pub mod keys {
    /// Key for the bearer access token.
    pub const ACCESS_TOKEN: &str = "access_token";

    /// Key for the refresh credential.
    pub const REFRESH_TOKEN: &str = "refresh_token";

    /// Key for the logged-in user's identifier.
    pub const USER_ID: &str = "user_id";

    /// Key for the logged-in user's record (JSON).
    pub const USER_RECORD: &str = "user_record";

    /// Key for the last-fetched order list (JSON), served when offline.
    pub const CACHED_ORDERS: &str = "cached_orders";

    /// Key for an order awaiting submission after a successful gateway
    /// payment that could not be finalized (JSON).
    pub const PENDING_ORDER: &str = "pending_gateway_order";
}

/// File-per-key storage rooted at a data directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Create a handle rooted at `root`. The directory is created lazily on
    /// first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory this store writes under.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Read the raw value stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error for any I/O failure other than the file not existing.
    pub async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.entry_path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created or written.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await?;
        fs::write(self.entry_path(key), value).await?;
        Ok(())
    }

    /// Remove the value stored under `key`. Removing an absent key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error for any I/O failure other than the file not existing.
    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read and decode the JSON value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or if the stored value is not valid
    /// JSON for `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encode `value` as JSON and store it under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw).await
    }
}
