//! Cart persistence.
//!
//! The container saves both collections (never the aggregates) after every
//! change and restores them at startup. [`FileStore`] writes a versioned JSON
//! document atomically (write to a temp file, then rename); [`MemoryStore`]
//! keeps the latest snapshot in process.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use basket_core::CartCollections;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// Errors that can occur when loading or saving the cart.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document is not valid JSON for this format.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stored document was written by an incompatible version.
    #[error("Unsupported cart format version {0}")]
    UnsupportedVersion(u32),
}

/// Load/save boundary for the cart collections.
#[async_trait]
pub trait CartPersistence: Send + Sync {
    /// Load the last saved collections, `None` if nothing was saved yet.
    async fn load(&self) -> Result<Option<CartCollections>, StoreError>;

    /// Save the collections, replacing any previous snapshot.
    async fn save(&self, cart: &CartCollections) -> Result<(), StoreError>;
}

/// On-disk document.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedCart {
    version: u32,
    saved_at: DateTime<Utc>,
    #[serde(flatten)]
    cart: CartCollections,
}

/// JSON file persistence.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Persist to `path`. Parent directories are created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the cart file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

#[async_trait]
impl CartPersistence for FileStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<CartCollections>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No saved cart");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let persisted: PersistedCart = serde_json::from_slice(&bytes)?;
        if persisted.version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion(persisted.version));
        }

        Ok(Some(persisted.cart))
    }

    #[instrument(skip(self, cart), fields(path = %self.path.display()))]
    async fn save(&self, cart: &CartCollections) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let document = PersistedCart {
            version: FORMAT_VERSION,
            saved_at: Utc::now(),
            cart: cart.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&document)?;

        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

/// In-process persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<CartCollections>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    /// Start from a previously saved snapshot.
    #[must_use]
    pub fn with_snapshot(cart: CartCollections) -> Self {
        Self {
            snapshot: Mutex::new(Some(cart)),
            saves: Mutex::new(0),
        }
    }

    /// The latest saved snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Option<CartCollections> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times `save` was called.
    #[must_use]
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CartPersistence for MemoryStore {
    async fn load(&self) -> Result<Option<CartCollections>, StoreError> {
        Ok(self.snapshot())
    }

    async fn save(&self, cart: &CartCollections) -> Result<(), StoreError> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(cart.clone());
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}
