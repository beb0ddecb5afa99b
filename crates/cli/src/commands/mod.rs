//! Command implementations.
//!
//! Every command opens the persisted cart, runs one operation and exits. The
//! cart file and the session flag file live side by side (see
//! [`CartConfig::session_path`]).

pub mod cart;
pub mod session;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use basket_cart::config::ConfigError;
use basket_cart::{
    ApiError, AuthSession, BackendClient, CachedCatalog, CartConfig, CartContainer, CartError,
    FileStore,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend client could not be built.
    #[error("Backend error: {0}")]
    Backend(#[from] ApiError),

    /// Cart operation failed.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Session flag file could not be read or written.
    #[error("Session file {path}: {message}")]
    SessionFile { path: PathBuf, message: String },
}

/// Persisted session flag.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    active: bool,
}

/// An opened cart plus the session flag it follows.
pub struct App {
    pub cart: CartContainer,
    pub session: AuthSession,
    session_path: PathBuf,
}

impl App {
    /// Open the cart described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `CliError` if the backend client cannot be built or the
    /// session file is unreadable.
    pub async fn open(config: &CartConfig) -> Result<Self, CliError> {
        let client = BackendClient::new(&config.backend)?;
        let catalog = CachedCatalog::new(Arc::new(client.clone()), config.catalog_cache_ttl);
        let store = FileStore::new(&config.state_path);

        let session_path = config.session_path();
        let session = AuthSession::new(read_session(&session_path).await?);

        let cart = CartContainer::restore(
            Arc::new(client),
            Arc::new(catalog),
            Arc::new(store),
            session.watch(),
        )
        .await;

        Ok(Self {
            cart,
            session,
            session_path,
        })
    }

    /// Persist the current session flag.
    ///
    /// # Errors
    ///
    /// Returns `CliError::SessionFile` if the file cannot be written.
    pub async fn save_session(&self) -> Result<(), CliError> {
        let file = SessionFile {
            active: self.session.is_active(),
        };
        let bytes = serde_json::to_vec_pretty(&file)
            .map_err(|e| session_error(&self.session_path, &e))?;

        if let Some(parent) = self.session_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| session_error(&self.session_path, &e))?;
        }
        tokio::fs::write(&self.session_path, bytes)
            .await
            .map_err(|e| session_error(&self.session_path, &e))
    }
}

async fn read_session(path: &Path) -> Result<bool, CliError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice::<SessionFile>(&bytes)
            .map(|file| file.active)
            .map_err(|e| session_error(path, &e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(session_error(path, &e)),
    }
}

fn session_error(path: &Path, e: &dyn std::fmt::Display) -> CliError {
    CliError::SessionFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
