//! Basket cart state container.
//!
//! This crate owns the shopper's cart: an anonymous collection kept entirely
//! on this side, and a mirror of the backend cart used while signed in. The
//! session flag decides which one every operation sees.
//!
//! # Architecture
//!
//! - [`container::CartContainer`] - the single owner of cart state
//! - [`gateway::CartGateway`] - backend cart operations, implemented over
//!   REST by [`backend::BackendClient`]
//! - [`catalog::Catalog`] - product lookups, cached via `moka`
//! - [`store::CartPersistence`] - saves both collections after each change
//! - [`session`] - the session flag and the listener that runs
//!   merge-on-login
//!
//! # Example
//!
//! ```rust,ignore
//! use basket_cart::{AuthSession, CartContainer, FileStore};
//!
//! let session = AuthSession::default();
//! let cart = CartContainer::restore(gateway, catalog, store, session.watch()).await;
//! tokio::spawn(basket_cart::session::follow_session(cart.clone(), session.watch()));
//!
//! cart.add_product(&"P1".into(), 2, None).await?;
//! println!("{} items", cart.totals().total_items);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod catalog;
pub mod config;
pub mod container;
pub mod error;
pub mod events;
pub mod gateway;
pub mod session;
pub mod store;
pub mod view;

pub use backend::{ApiError, BackendClient};
pub use catalog::{CachedCatalog, Catalog, StaticCatalog};
pub use config::CartConfig;
pub use container::{CartContainer, MergeFailure, MergeReport, SyncOutcome};
pub use error::{CartError, Mutation};
pub use events::CartEvent;
pub use gateway::CartGateway;
pub use session::{AuthSession, SessionWatch};
pub use store::{CartPersistence, FileStore, MemoryStore, StoreError};
pub use view::CartView;
