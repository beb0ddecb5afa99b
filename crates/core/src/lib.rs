//! Basket Core - Shared cart types.
//!
//! This crate provides common types used across all basket components:
//! - `cart` - Cart state container, gateway, catalog and persistence
//! - `cli` - Command-line front end over a persisted cart
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no persistence. Everything here is a deterministic function of
//! its inputs, which keeps the aggregate math easy to test.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, product references and cart lines
//! - [`collections`] - The two-collection cart record and aggregate projections

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod collections;
pub mod types;

pub use collections::{CartCollections, CartMode, CartTotals};
pub use types::*;
