//! Core types for the cart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod line;
pub mod price;
pub mod product;

pub use id::*;
pub use line::{CartLine, LineKey, QuantityError, apply_delta};
pub use price::{CurrencyCode, Price, UnknownCurrency};
pub use product::ProductReference;
