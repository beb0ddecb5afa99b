//! Cart error handling.
//!
//! Every gateway failure is caught at the mutation boundary, rolled back and
//! logged before it reaches the caller as a [`CartError`]. None of these
//! errors leave the cart in a half-applied state, so callers can treat them
//! as "the attempted change reverted" and carry on.

use core::fmt;

use basket_core::{LineId, ProductId, QuantityError};
use thiserror::Error;

use crate::backend::ApiError;

/// Mutation kinds, used in errors, events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
    Add,
    Remove,
    UpdateQuantity,
    UpdateVariant,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::UpdateQuantity => "update quantity",
            Self::UpdateVariant => "update variant",
        })
    }
}

/// Errors returned by cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Referenced line or product does not exist. Nothing changed.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend rejected or failed the mutation. The change was reverted.
    #[error("Cart {operation} failed: {source}")]
    MutationFailed {
        /// Which mutation failed.
        operation: Mutation,
        /// Line the mutation targeted, if it had one.
        line_id: Option<LineId>,
        /// Underlying backend error.
        #[source]
        source: ApiError,
    },

    /// Quantity argument cannot be applied.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// Anonymous carts do not support variant changes.
    #[error("Variant changes require a signed-in session")]
    VariantChangeUnsupported,

    /// The change would create a second line with the same product and variant.
    #[error("Cart already has a line for product {0} with that variant")]
    DuplicateLine(ProductId),

    /// Catalog lookup failed for a reason other than a missing product.
    #[error("Catalog error: {0}")]
    Catalog(#[source] ApiError),
}

impl CartError {
    /// Whether this error means the backend call failed and was rolled back.
    #[must_use]
    pub const fn is_mutation_failure(&self) -> bool {
        matches!(self, Self::MutationFailed { .. })
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_error_display() {
        let err = CartError::NotFound("line local-1".to_string());
        assert_eq!(err.to_string(), "Not found: line local-1");

        let err = CartError::MutationFailed {
            operation: Mutation::Remove,
            line_id: Some(LineId::new("line-1")),
            source: ApiError::RateLimited(5),
        };
        assert_eq!(
            err.to_string(),
            "Cart remove failed: Rate limited, retry after 5 seconds"
        );
        assert!(err.is_mutation_failure());

        let err = CartError::InvalidQuantity(QuantityError::Zero);
        assert_eq!(err.to_string(), "Invalid quantity: quantity must be at least 1");
        assert!(!err.is_mutation_failure());
    }
}
