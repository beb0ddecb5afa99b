//! Cart line type and quantity arithmetic.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{LineId, Price, ProductId, ProductReference};

/// Errors produced by quantity arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuantityError {
    /// A new line must hold at least one unit.
    #[error("quantity must be at least 1")]
    Zero,
    /// The resulting quantity does not fit the line's counter.
    #[error("quantity overflow: {0}")]
    Overflow(i64),
}

/// Identity of a logical line within one collection.
///
/// Two lines with the same key never coexist in a collection; adding an
/// existing key increments the existing line instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    /// Product the line refers to.
    pub product_id: ProductId,
    /// Selected variant, if any.
    pub variant: Option<String>,
}

impl LineKey {
    /// Create a key from a product and an optional variant.
    #[must_use]
    pub fn new(product_id: ProductId, variant: Option<String>) -> Self {
        Self {
            product_id,
            variant,
        }
    }

    /// Whether `line` carries this key.
    #[must_use]
    pub fn matches(&self, line: &CartLine) -> bool {
        self.product_id == line.product_id && self.variant == line.selected_variant
    }
}

/// A line item in a cart collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Collection-scoped line ID (server-issued or `local-` prefixed).
    pub line_id: LineId,
    /// Product this line refers to.
    pub product_id: ProductId,
    /// Units of the product, always at least 1 while the line exists.
    pub quantity: u32,
    /// Selected variant, if any.
    pub selected_variant: Option<String>,
    /// Product data captured when the line was created or last synced.
    pub product: ProductReference,
}

impl CartLine {
    /// Build a new anonymous-cart line with a locally generated ID.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::Zero` if `quantity` is zero.
    pub fn new_local(
        product: ProductReference,
        quantity: u32,
        selected_variant: Option<String>,
    ) -> Result<Self, QuantityError> {
        if quantity == 0 {
            return Err(QuantityError::Zero);
        }
        Ok(Self {
            line_id: LineId::local(),
            product_id: product.id.clone(),
            quantity,
            selected_variant,
            product,
        })
    }

    /// The identity key of this line.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product_id.clone(), self.selected_variant.clone())
    }

    /// Price of all units on this line.
    #[must_use]
    pub fn line_price(&self) -> Price {
        self.product.unit_price.times(self.quantity)
    }
}

/// Apply a signed delta to a quantity.
///
/// Returns `Ok(None)` when the result is zero or negative, meaning the line
/// must be removed rather than stored with a non-positive quantity.
///
/// # Errors
///
/// Returns `QuantityError::Overflow` if the result exceeds `u32::MAX`.
pub fn apply_delta(current: u32, delta: i64) -> Result<Option<u32>, QuantityError> {
    let next = i64::from(current).saturating_add(delta);
    if next <= 0 {
        return Ok(None);
    }
    u32::try_from(next)
        .map(Some)
        .map_err(|_| QuantityError::Overflow(next))
}
