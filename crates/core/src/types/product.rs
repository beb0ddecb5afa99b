//! Product reference as supplied by the catalog.

use serde::{Deserialize, Serialize};

use super::{Price, ProductId};

/// Immutable snapshot of a catalog product referenced by cart lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductReference {
    /// Catalog product ID.
    pub id: ProductId,
    /// Price of a single unit.
    pub unit_price: Price,
    /// Title shown to shoppers.
    pub display_name: String,
    /// Image URLs, first one is the featured image.
    #[serde(default)]
    pub images: Vec<String>,
}

impl ProductReference {
    /// The featured image URL, if the product has any images.
    #[must_use]
    pub fn featured_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}
