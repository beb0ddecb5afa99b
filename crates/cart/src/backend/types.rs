//! Wire types for the cart backend's JSON API.
//!
//! These mirror the backend payloads and stay separate from the domain
//! types in `basket_core`; see `conversions` for the mapping.

use serde::{Deserialize, Serialize};

/// Monetary amount with currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyRecord {
    /// Decimal amount as string (preserves precision).
    pub amount: String,
    /// ISO 4217 currency code.
    pub currency_code: String,
}

/// Product image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Image URL.
    pub url: String,
}

/// Product as returned by `GET products/{id}` and embedded in cart lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Product ID.
    pub id: String,
    /// Product title.
    pub title: String,
    /// Unit price.
    pub price: MoneyRecord,
    /// Product images, featured first.
    #[serde(default)]
    pub images: Vec<ImageRecord>,
}

/// A line of the server-side cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRecord {
    /// Server-issued line ID. Missing on malformed responses.
    #[serde(default)]
    pub id: Option<String>,
    /// Units on the line.
    pub quantity: i64,
    /// Selected variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Product data.
    pub product: ProductRecord,
}

/// Body of `GET cart/lines`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinesResponse {
    /// Lines in server order.
    pub lines: Vec<LineRecord>,
}

/// Body of `POST cart/lines`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddLineRequest {
    /// Product to add.
    pub product_id: String,
    /// Units to add.
    pub quantity: u32,
    /// Selected variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Body of `PATCH cart/lines/{id}/quantity`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuantityChangeRequest {
    /// Signed change applied to the line's quantity.
    pub delta: i64,
}

/// Body of `PATCH cart/lines/{id}/variant`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantChangeRequest {
    /// New variant for the line.
    pub variant: String,
}
