//! Cart backend gateway.
//!
//! The network boundary for authenticated carts. The container only talks to
//! the backend through this trait, which keeps it testable against scripted
//! gateways and independent of the transport.

use async_trait::async_trait;
use basket_core::{CartLine, LineId, ProductId};

use crate::backend::ApiError;

/// Operations on the server-side cart of the signed-in shopper.
///
/// Timeouts are the implementation's responsibility; the container never
/// cancels a call.
#[async_trait]
pub trait CartGateway: Send + Sync {
    /// Add units of a product, returning the canonical line.
    async fn add(
        &self,
        product_id: &ProductId,
        quantity: u32,
        variant: Option<&str>,
    ) -> Result<CartLine, ApiError>;

    /// Remove a line.
    async fn remove(&self, line_id: &LineId) -> Result<(), ApiError>;

    /// Apply a signed quantity change to a line.
    async fn update_quantity(&self, line_id: &LineId, delta: i64) -> Result<(), ApiError>;

    /// Change the selected variant of a line.
    async fn update_variant(&self, line_id: &LineId, variant: &str) -> Result<(), ApiError>;

    /// List every line of the server-side cart.
    async fn list(&self) -> Result<Vec<CartLine>, ApiError>;
}
