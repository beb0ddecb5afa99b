//! Cart operations against the backend.

use async_trait::async_trait;
use basket_core::{CartLine, LineId, ProductId};
use reqwest::Method;
use tracing::{instrument, warn};

use super::conversions::convert_line;
use super::types::{
    AddLineRequest, LineRecord, LinesResponse, QuantityChangeRequest, VariantChangeRequest,
};
use super::{ApiError, BackendClient};
use crate::gateway::CartGateway;

#[async_trait]
impl CartGateway for BackendClient {
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn add(
        &self,
        product_id: &ProductId,
        quantity: u32,
        variant: Option<&str>,
    ) -> Result<CartLine, ApiError> {
        let body = AddLineRequest {
            product_id: product_id.to_string(),
            quantity,
            variant: variant.map(str::to_string),
        };

        let request = self.request(Method::POST, &["cart", "lines"])?.json(&body);
        let line: LineRecord = self.execute_json(request).await?;
        convert_line(line)
    }

    #[instrument(skip(self), fields(line_id = %line_id))]
    async fn remove(&self, line_id: &LineId) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, &["cart", "lines", line_id.as_str()])?;
        self.execute(request).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(line_id = %line_id))]
    async fn update_quantity(&self, line_id: &LineId, delta: i64) -> Result<(), ApiError> {
        let request = self
            .request(
                Method::PATCH,
                &["cart", "lines", line_id.as_str(), "quantity"],
            )?
            .json(&QuantityChangeRequest { delta });
        self.execute(request).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(line_id = %line_id))]
    async fn update_variant(&self, line_id: &LineId, variant: &str) -> Result<(), ApiError> {
        let request = self
            .request(
                Method::PATCH,
                &["cart", "lines", line_id.as_str(), "variant"],
            )?
            .json(&VariantChangeRequest {
                variant: variant.to_string(),
            });
        self.execute(request).await?;
        Ok(())
    }

    /// Lines the cart cannot hold are skipped and logged rather than failing
    /// the whole listing.
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<CartLine>, ApiError> {
        let request = self.request(Method::GET, &["cart", "lines"])?;
        let response: LinesResponse = self.execute_json(request).await?;

        Ok(response
            .lines
            .into_iter()
            .filter_map(|line| match convert_line(line) {
                Ok(line) => Some(line),
                Err(e) => {
                    warn!(error = %e, "Skipping unusable cart line from backend");
                    None
                }
            })
            .collect())
    }
}
