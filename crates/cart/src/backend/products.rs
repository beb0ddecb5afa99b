//! Product lookups against the backend.

use async_trait::async_trait;
use basket_core::{ProductId, ProductReference};
use reqwest::Method;
use tracing::instrument;

use super::conversions::convert_product;
use super::types::ProductRecord;
use super::{ApiError, BackendClient};
use crate::catalog::Catalog;

#[async_trait]
impl Catalog for BackendClient {
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn get_product(&self, product_id: &ProductId) -> Result<ProductReference, ApiError> {
        let request = self.request(Method::GET, &["products", product_id.as_str()])?;
        let product: ProductRecord = self
            .execute_json(request)
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => ApiError::NotFound(product_id.to_string()),
                other => other,
            })?;
        convert_product(product)
    }
}
