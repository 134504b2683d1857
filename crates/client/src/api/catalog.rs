//! Product catalog endpoints.
//!
//! Catalog reads are anonymous; none of them attach credentials.

use serde_json::Value;
use tracing::instrument;

use lavande_core::{CategoryId, ProductId};

use crate::api::types::Product;
use crate::api::{ApiClient, ApiError, extract_item, extract_items};

/// Upper bound sent for an open-ended price filter, in đồng.
pub const MAX_PRICE_FILTER: i64 = 10_000_000;

/// Filters for the product list endpoint.
///
/// Only set fields are sent; the server treats absent filters as "all".
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Minimum price in đồng. Sending either bound sends both.
    pub price_min: Option<i64>,
    /// Maximum price in đồng.
    pub price_max: Option<i64>,
    pub status: Option<String>,
    pub category: Option<CategoryId>,
    pub search_text: Option<String>,
}

impl ProductQuery {
    fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();

        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if self.price_min.is_some() || self.price_max.is_some() {
            // The server expects one "min,max" parameter with both ends
            // filled in.
            let min = self.price_min.unwrap_or(0);
            let max = self.price_max.unwrap_or(MAX_PRICE_FILTER);
            pairs.push(("priceRange".to_string(), format!("{min},{max}")));
        }
        if let Some(status) = &self.status {
            pairs.push(("status".to_string(), status.clone()));
        }
        if let Some(category) = &self.category {
            pairs.push(("category".to_string(), category.as_str().to_owned()));
        }
        if let Some(text) = &self.search_text {
            pairs.push(("searchText".to_string(), text.clone()));
        }

        pairs
    }
}

impl ApiClient {
    /// List products matching a query.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or when no product array can
    /// be located in the response.
    #[instrument(skip(self))]
    pub async fn products(&self, query: &ProductQuery) -> Result<Vec<Product>, ApiError> {
        let value = self
            .get_value("/product", &query.to_query_pairs(), None)
            .await?;
        parse_products(&value)
    }

    /// Fetch one product by id.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an unexpected shape.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: &ProductId) -> Result<Product, ApiError> {
        let value = self
            .get_value(&format!("/product/{}", id.as_str()), &[], None)
            .await?;
        serde_json::from_value(extract_item(&value).clone())
            .map_err(|e| ApiError::Shape(format!("product detail: {e}")))
    }

    /// The highest-rated products, as curated by the server.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or when no product array can
    /// be located in the response.
    #[instrument(skip(self))]
    pub async fn top_rated(&self) -> Result<Vec<Product>, ApiError> {
        let value = self.get_value("/product-top-rate", &[], None).await?;
        parse_products(&value)
    }
}

fn parse_products(value: &Value) -> Result<Vec<Product>, ApiError> {
    extract_items(value)?
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|e| ApiError::Shape(format!("product: {e}")))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::from_base_url(server.base_url()).unwrap()
    }

    #[test]
    fn test_price_bounds_collapse_into_one_parameter() {
        let query = ProductQuery {
            price_min: Some(100_000),
            ..ProductQuery::default()
        };
        let pairs = query.to_query_pairs();
        assert_eq!(
            pairs,
            vec![("priceRange".to_string(), "100000,10000000".to_string())]
        );
    }

    #[test]
    fn test_empty_query_sends_nothing() {
        assert!(ProductQuery::default().to_query_pairs().is_empty());
    }

    #[tokio::test]
    async fn test_products_reads_wrapped_list() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/product")
                    .query_param("searchText", "linen");
                then.status(200).json_body(serde_json::json!({
                    "data": [
                        { "_id": "p1", "title": "Đầm linen", "price": 350000 },
                    ],
                }));
            })
            .await;

        let query = ProductQuery {
            search_text: Some("linen".to_string()),
            ..ProductQuery::default()
        };
        let products = client(&server).products(&query).await.unwrap();
        mock.assert_async().await;

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id.as_str(), "p1");
        assert_eq!(products[0].price.as_vnd(), 350_000);
    }

    #[tokio::test]
    async fn test_product_detail_unwraps_metadata() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/product/p9");
                then.status(200).json_body(serde_json::json!({
                    "metadata": { "_id": "p9", "title": "Sơ mi lụa", "price": "420000" },
                }));
            })
            .await;

        let product = client(&server)
            .product(&ProductId::new("p9"))
            .await
            .unwrap();
        assert_eq!(product.title, "Sơ mi lụa");
        assert_eq!(product.price.as_vnd(), 420_000);
    }

    #[tokio::test]
    async fn test_top_rated_accepts_bare_array() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/product-top-rate");
                then.status(200).json_body(serde_json::json!([
                    { "_id": "p1", "title": "A", "avgReview": 4.8 },
                    { "_id": "p2", "title": "B", "avgReview": 4.6 },
                ]));
            })
            .await;

        let products = client(&server).top_rated().await.unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].avg_review, Some(4.8));
    }
}
