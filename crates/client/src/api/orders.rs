//! Order endpoints. All of them are credentialed.

use serde_json::{Value, json};
use tracing::{instrument, warn};

use lavande_core::{OrderId, OrderStatus};

use crate::api::types::{CreateOrderRequest, Order};
use crate::api::{ApiClient, ApiError, extract_items, extract_order_id};
use crate::session::AccessCredentials;

impl ApiClient {
    /// Submit an order.
    ///
    /// The created order's id is returned when the response carries one;
    /// deployments differ on where (or whether) they echo it, so `None`
    /// still means the order was accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] on a rejected credential and
    /// transport or server errors otherwise.
    #[instrument(skip(self, credentials, request), fields(method = %request.payment_method))]
    pub async fn create_order(
        &self,
        credentials: &AccessCredentials,
        request: &CreateOrderRequest,
    ) -> Result<Option<OrderId>, ApiError> {
        let value = self.post_value("/order", request, Some(credentials)).await?;

        let order_id = extract_order_id(&value);
        if order_id.is_none() {
            warn!("order accepted but response carried no order id");
        }
        Ok(order_id)
    }

    /// The logged-in user's orders.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] on a rejected credential, and an
    /// error when no order array can be located in the response.
    #[instrument(skip(self, credentials))]
    pub async fn my_orders(
        &self,
        credentials: &AccessCredentials,
    ) -> Result<Vec<Order>, ApiError> {
        let value = self.get_value("/order", &[], Some(credentials)).await?;
        parse_orders(&value)
    }

    /// Every order in the store. Requires an admin credential.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] on a rejected credential, and an
    /// error when no order array can be located in the response.
    #[instrument(skip(self, credentials))]
    pub async fn all_orders(
        &self,
        credentials: &AccessCredentials,
    ) -> Result<Vec<Order>, ApiError> {
        let value = self.get_value("/order/all", &[], Some(credentials)).await?;
        parse_orders(&value)
    }

    /// Move an order to a new status. Requires an admin credential.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] on a rejected credential and
    /// transport or server errors otherwise.
    #[instrument(skip(self, credentials), fields(order_id = %id))]
    pub async fn update_order_status(
        &self,
        credentials: &AccessCredentials,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<(), ApiError> {
        let path = format!("/admin/order-status/{}", id.as_str());
        self.put_value(&path, &json!({ "status": status }), Some(credentials))
            .await?;
        Ok(())
    }
}

fn parse_orders(value: &Value) -> Result<Vec<Order>, ApiError> {
    extract_items(value)?
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(|e| ApiError::Shape(format!("order: {e}"))))
        .collect()
}
