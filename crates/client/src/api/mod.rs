//! Typed HTTP client for the Lavande storefront API.
//!
//! One [`ApiClient`] is shared across all flows; it is cheap to clone
//! (`Arc` inner). Endpoint wrappers live in the submodules:
//!
//! - [`auth`] - login, register, refresh, password reset
//! - [`catalog`] - product list, detail, top-rated
//! - [`orders`] - order creation, history, admin operations
//! - [`chat`] - the chatbot widget's query endpoint
//!
//! The API wraps its payloads in a handful of envelope shapes depending on
//! the server code path; [`extract_items`] and [`extract_order_id`] are the
//! single parsing contract for all of them.

pub mod auth;
pub mod catalog;
pub mod chat;
pub mod orders;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use lavande_core::OrderId;

use crate::config::ClientConfig;
use crate::session::AccessCredentials;

/// Request timeout for every API call.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the caller's user id on order-scoped endpoints.
const CLIENT_ID_HEADER: &str = "x-client-id";

/// Errors that can occur when calling the storefront API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the credentials (HTTP 401).
    #[error("authorization failed")]
    Unauthorized,

    /// Non-success HTTP status other than 401.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The response parsed as JSON but not into the expected shape.
    #[error("unexpected response shape: {0}")]
    Shape(String),
}

impl ApiError {
    /// Whether retrying the same call after a credential refresh could help.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

struct ApiClientInner {
    http: reqwest::Client,
    base_url: String,
}

/// HTTP client bound to one API base URL.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

impl ApiClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::from_base_url(config.api_base_url.clone())
    }

    /// Create a client against an explicit base URL (no trailing slash).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn from_base_url(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http,
                base_url: base_url.into(),
            }),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    fn apply_auth(
        request: reqwest::RequestBuilder,
        credentials: Option<&AccessCredentials>,
    ) -> reqwest::RequestBuilder {
        match credentials {
            Some(creds) => request
                .bearer_auth(&creds.token)
                .header(CLIENT_ID_HEADER, creds.user_id.as_str()),
            None => request,
        }
    }

    /// Read the response body, mapping 401 and other non-success statuses
    /// to their error variants. An empty body parses as JSON `null`.
    async fn read_json(response: reqwest::Response) -> Result<Value, ApiError> {
        let status = response.status();

        if status.as_u16() == 401 {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Shape(e.to_string()))
    }

    pub(crate) async fn get_value(
        &self,
        path: &str,
        query: &[(String, String)],
        credentials: Option<&AccessCredentials>,
    ) -> Result<Value, ApiError> {
        debug!(path, "GET");
        let request = self.inner.http.get(self.endpoint(path)).query(query);
        let response = Self::apply_auth(request, credentials).send().await?;
        Self::read_json(response).await
    }

    pub(crate) async fn post_value<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        credentials: Option<&AccessCredentials>,
    ) -> Result<Value, ApiError> {
        debug!(path, "POST");
        let request = self.inner.http.post(self.endpoint(path)).json(body);
        let response = Self::apply_auth(request, credentials).send().await?;
        Self::read_json(response).await
    }

    pub(crate) async fn put_value<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        credentials: Option<&AccessCredentials>,
    ) -> Result<Value, ApiError> {
        debug!(path, "PUT");
        let request = self.inner.http.put(self.endpoint(path)).json(body);
        let response = Self::apply_auth(request, credentials).send().await?;
        Self::read_json(response).await
    }
}

// =============================================================================
// Envelope sniffing
// =============================================================================

/// Pull the payload array out of whichever envelope the server used.
///
/// Checked in order: the value itself, `data`, `metadata`, a `data.data`
/// nesting, then the first array-valued property.
pub(crate) fn extract_items(value: &Value) -> Result<Vec<Value>, ApiError> {
    if let Some(items) = value.as_array() {
        return Ok(items.clone());
    }

    if let Some(object) = value.as_object() {
        for key in ["data", "metadata"] {
            if let Some(items) = object.get(key).and_then(Value::as_array) {
                return Ok(items.clone());
            }
        }

        if let Some(items) = object
            .get("data")
            .and_then(|inner| inner.get("data"))
            .and_then(Value::as_array)
        {
            return Ok(items.clone());
        }

        if let Some(items) = object.values().find_map(Value::as_array) {
            warn!("payload array found only by scanning properties");
            return Ok(items.clone());
        }
    }

    Err(ApiError::Shape(
        "no payload array found in response".to_string(),
    ))
}

/// Pull a single payload object out of the envelope, if there is one.
///
/// Used for detail endpoints that wrap the record in `data` or `metadata`.
pub(crate) fn extract_item(value: &Value) -> &Value {
    for key in ["data", "metadata"] {
        if let Some(inner) = value.get(key)
            && inner.is_object()
        {
            return inner;
        }
    }
    value
}

/// Find the created order's id wherever this server version put it.
///
/// Checked in order: `_id`, `metadata._id`, `data._id`, `order._id`.
pub(crate) fn extract_order_id(value: &Value) -> Option<OrderId> {
    let candidates: [&[&str]; 4] = [
        &["_id"],
        &["metadata", "_id"],
        &["data", "_id"],
        &["order", "_id"],
    ];

    for path in candidates {
        let mut current = value;
        for segment in path {
            match current.get(segment) {
                Some(next) => current = next,
                None => {
                    current = &Value::Null;
                    break;
                }
            }
        }
        if let Some(id) = current.as_str() {
            return Some(OrderId::new(id));
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_items_bare_array() {
        let value = json!([{"_id": "a"}, {"_id": "b"}]);
        assert_eq!(extract_items(&value).unwrap().len(), 2);
    }

    #[test]
    fn test_extract_items_data_and_metadata() {
        let data = json!({"status": 200, "data": [{"_id": "a"}]});
        assert_eq!(extract_items(&data).unwrap().len(), 1);

        let metadata = json!({"metadata": [{"_id": "a"}, {"_id": "b"}]});
        assert_eq!(extract_items(&metadata).unwrap().len(), 2);
    }

    #[test]
    fn test_extract_items_nested_data() {
        let value = json!({"status": 200, "data": {"data": [{"_id": "a"}], "pagination": {}}});
        assert_eq!(extract_items(&value).unwrap().len(), 1);
    }

    #[test]
    fn test_extract_items_scans_properties() {
        let value = json!({"ok": true, "orders": [{"_id": "a"}]});
        assert_eq!(extract_items(&value).unwrap().len(), 1);
    }

    #[test]
    fn test_extract_items_rejects_arrayless_payload() {
        let value = json!({"ok": true, "count": 3});
        assert!(matches!(
            extract_items(&value),
            Err(ApiError::Shape(_))
        ));
    }

    #[test]
    fn test_extract_order_id_locations() {
        for payload in [
            json!({"_id": "o1"}),
            json!({"metadata": {"_id": "o1"}}),
            json!({"data": {"_id": "o1"}}),
            json!({"order": {"_id": "o1"}}),
        ] {
            assert_eq!(
                extract_order_id(&payload),
                Some(OrderId::new("o1")),
                "failed for {payload}"
            );
        }
        assert_eq!(extract_order_id(&json!({"ok": true})), None);
    }

    #[test]
    fn test_extract_item_unwraps_detail_envelope() {
        let wrapped = json!({"status": 200, "data": {"_id": "p1"}});
        assert_eq!(extract_item(&wrapped)["_id"], "p1");

        let bare = json!({"_id": "p1"});
        assert_eq!(extract_item(&bare)["_id"], "p1");
    }
}
