//! Wire types shared across API endpoints.
//!
//! Field names follow the server's JSON (camelCase, Mongo-style `_id`).
//! Optional fields default rather than fail: order and product records come
//! from several server code paths that do not all populate the same fields.

use chrono::{DateTime, Utc};
use lavande_core::{CategoryId, OrderId, OrderStatus, PaymentMethod, Price, ProductId, UserId};
use serde::{Deserialize, Serialize};

// =============================================================================
// Authentication
// =============================================================================

/// Access/refresh credential pair from the login endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Bearer token for authenticated calls. Optional because the server
    /// omits it from some failure envelopes that still return 200.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Credential for the refresh endpoint.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// The logged-in user as returned by the login endpoint and cached locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Flattened result of a login call.
///
/// A response can be well-formed HTTP-wise yet carry no token; the session
/// store decides whether this outcome establishes a session.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: Option<TokenPair>,
    pub user: Option<UserRecord>,
    /// Server-provided failure message, if any.
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginEnvelope {
    #[serde(default)]
    pub data: Option<LoginData>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginData {
    #[serde(default)]
    pub tokens: Option<TokenPair>,
    #[serde(default)]
    pub user: Option<UserRecord>,
}

/// Generic acknowledgement envelope (register, password reset).
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct AckResponse {
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Catalog
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub title: String,
    #[serde(default)]
    pub price: Price,
    /// Primary image URL. Older records use `image`, newer ones `img`.
    #[serde(default, alias = "image")]
    pub img: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sizes: Vec<SizeStock>,
    #[serde(default)]
    pub avg_review: Option<f64>,
    #[serde(default)]
    pub category: Option<CategoryRef>,
}

/// Per-size stock level.
#[derive(Debug, Clone, Deserialize)]
pub struct SizeStock {
    pub size: String,
    #[serde(default)]
    pub quantity: i64,
}

/// Category reference embedded in a product.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRef {
    #[serde(rename = "_id")]
    pub id: CategoryId,
    #[serde(default)]
    pub name: Option<String>,
}

// =============================================================================
// Orders
// =============================================================================

/// Payload for the order-creation endpoint.
///
/// Also persisted verbatim when a paid gateway order cannot be submitted,
/// so it round-trips through serde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub recipient_name: String,
    pub phone: String,
    pub address: String,
    pub payment_method: PaymentMethod,
    /// Whole đồng; the server stores this as a plain number.
    pub total_amount: i64,
    /// Gateway transaction reference, set only on VNPAY-paid orders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vnp_txn_ref: Option<String>,
    pub cart: Vec<OrderLineRequest>,
}

/// One line of an order-creation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product: ProductId,
    pub quantity: u32,
    pub size: String,
}

/// An order as read back from the order-list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: OrderId,
    #[serde(default)]
    pub recipient_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub total_amount: Price,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub cart: Vec<OrderLine>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Human-facing order number, present on some records.
    #[serde(default)]
    pub order_number: Option<String>,
    /// Gateway transaction reference for VNPAY-paid orders.
    #[serde(default)]
    pub vnp_txn_ref: Option<String>,
}

impl Order {
    /// The alternate reference shown to users: the order number when set,
    /// otherwise the gateway transaction reference.
    #[must_use]
    pub fn alternate_reference(&self) -> Option<&str> {
        self.order_number
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.vnp_txn_ref.as_deref().filter(|s| !s.is_empty()))
    }
}

/// One line of a fetched order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub product: ProductRef,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub size: Option<String>,
}

const fn default_quantity() -> u32 {
    1
}

/// An order line's product: populated by the server on some endpoints,
/// a bare id on others.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductRef {
    Populated(OrderProduct),
    Id(ProductId),
}

impl ProductRef {
    /// The referenced product id, whichever shape was sent.
    #[must_use]
    pub fn id(&self) -> &ProductId {
        match self {
            Self::Populated(p) => &p.id,
            Self::Id(id) => id,
        }
    }

    /// The product title, when the server populated it.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Populated(p) => p.title.as_deref(),
            Self::Id(_) => None,
        }
    }

    /// The unit price, when the server populated it.
    #[must_use]
    pub fn price(&self) -> Option<Price> {
        match self {
            Self::Populated(p) => p.price,
            Self::Id(_) => None,
        }
    }
}

/// Product fields embedded in a populated order line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderProduct {
    #[serde(rename = "_id")]
    pub id: ProductId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub price: Option<Price>,
}
