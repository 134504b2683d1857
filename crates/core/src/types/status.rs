//! Status enums for orders and payments.

use serde::{Deserialize, Deserializer, Serialize};

/// Order lifecycle status as reported by the Lavande API.
///
/// The API has emitted both `cancel` and `cancelled` for cancelled orders
/// depending on the code path that wrote the record, and older records can
/// carry unexpected strings. Deserialization is therefore lenient: the two
/// cancel spellings fold together and anything unrecognized falls back to
/// [`OrderStatus::Pending`], the same bucket the timeline renders for an
/// unknown status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Parse an API status string, folding unknown values to `Pending`.
    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "processing" => Self::Processing,
            "shipped" => Self::Shipped,
            "delivered" => Self::Delivered,
            "cancel" | "cancelled" => Self::Cancelled,
            _ => Self::Pending,
        }
    }

    /// Position on the fixed 4-step order timeline.
    ///
    /// `1` = placed, `2` = processing, `3` = shipped, `4` = delivered.
    /// Cancelled orders return `0`: the timeline is short-circuited entirely.
    #[must_use]
    pub const fn timeline_step(self) -> u8 {
        match self {
            Self::Cancelled => 0,
            Self::Pending => 1,
            Self::Processing => 2,
            Self::Shipped => 3,
            Self::Delivered => 4,
        }
    }

    /// Whether the order was cancelled.
    #[must_use]
    pub const fn is_cancelled(self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse_lenient(&raw))
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Shipped => write!(f, "shipped"),
            Self::Delivered => write!(f, "delivered"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    /// Strict parse for operator input; use [`OrderStatus::parse_lenient`]
    /// for API payloads.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancel" | "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// How an order is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash on delivery.
    Cash,
    /// VNPAY gateway redirect.
    Vnpay,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cash => write!(f, "cash"),
            Self::Vnpay => write!(f, "vnpay"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(Self::Cash),
            "vnpay" => Ok(Self::Vnpay),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}
