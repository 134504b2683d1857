//! Type-safe VND price representation using decimal arithmetic.
//!
//! Lavande sells in a single currency (Vietnamese đồng), so [`Price`] wraps
//! a bare [`Decimal`] amount rather than carrying a currency code. Amounts
//! are whole đồng in practice; `Decimal` keeps discount math exact.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price in Vietnamese đồng.
///
/// Deserializes from both JSON numbers and numeric strings (the API emits
/// either depending on the endpoint).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// A zero price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount of đồng.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from a whole number of đồng.
    #[must_use]
    pub fn from_vnd(vnd: i64) -> Self {
        Self(Decimal::from(vnd))
    }

    /// The underlying decimal amount in đồng.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// The amount rounded to whole đồng, as sent in order payloads.
    ///
    /// Rounds half away from zero, matching the gateway's convention.
    /// Saturates at `i64::MAX` (unreachable for real cart totals).
    #[must_use]
    pub fn as_vnd(&self) -> i64 {
        self.0
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(i64::MAX)
    }

    /// The amount in the payment gateway's minor-unit convention (đồng × 100).
    ///
    /// Rounds half away from zero. Saturates at `i64::MAX`.
    #[must_use]
    pub fn gateway_minor_units(&self) -> i64 {
        (self.0 * Decimal::from(100))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(i64::MAX)
    }

    /// Reconstruct a price from the gateway's minor-unit amount.
    #[must_use]
    pub fn from_gateway_minor_units(minor: i64) -> Self {
        Self(Decimal::new(minor, 2).normalize())
    }

    /// This unit price extended over `quantity` units.
    #[must_use]
    pub fn line_total(&self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// This price reduced by a fractional discount rate (e.g. `0.1` for 10%).
    #[must_use]
    pub fn discounted(&self, rate: Decimal) -> Self {
        Self(self.0 - self.0 * rate)
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Price {
    /// Formats with Vietnamese digit grouping, e.g. `225.000 đ`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vnd = self.as_vnd();
        let digits = vnd.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }
        let sign = if vnd < 0 { "-" } else { "" };
        write!(f, "{sign}{grouped} đ")
    }
}
