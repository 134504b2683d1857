//! In-memory shopping cart.
//!
//! The cart lives for one session and is never persisted; only a pending
//! gateway order (already priced and addressed) survives a restart. Lines
//! are not merged: adding the same product twice keeps two lines, matching
//! how the order endpoint accepts duplicate products.

use rust_decimal::Decimal;
use thiserror::Error;

use lavande_core::{Price, ProductId};

use crate::api::types::Product;

/// Size used when a product is added without picking one.
pub const DEFAULT_SIZE: &str = "M";

/// Promo code rejections.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromoError {
    /// The input was empty or whitespace.
    #[error("promo code is empty")]
    Empty,

    /// The code is not one of the known promotions.
    #[error("promo code {0:?} is not valid")]
    Invalid(String),
}

/// Result of a quantity change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityUpdate {
    /// All lines for the product now carry the new quantity.
    Updated,
    /// The requested quantity was zero; the cart was left untouched and
    /// the caller should confirm removal explicitly.
    RemovalRequested,
    /// No line carries this product.
    NotInCart,
}

/// One cart line.
#[derive(Debug, Clone)]
pub struct CartItem {
    pub product_id: ProductId,
    pub title: String,
    pub unit_price: Price,
    pub size: String,
    pub color: Option<String>,
    pub quantity: u32,
}

impl CartItem {
    /// Build a line from a catalog product. Quantity starts at 1.
    #[must_use]
    pub fn from_product(product: &Product, size: Option<&str>, color: Option<&str>) -> Self {
        Self {
            product_id: product.id.clone(),
            title: product.title.clone(),
            unit_price: product.price,
            size: size.unwrap_or(DEFAULT_SIZE).to_owned(),
            color: color.map(str::to_owned),
            quantity: 1,
        }
    }

    /// Price of this line (unit price times quantity).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.line_total(self.quantity)
    }
}

#[derive(Debug, Clone)]
struct AppliedPromo {
    code: String,
    rate: Decimal,
}

/// The cart: ordered lines plus at most one applied promotion.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    items: Vec<CartItem>,
    promo: Option<AppliedPromo>,
}

impl Cart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a line. Quantity is always reset to 1 on entry; repeated adds
    /// of the same product produce separate lines.
    pub fn add(&mut self, mut item: CartItem) {
        item.quantity = 1;
        self.items.push(item);
    }

    /// Remove every line carrying this product. Removing a product that is
    /// not present is a no-op.
    pub fn remove(&mut self, product_id: &ProductId) {
        self.items.retain(|item| item.product_id != *product_id);
    }

    /// Set the quantity on every line carrying this product.
    ///
    /// A requested quantity of zero changes nothing and returns
    /// [`QuantityUpdate::RemovalRequested`]; dropping a line requires an
    /// explicit [`Cart::remove`].
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) -> QuantityUpdate {
        if quantity == 0 {
            return QuantityUpdate::RemovalRequested;
        }

        let mut touched = false;
        for item in &mut self.items {
            if item.product_id == *product_id {
                item.quantity = quantity;
                touched = true;
            }
        }

        if touched {
            QuantityUpdate::Updated
        } else {
            QuantityUpdate::NotInCart
        }
    }

    /// Apply a promo code, replacing any previous one.
    ///
    /// Codes are matched case-insensitively. On rejection the previously
    /// applied promotion stays in force.
    ///
    /// # Errors
    ///
    /// Returns [`PromoError::Empty`] for blank input and
    /// [`PromoError::Invalid`] for an unknown code.
    pub fn apply_promo(&mut self, code: &str) -> Result<(), PromoError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(PromoError::Empty);
        }

        let code = code.to_uppercase();
        let rate = promo_rate(&code).ok_or_else(|| PromoError::Invalid(code.clone()))?;

        self.promo = Some(AppliedPromo { code, rate });
        Ok(())
    }

    /// Drop the applied promotion, if any.
    pub fn clear_promo(&mut self) {
        self.promo = None;
    }

    /// Empty the cart, including the promotion.
    pub fn clear(&mut self) {
        self.items.clear();
        self.promo = None;
    }

    /// Sum of line totals before any discount.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// The applied discount rate, zero when no promotion is active.
    #[must_use]
    pub fn discount_rate(&self) -> Decimal {
        self.promo
            .as_ref()
            .map_or(Decimal::ZERO, |promo| promo.rate)
    }

    /// Subtotal with the active discount applied.
    #[must_use]
    pub fn total(&self) -> Price {
        self.subtotal().discounted(self.discount_rate())
    }

    /// The active promo code, if any.
    #[must_use]
    pub fn promo_code(&self) -> Option<&str> {
        self.promo.as_ref().map(|promo| promo.code.as_str())
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

fn promo_rate(code: &str) -> Option<Decimal> {
    match code {
        "DISCOUNT10" => Some(Decimal::new(1, 1)),
        "SUPER20" => Some(Decimal::new(2, 1)),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(id: &str, price_vnd: i64, quantity: u32) -> CartItem {
        CartItem {
            product_id: ProductId::new(id),
            title: format!("Sản phẩm {id}"),
            unit_price: Price::from_vnd(price_vnd),
            size: DEFAULT_SIZE.to_string(),
            color: None,
            quantity,
        }
    }

    #[test]
    fn test_subtotal_sums_line_totals() {
        let mut cart = Cart::new();
        cart.add(item("p1", 100_000, 1));
        cart.add(item("p2", 75_000, 1));
        cart.set_quantity(&ProductId::new("p2"), 2);

        assert_eq!(cart.subtotal().as_vnd(), 250_000);
        assert_eq!(cart.total().as_vnd(), 250_000);
    }

    #[test]
    fn test_discount10_takes_ten_percent_off() {
        let mut cart = Cart::new();
        cart.add(item("p1", 250_000, 1));
        cart.apply_promo("discount10").unwrap();

        assert_eq!(cart.promo_code(), Some("DISCOUNT10"));
        assert_eq!(cart.total().as_vnd(), 225_000);
        // Subtotal is unaffected by the promotion.
        assert_eq!(cart.subtotal().as_vnd(), 250_000);
    }

    #[test]
    fn test_invalid_promo_keeps_previous_one() {
        let mut cart = Cart::new();
        cart.add(item("p1", 100_000, 1));
        cart.apply_promo("SUPER20").unwrap();

        let err = cart.apply_promo("BOGUS").unwrap_err();
        assert_eq!(err, PromoError::Invalid("BOGUS".to_string()));
        assert_eq!(cart.promo_code(), Some("SUPER20"));
        assert_eq!(cart.total().as_vnd(), 80_000);
    }

    #[test]
    fn test_blank_promo_is_rejected() {
        let mut cart = Cart::new();
        assert_eq!(cart.apply_promo("   "), Err(PromoError::Empty));
        assert_eq!(cart.promo_code(), None);
    }

    #[test]
    fn test_add_keeps_duplicate_lines_and_resets_quantity() {
        let mut cart = Cart::new();
        cart.add(item("p1", 50_000, 9));
        cart.add(item("p1", 50_000, 9));

        assert_eq!(cart.len(), 2);
        assert!(cart.items().iter().all(|line| line.quantity == 1));
    }

    #[test]
    fn test_set_quantity_touches_every_matching_line() {
        let mut cart = Cart::new();
        cart.add(item("p1", 50_000, 1));
        cart.add(item("p1", 50_000, 1));
        cart.add(item("p2", 30_000, 1));

        assert_eq!(
            cart.set_quantity(&ProductId::new("p1"), 3),
            QuantityUpdate::Updated
        );
        assert_eq!(cart.subtotal().as_vnd(), 3 * 50_000 + 3 * 50_000 + 30_000);
    }

    #[test]
    fn test_zero_quantity_requests_removal_without_mutating() {
        let mut cart = Cart::new();
        cart.add(item("p1", 50_000, 1));

        assert_eq!(
            cart.set_quantity(&ProductId::new("p1"), 0),
            QuantityUpdate::RemovalRequested
        );
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].quantity, 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut cart = Cart::new();
        cart.add(item("p1", 50_000, 1));
        let id = ProductId::new("p1");

        cart.remove(&id);
        cart.remove(&id);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_clear_drops_promo_too() {
        let mut cart = Cart::new();
        cart.add(item("p1", 100_000, 1));
        cart.apply_promo("DISCOUNT10").unwrap();

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.promo_code(), None);
        assert!(cart.total().is_zero());
    }
}
