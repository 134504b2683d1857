//! Interactive shopping session: browse, cart, promo codes, checkout.
//!
//! # Usage
//!
//! ```bash
//! lavande shop
//! ```
//!
//! The session keeps an in-memory cart and reads commands from stdin;
//! `help` lists them. Checkout is either cash on delivery or a VNPAY
//! gateway redirect. For the gateway, the session prints the payment URL
//! and then waits for the URL the gateway lands on after payment, the
//! same navigation the mobile app's webview intercepts.
//!
//! A failed command is reported and the prompt continues; only losing
//! stdin ends the session.

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use lavande_client::api::ApiError;
use lavande_client::api::catalog::ProductQuery;
use lavande_client::api::types::Product;
use lavande_client::cart::{Cart, CartItem, QuantityUpdate};
use lavande_client::checkout::{
    CheckoutError, CheckoutFlow, Navigation, OrderConfirmation, PaymentCallback, RecipientForm,
    classify_navigation,
};
use lavande_client::error::{ClientError, add_breadcrumb, capture};
use lavande_client::storage::StorageError;
use lavande_core::{Price, ProductId};

use super::CommandContext;

/// Errors that end the interactive session.
#[derive(Debug, Error)]
pub enum ShopError {
    /// Terminal input failed.
    #[error("Input error: {0}")]
    Io(#[from] std::io::Error),

    /// API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Checkout failed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Stored state could not be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Run the interactive session until `quit` or end of input.
pub async fn run(ctx: &CommandContext) -> Result<(), ShopError> {
    let mut session = ShopSession {
        ctx,
        checkout: ctx.checkout(),
        cart: Cart::new(),
        listing: Vec::new(),
        lines: BufReader::new(tokio::io::stdin()).lines(),
    };
    session.run().await
}

struct ShopSession<'a> {
    ctx: &'a CommandContext,
    checkout: CheckoutFlow,
    cart: Cart,
    /// Last product listing; `show`/`add` refer to it by number.
    listing: Vec<Product>,
    lines: Lines<BufReader<Stdin>>,
}

impl ShopSession<'_> {
    async fn run(&mut self) -> Result<(), ShopError> {
        tracing::info!("Lavande interactive shop. Type `help` for commands.");

        if self.ctx.session.is_authenticated()
            && let Ok(Some(request)) = self.checkout.pending_order().await
        {
            tracing::info!(
                "A paid order for {} is parked. Type `resume` to submit it.",
                Price::from_vnd(request.total_amount)
            );
        }

        loop {
            let Some(line) = self.lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "quit" || line == "exit" {
                break;
            }

            if let Err(e) = self.handle(line).await {
                match e {
                    ShopError::Io(e) => return Err(ShopError::Io(e)),
                    ShopError::Api(e) => report(ClientError::Api(e)),
                    ShopError::Checkout(e) => report(ClientError::Checkout(e)),
                    ShopError::Storage(e) => report(ClientError::Storage(e)),
                }
            }
        }

        tracing::info!("Bye");
        Ok(())
    }

    async fn handle(&mut self, line: &str) -> Result<(), ShopError> {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "help" => help(),
            "list" => self.list(None).await?,
            "search" => self.list(Some(rest)).await?,
            "show" => self.show(rest),
            "add" => self.add(rest),
            "cart" => self.render_cart(),
            "qty" => self.set_quantity(rest).await?,
            "rm" => self.remove(rest),
            "promo" => self.promo(rest),
            "cod" => self.checkout_cod().await?,
            "vnpay" => self.checkout_vnpay().await?,
            "resume" => self.resume().await?,
            _ => tracing::info!("Unknown command; type `help`"),
        }
        Ok(())
    }

    async fn list(&mut self, search: Option<&str>) -> Result<(), ShopError> {
        let query = ProductQuery {
            search_text: search.filter(|s| !s.is_empty()).map(str::to_owned),
            ..ProductQuery::default()
        };
        self.listing = self.ctx.api.products(&query).await?;

        if self.listing.is_empty() {
            tracing::info!("No products found");
            return Ok(());
        }
        for (index, product) in self.listing.iter().enumerate() {
            tracing::info!("  {}. {} - {}", index + 1, product.title, product.price);
        }
        tracing::info!("`add <n> [size]` puts one in the cart");
        Ok(())
    }

    fn show(&self, arg: &str) {
        let Some(product) = self.listed(arg) else {
            tracing::info!("No such listing; run `list` or `search` first");
            return;
        };

        tracing::info!("{} - {}", product.title, product.price);
        if !product.sizes.is_empty() {
            let sizes = product
                .sizes
                .iter()
                .map(|stock| stock.size.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::info!("  Sizes: {}", sizes);
        }
        if let Some(description) = product.description.as_deref() {
            tracing::info!("  {}", description);
        }
    }

    fn add(&mut self, rest: &str) {
        let (index, size) = match rest.split_once(' ') {
            Some((index, size)) => (index, Some(size.trim()).filter(|s| !s.is_empty())),
            None => (rest, None),
        };
        let Some(product) = self.listed(index) else {
            tracing::info!("No such listing; run `list` or `search` first");
            return;
        };

        add_breadcrumb("cart", "add", Some(&[("product", product.id.as_str())]));
        let item = CartItem::from_product(product, size, None);
        tracing::info!("Added {} ({}) - {}", item.title, item.size, item.unit_price);
        self.cart.add(item);
        tracing::info!(
            "Cart: {} item(s), total {}",
            self.cart.len(),
            self.cart.total()
        );
    }

    fn render_cart(&self) {
        if self.cart.is_empty() {
            tracing::info!("Cart is empty");
            return;
        }

        for (index, item) in self.cart.items().iter().enumerate() {
            tracing::info!(
                "  {}. {} ({}) x{} - {}",
                index + 1,
                item.title,
                item.size,
                item.quantity,
                item.line_total()
            );
        }
        tracing::info!("  Subtotal: {}", self.cart.subtotal());
        if let Some(code) = self.cart.promo_code() {
            tracing::info!("  Promo {} applied", code);
        }
        tracing::info!("  Total: {}", self.cart.total());
    }

    async fn set_quantity(&mut self, rest: &str) -> Result<(), ShopError> {
        let Some((index, count)) = rest.split_once(' ') else {
            tracing::info!("Usage: qty <line> <count>");
            return Ok(());
        };
        let Some((product_id, title)) = line_item(self.cart.items(), index) else {
            tracing::info!("No such cart line; run `cart`");
            return Ok(());
        };
        let Ok(count) = count.trim().parse::<u32>() else {
            tracing::info!("Usage: qty <line> <count>");
            return Ok(());
        };

        match self.cart.set_quantity(&product_id, count) {
            QuantityUpdate::Updated => self.render_cart(),
            QuantityUpdate::NotInCart => tracing::info!("Not in the cart"),
            // Quantity zero never silently drops a line; it asks.
            QuantityUpdate::RemovalRequested => {
                tracing::info!("Remove {} from the cart? (y/n)", title);
                if self.confirm().await? {
                    self.cart.remove(&product_id);
                    tracing::info!("Removed");
                } else {
                    tracing::info!("Kept");
                }
            }
        }
        Ok(())
    }

    fn remove(&mut self, arg: &str) {
        let Some((product_id, title)) = line_item(self.cart.items(), arg) else {
            tracing::info!("No such cart line; run `cart`");
            return;
        };
        self.cart.remove(&product_id);
        tracing::info!("Removed {}", title);
    }

    fn promo(&mut self, code: &str) {
        if code.eq_ignore_ascii_case("off") {
            self.cart.clear_promo();
            tracing::info!("Promo removed; total {}", self.cart.total());
            return;
        }

        match self.cart.apply_promo(code) {
            Ok(()) => tracing::info!(
                "Applied {}: total {}",
                self.cart.promo_code().unwrap_or(code),
                self.cart.total()
            ),
            Err(e) => tracing::warn!("{}", e),
        }
    }

    async fn checkout_cod(&mut self) -> Result<(), ShopError> {
        if self.cart.is_empty() {
            tracing::info!("Cart is empty");
            return Ok(());
        }
        if !self.ctx.session.is_authenticated() {
            tracing::info!("Sign in first: lavande login -e <email> -p <password>");
            return Ok(());
        }

        let form = self.recipient_form().await?;
        add_breadcrumb("checkout", "cod", None);
        let confirmation = self.checkout.place_cod_order(&mut self.cart, &form).await?;
        render_confirmation(&confirmation);
        Ok(())
    }

    async fn checkout_vnpay(&mut self) -> Result<(), ShopError> {
        if self.cart.is_empty() {
            tracing::info!("Cart is empty");
            return Ok(());
        }

        let form = self.recipient_form().await?;
        let payment = self.checkout.begin_gateway_payment(&self.cart, &form)?;
        add_breadcrumb("checkout", "vnpay", Some(&[("txn_ref", &payment.txn_ref)]));

        tracing::info!("Open this URL and pay {}:", payment.amount);
        tracing::info!("  {}", payment.url);
        tracing::info!("Then paste the URL the gateway lands on (`cancel` to abort):");

        while let Some(line) = self.lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "cancel" {
                tracing::info!("Payment abandoned; the cart is unchanged");
                return Ok(());
            }

            match classify_navigation(line, self.ctx.config.vnpay.return_marker()) {
                Navigation::External(url) => {
                    tracing::info!("That is a banking-app link; open it on the phone: {}", url);
                }
                Navigation::UnknownScheme(scheme) => {
                    tracing::warn!(
                        "Cannot open {} links here; finish in the browser and paste the return URL",
                        scheme
                    );
                }
                Navigation::Page => {
                    tracing::info!("Still on the gateway; paste the final return URL");
                }
                Navigation::Callback(callback) => {
                    return self.finalize(&form, &callback).await;
                }
            }
        }
        Ok(())
    }

    async fn finalize(
        &mut self,
        form: &RecipientForm,
        callback: &PaymentCallback,
    ) -> Result<(), ShopError> {
        match self
            .checkout
            .finalize_gateway_order(&mut self.cart, form, callback)
            .await
        {
            Ok(confirmation) => {
                render_confirmation(&confirmation);
                Ok(())
            }
            Err(CheckoutError::PaymentDeclined { code }) => {
                tracing::warn!(
                    "Payment declined by the gateway (code {}); the cart is unchanged",
                    code
                );
                Ok(())
            }
            Err(CheckoutError::SessionExpired) => {
                tracing::warn!(
                    "Session expired. The paid order is saved; sign in again, then type `resume`."
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn resume(&mut self) -> Result<(), ShopError> {
        match self.checkout.resume_pending_order().await {
            Ok(Some(confirmation)) => {
                render_confirmation(&confirmation);
                Ok(())
            }
            Ok(None) => {
                tracing::info!("No parked order");
                Ok(())
            }
            Err(CheckoutError::SessionExpired | CheckoutError::LoginRequired) => {
                tracing::warn!("Sign in first, then type `resume` again");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn recipient_form(&mut self) -> Result<RecipientForm, std::io::Error> {
        let full_name = self.prompt("Recipient name:").await?;
        let phone = self.prompt("Phone:").await?;
        let address = self.prompt("Delivery address:").await?;
        let note = self.prompt("Note (enter to skip):").await?;

        Ok(RecipientForm {
            full_name,
            phone,
            address,
            note: (!note.is_empty()).then_some(note),
        })
    }

    async fn prompt(&mut self, label: &str) -> Result<String, std::io::Error> {
        tracing::info!("{}", label);
        Ok(self
            .lines
            .next_line()
            .await?
            .unwrap_or_default()
            .trim()
            .to_owned())
    }

    async fn confirm(&mut self) -> Result<bool, std::io::Error> {
        let answer = self.lines.next_line().await?.unwrap_or_default();
        Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
    }

    fn listed(&self, arg: &str) -> Option<&Product> {
        let index: usize = arg.trim().parse().ok()?;
        index.checked_sub(1).and_then(|i| self.listing.get(i))
    }
}

/// Resolve a 1-based cart line number to its product id and title.
fn line_item(items: &[CartItem], arg: &str) -> Option<(ProductId, String)> {
    let index: usize = arg.trim().parse().ok()?;
    let item = index.checked_sub(1).and_then(|i| items.get(i))?;
    Some((item.product_id.clone(), item.title.clone()))
}

/// Report a failed shop command and keep the prompt alive.
fn report(error: ClientError) {
    let error = capture(error);
    tracing::warn!("{}", error);
}

fn render_confirmation(confirmation: &OrderConfirmation) {
    tracing::info!("Order placed!");
    if let Some(id) = &confirmation.order_id {
        tracing::info!("  Order id: {}", id);
    }
    if let Some(reference) = &confirmation.reference {
        tracing::info!("  Reference: {}", reference);
    }
    tracing::info!("  Total: {}", confirmation.total);
    tracing::info!("  Payment: {}", confirmation.payment_method);
    tracing::info!("Track it with: lavande track <reference>");
}

fn help() {
    tracing::info!("Commands:");
    tracing::info!("  list / search <text>   list products");
    tracing::info!("  show <n>               product details");
    tracing::info!("  add <n> [size]         add listing n to the cart");
    tracing::info!("  cart                   show the cart");
    tracing::info!("  qty <line> <count>     change quantity (0 asks to remove)");
    tracing::info!("  rm <line>              remove a cart line");
    tracing::info!("  promo <code|off>       apply or drop a promo code");
    tracing::info!("  cod                    checkout, cash on delivery");
    tracing::info!("  vnpay                  checkout via the VNPAY gateway");
    tracing::info!("  resume                 submit a paid order parked at sign-out");
    tracing::info!("  quit                   leave");
}
