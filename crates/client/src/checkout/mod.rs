//! Checkout flows: cash on delivery and the VNPAY gateway round trip.
//!
//! Money changes hands before the order record exists, so the gateway flow
//! is careful about failure order: a declined payment must leave the cart
//! intact, and a paid-but-unsubmittable order must survive a dead session
//! on disk until the user signs in again.

pub mod vnpay;

use std::sync::Arc;

use chrono::Local;
use thiserror::Error;
use tracing::{info, instrument, warn};

use lavande_core::{OrderId, PaymentMethod, Phone, PhoneError, Price};

use crate::api::types::{CreateOrderRequest, OrderLineRequest};
use crate::api::{ApiClient, ApiError};
use crate::cart::{Cart, CartItem};
use crate::config::VnpayConfig;
use crate::session::{RefreshError, SessionStore};
use crate::storage::{StorageError, keys};

pub use vnpay::{Navigation, PaymentCallback, VnpayError, classify_navigation};

/// Delivery details collected at checkout.
#[derive(Debug, Clone, Default)]
pub struct RecipientForm {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub note: Option<String>,
}

/// Recipient form rejections.
#[derive(Debug, Error, Clone)]
pub enum FormError {
    #[error("recipient name is required")]
    MissingName,

    #[error("delivery address is required")]
    MissingAddress,

    #[error(transparent)]
    Phone(#[from] PhoneError),
}

impl RecipientForm {
    /// Check the form before building an order from it.
    ///
    /// # Errors
    ///
    /// Returns the first failing field.
    pub fn validate(&self) -> Result<(), FormError> {
        if self.full_name.trim().is_empty() {
            return Err(FormError::MissingName);
        }
        Phone::parse(&self.phone)?;
        if self.address.trim().is_empty() {
            return Err(FormError::MissingAddress);
        }
        Ok(())
    }
}

/// Errors placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// No session; sign in and try again.
    #[error("sign in before placing an order")]
    LoginRequired,

    /// Nothing to order.
    #[error("cart is empty")]
    EmptyCart,

    #[error(transparent)]
    InvalidForm(#[from] FormError),

    /// The gateway reported the payment as not completed.
    #[error("payment declined by gateway (code {code})")]
    PaymentDeclined { code: String },

    /// Credentials died and could not be refreshed. For gateway orders the
    /// paid order payload has been saved and can be resubmitted after the
    /// next sign-in.
    #[error("session expired")]
    SessionExpired,

    #[error(transparent)]
    Vnpay(#[from] VnpayError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A started gateway payment: the URL to open and what it is for.
#[derive(Debug, Clone)]
pub struct GatewayPayment {
    pub url: String,
    pub txn_ref: String,
    pub amount: Price,
}

/// A successfully placed order.
#[derive(Debug, Clone)]
pub struct OrderConfirmation {
    /// Server-side id, when the response echoed one.
    pub order_id: Option<OrderId>,
    /// Gateway transaction reference, for gateway-paid orders.
    pub reference: Option<String>,
    pub total: Price,
    pub payment_method: PaymentMethod,
}

/// Orchestrates checkout against the API, the session, and the gateway.
pub struct CheckoutFlow {
    api: ApiClient,
    session: Arc<SessionStore>,
    vnpay: VnpayConfig,
}

impl CheckoutFlow {
    #[must_use]
    pub const fn new(api: ApiClient, session: Arc<SessionStore>, vnpay: VnpayConfig) -> Self {
        Self { api, session, vnpay }
    }

    /// Place a cash-on-delivery order from the cart.
    ///
    /// The cart is emptied only after the server accepts the order.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::LoginRequired`] without a session,
    /// [`CheckoutError::SessionExpired`] when the credential dies and one
    /// refresh does not revive it, and form, cart, or API errors otherwise.
    #[instrument(skip_all)]
    pub async fn place_cod_order(
        &self,
        cart: &mut Cart,
        form: &RecipientForm,
    ) -> Result<OrderConfirmation, CheckoutError> {
        form.validate()?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let total = cart.total();
        let request = build_order_request(form, cart.items(), PaymentMethod::Cash, total, None);
        let order_id = self.submit_with_refresh(&request).await?;

        cart.clear();
        info!(total = total.as_vnd(), "cash order placed");
        Ok(OrderConfirmation {
            order_id,
            reference: None,
            total,
            payment_method: PaymentMethod::Cash,
        })
    }

    /// Start a gateway payment for the cart: a fresh transaction reference
    /// and the signed URL to open.
    ///
    /// No order exists yet; that happens in
    /// [`CheckoutFlow::finalize_gateway_order`] once the gateway reports
    /// the payment outcome.
    ///
    /// # Errors
    ///
    /// Returns form, cart, or signing errors.
    #[instrument(skip_all)]
    pub fn begin_gateway_payment(
        &self,
        cart: &Cart,
        form: &RecipientForm,
    ) -> Result<GatewayPayment, CheckoutError> {
        form.validate()?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let txn_ref = vnpay::generate_txn_ref();
        let amount = cart.total();
        let url = vnpay::build_payment_url(&self.vnpay, amount, &txn_ref, Local::now())?;

        info!(txn_ref, amount = amount.as_vnd(), "gateway payment started");
        Ok(GatewayPayment {
            url,
            txn_ref,
            amount,
        })
    }

    /// Turn a gateway return into an order.
    ///
    /// A failed payment leaves the cart untouched. For a completed payment
    /// the gateway's amount is authoritative when it parses; the cart total
    /// is the fallback. If the order cannot be submitted because the
    /// session is dead, the payload is stashed and resubmitted by
    /// [`CheckoutFlow::resume_pending_order`] after the next sign-in.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::PaymentDeclined`] for a non-success
    /// callback, [`CheckoutError::SessionExpired`] after stashing when the
    /// session is dead, and form or API errors otherwise.
    #[instrument(skip_all, fields(txn_ref = callback.txn_ref.as_deref().unwrap_or("-")))]
    pub async fn finalize_gateway_order(
        &self,
        cart: &mut Cart,
        form: &RecipientForm,
        callback: &PaymentCallback,
    ) -> Result<OrderConfirmation, CheckoutError> {
        if !callback.is_success() {
            let code = callback
                .response_code
                .clone()
                .unwrap_or_else(|| "none".to_string());
            warn!(code, "gateway reported failure");
            return Err(CheckoutError::PaymentDeclined { code });
        }

        form.validate()?;
        let total = callback.paid_amount().unwrap_or_else(|| cart.total());
        let request = build_order_request(
            form,
            cart.items(),
            PaymentMethod::Vnpay,
            total,
            callback.txn_ref.clone(),
        );

        if self.session.credentials().is_none() {
            self.stash_pending(&request).await?;
            return Err(CheckoutError::SessionExpired);
        }

        match self.submit_with_refresh(&request).await {
            Ok(order_id) => {
                cart.clear();
                info!(total = total.as_vnd(), "gateway order placed");
                Ok(OrderConfirmation {
                    order_id,
                    reference: callback.txn_ref.clone(),
                    total,
                    payment_method: PaymentMethod::Vnpay,
                })
            }
            Err(CheckoutError::SessionExpired) => {
                self.stash_pending(&request).await?;
                Err(CheckoutError::SessionExpired)
            }
            Err(other) => Err(other),
        }
    }

    /// The stashed paid-but-unsubmitted order, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub async fn pending_order(&self) -> Result<Option<CreateOrderRequest>, CheckoutError> {
        Ok(self
            .session
            .storage()
            .get_json(keys::PENDING_ORDER)
            .await?)
    }

    /// Resubmit the stashed order, typically right after a fresh sign-in.
    ///
    /// The stash is cleared only once the server accepts the order; any
    /// failure leaves it in place for the next attempt.
    ///
    /// # Errors
    ///
    /// Same failure modes as submitting an order.
    #[instrument(skip_all)]
    pub async fn resume_pending_order(
        &self,
    ) -> Result<Option<OrderConfirmation>, CheckoutError> {
        let Some(request) = self.pending_order().await? else {
            return Ok(None);
        };

        let order_id = self.submit_with_refresh(&request).await?;
        self.session.storage().remove(keys::PENDING_ORDER).await?;

        info!("stashed gateway order submitted");
        Ok(Some(OrderConfirmation {
            order_id,
            reference: request.vnp_txn_ref,
            total: Price::from_vnd(request.total_amount),
            payment_method: request.payment_method,
        }))
    }

    /// Submit an order, refreshing the access token once on a 401 and
    /// retrying exactly once.
    async fn submit_with_refresh(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<Option<OrderId>, CheckoutError> {
        let credentials = self
            .session
            .credentials()
            .ok_or(CheckoutError::LoginRequired)?;

        match self.api.create_order(&credentials, request).await {
            Ok(order_id) => Ok(order_id),
            Err(err) if err.is_unauthorized() => {
                warn!("access token rejected, refreshing once");
                if let Err(refresh_err) = self.session.refresh(&self.api).await {
                    return Err(match refresh_err {
                        RefreshError::Storage(e) => CheckoutError::Storage(e),
                        RefreshError::MissingCredential | RefreshError::Rejected(_) => {
                            CheckoutError::SessionExpired
                        }
                    });
                }

                let refreshed = self
                    .session
                    .credentials()
                    .ok_or(CheckoutError::SessionExpired)?;
                match self.api.create_order(&refreshed, request).await {
                    Ok(order_id) => Ok(order_id),
                    Err(err) if err.is_unauthorized() => Err(CheckoutError::SessionExpired),
                    Err(err) => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn stash_pending(&self, request: &CreateOrderRequest) -> Result<(), StorageError> {
        warn!("session dead, stashing paid order for later submission");
        self.session
            .storage()
            .set_json(keys::PENDING_ORDER, request)
            .await
    }
}

fn build_order_request(
    form: &RecipientForm,
    items: &[CartItem],
    payment_method: PaymentMethod,
    total: Price,
    txn_ref: Option<String>,
) -> CreateOrderRequest {
    CreateOrderRequest {
        recipient_name: form.full_name.trim().to_owned(),
        phone: form.phone.trim().to_owned(),
        address: form.address.trim().to_owned(),
        payment_method,
        total_amount: total.as_vnd(),
        vnp_txn_ref: txn_ref,
        cart: items
            .iter()
            .map(|item| OrderLineRequest {
                product: item.product_id.clone(),
                quantity: item.quantity,
                size: item.size.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use secrecy::SecretString;

    use lavande_core::ProductId;

    use crate::api::types::{LoginOutcome, TokenPair, UserRecord};
    use crate::storage::Storage;

    fn vnpay_config() -> VnpayConfig {
        VnpayConfig {
            tmn_code: "LAVANDE1".to_string(),
            hash_secret: SecretString::from("HUSXH1330A8TUE57O1UAS2Q5KBJYL1GD".to_string()),
            gateway_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "http://localhost:5173/vnpay_return".to_string(),
        }
    }

    fn form() -> RecipientForm {
        RecipientForm {
            full_name: "Trần Minh Hạnh".to_string(),
            phone: "0912 345 678".to_string(),
            address: "12 Lý Thường Kiệt, Hà Nội".to_string(),
            note: None,
        }
    }

    fn filled_cart() -> Cart {
        let mut cart = Cart::new();
        cart.add(CartItem {
            product_id: ProductId::new("p1"),
            title: "Đầm linen".to_string(),
            unit_price: Price::from_vnd(250_000),
            size: "M".to_string(),
            color: None,
            quantity: 1,
        });
        cart
    }

    async fn logged_in_flow(server: &MockServer, token: &str) -> (tempfile::TempDir, CheckoutFlow) {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionStore::load(Storage::new(dir.path())).await.unwrap();
        session
            .establish(&LoginOutcome {
                tokens: Some(TokenPair {
                    access_token: Some(token.to_string()),
                    refresh_token: Some("refresh-1".to_string()),
                }),
                user: Some(UserRecord {
                    id: lavande_core::UserId::new("u1"),
                    username: None,
                    email: None,
                }),
                message: None,
            })
            .await
            .unwrap();

        let api = ApiClient::from_base_url(server.base_url()).unwrap();
        let flow = CheckoutFlow::new(api, Arc::new(session), vnpay_config());
        (dir, flow)
    }

    #[tokio::test]
    async fn test_cod_order_clears_cart_on_acceptance() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/order").json_body_includes(
                    r#"{ "paymentMethod": "cash", "totalAmount": 250000 }"#,
                );
                then.status(200)
                    .json_body(serde_json::json!({ "metadata": { "_id": "ord1" } }));
            })
            .await;

        let (_dir, flow) = logged_in_flow(&server, "a.b.c").await;
        let mut cart = filled_cart();
        let confirmation = flow.place_cod_order(&mut cart, &form()).await.unwrap();
        mock.assert_async().await;

        assert!(cart.is_empty());
        assert_eq!(confirmation.order_id.unwrap().as_str(), "ord1");
        assert_eq!(confirmation.payment_method, PaymentMethod::Cash);
    }

    #[tokio::test]
    async fn test_cod_order_keeps_cart_on_server_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/order");
                then.status(500).body("boom");
            })
            .await;

        let (_dir, flow) = logged_in_flow(&server, "a.b.c").await;
        let mut cart = filled_cart();
        let err = flow.place_cod_order(&mut cart, &form()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Api(_)));
        assert_eq!(cart.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_retried_once() {
        let server = MockServer::start_async().await;
        let stale = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/order")
                    .header("authorization", "Bearer old.a.t");
                then.status(401).body("jwt expired");
            })
            .await;
        let refresh = server
            .mock_async(|when, then| {
                when.method(POST).path("/refresh-token");
                then.status(200)
                    .json_body(serde_json::json!({ "accessToken": "new.a.t" }));
            })
            .await;
        let fresh = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/order")
                    .header("authorization", "Bearer new.a.t");
                then.status(200)
                    .json_body(serde_json::json!({ "metadata": { "_id": "ord2" } }));
            })
            .await;

        let (_dir, flow) = logged_in_flow(&server, "old.a.t").await;
        let mut cart = filled_cart();
        let confirmation = flow.place_cod_order(&mut cart, &form()).await.unwrap();

        stale.assert_async().await;
        refresh.assert_async().await;
        fresh.assert_async().await;
        assert_eq!(confirmation.order_id.unwrap().as_str(), "ord2");
    }

    #[tokio::test]
    async fn test_declined_payment_keeps_cart() {
        let server = MockServer::start_async().await;
        let (_dir, flow) = logged_in_flow(&server, "a.b.c").await;

        let callback = PaymentCallback::from_url(
            "http://localhost:5173/vnpay_return?vnp_ResponseCode=24&vnp_TxnRef=ref1",
        );
        let mut cart = filled_cart();
        let err = flow
            .finalize_gateway_order(&mut cart, &form(), &callback)
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::PaymentDeclined { code } if code == "24"));
        assert_eq!(cart.len(), 1);
    }

    #[tokio::test]
    async fn test_gateway_amount_wins_over_cart_total() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/order")
                    .json_body_includes(r#"{ "totalAmount": 225000, "vnpTxnRef": "ref7" }"#);
                then.status(200)
                    .json_body(serde_json::json!({ "metadata": { "_id": "ord3" } }));
            })
            .await;

        let (_dir, flow) = logged_in_flow(&server, "a.b.c").await;
        let callback = PaymentCallback::from_url(
            "http://localhost:5173/vnpay_return?vnp_ResponseCode=00&vnp_Amount=22500000&vnp_TxnRef=ref7",
        );
        let mut cart = filled_cart();
        let confirmation = flow
            .finalize_gateway_order(&mut cart, &form(), &callback)
            .await
            .unwrap();
        mock.assert_async().await;

        assert!(cart.is_empty());
        assert_eq!(confirmation.total.as_vnd(), 225_000);
        assert_eq!(confirmation.reference.as_deref(), Some("ref7"));
    }

    #[tokio::test]
    async fn test_paid_order_without_session_is_stashed() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().unwrap();
        let session = SessionStore::load(Storage::new(dir.path())).await.unwrap();
        let api = ApiClient::from_base_url(server.base_url()).unwrap();
        let flow = CheckoutFlow::new(api, Arc::new(session), vnpay_config());

        let callback = PaymentCallback::from_url(
            "http://localhost:5173/vnpay_return?vnp_ResponseCode=00&vnp_Amount=25000000",
        );
        let mut cart = filled_cart();
        let err = flow
            .finalize_gateway_order(&mut cart, &form(), &callback)
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::SessionExpired));
        let stashed = flow.pending_order().await.unwrap().unwrap();
        assert_eq!(stashed.total_amount, 250_000);
        assert_eq!(stashed.payment_method, PaymentMethod::Vnpay);
        // Cart is preserved; the user may retry after signing in.
        assert_eq!(cart.len(), 1);
    }

    #[tokio::test]
    async fn test_resume_submits_and_clears_stash() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/order");
                then.status(200)
                    .json_body(serde_json::json!({ "metadata": { "_id": "ord4" } }));
            })
            .await;

        let (_dir, flow) = logged_in_flow(&server, "a.b.c").await;
        flow.session
            .storage()
            .set_json(
                keys::PENDING_ORDER,
                &build_order_request(
                    &form(),
                    filled_cart().items(),
                    PaymentMethod::Vnpay,
                    Price::from_vnd(250_000),
                    Some("68a9c3f0a1b2c3d4e5f60718".to_string()),
                ),
            )
            .await
            .unwrap();

        let confirmation = flow.resume_pending_order().await.unwrap().unwrap();
        mock.assert_async().await;
        assert_eq!(confirmation.order_id.unwrap().as_str(), "ord4");
        assert_eq!(
            confirmation.reference.as_deref(),
            Some("68a9c3f0a1b2c3d4e5f60718")
        );
        assert!(flow.pending_order().await.unwrap().is_none());

        // Nothing left to resume.
        assert!(flow.resume_pending_order().await.unwrap().is_none());
    }

    #[test]
    fn test_form_validation_order() {
        let mut bad = form();
        bad.full_name = "  ".to_string();
        assert!(matches!(bad.validate(), Err(FormError::MissingName)));

        let mut bad = form();
        bad.phone = "12ab".to_string();
        assert!(matches!(bad.validate(), Err(FormError::Phone(_))));

        let mut bad = form();
        bad.address = String::new();
        assert!(matches!(bad.validate(), Err(FormError::MissingAddress)));

        assert!(form().validate().is_ok());
    }
}
