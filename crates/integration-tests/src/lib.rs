//! Integration tests for the Lavande client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p lavande-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `checkout_vnpay` - Signed payment URL, callback handling, order submission
//! - `order_tracking` - Reference reconciliation and the offline cache
//! - `session_refresh` - The single refresh-and-retry on an expired token
//!
//! Every test runs against an `httpmock` server standing in for the
//! storefront API; nothing here talks to a real backend.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use httpmock::{Method::POST, MockServer};
use secrecy::SecretString;
use serde_json::{Value, json};

use lavande_client::config::VnpayConfig;
use lavande_client::{ApiClient, SessionStore, Storage};
use lavande_core::Email;

/// Signing secret used by gateway tests; high-entropy but obviously fake.
pub const TEST_HASH_SECRET: &str = "HUSXH1330A8TUE57O1UAS2Q5KBJYL1GD";

/// A mock API server plus a client and session store wired to it.
///
/// The session store lives in a temporary directory that is removed when
/// the harness drops.
pub struct TestHarness {
    pub server: MockServer,
    pub api: ApiClient,
    pub session: Arc<SessionStore>,
    data_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Start a mock server and a client with an empty session.
    pub async fn new() -> Self {
        let server = MockServer::start_async().await;
        let api = ApiClient::from_base_url(server.base_url()).expect("client builds");
        let data_dir = tempfile::tempdir().expect("tempdir");
        let session = Arc::new(
            SessionStore::load(Storage::new(data_dir.path()))
                .await
                .expect("session loads"),
        );
        Self {
            server,
            api,
            session,
            data_dir,
        }
    }

    /// Sign in as `user_id` through the login endpoint, the way the app
    /// does, so the session holds both tokens and the user record.
    pub async fn sign_in(&self, user_id: &str) {
        let token = fake_jwt(user_id);
        let login = self
            .server
            .mock_async(|when, then| {
                when.method(POST).path("/login");
                then.status(200).json_body(json!({
                    "data": {
                        "tokens": { "accessToken": token, "refreshToken": "refresh-1" },
                        "user": { "_id": user_id, "username": "hanh" }
                    }
                }));
            })
            .await;

        let email = Email::parse("hanh@example.com").expect("valid email");
        let outcome = self
            .api
            .login(&email, "Mk@12345")
            .await
            .expect("login succeeds");
        self.session
            .establish(&outcome)
            .await
            .expect("session established");

        // Later tests may mount their own /login expectations.
        login.delete_async().await;
    }

    /// Re-open the session store from the same directory, as a fresh
    /// process would.
    pub async fn reload_session(&mut self) {
        self.session = Arc::new(
            SessionStore::load(Storage::new(self.data_dir.path()))
                .await
                .expect("session reloads"),
        );
    }
}

/// Gateway configuration whose return URL carries the standard marker.
#[must_use]
pub fn vnpay_config() -> VnpayConfig {
    VnpayConfig {
        tmn_code: "LAVANDE1".to_string(),
        hash_secret: SecretString::from(TEST_HASH_SECRET.to_string()),
        gateway_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
        return_url: "http://localhost:5173/vnpay_return".to_string(),
    }
}

/// A structurally valid JWT whose payload carries a `userId` claim.
///
/// The signature is garbage; the client never verifies it.
#[must_use]
pub fn fake_jwt(user_id: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({ "userId": user_id }).to_string().as_bytes());
    format!("{header}.{payload}.s")
}

/// An order record in the server's wire shape.
#[must_use]
pub fn order_json(id: &str, status: &str, created_at: &str) -> Value {
    json!({
        "_id": id,
        "status": status,
        "totalAmount": 250_000,
        "createdAt": created_at,
        "cart": [],
    })
}
