//! Lavande Client - Typed SDK for the Lavande storefront API.
//!
//! Everything the mobile storefront computes client-side lives here as
//! library code: the session store, the in-memory cart, the signed VNPAY
//! redirect flow, checkout orchestration with a single refresh-and-retry,
//! and order tracking with its reconciliation cascade and polling watcher.
//!
//! # Modules
//!
//! - [`config`] - Environment-driven configuration
//! - [`storage`] - Unstructured key-value storage on disk
//! - [`session`] - Owned session store (access/refresh credentials + user)
//! - [`api`] - Typed HTTP client for the `/v1/api` endpoints
//! - [`cart`] - In-memory cart with promo codes
//! - [`checkout`] - Order submission and the VNPAY gateway-redirect flow
//! - [`tracking`] - Order reconciliation, history, and the polling watcher
//! - [`error`] - Umbrella error type

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod tracking;

pub use api::ApiClient;
pub use cart::Cart;
pub use checkout::CheckoutFlow;
pub use config::ClientConfig;
pub use error::ClientError;
pub use session::SessionStore;
pub use storage::Storage;
