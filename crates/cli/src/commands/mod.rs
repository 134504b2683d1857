//! Command implementations.
//!
//! Each submodule owns one command family and its own error type; shared
//! wiring (config, API client, stored session) lives in [`CommandContext`].

use std::sync::Arc;

use lavande_client::checkout::CheckoutFlow;
use lavande_client::tracking::OrderTracker;
use lavande_client::{ApiClient, ClientConfig, ClientError, SessionStore, Storage};

pub mod account;
pub mod catalog;
pub mod chat;
pub mod orders;
pub mod shop;

/// Shared wiring handed to every command.
pub struct CommandContext {
    pub config: ClientConfig,
    pub api: ApiClient,
    pub session: Arc<SessionStore>,
}

impl CommandContext {
    /// Build the API client and load any session stored on disk.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built or the stored
    /// session cannot be read.
    pub async fn init(config: ClientConfig) -> Result<Self, ClientError> {
        let api = ApiClient::new(&config)?;
        let session = Arc::new(SessionStore::load(Storage::new(&config.data_dir)).await?);
        Ok(Self {
            config,
            api,
            session,
        })
    }

    /// Checkout orchestrator bound to this context.
    #[must_use]
    pub fn checkout(&self) -> CheckoutFlow {
        CheckoutFlow::new(
            self.api.clone(),
            Arc::clone(&self.session),
            self.config.vnpay.clone(),
        )
    }

    /// Order tracker bound to this context.
    #[must_use]
    pub fn tracker(&self) -> OrderTracker {
        OrderTracker::new(self.api.clone(), Arc::clone(&self.session))
    }
}
