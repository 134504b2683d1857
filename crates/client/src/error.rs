//! Unified error handling with Sentry integration.
//!
//! Provides a single `ClientError` that the binary surfaces to users, plus
//! the Sentry context helpers the flows call as the user moves around.

use thiserror::Error;

use crate::api::ApiError;
use crate::checkout::{CheckoutError, VnpayError};
use crate::config::ConfigError;
use crate::session::{AuthError, RefreshError};
use crate::storage::StorageError;
use crate::tracking::TrackingError;

/// Top-level error type for the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration could not be loaded or validated.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Local state could not be read or written.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Establishing or persisting a session failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// The access token could not be refreshed.
    #[error("Session refresh error: {0}")]
    Refresh(#[from] RefreshError),

    /// An API call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Checkout could not complete.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Order history or tracking failed.
    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    /// Payment URL construction failed.
    #[error("Payment error: {0}")]
    Vnpay(#[from] VnpayError),
}

impl ClientError {
    /// Whether this error is a fault worth reporting, as opposed to an
    /// expected outcome of user input (declined payment, wrong password,
    /// signed-out session).
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        match self {
            Self::Config(_) | Self::Storage(_) | Self::Vnpay(_) => true,
            Self::Api(err) => matches!(err, ApiError::Http(_) | ApiError::Shape(_)),
            Self::Checkout(err) => matches!(
                err,
                CheckoutError::Api(ApiError::Http(_) | ApiError::Shape(_))
                    | CheckoutError::Storage(_)
                    | CheckoutError::Vnpay(_)
            ),
            Self::Tracking(err) => matches!(
                err,
                TrackingError::Api(ApiError::Http(_) | ApiError::Shape(_))
                    | TrackingError::Storage(_)
            ),
            Self::Auth(_) | Self::Refresh(_) => false,
        }
    }
}

/// Capture a fault to Sentry, returning the error for further handling.
///
/// Expected outcomes pass through untouched.
pub fn capture(error: ClientError) -> ClientError {
    if error.is_reportable() {
        let event_id = sentry::capture_error(&error);
        tracing::error!(error = %error, sentry_event_id = %event_id, "Client error");
    }
    error
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user
/// actions leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
