//! Account commands: register, login, logout, whoami, change-password.
//!
//! # Usage
//!
//! ```bash
//! # Create an account
//! lavande register -u minh -e minh@example.com --phone 0912345678 --password "Mk@12345"
//!
//! # Sign in; the session is stored under LAVANDE_DATA_DIR
//! lavande login -e minh@example.com -p "Mk@12345"
//! ```
//!
//! A stored session survives across invocations; `logout` removes it.

use lavande_client::api::ApiError;
use lavande_client::api::auth::{PasswordError, validate_new_password};
use lavande_client::error::{clear_sentry_user, set_sentry_user};
use lavande_client::session::AuthError;
use lavande_client::storage::StorageError;
use lavande_core::{Email, EmailError, Phone, PhoneError, Price};
use thiserror::Error;

use super::CommandContext;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Email rejected client-side.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Phone number rejected client-side.
    #[error("Invalid phone number: {0}")]
    InvalidPhone(#[from] PhoneError),

    /// New password rejected client-side.
    #[error("Weak password: {0}")]
    WeakPassword(#[from] PasswordError),

    /// The server answered but did not open a session.
    #[error("Login failed: {0}")]
    LoginFailed(String),

    /// No stored session.
    #[error("Not signed in. Run `lavande login` first")]
    NotSignedIn,

    /// The stored token was rejected by the server.
    #[error("Session expired. Run `lavande login` again")]
    SessionExpired,

    /// API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The login response could not establish a session.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The stored session could not be written or removed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Create an account.
///
/// Client-side checks run first so obviously bad input never reaches the
/// server: email shape, phone shape, then the password policy.
pub async fn register(
    ctx: &CommandContext,
    username: &str,
    email: &str,
    phone: &str,
    password: &str,
) -> Result<(), AccountError> {
    let email = Email::parse(email)?;
    let phone = Phone::parse(phone)?;
    validate_new_password(password)?;

    ctx.api.register(username, &email, &phone, password).await?;

    tracing::info!("Account created for {}", email.as_str());
    tracing::info!("Sign in with: lavande login -e {} -p <password>", email.as_str());
    Ok(())
}

/// Sign in and persist the session.
pub async fn login(ctx: &CommandContext, email: &str, password: &str) -> Result<(), AccountError> {
    let email = Email::parse(email)?;

    let outcome = ctx.api.login(&email, password).await?;

    match ctx.session.establish(&outcome).await {
        Ok(user) => {
            set_sentry_user(&user.id, user.email.as_deref());
            tracing::info!(
                "Signed in as {}",
                user.username.as_deref().unwrap_or_else(|| email.as_str())
            );

            // A paid gateway order may have been parked while signed out.
            if let Ok(Some(request)) = ctx.checkout().pending_order().await {
                tracing::info!(
                    "A paid order for {} is waiting to be submitted. Run `lavande shop` and type `resume`.",
                    Price::from_vnd(request.total_amount)
                );
            }
            Ok(())
        }
        // A 200 with no token is how the server reports bad credentials.
        Err(AuthError::MissingAccessToken) => {
            let message = outcome
                .message
                .unwrap_or_else(|| "no access token in response".to_owned());
            Err(AccountError::LoginFailed(message))
        }
        Err(e) => Err(e.into()),
    }
}

/// Sign out and remove the stored session.
pub async fn logout(ctx: &CommandContext) -> Result<(), AccountError> {
    if !ctx.session.is_authenticated() {
        tracing::info!("Already signed out");
        return Ok(());
    }

    ctx.session.clear().await?;
    clear_sentry_user();
    tracing::info!("Signed out");
    Ok(())
}

/// Change the signed-in account's password.
pub async fn change_password(
    ctx: &CommandContext,
    current: &str,
    new: &str,
) -> Result<(), AccountError> {
    validate_new_password(new)?;

    let credentials = ctx.session.credentials().ok_or(AccountError::NotSignedIn)?;
    ctx.api
        .change_password(&credentials, current, new)
        .await
        .map_err(|err| match err {
            ApiError::Unauthorized => AccountError::SessionExpired,
            other => AccountError::Api(other),
        })?;

    tracing::info!("Password changed");
    Ok(())
}

/// Show the signed-in user.
pub fn whoami(ctx: &CommandContext) -> Result<(), AccountError> {
    let user_id = ctx.session.user_id().ok_or(AccountError::NotSignedIn)?;

    if let Some(user) = ctx.session.current_user() {
        tracing::info!(
            "Signed in as {} ({})",
            user.username.as_deref().unwrap_or("unknown"),
            user_id
        );
        if let Some(email) = user.email.as_deref() {
            tracing::info!("  Email: {}", email);
        }
    } else {
        tracing::info!("Signed in as {}", user_id);
    }
    Ok(())
}
