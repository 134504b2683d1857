//! Account endpoints: login, registration, token refresh, password change.

use serde_json::json;
use thiserror::Error;
use tracing::instrument;

use lavande_core::{Email, Phone, UserId};

use crate::api::types::{AckResponse, LoginEnvelope, LoginOutcome};
use crate::api::{ApiClient, ApiError, extract_item};
use crate::session::AccessCredentials;

/// Minimum password length accepted by [`validate_new_password`].
pub const MIN_PASSWORD_LENGTH: usize = 6;

const SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Local password policy violations, checked before the network round trip.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    TooShort,

    #[error("password must not contain spaces")]
    ContainsSpace,

    #[error("password must start with an uppercase letter")]
    MissingUppercaseStart,

    #[error("password must contain a special character")]
    MissingSpecial,
}

/// Check a new password against the local policy.
///
/// The server applies the same rules; checking here keeps the failure
/// off the network and the message immediate.
///
/// # Errors
///
/// Returns the first violated rule.
pub fn validate_new_password(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    if password.contains(' ') {
        return Err(PasswordError::ContainsSpace);
    }
    if !password.chars().next().is_some_and(char::is_uppercase) {
        return Err(PasswordError::MissingUppercaseStart);
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        return Err(PasswordError::MissingSpecial);
    }
    Ok(())
}

impl ApiClient {
    /// Authenticate with email and password.
    ///
    /// Always returns the parsed outcome on a well-formed response, even
    /// when it carries no tokens; deciding whether that outcome establishes
    /// a session belongs to [`crate::session::SessionStore::establish`].
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or a
    /// response that is not a JSON object.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &Email, password: &str) -> Result<LoginOutcome, ApiError> {
        let body = json!({ "email": email.as_str(), "password": password });
        let value = self.post_value("/login", &body, None).await?;

        let envelope: LoginEnvelope = serde_json::from_value(value.clone())
            .map_err(|e| ApiError::Shape(format!("login response: {e}")))?;

        // Older deployments nest the payload under `metadata` instead of
        // `data`, or put tokens at the top level.
        let data = match envelope.data {
            Some(data) => Some(data),
            None => serde_json::from_value(extract_item(&value).clone()).ok(),
        };

        let (tokens, user) = data.map_or((None, None), |data| (data.tokens, data.user));
        Ok(LoginOutcome {
            tokens,
            user,
            message: envelope.message,
        })
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Api`] when the server acknowledges the request
    /// but rejects it (duplicate email, weak password), and transport or
    /// shape errors otherwise.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn register(
        &self,
        username: &str,
        email: &Email,
        phone: &Phone,
        password: &str,
    ) -> Result<(), ApiError> {
        let body = json!({
            "username": username,
            "email": email.as_str(),
            "phone": phone.as_str(),
            "password": password,
        });
        let value = self.post_value("/register", &body, None).await?;
        Self::expect_ack(&value, "registration")
    }

    /// Exchange a refresh credential for a new access token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] when the refresh token itself is
    /// rejected, and [`ApiError::Shape`] when the response carries no
    /// `accessToken`.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        user_id: &UserId,
    ) -> Result<String, ApiError> {
        let body = json!({
            "refreshToken": refresh_token,
            "userId": user_id.as_str(),
        });
        let value = self.post_value("/refresh-token", &body, None).await?;

        value
            .get("accessToken")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ApiError::Shape("refresh response missing accessToken".to_string()))
    }

    /// Change the logged-in user's password.
    ///
    /// Callers should run [`validate_new_password`] first; the server
    /// enforces the same policy.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Api`] when the current password is wrong, and
    /// transport or shape errors otherwise.
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        credentials: &AccessCredentials,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let body = json!({
            "currentPassword": current_password,
            "newPassword": new_password,
        });
        let value = self
            .post_value("/reset-password", &body, Some(credentials))
            .await?;
        Self::expect_ack(&value, "password change")
    }

    /// Interpret an acknowledgement body, treating either `success: true`
    /// or a 200 body status as accepted. Some endpoints report app-level
    /// failure inside an HTTP 200.
    fn expect_ack(value: &serde_json::Value, what: &str) -> Result<(), ApiError> {
        let ack: AckResponse = serde_json::from_value(value.clone()).unwrap_or_default();

        if ack.success == Some(true) || ack.status == Some(200) {
            return Ok(());
        }

        let status = ack
            .status
            .and_then(|status| u16::try_from(status).ok())
            .unwrap_or(200);
        Err(ApiError::Api {
            status,
            message: ack
                .message
                .unwrap_or_else(|| format!("{what} was not acknowledged")),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::from_base_url(server.base_url()).unwrap()
    }

    #[test]
    fn test_password_policy() {
        assert_eq!(validate_new_password("Ab1!xy"), Ok(()));
        assert_eq!(validate_new_password("Ab!"), Err(PasswordError::TooShort));
        assert_eq!(
            validate_new_password("Abc de!"),
            Err(PasswordError::ContainsSpace)
        );
        assert_eq!(
            validate_new_password("abcdef!"),
            Err(PasswordError::MissingUppercaseStart)
        );
        assert_eq!(
            validate_new_password("Abcdefg"),
            Err(PasswordError::MissingSpecial)
        );
    }

    #[tokio::test]
    async fn test_login_flattens_envelope() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/login")
                    .json_body(serde_json::json!({
                        "email": "hanh@lavande.vn",
                        "password": "Secret!1",
                    }));
                then.status(200).json_body(serde_json::json!({
                    "message": "OK",
                    "data": {
                        "tokens": { "accessToken": "a.b.c", "refreshToken": "r1" },
                        "user": { "_id": "u1", "username": "hanh" },
                    },
                }));
            })
            .await;

        let email = Email::parse("hanh@lavande.vn").unwrap();
        let outcome = client(&server).login(&email, "Secret!1").await.unwrap();
        mock.assert_async().await;

        let tokens = outcome.tokens.unwrap();
        assert_eq!(tokens.access_token.as_deref(), Some("a.b.c"));
        assert_eq!(tokens.refresh_token.as_deref(), Some("r1"));
        assert_eq!(outcome.user.unwrap().id.as_str(), "u1");
    }

    #[tokio::test]
    async fn test_login_reads_metadata_envelope() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/login");
                then.status(200).json_body(serde_json::json!({
                    "metadata": {
                        "tokens": { "accessToken": "x.y.z" },
                    },
                }));
            })
            .await;

        let email = Email::parse("hanh@lavande.vn").unwrap();
        let outcome = client(&server).login(&email, "pw").await.unwrap();
        assert_eq!(
            outcome.tokens.unwrap().access_token.as_deref(),
            Some("x.y.z")
        );
    }

    #[tokio::test]
    async fn test_login_without_tokens_is_not_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/login");
                then.status(200)
                    .json_body(serde_json::json!({ "message": "Wrong password" }));
            })
            .await;

        let email = Email::parse("hanh@lavande.vn").unwrap();
        let outcome = client(&server).login(&email, "bad").await.unwrap();
        assert!(outcome.tokens.is_none());
        assert_eq!(outcome.message.as_deref(), Some("Wrong password"));
    }

    #[tokio::test]
    async fn test_register_accepts_status_200_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/register");
                then.status(200)
                    .json_body(serde_json::json!({ "status": 200, "message": "created" }));
            })
            .await;

        let email = Email::parse("moi@lavande.vn").unwrap();
        let phone = Phone::parse("0912345678").unwrap();
        client(&server)
            .register("moi", &email, &phone, "Secret!1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_register_surfaces_body_level_rejection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/register");
                then.status(200).json_body(
                    serde_json::json!({ "status": 409, "message": "Email already registered" }),
                );
            })
            .await;

        let email = Email::parse("moi@lavande.vn").unwrap();
        let phone = Phone::parse("0912345678").unwrap();
        let err = client(&server)
            .register("moi", &email, &phone, "Secret!1")
            .await
            .unwrap_err();
        match err {
            ApiError::Api { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "Email already registered");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_token_round_trip() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/refresh-token")
                    .json_body(serde_json::json!({
                        "refreshToken": "r1",
                        "userId": "u1",
                    }));
                then.status(200)
                    .json_body(serde_json::json!({ "accessToken": "new.a.t" }));
            })
            .await;

        let token = client(&server)
            .refresh_token("r1", &UserId::new("u1"))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(token, "new.a.t");
    }

    #[tokio::test]
    async fn test_refresh_token_missing_field_is_shape_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/refresh-token");
                then.status(200).json_body(serde_json::json!({ "ok": true }));
            })
            .await;

        let err = client(&server)
            .refresh_token("r1", &UserId::new("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Shape(_)));
    }
}
