//! Owned session store for authentication state.
//!
//! The session is an explicit object handed to the flows that need it, not
//! ambient global state: loaded from [`Storage`] once at startup, written on
//! login, cleared on logout. Order-scoped calls get credentials only when
//! the access token and user id are both present; a token without a user id
//! is treated as unauthenticated (after one attempt to recover the id from
//! the token's JWT payload).

use std::sync::RwLock;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use lavande_core::UserId;

use crate::api::types::{LoginOutcome, UserRecord};
use crate::api::{ApiClient, ApiError};
use crate::storage::{Storage, StorageError, keys};

/// Errors establishing or persisting a session.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The login response carried no access token.
    #[error("login did not return an access token")]
    MissingAccessToken,

    /// The access token does not have the three dot-separated JWT segments.
    #[error("access token is not JWT-shaped")]
    MalformedToken,

    /// No user id in the login response and none recoverable from the token.
    #[error("login did not identify the user")]
    MissingUserId,

    /// Persisting the session failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors refreshing the access credential.
///
/// Refresh failure never clears existing session state; callers decide
/// whether to prompt for re-login.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// No refresh credential is stored for this session.
    #[error("no refresh credential stored")]
    MissingCredential,

    /// The refresh endpoint rejected the request or failed.
    #[error("refresh failed: {0}")]
    Rejected(#[from] ApiError),

    /// Persisting the new access token failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Bearer token and user id attached to order-scoped requests.
///
/// Constructed only from a session holding both, which is what makes the
/// both-or-neither invariant hold everywhere downstream.
#[derive(Debug, Clone)]
pub struct AccessCredentials {
    pub token: String,
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
struct SessionState {
    access_token: String,
    refresh_token: Option<String>,
    user_id: UserId,
    user: Option<UserRecord>,
}

/// Authentication state shared by the client's flows.
pub struct SessionStore {
    storage: Storage,
    state: RwLock<Option<SessionState>>,
}

impl SessionStore {
    /// Load session state from storage.
    ///
    /// A stored token without a stored user id triggers one recovery
    /// attempt from the token's JWT payload (`userId`, then `_id` claim);
    /// a recovered id is written back. If no id can be found the store
    /// loads as unauthenticated without touching the stored values.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or written.
    pub async fn load(storage: Storage) -> Result<Self, StorageError> {
        let access_token = storage.get(keys::ACCESS_TOKEN).await?;
        let refresh_token = storage.get(keys::REFRESH_TOKEN).await?;
        let mut user_id = storage.get(keys::USER_ID).await?;

        let user = match storage.get_json::<UserRecord>(keys::USER_RECORD).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "stored user record unreadable, ignoring");
                None
            }
        };

        if user_id.is_none()
            && let Some(token) = access_token.as_deref()
            && let Some(recovered) = user_id_claim(token)
        {
            debug!("recovered user id from token payload");
            storage.set(keys::USER_ID, &recovered).await?;
            user_id = Some(recovered);
        }

        let state = match (access_token, user_id) {
            (Some(access_token), Some(user_id)) => Some(SessionState {
                access_token,
                refresh_token,
                user_id: UserId::new(user_id),
                user,
            }),
            _ => None,
        };

        Ok(Self {
            storage,
            state: RwLock::new(state),
        })
    }

    fn read_state(&self) -> Option<SessionState> {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn write_state(&self, state: Option<SessionState>) {
        match self.state.write() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    /// Whether a full credential pair is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read_state().is_some()
    }

    /// Credentials for order-scoped calls, if authenticated.
    #[must_use]
    pub fn credentials(&self) -> Option<AccessCredentials> {
        self.read_state().map(|state| AccessCredentials {
            token: state.access_token,
            user_id: state.user_id,
        })
    }

    /// The logged-in user's id, if authenticated.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.read_state().map(|state| state.user_id)
    }

    /// The cached user record, when the login response included one.
    #[must_use]
    pub fn current_user(&self) -> Option<UserRecord> {
        self.read_state().and_then(|state| state.user)
    }

    /// Establish a session from a login outcome and persist it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingAccessToken`] when the outcome has no
    /// token (the session stays logged out), [`AuthError::MalformedToken`]
    /// for a token without JWT shape, [`AuthError::MissingUserId`] when no
    /// user id is present or recoverable, and storage errors on write.
    #[instrument(skip(self, outcome))]
    pub async fn establish(&self, outcome: &LoginOutcome) -> Result<UserRecord, AuthError> {
        let access_token = outcome
            .tokens
            .as_ref()
            .and_then(|tokens| tokens.access_token.as_deref())
            .ok_or(AuthError::MissingAccessToken)?;

        if !is_jwt_shaped(access_token) {
            return Err(AuthError::MalformedToken);
        }

        let user = outcome.user.clone().or_else(|| {
            user_id_claim(access_token).map(|id| UserRecord {
                id: UserId::new(id),
                username: None,
                email: None,
            })
        });
        let user = user.ok_or(AuthError::MissingUserId)?;

        let refresh_token = outcome
            .tokens
            .as_ref()
            .and_then(|tokens| tokens.refresh_token.clone());

        self.storage.set(keys::ACCESS_TOKEN, access_token).await?;
        self.storage
            .set(keys::USER_ID, user.id.as_str())
            .await?;
        if let Some(refresh) = refresh_token.as_deref() {
            self.storage.set(keys::REFRESH_TOKEN, refresh).await?;
        }
        self.storage.set_json(keys::USER_RECORD, &user).await?;

        self.write_state(Some(SessionState {
            access_token: access_token.to_owned(),
            refresh_token,
            user_id: user.id.clone(),
            user: Some(user.clone()),
        }));

        debug!(user_id = %user.id, "session established");
        Ok(user)
    }

    /// Log out: clear in-memory state and remove the credential keys.
    ///
    /// The cached order list is deliberately kept so history still renders
    /// offline after a logout.
    ///
    /// # Errors
    ///
    /// Returns an error if a key cannot be removed.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.write_state(None);
        self.storage.remove(keys::ACCESS_TOKEN).await?;
        self.storage.remove(keys::REFRESH_TOKEN).await?;
        self.storage.remove(keys::USER_ID).await?;
        self.storage.remove(keys::USER_RECORD).await?;
        Ok(())
    }

    /// Exchange the refresh credential for a new access token.
    ///
    /// On success the new token is persisted and takes effect immediately.
    /// On any failure existing state is left untouched. Concurrent calls
    /// are not queued: if two flows race, both refresh independently.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::MissingCredential`] when the session has no
    /// refresh token, the API error when the endpoint rejects the exchange,
    /// and storage errors on persist.
    #[instrument(skip(self, api))]
    pub async fn refresh(&self, api: &ApiClient) -> Result<(), RefreshError> {
        let state = self.read_state().ok_or(RefreshError::MissingCredential)?;
        let refresh_token = state
            .refresh_token
            .clone()
            .ok_or(RefreshError::MissingCredential)?;

        let access_token = api.refresh_token(&refresh_token, &state.user_id).await?;

        self.storage.set(keys::ACCESS_TOKEN, &access_token).await?;
        self.write_state(Some(SessionState {
            access_token,
            ..state
        }));

        debug!("access token refreshed");
        Ok(())
    }

    /// The storage this session persists to.
    #[must_use]
    pub const fn storage(&self) -> &Storage {
        &self.storage
    }
}

/// Whether a token has the three dot-separated segments of a JWT.
fn is_jwt_shaped(token: &str) -> bool {
    token.split('.').count() == 3
}

/// Decode the JWT payload and pull out the user id claim, trying `userId`
/// then `_id`.
fn user_id_claim(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;

    for claim in ["userId", "_id"] {
        if let Some(id) = claims.get(claim).and_then(serde_json::Value::as_str) {
            return Some(id.to_owned());
        }
    }
    None
}
