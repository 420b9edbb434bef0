//! Admin/vendor session lifecycle.
//!
//! The session is a two-state machine driven by [`SessionEvent`]s. Every
//! entry point that talks to the backend funnels its failures through
//! [`classify_failure`], so a 401 anywhere ends the session the same way.

use std::fmt;
use thiserror::Error;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::api::{ApiClient, ApiError};
use crate::endpoints;
use crate::models::Profile;
use crate::storage::{self, SecureStore, StorageError};

pub const NOTICE_EXPIRED: &str = "Session expired.";
pub const NOTICE_SIGNED_OUT: &str = "Signed out.";
pub const MSG_MISSING_CREDENTIALS: &str = "Enter email and password to continue.";
const MSG_SIGN_IN_FAILED: &str = "Sign in failed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Vendor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Vendor => "vendor",
        }
    }

    pub fn mismatch_message(self) -> &'static str {
        match self {
            Role::Admin => "This account is not an admin.",
            Role::Vendor => "This account is not a vendor.",
        }
    }

    fn matches(self, raw: Option<&str>) -> bool {
        raw.map(str::trim) == Some(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Eq)]
pub enum SessionState {
    SignedOut { notice: Option<String> },
    SignedIn { token: Zeroizing<String>, profile: Profile },
}

pub enum SessionEvent {
    SignedIn { token: String, profile: Profile },
    SignedOut,
    /// A request came back 401.
    Expired,
    /// The account is valid but may not use this console.
    Rejected(String),
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::SignedOut { notice: None }
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::SignedOut { notice } => f
                .debug_struct("SignedOut")
                .field("notice", notice)
                .finish(),
            SessionState::SignedIn { profile, .. } => f
                .debug_struct("SignedIn")
                .field("token", &"<redacted>")
                .field("profile", profile)
                .finish(),
        }
    }
}

impl SessionState {
    /// The only transition function. Dropping the previous state zeroizes
    /// its token.
    pub fn apply(self, event: SessionEvent) -> SessionState {
        match event {
            SessionEvent::SignedIn { token, profile } => SessionState::SignedIn {
                token: Zeroizing::new(token),
                profile,
            },
            SessionEvent::SignedOut => SessionState::SignedOut {
                notice: Some(NOTICE_SIGNED_OUT.to_string()),
            },
            SessionEvent::Expired => SessionState::SignedOut {
                notice: Some(NOTICE_EXPIRED.to_string()),
            },
            SessionEvent::Rejected(message) => SessionState::SignedOut {
                notice: Some(message),
            },
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            SessionState::SignedIn { token, .. } => Some(token.as_str()),
            SessionState::SignedOut { .. } => None,
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        match self {
            SessionState::SignedIn { profile, .. } => Some(profile),
            SessionState::SignedOut { .. } => None,
        }
    }

    pub fn notice(&self) -> Option<&str> {
        match self {
            SessionState::SignedOut { notice } => notice.as_deref(),
            SessionState::SignedIn { .. } => None,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self, SessionState::SignedIn { .. })
    }
}

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    SessionExpired,
    Message(String),
}

/// 401 ends the session; anything else becomes an inline message.
pub fn classify_failure(err: &ApiError, fallback: &str) -> Failure {
    if err.is_unauthorized() {
        return Failure::SessionExpired;
    }
    Failure::Message(failure_message(err, fallback))
}

fn failure_message(err: &ApiError, fallback: &str) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{}", MSG_MISSING_CREDENTIALS)]
    MissingCredentials,

    #[error("{}", .0.mismatch_message())]
    WrongRole(Role),

    #[error("{0}")]
    Rejected(String),

    #[error("Could not save session: {0}")]
    Storage(#[from] StorageError),
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Sign in with email and password, requiring `required_role`.
///
/// Validation happens before any I/O. On success the token is persisted.
pub async fn sign_in(
    client: &ApiClient,
    store: &dyn SecureStore,
    email: &str,
    password: &str,
    required_role: Role,
) -> Result<SessionState, AuthError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    // A 401 here means bad credentials, not an expired session.
    let response = endpoints::login(client, email, password)
        .await
        .map_err(|e| AuthError::Rejected(failure_message(&e, MSG_SIGN_IN_FAILED)))?;

    if !required_role.matches(response.role.as_deref()) {
        warn!(role = ?response.role, required = required_role.as_str(), "sign-in rejected: role mismatch");
        return Err(AuthError::WrongRole(required_role));
    }
    if response.token.trim().is_empty() {
        return Err(AuthError::Rejected(MSG_SIGN_IN_FAILED.to_string()));
    }

    storage::save_token(store, &response.token)?;
    info!(email = ?response.email, role = required_role.as_str(), "signed in");

    let profile = response.profile();
    Ok(SessionState::default().apply(SessionEvent::SignedIn {
        token: response.token,
        profile,
    }))
}

/// Rebuild the session from the stored token.
///
/// A 401 or a role mismatch on the profile lookup ends the session and
/// clears the stored token. Transport failures leave the token in place.
pub async fn restore(
    client: &ApiClient,
    store: &dyn SecureStore,
    required_role: Role,
) -> Result<SessionState, ApiError> {
    let Some(token) = storage::load_token(store).map(Zeroizing::new) else {
        return Ok(SessionState::default());
    };

    match endpoints::me(client, &token).await {
        Ok(profile) => {
            if profile.role.is_some() && !required_role.matches(profile.role.as_deref()) {
                storage::clear_token(store);
                return Ok(SessionState::default().apply(SessionEvent::Rejected(
                    required_role.mismatch_message().to_string(),
                )));
            }
            Ok(SessionState::default().apply(SessionEvent::SignedIn {
                token: token.as_str().to_string(),
                profile,
            }))
        }
        Err(e) if e.is_unauthorized() => Ok(expire(store)),
        Err(e) => Err(e),
    }
}

pub fn sign_out(store: &dyn SecureStore) -> SessionState {
    storage::clear_token(store);
    info!("signed out");
    SessionState::default().apply(SessionEvent::SignedOut)
}

/// End the session after a 401.
pub fn expire(store: &dyn SecureStore) -> SessionState {
    storage::clear_token(store);
    warn!("session expired");
    SessionState::default().apply(SessionEvent::Expired)
}
