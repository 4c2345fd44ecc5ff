//! Authentication state.
//!
//! The session store is the only owner of the bearer credential. It performs
//! no I/O: persisting the credential between runs is handled by the
//! [`CredentialStore`](crate::persistence::CredentialStore) at the manager
//! boundary.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::{ChatError, ChatResult};
use crate::types::{Credential, User};

/// Shared handle to the session store
pub type SharedSession = Arc<RwLock<SessionStore>>;

/// Authentication state. Exactly one is live at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated { user: User, credential: Credential },
    Failed { reason: String },
}

impl AuthState {
    /// Short name for logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Anonymous => "Anonymous",
            Self::Authenticating => "Authenticating",
            Self::Authenticated { .. } => "Authenticated",
            Self::Failed { .. } => "Failed",
        }
    }
}

/// Holds the authentication state machine.
#[derive(Debug, Default)]
pub struct SessionStore {
    state: AuthState,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh store in a shared handle
    pub fn shared() -> SharedSession {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated { .. })
    }

    pub fn user(&self) -> Option<&User> {
        match &self.state {
            AuthState::Authenticated { user, .. } => Some(user),
            _ => None,
        }
    }

    /// Credential to attach to outgoing requests, if signed in.
    pub fn credential(&self) -> Option<&Credential> {
        match &self.state {
            AuthState::Authenticated { credential, .. } => Some(credential),
            _ => None,
        }
    }

    /// Start a password login.
    ///
    /// Rejected without a transition while another login is in flight or
    /// when either field is blank. Re-entry from `Failed` is allowed.
    pub fn begin_login(&mut self, email: &str, password: &str) -> ChatResult<()> {
        self.ensure_not_authenticating("begin_login")?;

        if email.trim().is_empty() {
            return Err(ChatError::Invalid("Email is required".to_string()));
        }
        if password.is_empty() {
            return Err(ChatError::Invalid("Password is required".to_string()));
        }

        info!(email = %email.trim(), from = self.state.name(), "Login started");
        self.state = AuthState::Authenticating;
        Ok(())
    }

    /// Start validating a credential persisted by an earlier run.
    pub fn begin_restore(&mut self) -> ChatResult<()> {
        self.ensure_not_authenticating("begin_restore")?;
        self.state = AuthState::Authenticating;
        Ok(())
    }

    /// Finish a login. Only valid while `Authenticating`.
    pub fn complete_login(&mut self, user: User, credential: Credential) -> ChatResult<()> {
        if self.state != AuthState::Authenticating {
            return Err(ChatError::invalid_state(
                self.state.name(),
                "Authenticating",
                "complete_login",
            ));
        }

        info!(user = %user.username, "Login completed");
        self.state = AuthState::Authenticated { user, credential };
        Ok(())
    }

    /// Record a failed login. Only valid while `Authenticating`.
    pub fn fail_login(&mut self, reason: impl Into<String>) -> ChatResult<()> {
        if self.state != AuthState::Authenticating {
            return Err(ChatError::invalid_state(
                self.state.name(),
                "Authenticating",
                "fail_login",
            ));
        }

        let reason = reason.into();
        warn!(reason = %reason, "Login failed");
        self.state = AuthState::Failed { reason };
        Ok(())
    }

    /// Treat a credential rejection as session expiry.
    ///
    /// Applies only to an authenticated session; a logout or a new login
    /// that happened while the rejected request was in flight is left alone.
    /// Returns whether the state changed.
    pub fn expire(&mut self, reason: impl Into<String>) -> bool {
        if !self.is_authenticated() {
            return false;
        }

        let reason = reason.into();
        warn!(reason = %reason, "Session expired");
        self.state = AuthState::Failed { reason };
        true
    }

    /// Drop the credential and return to `Anonymous` from any state.
    pub fn logout(&mut self) {
        if self.state != AuthState::Anonymous {
            info!(from = self.state.name(), "Logged out");
        }
        self.state = AuthState::Anonymous;
    }

    fn ensure_not_authenticating(&self, operation: &str) -> ChatResult<()> {
        if self.state == AuthState::Authenticating {
            return Err(ChatError::invalid_state(
                self.state.name(),
                "Anonymous, Authenticated or Failed",
                operation,
            ));
        }
        Ok(())
    }
}
