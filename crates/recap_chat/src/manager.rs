//! Chat manager.
//!
//! Main entry point for a UI: wires the session store, the transcript, the
//! remote gateway and the credential cache together and exposes account,
//! chat and submission operations over them.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::coordinator::IngestionCoordinator;
use crate::error::{ChatError, ChatResult, GatewayError, GatewayResult};
use crate::gateway::RemoteGateway;
use crate::history::{self, HistoryEntry};
use crate::http::HttpGateway;
use crate::persistence::{CredentialStore, FileCredentialStore};
use crate::session::{AuthState, SessionStore, SharedSession};
use crate::transcript::{SharedTranscript, TranscriptStore};
use crate::types::{Chat, ChatId, Committed, Credential, Submission, User};

/// Title given to chats created without one.
pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;

/// Main chat manager
pub struct ChatManager {
    gateway: Arc<dyn RemoteGateway>,
    session: SharedSession,
    transcript: SharedTranscript,
    coordinator: IngestionCoordinator,
    credentials: Arc<dyn CredentialStore>,
}

impl ChatManager {
    pub fn new(gateway: Arc<dyn RemoteGateway>, credentials: Arc<dyn CredentialStore>) -> Self {
        let session = SessionStore::shared();
        let transcript = TranscriptStore::shared();
        let coordinator = IngestionCoordinator::new(gateway.clone(), session.clone(), transcript.clone());

        Self {
            gateway,
            session,
            transcript,
            coordinator,
            credentials,
        }
    }

    /// Manager talking to the HTTP service, caching the credential under the state dir.
    pub fn from_config(config: &ClientConfig) -> ChatResult<Self> {
        let gateway = HttpGateway::from_config(config)?;
        let credentials = FileCredentialStore::new(config.credential_path());
        Ok(Self::new(Arc::new(gateway), Arc::new(credentials)))
    }

    pub fn session(&self) -> SharedSession {
        self.session.clone()
    }

    pub fn transcript(&self) -> SharedTranscript {
        self.transcript.clone()
    }

    pub fn coordinator(&self) -> &IngestionCoordinator {
        &self.coordinator
    }

    pub fn auth_state(&self) -> AuthState {
        self.session.read().state().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.read().user().cloned()
    }

    // --- account ---

    /// Create an account and sign it in.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> ChatResult<User> {
        validate_registration(username, email, password)?;

        let user = self.gateway.register(username.trim(), email.trim(), password).await?;
        info!(user = %user.username, "Account registered");

        self.login(email, password).await
    }

    /// Exchange email and password for a credential and load the profile.
    pub async fn login(&self, email: &str, password: &str) -> ChatResult<User> {
        self.session.write().begin_login(email, password)?;

        match self.authenticate(email.trim(), password).await {
            Ok((user, credential)) => {
                self.session.write().complete_login(user.clone(), credential.clone())?;
                if let Err(e) = self.credentials.save(&credential) {
                    warn!(error = %e, "Failed to cache credential");
                }
                Ok(user)
            }
            Err(error) => {
                // A logout while the request was in flight has already moved the state on
                if let Err(e) = self.session.write().fail_login(error.to_string()) {
                    debug!(error = %e, "Login failure not recorded");
                }
                Err(error.into())
            }
        }
    }

    async fn authenticate(&self, email: &str, password: &str) -> GatewayResult<(User, Credential)> {
        let credential = self.gateway.login(email, password).await?;
        let user = self.gateway.current_user(&credential).await?;
        Ok((user, credential))
    }

    /// Resume the session from a cached credential.
    ///
    /// Returns `None` when nothing is cached or the service rejected the
    /// cached credential; a rejected credential is discarded.
    pub async fn restore(&self) -> ChatResult<Option<User>> {
        let credential = match self.credentials.load() {
            Ok(Some(credential)) => credential,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable cached credential");
                return Ok(None);
            }
        };

        self.session.write().begin_restore()?;

        match self.gateway.current_user(&credential).await {
            Ok(user) => {
                self.session.write().complete_login(user.clone(), credential)?;
                info!(user = %user.username, "Session restored");
                Ok(Some(user))
            }
            Err(GatewayError::Unauthorized(reason)) => {
                info!(reason = %reason, "Cached credential rejected");
                self.session.write().logout();
                if let Err(e) = self.credentials.clear() {
                    warn!(error = %e, "Failed to clear cached credential");
                }
                Ok(None)
            }
            Err(error) => {
                // A logout while the request was in flight has already moved the state on
                if let Err(e) = self.session.write().fail_login(error.to_string()) {
                    debug!(error = %e, "Login failure not recorded");
                }
                Err(error.into())
            }
        }
    }

    /// Sign out, forgetting the credential and every loaded chat.
    pub fn logout(&self) {
        self.session.write().logout();
        self.transcript.write().clear();
        if let Err(e) = self.credentials.clear() {
            warn!(error = %e, "Failed to clear cached credential");
        }
    }

    // --- chats ---

    /// Merge the server's chat list into the transcript. Returns the number of chats listed.
    pub async fn load_history(&self) -> ChatResult<usize> {
        let credential = self.require_credential()?;
        let chats = self.check(self.gateway.list_chats(&credential).await)?;

        let count = chats.len();
        {
            let mut transcript = self.transcript.write();
            for chat in chats {
                transcript.merge_remote(chat);
            }
        }

        debug!(count, "History loaded");
        Ok(count)
    }

    /// Fetch a chat with its messages and make it active.
    pub async fn open_chat(&self, chat_id: &str) -> ChatResult<Chat> {
        let credential = self.require_credential()?;

        let chat = match self.check(self.gateway.get_chat(&credential, chat_id).await) {
            Ok(chat) => chat,
            Err(ChatError::Gateway(GatewayError::NotFound(reason))) => {
                self.transcript.write().remove_chat(chat_id);
                return Err(GatewayError::NotFound(reason).into());
            }
            Err(e) => return Err(e),
        };

        let mut transcript = self.transcript.write();
        transcript.merge_remote(chat);
        transcript.set_active(Some(chat_id))?;
        transcript
            .get(chat_id)
            .cloned()
            .ok_or_else(|| ChatError::ChatNotFound(chat_id.to_string()))
    }

    /// Create a chat on the server and make it active.
    pub async fn start_new_chat(&self, title: Option<&str>) -> ChatResult<Chat> {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_CHAT_TITLE);
        let credential = self.require_credential()?;

        let chat = self.check(self.gateway.create_chat(&credential, title).await)?;
        info!(chat_id = %chat.id, title = %chat.title, "Chat created");

        let mut transcript = self.transcript.write();
        transcript.upsert_chat(chat.clone());
        transcript.set_active(Some(&chat.id))?;
        Ok(chat)
    }

    /// The active chat, creating one when none is active.
    pub async fn ensure_active_chat(&self) -> ChatResult<ChatId> {
        let active = self.transcript.read().active_id().map(str::to_string);
        match active {
            Some(chat_id) => Ok(chat_id),
            None => Ok(self.start_new_chat(None).await?.id),
        }
    }

    /// Delete a chat on the server and locally.
    ///
    /// A chat the server no longer knows counts as deleted.
    pub async fn delete_chat(&self, chat_id: &str) -> ChatResult<()> {
        let credential = self.require_credential()?;

        match self.check(self.gateway.delete_chat(&credential, chat_id).await) {
            Ok(()) => {}
            Err(ChatError::Gateway(GatewayError::NotFound(_))) => {
                debug!(chat_id = %chat_id, "Chat already gone on the server");
            }
            Err(e) => return Err(e),
        }

        self.transcript.write().remove_chat(chat_id);
        info!(chat_id = %chat_id, "Chat deleted");
        Ok(())
    }

    /// Rename a chat in the local transcript.
    pub fn rename_chat(&self, chat_id: &str, title: &str) -> ChatResult<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatError::Invalid("Chat title cannot be empty".to_string()));
        }

        if self.transcript.write().rename_chat(chat_id, title) {
            Ok(())
        } else {
            Err(ChatError::ChatNotFound(chat_id.to_string()))
        }
    }

    pub fn chat(&self, chat_id: &str) -> Option<Chat> {
        self.transcript.read().get(chat_id).cloned()
    }

    pub fn active_chat(&self) -> Option<Chat> {
        self.transcript.read().active_chat().cloned()
    }

    // --- submissions and history ---

    /// Run one submission, see [`IngestionCoordinator::submit`].
    pub async fn submit(&self, submission: Submission) -> ChatResult<Committed> {
        self.coordinator.submit(submission).await
    }

    /// Chats matching `query`, most recent first.
    pub fn search(&self, query: &str) -> Vec<HistoryEntry> {
        history::search_entries(&self.transcript.read(), query)
    }

    fn require_credential(&self) -> ChatResult<Credential> {
        self.session
            .read()
            .credential()
            .cloned()
            .ok_or(ChatError::NotAuthenticated)
    }

    /// Map a gateway result, expiring the session on a credential rejection.
    fn check<T>(&self, result: GatewayResult<T>) -> ChatResult<T> {
        result.map_err(|error| {
            if let GatewayError::Unauthorized(reason) = &error {
                self.session.write().expire(reason.clone());
            }
            ChatError::Gateway(error)
        })
    }
}

/// Check sign-up fields before calling the service.
pub fn validate_registration(username: &str, email: &str, password: &str) -> ChatResult<()> {
    let username = username.trim();
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(ChatError::Invalid(format!(
            "Username must be at least {} characters",
            MIN_USERNAME_LEN
        )));
    }
    if !username.chars().all(char::is_alphanumeric) {
        return Err(ChatError::Invalid(
            "Username may only contain letters and digits".to_string(),
        ));
    }

    let email_pattern = Regex::new(r"^\S+@\S+\.\S+$")
        .map_err(|e| ChatError::Config(format!("Invalid email pattern: {}", e)))?;
    if !email_pattern.is_match(email.trim()) {
        return Err(ChatError::Invalid("Email is invalid".to_string()));
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ChatError::Invalid(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mock::{MockGateway, MockOperation};
    use crate::persistence::MemoryCredentialStore;

    const EMAIL: &str = "alice@example.com";
    const PASSWORD: &str = "secret1";

    fn setup() -> (ChatManager, MockGateway, Arc<MemoryCredentialStore>) {
        let gateway = MockGateway::new().with_account(EMAIL, PASSWORD, "alice");
        let credentials = Arc::new(MemoryCredentialStore::new());
        let manager = ChatManager::new(Arc::new(gateway.clone()), credentials.clone());
        (manager, gateway, credentials)
    }

    #[tokio::test]
    async fn test_login_persists_credential() {
        let (manager, _, credentials) = setup();

        let user = manager.login(EMAIL, PASSWORD).await.unwrap();
        assert_eq!(user.username, "alice");
        assert!(manager.session().read().is_authenticated());
        assert!(credentials.current().is_some());
    }

    #[tokio::test]
    async fn test_failed_login_allows_retry() {
        let (manager, _, _) = setup();

        let err = manager.login(EMAIL, "wrong-password").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(matches!(manager.auth_state(), AuthState::Failed { .. }));

        manager.login(EMAIL, PASSWORD).await.unwrap();
        assert!(manager.session().read().is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_during_login_keeps_gateway_error() {
        let slot: Arc<parking_lot::Mutex<Option<SharedSession>>> = Arc::default();
        let mut gateway = crate::gateway::MockRemoteGateway::new();
        let in_flight = slot.clone();
        gateway.expect_login().times(1).returning(move |_, _| {
            // User signs out while the request is pending
            if let Some(session) = in_flight.lock().as_ref() {
                session.write().logout();
            }
            Err(GatewayError::Unavailable("connection reset".to_string()))
        });
        let manager = ChatManager::new(Arc::new(gateway), Arc::new(MemoryCredentialStore::new()));
        *slot.lock() = Some(manager.session());

        let err = manager.login(EMAIL, PASSWORD).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(manager.auth_state(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_credential_cache_failure_is_not_fatal() {
        let gateway = MockGateway::new().with_account(EMAIL, PASSWORD, "alice");
        let manager = ChatManager::new(Arc::new(gateway), Arc::new(MemoryCredentialStore::read_only()));

        manager.login(EMAIL, PASSWORD).await.unwrap();
        assert!(manager.session().read().is_authenticated());
        manager.logout();
        assert_eq!(manager.auth_state(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_register_signs_in() {
        let (manager, gateway, _) = setup();

        let user = manager.register("bob42", "bob@example.com", "hunter22").await.unwrap();
        assert_eq!(user.email, "bob@example.com");
        assert!(manager.session().read().is_authenticated());
        assert_eq!(gateway.calls_to(MockOperation::Login).len(), 1);
    }

    #[tokio::test]
    async fn test_register_validation_makes_no_calls() {
        let (manager, gateway, _) = setup();

        for (username, email, password) in [
            ("bo", "bob@example.com", "hunter22"),
            ("bob!", "bob@example.com", "hunter22"),
            ("bob42", "bob@example", "hunter22"),
            ("bob42", "bob@example.com", "short"),
        ] {
            let err = manager.register(username, email, password).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Invalid);
        }
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_restore() {
        let gateway = MockGateway::new().with_account(EMAIL, PASSWORD, "alice");
        let token = gateway.issue_token(EMAIL).unwrap();
        let credentials = Arc::new(MemoryCredentialStore::with_credential(token));
        let manager = ChatManager::new(Arc::new(gateway.clone()), credentials.clone());

        let user = manager.restore().await.unwrap();
        assert_eq!(user.map(|u| u.username), Some("alice".to_string()));

        manager.session().write().logout();
        gateway.revoke_tokens();
        assert!(manager.restore().await.unwrap().is_none());
        assert_eq!(manager.auth_state(), AuthState::Anonymous);
        assert!(credentials.current().is_none());
    }

    #[tokio::test]
    async fn test_restore_without_cache() {
        let (manager, gateway, _) = setup();
        assert!(manager.restore().await.unwrap().is_none());
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_chat_operations_require_login() {
        let (manager, _, _) = setup();
        assert!(matches!(manager.load_history().await, Err(ChatError::NotAuthenticated)));
        assert!(matches!(manager.start_new_chat(None).await, Err(ChatError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_start_and_ensure_active_chat() {
        let (manager, gateway, _) = setup();
        manager.login(EMAIL, PASSWORD).await.unwrap();

        let chat_id = manager.ensure_active_chat().await.unwrap();
        assert_eq!(manager.chat(&chat_id).unwrap().title, DEFAULT_CHAT_TITLE);
        assert_eq!(manager.ensure_active_chat().await.unwrap(), chat_id);
        assert_eq!(gateway.calls_to(MockOperation::CreateChat).len(), 1);

        let titled = manager.start_new_chat(Some("  Reading list ")).await.unwrap();
        assert_eq!(titled.title, "Reading list");
        assert_eq!(manager.active_chat().unwrap().id, titled.id);
    }

    #[tokio::test]
    async fn test_load_history_and_open_chat() {
        let (manager, gateway, _) = setup();
        manager.login(EMAIL, PASSWORD).await.unwrap();

        let mut seeded = Chat::new("42", "Paper notes");
        seeded.messages.push(crate::types::Message::assistant("## Summary\nS"));
        gateway.seed_chat(seeded);

        assert_eq!(manager.load_history().await.unwrap(), 1);
        assert!(manager.chat("42").unwrap().messages.is_empty());

        let opened = manager.open_chat("42").await.unwrap();
        assert_eq!(opened.messages.len(), 1);
        assert_eq!(manager.active_chat().unwrap().id, "42");

        let err = manager.open_chat("missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_chat() {
        let (manager, gateway, _) = setup();
        manager.login(EMAIL, PASSWORD).await.unwrap();
        let chat = manager.start_new_chat(None).await.unwrap();

        manager.delete_chat(&chat.id).await.unwrap();
        assert!(manager.chat(&chat.id).is_none());
        assert!(manager.active_chat().is_none());
        assert!(gateway.server_chat(&chat.id).is_none());

        manager.delete_chat(&chat.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_rename_chat() {
        let (manager, _, _) = setup();
        manager.login(EMAIL, PASSWORD).await.unwrap();
        let chat = manager.start_new_chat(None).await.unwrap();

        manager.rename_chat(&chat.id, "Renamed").unwrap();
        assert_eq!(manager.chat(&chat.id).unwrap().title, "Renamed");
        assert_eq!(manager.rename_chat(&chat.id, "  ").unwrap_err().kind(), ErrorKind::Invalid);
        assert!(matches!(manager.rename_chat("nope", "x"), Err(ChatError::ChatNotFound(_))));
    }

    #[tokio::test]
    async fn test_unauthorized_expires_session() {
        let (manager, gateway, _) = setup();
        manager.login(EMAIL, PASSWORD).await.unwrap();
        gateway.revoke_tokens();

        let err = manager.load_history().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(matches!(manager.auth_state(), AuthState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_logout_clears_transcript() {
        let (manager, _, credentials) = setup();
        manager.login(EMAIL, PASSWORD).await.unwrap();
        manager.start_new_chat(None).await.unwrap();

        manager.logout();
        assert!(manager.transcript().read().is_empty());
        assert!(credentials.current().is_none());
        assert!(manager.search("").is_empty());
    }

    #[test]
    fn test_validate_registration() {
        assert!(validate_registration("alice", "alice@example.com", "secret1").is_ok());
        assert!(validate_registration("al", "alice@example.com", "secret1").is_err());
        assert!(validate_registration("alice", "alice example.com", "secret1").is_err());
    }
}
