//! Mock content service for testing.
//!
//! Provides an in-memory implementation of the [`RemoteGateway`] trait that
//! behaves like the real service (accounts, tokens, chats, messages) and
//! lets tests queue ingestion results, inject failures, inspect captured
//! calls and hold ingestion requests open.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::RemoteGateway;
use crate::types::{Chat, Credential, FileUpload, IngestResult, Message, MessageRole, User};

/// Gateway operations, for failure injection and call inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Register,
    Login,
    CurrentUser,
    ListChats,
    GetChat,
    CreateChat,
    DeleteChat,
    AppendMessage,
    IngestText,
    IngestUrl,
    IngestFile,
}

/// Captured call information for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedCall {
    pub operation: MockOperation,
    /// Bearer token the call carried
    pub token: Option<String>,
    pub chat_id: Option<String>,
    /// Message content, text, URL or file name
    pub payload: Option<String>,
}

#[derive(Default)]
struct MockState {
    /// email -> (password, user)
    accounts: HashMap<String, (String, User)>,
    /// token -> user email
    tokens: HashMap<String, String>,
    chats: HashMap<String, Chat>,
    next_id: u64,
    ingest_results: VecDeque<GatewayResult<IngestResult>>,
    failures: HashMap<MockOperation, VecDeque<GatewayError>>,
    calls: Vec<CapturedCall>,
    ingest_gate: Option<Arc<Notify>>,
}

impl MockState {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}

/// In-memory stand-in for the content service.
///
/// Ingestion calls pop queued results in order; with an empty queue they
/// answer with a plain `response` of `"ok"`.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    /// Create a new mock gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account that can log in.
    pub fn with_account(self, email: &str, password: &str, username: &str) -> Self {
        {
            let mut state = self.state.lock();
            let user = User {
                id: state.next_id(),
                email: email.to_string(),
                username: username.to_string(),
            };
            state.accounts.insert(email.to_string(), (password.to_string(), user));
        }
        self
    }

    /// Issue a valid token for an existing account without a login call.
    pub fn issue_token(&self, email: &str) -> Option<Credential> {
        let mut state = self.state.lock();
        if !state.accounts.contains_key(email) {
            return None;
        }
        let token = format!("token-{}", state.next_id());
        state.tokens.insert(token.clone(), email.to_string());
        Some(Credential::new(token))
    }

    /// Invalidate every issued token.
    pub fn revoke_tokens(&self) {
        self.state.lock().tokens.clear();
    }

    /// Queue the result of the next ingestion call.
    pub fn add_ingest_result(self, result: IngestResult) -> Self {
        self.state.lock().ingest_results.push_back(Ok(result));
        self
    }

    /// Queue a failure for the next ingestion call.
    pub fn add_ingest_failure(self, error: GatewayError) -> Self {
        self.state.lock().ingest_results.push_back(Err(error));
        self
    }

    /// Fail the next call to `operation` with `error`.
    pub fn fail_next(&self, operation: MockOperation, error: GatewayError) {
        self.state
            .lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Make ingestion calls wait until the returned handle is notified.
    pub fn hold_ingestion(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().ingest_gate = Some(gate.clone());
        gate
    }

    /// Seed a chat on the server side.
    pub fn seed_chat(&self, chat: Chat) {
        self.state.lock().chats.insert(chat.id.clone(), chat);
    }

    /// Server-side copy of a chat.
    pub fn server_chat(&self, chat_id: &str) -> Option<Chat> {
        self.state.lock().chats.get(chat_id).cloned()
    }

    /// Get all captured calls.
    pub fn calls(&self) -> Vec<CapturedCall> {
        self.state.lock().calls.clone()
    }

    /// Captured calls to one operation.
    pub fn calls_to(&self, operation: MockOperation) -> Vec<CapturedCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .cloned()
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Record the call and pop an injected failure for it, if any.
    fn begin(
        &self,
        operation: MockOperation,
        credential: Option<&Credential>,
        chat_id: Option<&str>,
        payload: Option<&str>,
    ) -> GatewayResult<()> {
        let mut state = self.state.lock();
        state.calls.push(CapturedCall {
            operation,
            token: credential.map(|c| c.as_str().to_string()),
            chat_id: chat_id.map(str::to_string),
            payload: payload.map(str::to_string),
        });

        if let Some(error) = state.failures.get_mut(&operation).and_then(VecDeque::pop_front) {
            return Err(error);
        }

        if let Some(credential) = credential {
            if !state.tokens.contains_key(credential.as_str()) {
                return Err(GatewayError::Unauthorized("Could not validate credentials".to_string()));
            }
        }
        Ok(())
    }

    async fn ingest(
        &self,
        operation: MockOperation,
        credential: &Credential,
        payload: &str,
    ) -> GatewayResult<IngestResult> {
        self.begin(operation, Some(credential), None, Some(payload))?;

        let gate = self.state.lock().ingest_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.state
            .lock()
            .ingest_results
            .pop_front()
            .unwrap_or_else(|| Ok(IngestResult::response("ok")))
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn register(&self, username: &str, email: &str, password: &str) -> GatewayResult<User> {
        self.begin(MockOperation::Register, None, None, Some(email))?;

        let mut state = self.state.lock();
        if state.accounts.contains_key(email) {
            return Err(GatewayError::Invalid("A user with this email already exists".to_string()));
        }
        let user = User {
            id: state.next_id(),
            email: email.to_string(),
            username: username.to_string(),
        };
        state
            .accounts
            .insert(email.to_string(), (password.to_string(), user.clone()));
        Ok(user)
    }

    async fn login(&self, email: &str, password: &str) -> GatewayResult<Credential> {
        self.begin(MockOperation::Login, None, None, Some(email))?;

        let matches = self
            .state
            .lock()
            .accounts
            .get(email)
            .map(|(stored, _)| stored == password)
            .unwrap_or(false);
        if !matches {
            return Err(GatewayError::Unauthorized("Incorrect email or password".to_string()));
        }

        self.issue_token(email)
            .ok_or_else(|| GatewayError::Unauthorized("Incorrect email or password".to_string()))
    }

    async fn current_user(&self, credential: &Credential) -> GatewayResult<User> {
        self.begin(MockOperation::CurrentUser, Some(credential), None, None)?;

        let state = self.state.lock();
        state
            .tokens
            .get(credential.as_str())
            .and_then(|email| state.accounts.get(email))
            .map(|(_, user)| user.clone())
            .ok_or_else(|| GatewayError::Unauthorized("Could not validate credentials".to_string()))
    }

    async fn list_chats(&self, credential: &Credential) -> GatewayResult<Vec<Chat>> {
        self.begin(MockOperation::ListChats, Some(credential), None, None)?;

        let state = self.state.lock();
        let mut chats: Vec<Chat> = state
            .chats
            .values()
            .map(|chat| Chat {
                messages: Vec::new(),
                ..chat.clone()
            })
            .collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(chats)
    }

    async fn get_chat(&self, credential: &Credential, chat_id: &str) -> GatewayResult<Chat> {
        self.begin(MockOperation::GetChat, Some(credential), Some(chat_id), None)?;

        self.state
            .lock()
            .chats
            .get(chat_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound("Chat not found".to_string()))
    }

    async fn create_chat(&self, credential: &Credential, title: &str) -> GatewayResult<Chat> {
        self.begin(MockOperation::CreateChat, Some(credential), None, Some(title))?;

        let mut state = self.state.lock();
        let chat = Chat::new(state.next_id(), title);
        state.chats.insert(chat.id.clone(), chat.clone());
        Ok(chat)
    }

    async fn delete_chat(&self, credential: &Credential, chat_id: &str) -> GatewayResult<()> {
        self.begin(MockOperation::DeleteChat, Some(credential), Some(chat_id), None)?;

        self.state
            .lock()
            .chats
            .remove(chat_id)
            .map(|_| ())
            .ok_or_else(|| GatewayError::NotFound("Chat not found".to_string()))
    }

    async fn append_message(
        &self,
        credential: &Credential,
        chat_id: &str,
        content: &str,
        role: MessageRole,
    ) -> GatewayResult<()> {
        self.begin(MockOperation::AppendMessage, Some(credential), Some(chat_id), Some(content))?;

        let mut state = self.state.lock();
        let chat = state
            .chats
            .get_mut(chat_id)
            .ok_or_else(|| GatewayError::NotFound("Chat not found".to_string()))?;

        chat.messages.push(Message {
            role,
            ..Message::assistant(content)
        });
        chat.updated_at = Utc::now();
        Ok(())
    }

    async fn ingest_text(&self, credential: &Credential, text: &str) -> GatewayResult<IngestResult> {
        self.ingest(MockOperation::IngestText, credential, text).await
    }

    async fn ingest_url(&self, credential: &Credential, url: &str) -> GatewayResult<IngestResult> {
        self.ingest(MockOperation::IngestUrl, credential, url).await
    }

    async fn ingest_file(&self, credential: &Credential, file: &FileUpload) -> GatewayResult<IngestResult> {
        self.ingest(MockOperation::IngestFile, credential, &file.file_name).await
    }
}
