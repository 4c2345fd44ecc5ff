//! Remote gateway trait.
//!
//! Each operation is a single request/response with no retry. Failures are
//! reported as one of the four [`GatewayError`](crate::error::GatewayError)
//! kinds.

use async_trait::async_trait;

use crate::error::GatewayResult;
use crate::types::{Chat, Credential, FileUpload, IngestResult, MessageRole, User};

/// Capabilities of the content service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Create an account.
    async fn register(&self, username: &str, email: &str, password: &str) -> GatewayResult<User>;

    /// Exchange email and password for a bearer credential.
    async fn login(&self, email: &str, password: &str) -> GatewayResult<Credential>;

    /// Fetch the account the credential belongs to.
    async fn current_user(&self, credential: &Credential) -> GatewayResult<User>;

    /// List the user's chats, most recently updated first. Messages may be omitted.
    async fn list_chats(&self, credential: &Credential) -> GatewayResult<Vec<Chat>>;

    /// Fetch one chat with its full message history.
    async fn get_chat(&self, credential: &Credential, chat_id: &str) -> GatewayResult<Chat>;

    async fn create_chat(&self, credential: &Credential, title: &str) -> GatewayResult<Chat>;

    async fn delete_chat(&self, credential: &Credential, chat_id: &str) -> GatewayResult<()>;

    /// Persist one conversation turn.
    async fn append_message(
        &self,
        credential: &Credential,
        chat_id: &str,
        content: &str,
        role: MessageRole,
    ) -> GatewayResult<()>;

    async fn ingest_text(&self, credential: &Credential, text: &str) -> GatewayResult<IngestResult>;

    async fn ingest_url(&self, credential: &Credential, url: &str) -> GatewayResult<IngestResult>;

    /// Analyse an uploaded document. The service accepts PDF only.
    async fn ingest_file(&self, credential: &Credential, file: &FileUpload) -> GatewayResult<IngestResult>;
}
