//! HTTP binding of the remote gateway.
//!
//! Talks to the content service's REST API. JSON everywhere except login,
//! which uses the form-encoded `username`/`password` convention, and PDF
//! ingestion, which is a multipart upload.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ChatError, ChatResult, GatewayError, GatewayResult};
use crate::gateway::RemoteGateway;
use crate::types::{Chat, Credential, FileUpload, IngestResult, MessageRole, User};

/// Gateway backed by the content service's HTTP API
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    /// Create a gateway with a default client (no request timeout)
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            client: reqwest::Client::new(),
        }
    }

    /// Create a gateway from client configuration
    pub fn from_config(config: &ClientConfig) -> ChatResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ChatError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: normalize_base_url(&config.api_url),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, request: RequestBuilder, credential: &Credential) -> RequestBuilder {
        request.bearer_auth(credential.as_str())
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, operation: &str) -> GatewayResult<T> {
        let response = self.send(request, operation).await?;
        response
            .json()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("Failed to parse {} response: {}", operation, e)))
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> GatewayResult<Response> {
        debug!(operation, "Calling content service");

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(operation, status = status.as_u16(), "Content service returned an error");
        Err(classify_status(status, &body))
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn register(&self, username: &str, email: &str, password: &str) -> GatewayResult<User> {
        let request = self.client.post(self.url("/auth/register")).json(&RegisterRequest {
            username,
            email,
            password,
        });
        self.send_json(request, "register").await
    }

    async fn login(&self, email: &str, password: &str) -> GatewayResult<Credential> {
        let form = [("username", email), ("password", password)];
        let request = self.client.post(self.url("/auth/login")).form(&form);
        let token: TokenResponse = self.send_json(request, "login").await?;
        Ok(Credential::new(token.access_token))
    }

    async fn current_user(&self, credential: &Credential) -> GatewayResult<User> {
        let request = self.authed(self.client.get(self.url("/auth/me")), credential);
        self.send_json(request, "current_user").await
    }

    async fn list_chats(&self, credential: &Credential) -> GatewayResult<Vec<Chat>> {
        let request = self.authed(self.client.get(self.url("/chat")), credential);
        self.send_json(request, "list_chats").await
    }

    async fn get_chat(&self, credential: &Credential, chat_id: &str) -> GatewayResult<Chat> {
        let request = self.authed(self.client.get(self.url(&format!("/chat/{}", chat_id))), credential);
        self.send_json(request, "get_chat").await
    }

    async fn create_chat(&self, credential: &Credential, title: &str) -> GatewayResult<Chat> {
        let request = self
            .authed(self.client.post(self.url("/chat")), credential)
            .json(&CreateChatRequest { title });
        self.send_json(request, "create_chat").await
    }

    async fn delete_chat(&self, credential: &Credential, chat_id: &str) -> GatewayResult<()> {
        let request = self.authed(self.client.delete(self.url(&format!("/chat/{}", chat_id))), credential);
        self.send(request, "delete_chat").await?;
        Ok(())
    }

    async fn append_message(
        &self,
        credential: &Credential,
        chat_id: &str,
        content: &str,
        role: MessageRole,
    ) -> GatewayResult<()> {
        let request = self
            .authed(self.client.post(self.url(&format!("/chat/{}/messages", chat_id))), credential)
            .json(&AppendMessageRequest { content, role });
        self.send(request, "append_message").await?;
        Ok(())
    }

    async fn ingest_text(&self, credential: &Credential, text: &str) -> GatewayResult<IngestResult> {
        let request = self
            .authed(self.client.post(self.url("/chat/process-text")), credential)
            .json(&TextRequest { text });
        self.send_json(request, "ingest_text").await
    }

    async fn ingest_url(&self, credential: &Credential, url: &str) -> GatewayResult<IngestResult> {
        let request = self
            .authed(self.client.post(self.url("/chat/process-url")), credential)
            .json(&UrlRequest { url });
        self.send_json(request, "ingest_url").await
    }

    async fn ingest_file(&self, credential: &Credential, file: &FileUpload) -> GatewayResult<IngestResult> {
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| GatewayError::Invalid(format!("Invalid MIME type {}: {}", file.mime_type, e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let request = self
            .authed(self.client.post(self.url("/chat/process-pdf")), credential)
            .multipart(form);
        self.send_json(request, "ingest_file").await
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Map an unsuccessful HTTP status onto the gateway taxonomy.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> GatewayError {
    let detail = error_detail(body).unwrap_or_else(|| format!("HTTP {}", status));

    match status.as_u16() {
        401 | 403 => GatewayError::Unauthorized(detail),
        404 => GatewayError::NotFound(detail),
        400 | 413 | 415 | 422 => GatewayError::Invalid(detail),
        _ => GatewayError::Unavailable(detail),
    }
}

/// Pull the human-readable `detail` out of an error body.
///
/// The service sends either `{"detail": "..."}` or, for schema violations,
/// `{"detail": [{"msg": "..."}, ...]}`.
fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        serde_json::Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

// Content service API types
#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct CreateChatRequest<'a> {
    title: &'a str,
}

#[derive(Debug, Serialize)]
struct AppendMessageRequest<'a> {
    content: &'a str,
    role: MessageRole,
}

#[derive(Debug, Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct UrlRequest<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: serde_json::Value,
}
