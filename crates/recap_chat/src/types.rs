//! Core types for the conversation session.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of a chat, assigned by the content service.
pub type ChatId = String;

/// Authenticated account as reported by the content service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-side user ID
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Login email
    pub email: String,
    /// Display name
    pub username: String,
}

/// Opaque bearer token proving an authenticated session.
///
/// The token is never inspected, only attached to outgoing requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token, for the `Authorization` header and the credential file.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Message role in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Whether the service has persisted a message.
///
/// User messages are appended to the transcript before the service confirms
/// them. A message whose persistence call failed stays in the transcript as
/// `Unsent` rather than being retracted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Appended locally, persistence call in flight
    Pending,
    /// Persisted by the service
    #[default]
    Confirmed,
    /// Persistence call failed
    Unsent,
}

/// A single chat message.
///
/// Only `delivery` ever changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Unique message ID (UUID for locally created messages)
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Role of the message sender
    pub role: MessageRole,
    /// Message content
    pub content: String,
    /// When the message was created
    #[serde(
        rename = "created_at",
        alias = "createdAt",
        default = "Utc::now",
        deserialize_with = "utc_timestamp"
    )]
    pub created_at: DateTime<Utc>,
    /// Server persistence state
    #[serde(default)]
    pub delivery: DeliveryStatus,
}

impl Message {
    /// Create a user message that has not been persisted yet
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: MessageRole::User,
            content: content.into(),
            created_at: Utc::now(),
            delivery: DeliveryStatus::Pending,
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: MessageRole::Assistant,
            content: content.into(),
            created_at: Utc::now(),
            delivery: DeliveryStatus::Confirmed,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.delivery == DeliveryStatus::Pending
    }
}

/// A conversation with its ordered messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chat {
    #[serde(deserialize_with = "string_or_number")]
    pub id: ChatId,
    pub title: String,
    /// Conversation order, append-only
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(rename = "created_at", alias = "createdAt", deserialize_with = "utc_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updated_at", alias = "updatedAt", deserialize_with = "utc_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    /// Create an empty chat with both timestamps set to now
    pub fn new(id: impl Into<ChatId>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.updated_at = self.updated_at.max(Utc::now());
        self.messages.push(message);
    }
}

/// Submission modality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Text,
    Url,
    File,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Url => "url",
            Self::File => "file",
        };
        f.write_str(name)
    }
}

/// A document selected for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Create a PDF upload
    pub fn pdf(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(file_name, PDF_MIME_TYPE, bytes)
    }
}

impl fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUpload")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// The only document type the service analyses.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Raw user input for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionPayload {
    Text(String),
    Url(String),
    File(FileUpload),
}

impl SubmissionPayload {
    pub fn channel(&self) -> Channel {
        match self {
            Self::Text(_) => Channel::Text,
            Self::Url(_) => Channel::Url,
            Self::File(_) => Channel::File,
        }
    }
}

/// One user-initiated turn against one chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub chat_id: ChatId,
    pub payload: SubmissionPayload,
}

impl Submission {
    pub fn text(chat_id: impl Into<ChatId>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            payload: SubmissionPayload::Text(text.into()),
        }
    }

    pub fn url(chat_id: impl Into<ChatId>, url: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            payload: SubmissionPayload::Url(url.into()),
        }
    }

    pub fn file(chat_id: impl Into<ChatId>, file: FileUpload) -> Self {
        Self {
            chat_id: chat_id.into(),
            payload: SubmissionPayload::File(file),
        }
    }

    pub fn channel(&self) -> Channel {
        self.payload.channel()
    }
}

/// Structured analysis returned by the ingestion endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_points: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl IngestResult {
    /// Result carrying only a free-form response
    pub fn response(text: impl Into<String>) -> Self {
        Self {
            response: Some(text.into()),
            ..Self::default()
        }
    }

    /// Result carrying a summary and key points
    pub fn summary(summary: impl Into<String>, key_points: Vec<String>) -> Self {
        Self {
            summary: Some(summary.into()),
            key_points: Some(key_points),
            response: None,
        }
    }
}

/// A submission that completed every step.
#[derive(Debug, Clone, PartialEq)]
pub struct Committed {
    pub chat_id: ChatId,
    pub user_message: Message,
    pub assistant_message: Message,
}

/// Accept IDs the service sends as either JSON numbers or strings.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Int(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Int(n) => n.to_string(),
    })
}

/// Accept RFC 3339 timestamps as well as the service's offset-less ones, which are UTC.
pub(crate) fn utc_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(at) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(at.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(serde::de::Error::custom)
}
