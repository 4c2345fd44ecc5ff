//! Ingestion coordinator.
//!
//! Drives one submission through the per-chat state machine
//!
//! ```text
//! Idle ──submit──▶ Submitting(channel) ──▶ Committed  ─┐
//!                                     └──▶ RolledBack ─┴──▶ Idle
//! ```
//!
//! and the steps of a turn:
//!
//! 1. validate the payload locally (no network call on failure)
//! 2. append the user message to the transcript, marked `Pending`
//! 3. persist the user turn with the service
//! 4. run the channel's ingestion call
//! 5. append the rendered assistant message
//!
//! A failure in step 3 or 4 rolls back: the user message stays in the
//! transcript (marked `Unsent` if step 3 failed), no assistant message is
//! appended and the chat returns to `Idle`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ChatError, ChatResult, GatewayError, GatewayResult};
use crate::gateway::RemoteGateway;
use crate::session::SharedSession;
use crate::transcript::SharedTranscript;
use crate::types::{
    Channel, ChatId, Committed, Credential, DeliveryStatus, IngestResult, Message, MessageRole,
    Submission, SubmissionPayload, PDF_MIME_TYPE,
};

/// Largest document the service accepts for analysis.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Per-chat submission state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting(Channel),
}

/// Step of the protocol a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Persist,
    Ingest,
}

/// Orchestrates submissions against the gateway and the transcript.
///
/// Cheap to clone; clones share the stores and the in-flight table.
#[derive(Clone)]
pub struct IngestionCoordinator {
    gateway: Arc<dyn RemoteGateway>,
    session: SharedSession,
    transcript: SharedTranscript,
    in_flight: Arc<Mutex<HashMap<ChatId, Channel>>>,
}

impl IngestionCoordinator {
    pub fn new(gateway: Arc<dyn RemoteGateway>, session: SharedSession, transcript: SharedTranscript) -> Self {
        Self {
            gateway,
            session,
            transcript,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Current state of a chat's submission machine.
    pub fn state(&self, chat_id: &str) -> SubmissionState {
        match self.in_flight.lock().get(chat_id) {
            Some(channel) => SubmissionState::Submitting(*channel),
            None => SubmissionState::Idle,
        }
    }

    /// Run one submission to completion.
    ///
    /// Rejected with [`ChatError::Busy`] while another submission for the
    /// same chat is in flight; the rejected call changes nothing. Gateway
    /// failures are returned unchanged as [`ChatError::Gateway`].
    pub async fn submit(&self, submission: Submission) -> ChatResult<Committed> {
        let Submission { chat_id, payload } = submission;
        let channel = payload.channel();

        let _slot = self.acquire(&chat_id, channel)?;
        debug!(chat_id = %chat_id, %channel, "Submission started");

        validate_payload(&payload)?;

        if !self.transcript.read().contains(&chat_id) {
            return Err(ChatError::ChatNotFound(chat_id));
        }

        let credential = self.session.read().credential().cloned();
        let credential = credential.ok_or(ChatError::NotAuthenticated)?;

        let user_message = Message::user(user_facing_content(&payload));
        self.transcript.write().append_message(&chat_id, user_message.clone());

        let persisted = self
            .gateway
            .append_message(&credential, &chat_id, &user_message.content, MessageRole::User)
            .await;
        let delivery = if persisted.is_ok() {
            DeliveryStatus::Confirmed
        } else {
            DeliveryStatus::Unsent
        };
        self.transcript
            .write()
            .mark_delivery(&chat_id, &user_message.id, delivery);
        if let Err(error) = persisted {
            return Err(self.roll_back(&chat_id, channel, Step::Persist, error));
        }

        let result = match self.ingest(&credential, &payload).await {
            Ok(result) => result,
            Err(error) => return Err(self.roll_back(&chat_id, channel, Step::Ingest, error)),
        };

        let assistant_message = Message::assistant(result.render());
        let applied = self
            .transcript
            .write()
            .append_message(&chat_id, assistant_message.clone());
        if !applied {
            debug!(chat_id = %chat_id, "Chat removed before the result arrived");
        }

        info!(chat_id = %chat_id, %channel, "Submission committed");
        Ok(Committed {
            chat_id,
            user_message,
            assistant_message,
        })
    }

    fn acquire(&self, chat_id: &str, channel: Channel) -> ChatResult<InFlightSlot> {
        let mut in_flight = self.in_flight.lock();
        if in_flight.contains_key(chat_id) {
            debug!(chat_id = %chat_id, "Submission rejected, chat busy");
            return Err(ChatError::Busy {
                chat_id: chat_id.to_string(),
            });
        }
        in_flight.insert(chat_id.to_string(), channel);

        Ok(InFlightSlot {
            table: self.in_flight.clone(),
            chat_id: chat_id.to_string(),
        })
    }

    async fn ingest(&self, credential: &Credential, payload: &SubmissionPayload) -> GatewayResult<IngestResult> {
        match payload {
            SubmissionPayload::Text(text) => self.gateway.ingest_text(credential, text).await,
            SubmissionPayload::Url(url) => self.gateway.ingest_url(credential, url.trim()).await,
            SubmissionPayload::File(file) => self.gateway.ingest_file(credential, file).await,
        }
    }

    fn roll_back(&self, chat_id: &str, channel: Channel, step: Step, error: GatewayError) -> ChatError {
        warn!(chat_id = %chat_id, %channel, ?step, error = %error, "Submission rolled back");

        match &error {
            GatewayError::Unauthorized(reason) => {
                self.session.write().expire(reason.clone());
            }
            GatewayError::NotFound(_) if step == Step::Persist => {
                self.transcript.write().remove_chat(chat_id);
            }
            _ => {}
        }

        ChatError::Gateway(error)
    }
}

/// Holds a chat in `Submitting` until dropped.
struct InFlightSlot {
    table: Arc<Mutex<HashMap<ChatId, Channel>>>,
    chat_id: ChatId,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.table.lock().remove(&self.chat_id);
    }
}

/// Reject payloads the service would refuse, before any network call.
pub fn validate_payload(payload: &SubmissionPayload) -> ChatResult<()> {
    match payload {
        SubmissionPayload::Text(text) if text.trim().is_empty() => {
            Err(ChatError::Invalid("Message text is required".to_string()))
        }
        SubmissionPayload::Url(url) if url.trim().is_empty() => {
            Err(ChatError::Invalid("URL required. Please enter a valid URL".to_string()))
        }
        SubmissionPayload::File(file) => {
            if !file.mime_type.trim().eq_ignore_ascii_case(PDF_MIME_TYPE) {
                return Err(ChatError::Invalid(format!(
                    "Invalid file type {}. Please upload a PDF file",
                    file.mime_type
                )));
            }
            if file.file_name.trim().is_empty() {
                return Err(ChatError::Invalid("File name is required".to_string()));
            }
            if file.bytes.is_empty() {
                return Err(ChatError::Invalid(format!("{} is empty", file.file_name)));
            }
            if file.bytes.len() > MAX_UPLOAD_BYTES {
                return Err(ChatError::Invalid(format!(
                    "{} exceeds the {} MB upload limit",
                    file.file_name,
                    MAX_UPLOAD_BYTES / (1024 * 1024)
                )));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Transcript text for the user's side of a turn.
pub fn user_facing_content(payload: &SubmissionPayload) -> String {
    match payload {
        SubmissionPayload::Text(text) => text.clone(),
        SubmissionPayload::Url(url) => format!("I shared this URL: {}", url.trim()),
        SubmissionPayload::File(file) => format!("I uploaded a PDF: {}", file.file_name),
    }
}
