//! Ask command - send text, a URL or a PDF for analysis.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use recap_chat::{validate_payload, ChatManager, FileUpload, Submission, SubmissionPayload, PDF_MIME_TYPE};

use super::chats::speaker;
use super::{note, signed_in, GlobalArgs};

#[derive(Args, Debug)]
pub struct AskArgs {
    #[command(subcommand)]
    pub input: AskInput,
}

#[derive(Subcommand, Debug)]
pub enum AskInput {
    /// Summarize a piece of text
    Text {
        /// Text to analyze
        text: String,

        /// Continue an existing chat instead of starting a new one
        #[arg(short, long)]
        chat: Option<String>,
    },

    /// Summarize a web page
    Url {
        /// Page address
        url: String,

        /// Continue an existing chat instead of starting a new one
        #[arg(short, long)]
        chat: Option<String>,
    },

    /// Summarize a PDF document
    File {
        /// Path to the PDF
        path: PathBuf,

        /// Continue an existing chat instead of starting a new one
        #[arg(short, long)]
        chat: Option<String>,
    },
}

pub async fn execute(args: AskArgs, global: &GlobalArgs) -> Result<()> {
    let (manager, _) = signed_in(global).await?;

    let (payload, chat) = match args.input {
        AskInput::Text { text, chat } => (SubmissionPayload::Text(text), chat),
        AskInput::Url { url, chat } => (SubmissionPayload::Url(url), chat),
        AskInput::File { path, chat } => (SubmissionPayload::File(read_upload(&path).await?), chat),
    };

    // Reject bad input before a chat gets created for it
    validate_payload(&payload)?;

    let chat_id = target_chat(&manager, chat.as_deref(), global).await?;
    info!("Submitting {} to chat {}", payload.channel(), chat_id);

    let committed = manager.submit(Submission { chat_id, payload }).await?;

    if !global.quiet {
        println!("{}", speaker(committed.assistant_message.role));
    }
    println!("{}", committed.assistant_message.content);
    Ok(())
}

/// Open the requested chat or start a new one.
async fn target_chat(manager: &ChatManager, chat: Option<&str>, global: &GlobalArgs) -> Result<String> {
    match chat {
        Some(id) => Ok(manager.open_chat(id).await?.id),
        None => {
            let id = manager.ensure_active_chat().await?;
            note(global, format!("💬 Started chat {} (continue with --chat {})", id, id));
            Ok(id)
        }
    }
}

/// Load a file for upload, typed by its extension.
async fn read_upload(path: &Path) -> Result<FileUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(FileUpload::new(file_name, mime_type_for(path), bytes))
}

fn mime_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => PDF_MIME_TYPE,
        _ => "application/octet-stream",
    }
}
