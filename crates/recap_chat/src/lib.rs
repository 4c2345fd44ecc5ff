//! # recap_chat - Conversation core for the recap content-analysis client
//!
//! This crate holds everything a recap front end needs below the UI:
//! - Authentication state and the cached bearer credential
//! - The local transcript of chats and messages
//! - A typed gateway to the content service (HTTP, plus an in-memory mock)
//! - Ingestion of text, URLs and PDF documents, one turn per chat at a time
//! - Search over loaded chat history
//!
//! ## Architecture
//!
//! ```text
//!                     ┌─────────────────┐
//!                     │   ChatManager   │
//!                     └────────┬────────┘
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │  Session Store  │ │    Ingestion    │ │  History Query  │
//! │  (AuthState)    │◀│   Coordinator   │ └────────┬────────┘
//! └─────────────────┘ └───┬─────────┬───┘          │
//!                         │         ▼              ▼
//!                         │ ┌─────────────────────────────┐
//!                         │ │      Transcript Store       │
//!                         │ └─────────────────────────────┘
//!                         ▼
//!                ┌─────────────────┐
//!                │ RemoteGateway   │──▶ HttpGateway / MockGateway
//!                └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use recap_chat::{ChatManager, ClientConfig, Submission};
//!
//! # async fn run() -> recap_chat::ChatResult<()> {
//! let config = ClientConfig::load(".recap")?;
//! let manager = ChatManager::from_config(&config)?;
//!
//! manager.login("alice@example.com", "secret1").await?;
//! let chat_id = manager.ensure_active_chat().await?;
//! let turn = manager
//!     .submit(Submission::url(chat_id, "https://example.com/article"))
//!     .await?;
//! println!("{}", turn.assistant_message.content);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod history;
pub mod http;
pub mod manager;
pub mod mock;
pub mod persistence;
pub mod render;
pub mod session;
pub mod transcript;
pub mod types;

pub use config::*;
pub use coordinator::*;
pub use error::*;
pub use gateway::*;
pub use history::HistoryEntry;
pub use http::*;
pub use manager::*;
pub use mock::*;
pub use persistence::*;
pub use render::*;
pub use session::*;
pub use transcript::*;
pub use types::*;
