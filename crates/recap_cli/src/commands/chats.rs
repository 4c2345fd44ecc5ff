//! Chats command - list, create, show and delete chats.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use clap::Subcommand;

use recap_chat::{Chat, HistoryEntry, MessageRole};

use super::{note, signed_in, GlobalArgs};

#[derive(Subcommand, Debug)]
pub enum ChatsCommand {
    /// List chats, most recent first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Start a new chat
    New {
        /// Chat title (defaults to "New Chat")
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Print a chat with all its messages
    Show {
        /// Chat ID
        id: String,
    },

    /// Delete a chat and its messages
    Delete {
        /// Chat ID
        id: String,
    },
}

pub async fn execute(command: ChatsCommand, global: &GlobalArgs) -> Result<()> {
    let (manager, _) = signed_in(global).await?;

    match command {
        ChatsCommand::List { json } => {
            manager.load_history().await?;
            let entries = manager.search("");

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                note(global, "No chats yet. Start one with `recap ask text \"...\"`");
            } else {
                print_entries(&entries);
            }
        }
        ChatsCommand::New { title } => {
            let chat = manager.start_new_chat(title.as_deref()).await?;
            note(global, format!("✅ Created chat {} ({})", chat.id, chat.title));
            if global.quiet {
                println!("{}", chat.id);
            }
        }
        ChatsCommand::Show { id } => {
            let chat = manager.open_chat(&id).await?;
            print_chat(&chat);
        }
        ChatsCommand::Delete { id } => {
            manager.delete_chat(&id).await?;
            note(global, format!("🗑️  Deleted chat {}", id));
        }
    }

    Ok(())
}

pub fn print_entries(entries: &[HistoryEntry]) {
    println!("{:<8} {:<17} TITLE", "ID", "UPDATED");
    for entry in entries {
        println!("{:<8} {:<17} {}", entry.id, local_time(entry.updated_at), entry.title);
        if let Some(preview) = &entry.preview {
            println!("{:<8} {:<17} └ {}", "", "", preview);
        }
    }
}

pub fn print_chat(chat: &Chat) {
    println!("💬 {} (#{}, started {})", chat.title, chat.id, local_time(chat.created_at));
    if chat.messages.is_empty() {
        println!("   (no messages)");
        return;
    }

    for message in &chat.messages {
        println!();
        println!("{}", speaker(message.role));
        println!("{}", message.content);
    }
}

pub fn speaker(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "🧑 You",
        MessageRole::Assistant => "🤖 recap",
    }
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}
