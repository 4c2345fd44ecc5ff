//! Search command - find chats by title or message content.

use anyhow::Result;
use clap::Args;
use tracing::{debug, warn};

use recap_chat::ErrorKind;

use super::chats::print_entries;
use super::{note, signed_in, GlobalArgs};

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Text to look for, case-insensitive (empty lists every chat)
    query: Option<String>,

    /// Fetch every chat's messages so content is searched too
    #[arg(long)]
    messages: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: SearchArgs, global: &GlobalArgs) -> Result<()> {
    let (manager, _) = signed_in(global).await?;
    manager.load_history().await?;

    // Listings carry titles only
    if args.messages {
        let ids: Vec<String> = manager.search("").into_iter().map(|entry| entry.id).collect();
        for id in ids {
            match manager.open_chat(&id).await {
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Unauthorized => return Err(e.into()),
                Err(e) => warn!("Skipping chat {}: {}", id, e),
            }
        }
        debug!("Loaded messages for content search");
    }

    let query = args.query.unwrap_or_default();
    let entries = manager.search(&query);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        note(global, format!("No chats match {:?}", query));
    } else {
        print_entries(&entries);
    }

    Ok(())
}
