use crate::cli::ChatsCommand;
use crate::config::Config;
use crate::error::{QuireError, Result};
use crate::storage::{Chat, Store};
use colored::Colorize;
use prettytable::{format, Table};

use super::serve::open_store;

/// Handle chat inspection commands
pub fn handle_chats(config: &Config, command: ChatsCommand) -> Result<()> {
    let storage = open_store(config)?;

    match command {
        ChatsCommand::List { email, all } => {
            let user = storage
                .get_user_by_email(&email)?
                .ok_or_else(|| QuireError::Config(format!("No user with email {}", email)))?;
            let chats = storage.list_chats_for_user(&user.id, all)?;

            if chats.is_empty() {
                println!("{}", "No chats found.".yellow());
                return Ok(());
            }

            println!("\nChats for {}:", email);
            chats_table(&chats).printstd();
            println!();
        }
    }

    Ok(())
}

fn short_title(title: &str) -> String {
    if title.chars().count() > 40 {
        let head: String = title.chars().take(37).collect();
        format!("{}...", head)
    } else {
        title.to_string()
    }
}

fn chats_table(chats: &[Chat]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Created".bold(),
        "Inline".bold()
    ]);

    for chat in chats {
        let id_short: String = chat.id.chars().take(8).collect();
        let inline = match chat.lease_expires_at {
            Some(expires) if chat.ephemeral => {
                format!("until {}", expires.format("%H:%M"))
            }
            _ => "-".to_string(),
        };

        table.add_row(prettytable::row![
            id_short.cyan(),
            short_title(&chat.title),
            chat.created_at.format("%Y-%m-%d %H:%M").to_string(),
            inline
        ]);
    }

    table
}
