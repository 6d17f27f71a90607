use std::collections::BTreeMap;

use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use serde::Serialize;
use thiserror::Error;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::api::{Account, ContactSearchResult, Message, MessageSearchResult};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn json_string<T: Serialize + ?Sized>(value: &T) -> Result<String, OutputError> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), OutputError> {
    let payload = json_string(value)?;
    println!("{payload}");
    Ok(())
}

pub fn success(message: &str) {
    println!("{}", message.green());
}

pub fn detail(message: &str) {
    println!("{}", format!("   {message}").dimmed());
}

pub fn local_time(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %Z").to_string()
}

pub fn print_contacts(query: &str, result: &ContactSearchResult) {
    if result.items.is_empty() {
        println!("{}", format!("No contacts found for \"{query}\"").yellow());
        return;
    }

    let separator = "─".repeat(50);
    println!(
        "\n{}",
        format!("🔍 Contacts matching \"{query}\" ({})", result.items.len()).bold()
    );
    println!("{}", separator.dimmed());

    let count = result.items.len();
    for (index, user) in result.items.iter().enumerate() {
        let number = format!("{}.", index + 1);
        let you = if user.is_self.unwrap_or(false) {
            " (you)".cyan().to_string()
        } else {
            String::new()
        };
        let blocked = if user.cannot_message.unwrap_or(false) {
            " [cannot message]".red().to_string()
        } else {
            String::new()
        };
        println!("{} {}{you}{blocked}", number.dimmed(), user.display_name().bold());
        detail(&format!("ID: {}", user.id));
        if let Some(username) = user.username.as_deref() {
            detail(&format!("@{username}"));
        }
        if let Some(phone) = user.phone_number.as_deref() {
            detail(&format!("📱 {phone}"));
        }
        if let Some(email) = user.email.as_deref() {
            detail(&format!("📧 {email}"));
        }
        if index + 1 < count {
            println!("{}", separator.dimmed());
        }
    }
    println!();
}

pub fn print_accounts(accounts: &[Account]) {
    if accounts.is_empty() {
        println!("{}", "No accounts connected".yellow());
        return;
    }

    let mut id_width = display_width("account");
    let mut network_width = display_width("network");
    for account in accounts {
        id_width = id_width.max(display_width(&account.account_id));
        network_width = network_width.max(display_width(&account.network));
    }
    id_width = id_width.min(32);
    network_width = network_width.min(18);

    println!(
        "{}  {}  {}",
        pad_right("account", id_width).bold(),
        pad_right("network", network_width).bold(),
        "user".bold(),
    );
    for account in accounts {
        let user = account.user.as_ref().map(|user| user.display_name()).unwrap_or("-");
        println!(
            "{}  {}  {}",
            pad_right(&truncate_display(&account.account_id, id_width), id_width),
            pad_right(&truncate_display(&account.network, network_width), network_width),
            truncate_display(user, 40),
        );
    }
}

pub fn print_messages(result: &MessageSearchResult) {
    if result.items.is_empty() {
        println!("{}", "No messages found".yellow());
        return;
    }

    let mut from_width = display_width("from");
    let mut when_width = display_width("when");
    for message in &result.items {
        from_width = from_width.max(display_width(sender_label(message)));
        when_width = when_width.max(display_width(&message_time(message)));
    }
    from_width = from_width.min(18);
    when_width = when_width.min(20);

    println!(
        "{}  {}  {}",
        pad_right("when", when_width).bold(),
        pad_right("from", from_width).bold(),
        "text".bold(),
    );
    for message in &result.items {
        let text = message.text.as_deref().unwrap_or("<no text>").replace('\n', " ");
        println!(
            "{}  {}  {}",
            pad_right(&message_time(message), when_width).dimmed(),
            pad_right(&truncate_display(sender_label(message), from_width), from_width),
            truncate_display(&text, 72),
        );
    }
    if result.has_more {
        detail("More results available; narrow the search or raise --limit.");
    }
}

pub fn print_aliases(aliases: &BTreeMap<String, String>) {
    if aliases.is_empty() {
        println!("{}", "No aliases saved".yellow());
        detail("Add one: beep alias add <name> <chat-id>");
        return;
    }

    let name_width = aliases
        .keys()
        .map(|name| display_width(name))
        .max()
        .unwrap_or(0)
        .max(display_width("alias"))
        .min(24);
    println!("{}  {}", pad_right("alias", name_width).bold(), "chat id".bold());
    for (name, chat_id) in aliases {
        println!(
            "{}  {}",
            pad_right(&truncate_display(name, name_width), name_width).cyan(),
            chat_id
        );
    }
}

fn sender_label(message: &Message) -> &str {
    if message.is_sender.unwrap_or(false) {
        return "you";
    }
    message.sender_name.as_deref().unwrap_or("-")
}

fn message_time(message: &Message) -> String {
    message
        .timestamp
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn display_width(value: &str) -> usize {
    UnicodeWidthStr::width(value)
}

fn truncate_display(value: &str, max_width: usize) -> String {
    if display_width(value) <= max_width {
        return value.to_string();
    }
    let ellipsis = "...";
    let mut width = 0usize;
    let mut output = String::new();
    for ch in value.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + ch_width + ellipsis.len() > max_width {
            break;
        }
        output.push(ch);
        width += ch_width;
    }
    output.push_str(ellipsis);
    output
}

fn pad_right(value: &str, width: usize) -> String {
    let mut output = value.to_string();
    let current = display_width(value);
    if current < width {
        output.push_str(&" ".repeat(width - current));
    }
    output
}
