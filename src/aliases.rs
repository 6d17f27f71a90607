//! Alias and chat id resolution.
//!
//! Aliases always win: a stored alias is looked up before the input is
//! checked for the `!` chat id shape.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::store::StoredConfig;

static ALIAS_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid alias name regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AliasError {
    #[error("Invalid chat ID or alias: {0}")]
    InvalidChatTarget(String),
    #[error("Invalid alias name: {0}")]
    InvalidAliasName(String),
    #[error("Unknown alias: {0}")]
    UnknownAlias(String),
}

impl AliasError {
    /// Follow-up lines shown under the error message.
    pub fn hints(&self) -> Vec<String> {
        match self {
            AliasError::InvalidChatTarget(input) => vec![
                "Chat IDs should start with '!' (e.g., !abc123:beeper.local)".to_string(),
                format!("Or add an alias: beep alias add {input} <chat-id>"),
            ],
            AliasError::InvalidAliasName(_) => {
                vec!["Alias names may only contain letters, digits and '_'".to_string()]
            }
            AliasError::UnknownAlias(_) => vec!["Run 'beep alias list' to see saved aliases.".to_string()],
        }
    }
}

/// Resolves an alias or chat id.
///
/// Returns the aliased chat id if `input` is a saved alias, `input` itself if
/// it already looks like a chat id, or `None` otherwise.
pub fn resolve_alias(input: &str, config: &StoredConfig) -> Option<String> {
    if let Some(chat_id) = config.aliases.get(input) {
        return Some(chat_id.clone());
    }
    if is_valid_chat_id(input) {
        return Some(input.to_string());
    }
    None
}

pub fn is_valid_chat_id(chat_id: &str) -> bool {
    chat_id.starts_with('!')
}

pub fn is_valid_alias_name(name: &str) -> bool {
    ALIAS_NAME_RE.is_match(name)
}

/// Chat argument handling shared by every command: anything `resolve_alias`
/// cannot resolve is rejected.
pub fn resolve_chat_target(input: &str, config: &StoredConfig) -> Result<String, AliasError> {
    resolve_alias(input, config).ok_or_else(|| AliasError::InvalidChatTarget(input.to_string()))
}
