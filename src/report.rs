//! Turns command failures into console messages.

use std::io;

use colored::Colorize;
use thiserror::Error;

use crate::aliases::AliasError;
use crate::api::ApiError;
use crate::dates::TimeError;
use crate::output::OutputError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Alias(#[from] AliasError),
    #[error(transparent)]
    Time(#[from] TimeError),
    #[error("config error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),
    #[error("{message}")]
    Usage { message: String, hint: Option<String> },
}

impl CommandError {
    pub fn usage(message: impl Into<String>) -> Self {
        CommandError::Usage {
            message: message.into(),
            hint: None,
        }
    }

    pub fn usage_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CommandError::Usage {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }
}

/// What a command was operating on, for not-found wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Chat,
    Account,
    Asset,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub message: String,
    pub hints: Vec<String>,
}

impl Report {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hints: Vec::new(),
        }
    }

    fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }
}

pub fn classify(error: &CommandError, subject: Subject) -> Report {
    match error {
        CommandError::Alias(err) => {
            let mut report = Report::new(err.to_string());
            report.hints = err.hints();
            report
        }
        CommandError::Time(err) => Report::new(err.to_string()),
        CommandError::Api(err) => classify_api(err, subject),
        CommandError::Usage { message, hint } => {
            let report = Report::new(message.clone());
            match hint {
                Some(hint) => report.hint(hint.clone()),
                None => report,
            }
        }
        other => Report::new(format!("Error: {other}")),
    }
}

fn classify_api(error: &ApiError, subject: Subject) -> Report {
    if error.is_connect() {
        return Report::new("Cannot connect to Beeper Desktop API")
            .hint("Make sure Beeper Desktop is running with API enabled.");
    }
    match error.status() {
        Some(401) => Report::new("Not authorized by Beeper Desktop API")
            .hint("Save an access token with: beep auth set"),
        Some(403) => Report::new(format!("Permission denied: {error}"))
            .hint("Check your token has the required permissions."),
        Some(404) => match subject {
            Subject::Chat => Report::new("Chat not found").hint("Make sure the chat ID is correct."),
            Subject::Account => Report::new("Account not found")
                .hint("Run 'beep accounts list' to see available accounts."),
            Subject::Asset => Report::new("Asset not found")
                .hint("URL should be mxc:// or localmxc://"),
            Subject::Other => Report::new(format!("Error: {error}")),
        },
        _ => Report::new(format!("Error: {error}")),
    }
}

pub fn print_report(report: &Report) {
    eprintln!("{}", format!("❌ {}", report.message).red());
    for hint in &report.hints {
        eprintln!("{}", format!("   {hint}").dimmed());
    }
}
