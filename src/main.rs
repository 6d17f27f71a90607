mod aliases;
mod api;
mod config;
mod dates;
mod output;
mod report;
mod store;

use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use dialoguer::Password;
use serde_json::json;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::aliases::{is_valid_alias_name, is_valid_chat_id, resolve_chat_target, AliasError};
use crate::api::{ApiClient, FocusInput, MessageSearchInput};
use crate::config::Config;
use crate::report::{CommandError, Subject};
use crate::store::{resolve_token, ConfigStore, StoredConfig};

#[derive(Parser)]
#[command(
    name = "beep",
    version,
    about = "Drive Beeper Desktop from the command line",
    after_help = "Examples:\n  beep alias add work '!abc123:beeper.local'\n  beep send work \"on my way\"\n  beep archive work\n  beep reminders set work 2h\n  beep reminders set '!abc123:beeper.local' 2026-11-02T09:00 --dismiss-on-message\n  beep messages search invoice --after \"2w ago\"\n  beep contacts search whatsapp alice\n  beep download mxc://beeper.com/abc --output ./photo.jpg\n  beep focus work --draft \"hello\""
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, global = true, help = "Output JSON instead of formatted text")]
    json: bool,

    #[arg(short, long, global = true, help = "Log API requests to stderr")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Archive or unarchive a chat")]
    Archive(ArchiveArgs),
    #[command(about = "Send a message to a chat")]
    Send(SendArgs),
    #[command(about = "Search contacts")]
    Contacts {
        #[command(subcommand)]
        command: ContactsCommand,
    },
    #[command(about = "List connected accounts")]
    Accounts {
        #[command(subcommand)]
        command: AccountsCommand,
    },
    #[command(about = "Search messages")]
    Messages {
        #[command(subcommand)]
        command: MessagesCommand,
    },
    #[command(about = "Download a message attachment")]
    Download(DownloadArgs),
    #[command(about = "Manage chat reminders")]
    Reminders {
        #[command(subcommand)]
        command: RemindersCommand,
    },
    #[command(about = "Bring Beeper Desktop to the foreground")]
    Focus(FocusArgs),
    #[command(about = "Manage chat aliases")]
    Alias {
        #[command(subcommand)]
        command: AliasCommand,
    },
    #[command(about = "Manage the Beeper Desktop access token")]
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
}

impl Command {
    fn subject(&self) -> Subject {
        match self {
            Command::Archive(_)
            | Command::Send(_)
            | Command::Messages { .. }
            | Command::Reminders { .. }
            | Command::Focus(_) => Subject::Chat,
            Command::Contacts { .. } | Command::Accounts { .. } => Subject::Account,
            Command::Download(_) => Subject::Asset,
            Command::Alias { .. } | Command::Auth { .. } => Subject::Other,
        }
    }
}

#[derive(Args)]
struct ArchiveArgs {
    #[arg(help = "Chat ID or alias to archive")]
    chat: String,

    #[arg(short, long, help = "Unarchive the chat instead of archiving")]
    unarchive: bool,

    #[arg(short, long, help = "Don't show a confirmation message")]
    quiet: bool,
}

#[derive(Args)]
struct SendArgs {
    #[arg(help = "Chat ID or alias to send to")]
    chat: String,

    #[arg(help = "Message text")]
    message: String,

    #[arg(short, long, help = "Don't show a confirmation message")]
    quiet: bool,
}

#[derive(Subcommand)]
enum ContactsCommand {
    #[command(about = "Search contacts on one account")]
    Search(ContactsSearchArgs),
}

#[derive(Args)]
struct ContactsSearchArgs {
    #[arg(help = "Account ID to search on")]
    account_id: String,

    #[arg(help = "Search query")]
    query: String,
}

#[derive(Subcommand)]
enum AccountsCommand {
    #[command(about = "List accounts connected to Beeper Desktop")]
    List,
}

#[derive(Subcommand)]
enum MessagesCommand {
    #[command(about = "Search messages across chats")]
    Search(MessagesSearchArgs),
}

#[derive(Args)]
struct MessagesSearchArgs {
    #[arg(help = "Text to search for")]
    query: Option<String>,

    #[arg(
        long = "chat",
        value_name = "CHAT",
        action = ArgAction::Append,
        help = "Limit to a chat ID or alias (repeatable)"
    )]
    chats: Vec<String>,

    #[arg(long, value_name = "WHEN", help = "Only messages after this (2d ago, yesterday, today)")]
    after: Option<String>,

    #[arg(long, value_name = "WHEN", help = "Only messages before this (1h ago, today)")]
    before: Option<String>,

    #[arg(long, help = "Maximum number of results to return")]
    limit: Option<u32>,
}

#[derive(Args)]
struct DownloadArgs {
    #[arg(help = "Matrix content URL (mxc:// or localmxc://)")]
    url: String,

    #[arg(short, long, help = "Save to a specific file path")]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum RemindersCommand {
    #[command(about = "Set a reminder for a chat")]
    Set(RemindersSetArgs),
    #[command(about = "Clear a reminder from a chat")]
    Clear(RemindersClearArgs),
}

#[derive(Args)]
struct RemindersSetArgs {
    #[arg(help = "Chat ID or alias")]
    chat: String,

    #[arg(help = "When to remind (30m, 1h, 2d, 1w, tomorrow, or ISO date)")]
    time: String,

    #[arg(short, long, help = "Cancel if someone messages in the chat")]
    dismiss_on_message: bool,
}

#[derive(Args)]
struct RemindersClearArgs {
    #[arg(help = "Chat ID or alias")]
    chat: String,
}

#[derive(Args)]
struct FocusArgs {
    #[arg(help = "Optional chat ID or alias to open")]
    chat: Option<String>,

    #[arg(short, long, help = "Jump to a specific message")]
    message: Option<String>,

    #[arg(short, long, help = "Pre-fill draft text")]
    draft: Option<String>,

    #[arg(short, long, help = "Pre-fill a draft attachment")]
    attachment: Option<PathBuf>,
}

#[derive(Subcommand)]
enum AliasCommand {
    #[command(about = "Save an alias for a chat ID")]
    Add(AliasAddArgs),
    #[command(about = "Remove a saved alias")]
    Remove(AliasRemoveArgs),
    #[command(about = "List saved aliases")]
    List,
}

#[derive(Args)]
struct AliasAddArgs {
    #[arg(help = "Alias name (letters, digits, '_')")]
    name: String,

    #[arg(help = "Chat ID the alias points to")]
    chat_id: String,
}

#[derive(Args)]
struct AliasRemoveArgs {
    #[arg(help = "Alias name")]
    name: String,
}

#[derive(Subcommand)]
enum AuthCommand {
    #[command(about = "Save an access token (prompts when omitted)")]
    Set(AuthSetArgs),
    #[command(about = "Remove the saved access token")]
    Clear,
    #[command(about = "Show where the access token comes from")]
    Status,
}

#[derive(Args)]
struct AuthSetArgs {
    #[arg(help = "Access token from Beeper Desktop settings")]
    token: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let subject = cli.command.subject();
    if let Err(error) = run(cli).await {
        report::print_report(&report::classify(&error, subject));
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "beep=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("BEEP_LOG").unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CommandError> {
    let config = Config::load();
    let store = ConfigStore::new(config.config_path.clone());
    debug!(path = %store.path().display(), "loading config");
    let stored = store.load()?;
    let json = cli.json;

    match cli.command {
        Command::Archive(args) => {
            let chat_id = resolve_chat(&args.chat, &stored)?;
            let archived = !args.unarchive;
            let api = api_client(&config, &stored)?;
            api.archive_chat(&chat_id, archived).await?;

            if json {
                output::print_json(&json!({ "chatID": chat_id, "archived": archived }))?;
            } else if !args.quiet {
                if archived {
                    output::success("📦 Chat archived successfully!");
                } else {
                    output::success("📬 Chat unarchived successfully!");
                }
                output::detail(&format!("Chat: {chat_id}"));
            }
        }
        Command::Send(args) => {
            let chat_id = resolve_chat(&args.chat, &stored)?;
            if args.message.trim().is_empty() {
                return Err(CommandError::usage("Message text cannot be empty"));
            }
            let api = api_client(&config, &stored)?;
            let sent = api.send_message(&chat_id, &args.message).await?;

            if json {
                output::print_json(&sent)?;
            } else if !args.quiet {
                output::success("✅ Message sent!");
                output::detail(&format!("ID: {}", sent.pending_message_id));
                output::detail(&format!("Chat: {}", sent.chat_id));
            }
        }
        Command::Contacts { command } => match command {
            ContactsCommand::Search(args) => {
                let api = api_client(&config, &stored)?;
                let result = api.search_contacts(&args.account_id, &args.query).await?;
                if json {
                    output::print_json(&result)?;
                } else {
                    output::print_contacts(&args.query, &result);
                }
            }
        },
        Command::Accounts { command } => match command {
            AccountsCommand::List => {
                let api = api_client(&config, &stored)?;
                let accounts = api.list_accounts().await?;
                if json {
                    output::print_json(&accounts)?;
                } else {
                    output::print_accounts(&accounts);
                }
            }
        },
        Command::Messages { command } => match command {
            MessagesCommand::Search(args) => {
                let input = message_search_input(args, &stored)?;
                let api = api_client(&config, &stored)?;
                let result = api.search_messages(&input).await?;
                if json {
                    output::print_json(&result)?;
                } else {
                    output::print_messages(&result);
                }
            }
        },
        Command::Download(args) => {
            if !is_matrix_content_url(&args.url) {
                return Err(CommandError::usage_with_hint(
                    "Invalid URL format",
                    "URL should be mxc:// or localmxc://",
                ));
            }
            let api = api_client(&config, &stored)?;
            let result = api.download_asset(&args.url).await?;
            if let Some(error) = result.error.as_deref() {
                return Err(CommandError::usage(format!("Download failed: {error}")));
            }
            let Some(src_url) = result.src_url.as_deref() else {
                return Err(CommandError::usage("No source URL returned"));
            };
            let local_path = local_path_from_src(src_url);

            if let Some(output_path) = args.output.as_deref() {
                tokio::fs::copy(&local_path, output_path).await?;
                if json {
                    output::print_json(&json!({ "path": output_path, "source": local_path }))?;
                } else {
                    output::success("✓ Downloaded successfully");
                    output::detail(&format!("Saved to: {}", output_path.display()));
                }
            } else if json {
                output::print_json(&json!({ "path": local_path }))?;
            } else {
                output::success("✓ Asset available locally");
                output::detail(&format!("Path: {}", local_path.display()));
                if let Some(file_name) = local_path.file_name() {
                    output::detail(&format!("Filename: {}", file_name.to_string_lossy()));
                }
            }
        }
        Command::Reminders { command } => match command {
            RemindersCommand::Set(args) => {
                let chat_id = resolve_chat(&args.chat, &stored)?;
                let remind_at = dates::parse_future_time(&args.time)?;
                debug!(%remind_at, "parsed reminder time");
                let api = api_client(&config, &stored)?;
                api.set_reminder(&chat_id, remind_at.timestamp_millis(), args.dismiss_on_message)
                    .await?;

                if json {
                    output::print_json(&json!({
                        "chatID": chat_id,
                        "remindAtMs": remind_at.timestamp_millis(),
                        "remindAt": dates::format_iso(&remind_at),
                        "dismissOnIncomingMessage": args.dismiss_on_message,
                    }))?;
                } else {
                    output::success("✓ Reminder set successfully");
                    output::detail(&format!("Chat: {chat_id}"));
                    output::detail(&format!("Remind at: {}", output::local_time(&remind_at)));
                    if args.dismiss_on_message {
                        output::detail("Will dismiss if someone messages");
                    }
                }
            }
            RemindersCommand::Clear(args) => {
                let chat_id = resolve_chat(&args.chat, &stored)?;
                let api = api_client(&config, &stored)?;
                api.clear_reminder(&chat_id).await?;

                if json {
                    output::print_json(&json!({ "chatID": chat_id, "cleared": true }))?;
                } else {
                    output::success("✓ Reminder cleared");
                    output::detail(&format!("Chat: {chat_id}"));
                }
            }
        },
        Command::Focus(args) => {
            let chat_id = args
                .chat
                .as_deref()
                .map(|chat| resolve_chat(chat, &stored))
                .transpose()?;
            let input = FocusInput {
                chat_id: chat_id.clone(),
                message_id: args.message,
                draft_text: args.draft,
                draft_attachment_path: args
                    .attachment
                    .as_deref()
                    .map(|path| path.to_string_lossy().to_string()),
            };
            let api = api_client(&config, &stored)?;
            let result = api.focus(&input).await?;
            if !result.success {
                return Err(CommandError::usage("Failed to focus Beeper Desktop"));
            }

            if json {
                output::print_json(&result)?;
            } else {
                output::success("✓ Beeper Desktop focused");
                if let Some(chat_id) = chat_id {
                    output::detail(&format!("Chat: {chat_id}"));
                }
            }
        }
        Command::Alias { command } => handle_alias(command, &store, stored, json)?,
        Command::Auth { command } => handle_auth(command, &store, stored, &config, json)?,
    }

    Ok(())
}

fn api_client(config: &Config, stored: &StoredConfig) -> Result<ApiClient, CommandError> {
    let token = resolve_token(config.token_override.as_deref(), stored).map(|(token, _)| token);
    if token.is_none() {
        debug!("no access token configured");
    }
    Ok(ApiClient::new(&config.api_base_url, token, config.request_timeout)?)
}

fn resolve_chat(input: &str, stored: &StoredConfig) -> Result<String, CommandError> {
    let chat_id = resolve_chat_target(input, stored)?;
    debug!(input, chat_id = %chat_id, "resolved chat");
    Ok(chat_id)
}

fn message_search_input(
    args: MessagesSearchArgs,
    stored: &StoredConfig,
) -> Result<MessageSearchInput, CommandError> {
    let chat_ids = args
        .chats
        .iter()
        .map(|chat| resolve_chat(chat, stored))
        .collect::<Result<Vec<_>, _>>()?;
    let date_after = args.after.as_deref().map(dates::parse_relative_date).transpose()?;
    let date_before = args.before.as_deref().map(dates::parse_relative_date).transpose()?;
    let query = args.query.filter(|query| !query.trim().is_empty());

    Ok(MessageSearchInput {
        query,
        chat_ids,
        date_after,
        date_before,
        limit: args.limit,
    })
}

fn handle_alias(
    command: AliasCommand,
    store: &ConfigStore,
    mut stored: StoredConfig,
    json: bool,
) -> Result<(), CommandError> {
    match command {
        AliasCommand::Add(args) => {
            if !is_valid_alias_name(&args.name) {
                return Err(AliasError::InvalidAliasName(args.name).into());
            }
            if !is_valid_chat_id(&args.chat_id) {
                return Err(CommandError::usage_with_hint(
                    format!("Invalid chat ID: {}", args.chat_id),
                    "Chat IDs should start with '!' (e.g., !abc123:beeper.local)",
                ));
            }
            let previous = stored.aliases.insert(args.name.clone(), args.chat_id.clone());
            store.save(&stored)?;

            if json {
                output::print_json(&json!({ "alias": args.name, "chatID": args.chat_id }))?;
            } else {
                match previous {
                    Some(previous) if previous != args.chat_id => {
                        output::success(&format!("✓ Alias '{}' updated", args.name));
                        output::detail(&format!("Was: {previous}"));
                    }
                    _ => output::success(&format!("✓ Alias '{}' saved", args.name)),
                }
                output::detail(&format!("Chat: {}", args.chat_id));
            }
        }
        AliasCommand::Remove(args) => {
            let Some(chat_id) = stored.aliases.remove(&args.name) else {
                return Err(AliasError::UnknownAlias(args.name).into());
            };
            store.save(&stored)?;

            if json {
                output::print_json(&json!({ "alias": args.name, "chatID": chat_id, "removed": true }))?;
            } else {
                output::success(&format!("✓ Alias '{}' removed", args.name));
                output::detail(&format!("Chat: {chat_id}"));
            }
        }
        AliasCommand::List => {
            if json {
                output::print_json(&stored.aliases)?;
            } else {
                output::print_aliases(&stored.aliases);
            }
        }
    }
    Ok(())
}

fn handle_auth(
    command: AuthCommand,
    store: &ConfigStore,
    mut stored: StoredConfig,
    config: &Config,
    json: bool,
) -> Result<(), CommandError> {
    match command {
        AuthCommand::Set(args) => {
            let token = match args.token {
                Some(token) => token,
                None => Password::new()
                    .with_prompt("Beeper Desktop access token")
                    .interact()?,
            };
            let token = token.trim().to_string();
            if token.is_empty() {
                return Err(CommandError::usage("Access token cannot be empty"));
            }
            stored.token = Some(token);
            store.save(&stored)?;

            if json {
                output::print_json(&json!({ "saved": true, "configPath": store.path() }))?;
            } else {
                output::success("✓ Access token saved");
                output::detail(&format!("Config: {}", store.path().display()));
            }
            if config.token_override.is_some() {
                warn!("BEEPER_ACCESS_TOKEN is set and takes precedence over the saved token");
            }
        }
        AuthCommand::Clear => {
            let had_token = stored.token.take().is_some();
            if had_token {
                store.save(&stored)?;
            }

            if json {
                output::print_json(&json!({ "cleared": had_token }))?;
            } else if had_token {
                output::success("✓ Access token removed");
            } else {
                output::detail("No saved access token");
            }
        }
        AuthCommand::Status => {
            let source = resolve_token(config.token_override.as_deref(), &stored).map(|(_, source)| source);
            if json {
                output::print_json(&json!({
                    "configured": source.is_some(),
                    "source": source.map(|source| source.as_str()),
                    "configPath": store.path(),
                    "apiBaseUrl": config.api_base_url,
                }))?;
            } else {
                match source {
                    Some(source) => {
                        output::success("✓ Access token configured");
                        output::detail(&format!("Source: {}", source.as_str()));
                    }
                    None => {
                        return Err(CommandError::usage_with_hint(
                            "No access token configured",
                            "Save one with: beep auth set",
                        ));
                    }
                }
                output::detail(&format!("Config: {}", store.path().display()));
                output::detail(&format!("API: {}", config.api_base_url));
            }
        }
    }
    Ok(())
}

fn is_matrix_content_url(url: &str) -> bool {
    url.starts_with("mxc://") || url.starts_with("localmxc://")
}

fn local_path_from_src(src_url: &str) -> PathBuf {
    if let Ok(url) = url::Url::parse(src_url) {
        if url.scheme() == "file" {
            if let Ok(path) = url.to_file_path() {
                return path;
            }
        }
    }
    let stripped = src_url.strip_prefix("file://").unwrap_or(src_url);
    if stripped.len() == src_url.len() {
        warn!(src_url, "asset source is not a file url");
    }
    Path::new(stripped).to_path_buf()
}
