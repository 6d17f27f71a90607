use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid api url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api url cannot be used as a base: {0}")]
    InvalidBaseUrl(String),
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
}

impl ApiError {
    /// True when the desktop app could not be reached at all.
    pub fn is_connect(&self) -> bool {
        match self {
            ApiError::Http(err) => err.is_connect(),
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Http(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    http: Client,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("beep/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url,
            http,
            token,
        })
    }

    pub async fn archive_chat(&self, chat_id: &str, archived: bool) -> Result<(), ApiError> {
        let url = self.endpoint(&["v1", "chats", chat_id, "archive"])?;
        let mut payload = serde_json::Map::new();
        payload.insert("archived".to_string(), json!(archived));
        self.send_unit(self.request(Method::POST, url).json(&payload)).await
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<SendMessageResult, ApiError> {
        let url = self.endpoint(&["v1", "chats", chat_id, "messages"])?;
        let mut payload = serde_json::Map::new();
        payload.insert("text".to_string(), json!(text));
        self.send_json(self.request(Method::POST, url).json(&payload)).await
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, ApiError> {
        let url = self.endpoint(&["v1", "accounts"])?;
        let payload: AccountsPayload = self.send_json(self.request(Method::GET, url)).await?;
        Ok(match payload {
            AccountsPayload::List(accounts) => accounts,
            AccountsPayload::Wrapped { items } => items,
        })
    }

    pub async fn search_contacts(&self, account_id: &str, query: &str) -> Result<ContactSearchResult, ApiError> {
        let mut url = self.endpoint(&["v1", "accounts", account_id, "contacts"])?;
        url.query_pairs_mut().append_pair("query", query);
        self.send_json(self.request(Method::GET, url)).await
    }

    pub async fn search_messages(&self, input: &MessageSearchInput) -> Result<MessageSearchResult, ApiError> {
        let url = self.message_search_url(input)?;
        self.send_json(self.request(Method::GET, url)).await
    }

    pub async fn download_asset(&self, asset_url: &str) -> Result<DownloadAssetResult, ApiError> {
        let url = self.endpoint(&["v1", "assets", "download"])?;
        let mut payload = serde_json::Map::new();
        payload.insert("url".to_string(), json!(asset_url));
        self.send_json(self.request(Method::POST, url).json(&payload)).await
    }

    pub async fn set_reminder(
        &self,
        chat_id: &str,
        remind_at_ms: i64,
        dismiss_on_incoming_message: bool,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&["v1", "chats", chat_id, "reminders"])?;
        let mut reminder = serde_json::Map::new();
        reminder.insert("remindAtMs".to_string(), json!(remind_at_ms));
        reminder.insert(
            "dismissOnIncomingMessage".to_string(),
            json!(dismiss_on_incoming_message),
        );
        let mut payload = serde_json::Map::new();
        payload.insert("reminder".to_string(), Value::Object(reminder));
        self.send_unit(self.request(Method::POST, url).json(&payload)).await
    }

    pub async fn clear_reminder(&self, chat_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["v1", "chats", chat_id, "reminders"])?;
        self.send_unit(self.request(Method::DELETE, url)).await
    }

    pub async fn focus(&self, input: &FocusInput) -> Result<FocusResult, ApiError> {
        let url = self.endpoint(&["v1", "focus"])?;
        self.send_json(self.request(Method::POST, url).json(input)).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn message_search_url(&self, input: &MessageSearchInput) -> Result<Url, ApiError> {
        let mut url = self.endpoint(&["v1", "messages", "search"])?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(query) = input.query.as_deref() {
                pairs.append_pair("query", query);
            }
            for chat_id in &input.chat_ids {
                pairs.append_pair("chatIDs", chat_id);
            }
            if let Some(date_after) = input.date_after.as_deref() {
                pairs.append_pair("dateAfter", date_after);
            }
            if let Some(date_before) = input.date_before.as_deref() {
                pairs.append_pair("dateBefore", date_before);
            }
            if let Some(limit) = input.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, %url, "api request");
        let builder = self.http.request(method, url);
        match self.token.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = checked(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn send_unit(&self, request: RequestBuilder) -> Result<(), ApiError> {
        checked(request.send().await?).await?;
        Ok(())
    }
}

async fn checked(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    debug!(status = status.as_u16(), "api response");
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message: error_message_from_body(&body, status.canonical_reason()),
    })
}

fn error_message_from_body(body: &str, reason: Option<&str>) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error", "description"] {
            if let Some(message) = value.get(key).and_then(Value::as_str) {
                if !message.trim().is_empty() {
                    return message.trim().to_string();
                }
            }
        }
    }
    let body = body.trim();
    if !body.is_empty() && body.len() <= 200 {
        return body.to_string();
    }
    reason.unwrap_or("request failed").to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SendMessageResult {
    #[serde(rename = "chatID")]
    pub chat_id: String,
    #[serde(rename = "pendingMessageID")]
    pub pending_message_id: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    #[serde(rename = "imgURL")]
    pub img_url: Option<String>,
    pub cannot_message: Option<bool>,
    pub is_self: Option<bool>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| self.username.as_deref().filter(|name| !name.trim().is_empty()))
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ContactSearchResult {
    pub items: Vec<User>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Account {
    #[serde(rename = "accountID")]
    pub account_id: String,
    #[serde(default)]
    pub network: String,
    pub user: Option<User>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AccountsPayload {
    List(Vec<Account>),
    Wrapped { items: Vec<Account> },
}

#[derive(Debug, Clone, Default)]
pub struct MessageSearchInput {
    pub query: Option<String>,
    pub chat_ids: Vec<String>,
    pub date_after: Option<String>,
    pub date_before: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(rename = "chatID")]
    pub chat_id: String,
    pub sender_name: Option<String>,
    pub text: Option<String>,
    pub timestamp: Option<String>,
    pub is_sender: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MessageSearchResult {
    pub items: Vec<Message>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DownloadAssetResult {
    #[serde(rename = "srcURL")]
    pub src_url: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct FocusInput {
    #[serde(rename = "chatID", skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(rename = "messageID", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(rename = "draftText", skip_serializing_if = "Option::is_none")]
    pub draft_text: Option<String>,
    #[serde(rename = "draftAttachmentPath", skip_serializing_if = "Option::is_none")]
    pub draft_attachment_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FocusResult {
    pub success: bool,
}
