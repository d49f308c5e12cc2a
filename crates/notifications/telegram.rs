use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use thiserror::Error;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("telegram {method} rejected: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
    #[error("telegram {method} timed out")]
    Timeout { method: &'static str },
    #[error("telegram {method} request failed")]
    Transport { method: &'static str },
    #[error("telegram {method} returned an unreadable response: {message}")]
    Decode {
        method: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    pub fn is_empty(&self) -> bool {
        self.inline_keyboard.iter().all(|row| row.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub url: String,
}

impl InlineKeyboardButton {
    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

fn parse_response<T: DeserializeOwned>(
    body: &str,
    method: &'static str,
) -> Result<T, TelegramError> {
    let response: ApiResponse<T> =
        serde_json::from_str(body).map_err(|err| TelegramError::Decode {
            method,
            message: err.to_string(),
        })?;

    if !response.ok {
        return Err(TelegramError::Api {
            method,
            description: response
                .description
                .unwrap_or_else(|| "no description".to_string()),
        });
    }

    response.result.ok_or(TelegramError::Decode {
        method,
        message: "missing result".to_string(),
    })
}

// The bot token is part of the URL, so reqwest errors are never surfaced verbatim.
fn sanitize_reqwest_error(error: reqwest::Error, method: &'static str) -> TelegramError {
    if error.is_timeout() {
        return TelegramError::Timeout { method };
    }
    TelegramError::Transport { method }
}

/// Thin Telegram Bot API client: long polling and `sendMessage`.
pub struct TelegramClient {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramClient {
    pub fn new(token: String) -> Result<Self, TelegramError> {
        Self::with_api_base(TELEGRAM_API_BASE.to_string(), token)
    }

    pub fn with_api_base(api_base: String, token: String) -> Result<Self, TelegramError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| sanitize_reqwest_error(err, "client setup"))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> Result<T, TelegramError> {
        let response = self
            .client
            .post(self.endpoint(method))
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|err| sanitize_reqwest_error(err, method))?;

        let body = response
            .text()
            .await
            .map_err(|err| sanitize_reqwest_error(err, method))?;

        parse_response(&body, method)
    }

    /// Sends a Markdown message, optionally with link buttons underneath.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });
        if let Some(markup) = reply_markup.filter(|m| !m.is_empty()) {
            payload["reply_markup"] = json!(markup);
        }

        let _: serde_json::Value = self.call("sendMessage", payload, REQUEST_TIMEOUT).await?;
        Ok(())
    }

    /// Long-polls `getUpdates`; returns as soon as updates arrive or `timeout_secs` passes.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let payload = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });

        self.call(
            "getUpdates",
            payload,
            Duration::from_secs(timeout_secs) + Duration::from_secs(10),
        )
        .await
    }
}
