//! Chat gateway.
//!
//! One request, one reply: `POST {api}/api/chat` with the message, the
//! caller's id and a few of their words as context. The whole round trip runs
//! under a deadline; when it passes, the request future is dropped, which
//! aborts the connection.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::{AppConfig, endpoint};
use crate::error::{Error, Result};
use crate::models::Word;

/// A word sent along as conversation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatWord {
    pub hanzi: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinyin: Option<String>,
    pub meaning_th: String,
}

impl From<&Word> for ChatWord {
    fn from(word: &Word) -> Self {
        Self {
            hanzi: word.hanzi.clone(),
            pinyin: word.pinyin.clone(),
            meaning_th: word.meaning_th.clone(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    message: &'a str,
    user_id: &'a str,
    context: ChatContext<'a>,
}

#[derive(Serialize)]
struct ChatContext<'a> {
    words: &'a [ChatWord],
}

#[derive(Deserialize)]
struct ChatReply {
    reply: String,
}

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Sends `text` and returns the assistant's reply.
    async fn send(&self, text: &str, user_id: &str, words: &[ChatWord]) -> Result<String>;
}

#[derive(Clone, Debug)]
pub struct ChatGateway {
    client: Client,
    url: String,
    timeout: Duration,
}

impl ChatGateway {
    pub fn new(base: &Url, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            url: endpoint(base, "api/chat"),
            timeout,
        })
    }

    /// Fails with [`Error::Config`] when no API URL is configured.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(config.require_api_url()?, config.chat_timeout)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn round_trip(&self, body: &ChatRequest<'_>) -> Result<String> {
        let resp = self.client.post(&self.url).json(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = if text.trim().is_empty() {
                format!("Chat API error: HTTP {}", status.as_u16())
            } else {
                text
            };
            return Err(Error::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json::<ChatReply>().await?.reply)
    }
}

#[async_trait]
impl ChatService for ChatGateway {
    async fn send(&self, text: &str, user_id: &str, words: &[ChatWord]) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("message is empty".into()));
        }
        let body = ChatRequest {
            message: text,
            user_id,
            context: ChatContext { words },
        };
        debug!(url = %self.url, context_words = words.len(), "sending chat message");

        match tokio::time::timeout(self.timeout, self.round_trip(&body)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "chat request timed out");
                Err(Error::Timeout(Some(self.timeout)))
            }
        }
    }
}
