//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Deadline for a chat round trip.
pub const DEFAULT_CHAT_TIMEOUT_MS: u64 = 15_000;

/// Quiet period before a search edit triggers a reload.
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 250;

/// Object-store bucket holding vocabulary images.
pub const DEFAULT_IMAGE_BUCKET: &str = "vocab-images";

/// Configuration for the hosted backend and the application API.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Base URL of the chat/notifications API. `None` selects the local
    /// notifications mock and makes chat unavailable.
    pub api_url: Option<Url>,
    /// Base URL of the hosted backend (identity, relational store, object store).
    pub backend_url: Option<Url>,
    /// Public (anon) key sent as `apikey` on every backend call.
    pub backend_anon_key: Option<String>,
    /// Object-store bucket for uploaded images.
    pub image_bucket: String,
    /// Deadline for chat requests.
    pub chat_timeout: Duration,
    /// Debounce interval for search input.
    pub search_debounce: Duration,
    /// Where the last session is cached between runs.
    pub session_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            backend_url: None,
            backend_anon_key: None,
            image_bucket: DEFAULT_IMAGE_BUCKET.to_string(),
            chat_timeout: Duration::from_millis(DEFAULT_CHAT_TIMEOUT_MS),
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
            session_file: default_session_file(),
        }
    }
}

impl AppConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable              | Default                                   |
    /// |-----------------------|-------------------------------------------|
    /// | `HANZI_API_URL`       | `EXPO_PUBLIC_API_URL`, else unset         |
    /// | `SUPABASE_URL`        | unset                                     |
    /// | `SUPABASE_ANON_KEY`   | unset                                     |
    /// | `HANZI_IMAGE_BUCKET`  | `vocab-images`                            |
    /// | `HANZI_CHAT_TIMEOUT_MS` | `15000`                                 |
    /// | `HANZI_SESSION_FILE`  | `<data dir>/hanzi-cards/session.json`     |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = get("HANZI_API_URL")
            .or_else(|| get("EXPO_PUBLIC_API_URL"))
            .map(|raw| parse_base_url(&raw))
            .transpose()?;
        let backend_url = get("SUPABASE_URL")
            .map(|raw| parse_base_url(&raw))
            .transpose()?;

        let chat_timeout = match get("HANZI_CHAT_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(raw.trim().parse().map_err(|_| {
                Error::Config(format!("HANZI_CHAT_TIMEOUT_MS is not a number: {raw}"))
            })?),
            None => Duration::from_millis(DEFAULT_CHAT_TIMEOUT_MS),
        };

        Ok(Self {
            api_url,
            backend_url,
            backend_anon_key: get("SUPABASE_ANON_KEY"),
            image_bucket: get("HANZI_IMAGE_BUCKET")
                .unwrap_or_else(|| DEFAULT_IMAGE_BUCKET.to_string()),
            chat_timeout,
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
            session_file: get("HANZI_SESSION_FILE")
                .map(PathBuf::from)
                .or_else(default_session_file),
        })
    }

    /// The API base URL, or a config error naming the variable to set.
    pub fn require_api_url(&self) -> Result<&Url> {
        self.api_url.as_ref().ok_or_else(|| {
            Error::Config("API base URL is not configured (set HANZI_API_URL)".into())
        })
    }
}

/// Parses a base URL and strips trailing slashes from its path.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())?;
    let trimmed = url.path().trim_end_matches('/').to_string();
    url.set_path(&trimmed);
    Ok(url)
}

/// Joins `path` onto a base URL produced by [`parse_base_url`].
pub fn endpoint(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn default_session_file() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("hanzi-cards").join("session.json"))
}
