use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::debug;
use url::Url;

use super::NotificationRepository;
use crate::error::{Error, Result};
use crate::models::Notification;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Notification feed served by the application API under `/api/notifications`.
#[derive(Clone, Debug)]
pub struct HttpNotificationRepository {
    client: Client,
    base: Url,
}

impl HttpNotificationRepository {
    pub fn new(base: Url) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, base })
    }

    /// `{base}/api/notifications/{segments..}` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(["api", "notifications"])
            .extend(segments);
        Ok(url)
    }
}

/// Non-2xx answers become [`Error::Http`] carrying the body, or `HTTP {status}`.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        body
    };
    debug!(status = status.as_u16(), %message, "notification request failed");
    Err(Error::Http {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl NotificationRepository for HttpNotificationRepository {
    async fn list(&self) -> Result<Vec<Notification>> {
        let resp = self.client.get(self.url(&[])?).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.url(&[id, "read"])?)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let resp = self.client.delete(self.url(&[id])?).send().await?;
        check(resp).await?;
        Ok(())
    }
}
