//! Notification feed.
//!
//! The feed comes from the application API when one is configured, otherwise
//! from a seeded local mock. The choice is made once by
//! [`notification_repository`].

mod http;
mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::AppConfig;
use crate::error::Result;
use crate::models::Notification;

pub use http::HttpNotificationRepository;
pub use mock::MockNotificationRepository;

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// The feed in whatever order the source returns it.
    async fn list(&self) -> Result<Vec<Notification>>;

    async fn mark_read(&self, id: &str) -> Result<()>;

    async fn remove(&self, id: &str) -> Result<()>;
}

/// The HTTP repository if an API URL is configured, else the mock.
pub fn notification_repository(config: &AppConfig) -> Result<Arc<dyn NotificationRepository>> {
    match &config.api_url {
        Some(base) => {
            info!(base = %base, "using remote notification feed");
            Ok(Arc::new(HttpNotificationRepository::new(base.clone())?))
        }
        None => {
            info!("no API URL configured, using local notification mock");
            Ok(Arc::new(MockNotificationRepository::new()))
        }
    }
}
