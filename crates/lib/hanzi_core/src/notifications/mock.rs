use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::NotificationRepository;
use crate::error::{Error, Result};
use crate::models::Notification;

const LIST_LATENCY: Duration = Duration::from_millis(400);
const MUTATION_LATENCY: Duration = Duration::from_millis(200);

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;

/// Local stand-in for the feed. Starts with two entries and simulates latency.
#[derive(Debug)]
pub struct MockNotificationRepository {
    items: Mutex<Vec<Notification>>,
    list_latency: Duration,
    mutation_latency: Duration,
}

impl MockNotificationRepository {
    pub fn new() -> Self {
        Self::with_latency(LIST_LATENCY, MUTATION_LATENCY)
    }

    pub fn with_latency(list_latency: Duration, mutation_latency: Duration) -> Self {
        Self {
            items: Mutex::new(seed()),
            list_latency,
            mutation_latency,
        }
    }
}

impl Default for MockNotificationRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn seed() -> Vec<Notification> {
    let now = Utc::now().timestamp_millis();
    vec![
        Notification {
            id: "n1".into(),
            title: "คำศัพท์ใหม่ถูกเพิ่ม".into(),
            body: Some("คุณเพิ่ม “学习 (xuéxí)” สำเร็จ".into()),
            read: false,
            ts: now - 3 * MINUTE_MS,
        },
        Notification {
            id: "n2".into(),
            title: "ยินดีต้อนรับ!".into(),
            body: Some("เริ่มบันทึกคำศัพท์จีนคำแรกกันเลย".into()),
            read: true,
            ts: now - 10 * HOUR_MS,
        },
    ]
}

fn not_found(id: &str) -> Error {
    Error::Store(format!("notification {id} not found"))
}

#[async_trait]
impl NotificationRepository for MockNotificationRepository {
    async fn list(&self) -> Result<Vec<Notification>> {
        tokio::time::sleep(self.list_latency).await;
        Ok(self.items.lock().await.clone())
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        tokio::time::sleep(self.mutation_latency).await;
        let mut items = self.items.lock().await;
        let item = items.iter_mut().find(|n| n.id == id).ok_or_else(|| not_found(id))?;
        item.read = true;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        tokio::time::sleep(self.mutation_latency).await;
        let mut items = self.items.lock().await;
        let before = items.len();
        items.retain(|n| n.id != id);
        if items.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }
}
