use std::sync::Arc;

use super::record;
use crate::error::Result;
use crate::models::notification::sort_newest_first;
use crate::models::Notification;
use crate::notifications::NotificationRepository;

/// Notification feed, newest first, with optimistic mark-read and remove.
pub struct NotificationsController {
    repo: Arc<dyn NotificationRepository>,
    items: Vec<Notification>,
    loading: bool,
    last_error: Option<String>,
}

impl NotificationsController {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self {
            repo,
            items: Vec::new(),
            loading: false,
            last_error: None,
        }
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub async fn load(&mut self) -> Result<()> {
        self.loading = true;
        let result = self.repo.list().await;
        self.loading = false;
        let mut items = record(&mut self.last_error, result)?;
        sort_newest_first(&mut items);
        self.items = items;
        Ok(())
    }

    pub async fn mark_read(&mut self, id: &str) -> Result<()> {
        let flipped = match self.items.iter_mut().find(|n| n.id == id) {
            Some(item) if !item.read => {
                item.read = true;
                true
            }
            _ => false,
        };

        let result = self.repo.mark_read(id).await;
        if result.is_err() && flipped {
            if let Some(item) = self.items.iter_mut().find(|n| n.id == id) {
                item.read = false;
            }
        }
        record(&mut self.last_error, result)
    }

    pub async fn remove(&mut self, id: &str) -> Result<()> {
        let removed = self
            .items
            .iter()
            .position(|n| n.id == id)
            .map(|i| (i, self.items.remove(i)));

        let result = self.repo.remove(id).await;
        if result.is_err() {
            if let Some((index, item)) = removed {
                let index = index.min(self.items.len());
                self.items.insert(index, item);
            }
        }
        record(&mut self.last_error, result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::Error;
    use crate::notifications::MockNotificationRepository;

    /// Wraps the mock and fails mutations while `broken` is set.
    struct Flaky {
        inner: MockNotificationRepository,
        broken: AtomicBool,
    }

    impl Flaky {
        fn check(&self) -> Result<()> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(Error::Http {
                    status: 503,
                    message: "HTTP 503".into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl NotificationRepository for Flaky {
        async fn list(&self) -> Result<Vec<Notification>> {
            self.inner.list().await
        }

        async fn mark_read(&self, id: &str) -> Result<()> {
            self.check()?;
            self.inner.mark_read(id).await
        }

        async fn remove(&self, id: &str) -> Result<()> {
            self.check()?;
            self.inner.remove(id).await
        }
    }

    fn flaky(broken: bool) -> Arc<Flaky> {
        Arc::new(Flaky {
            inner: MockNotificationRepository::with_latency(Default::default(), Default::default()),
            broken: AtomicBool::new(broken),
        })
    }

    #[tokio::test]
    async fn load_sorts_newest_first() {
        let mut ctl = NotificationsController::new(flaky(false));
        ctl.load().await.unwrap();
        let ids: Vec<_> = ctl.items().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n1", "n2"]);
        assert_eq!(ctl.unread_count(), 1);
    }

    #[tokio::test]
    async fn failed_mark_read_reverts() {
        let repo = flaky(false);
        let mut ctl = NotificationsController::new(repo.clone());
        ctl.load().await.unwrap();
        repo.broken.store(true, Ordering::SeqCst);

        assert!(ctl.mark_read("n1").await.is_err());
        assert!(!ctl.items()[0].read);
        assert_eq!(ctl.last_error(), Some("HTTP 503"));
    }

    #[tokio::test]
    async fn failed_remove_restores_the_item_in_place() {
        let repo = flaky(false);
        let mut ctl = NotificationsController::new(repo.clone());
        ctl.load().await.unwrap();
        repo.broken.store(true, Ordering::SeqCst);

        assert!(ctl.remove("n1").await.is_err());
        assert_eq!(ctl.items()[0].id, "n1");
        assert_eq!(ctl.items().len(), 2);
    }

    #[tokio::test]
    async fn successful_mutations_stick() {
        let mut ctl = NotificationsController::new(flaky(false));
        ctl.load().await.unwrap();
        ctl.mark_read("n1").await.unwrap();
        ctl.remove("n2").await.unwrap();
        assert_eq!(ctl.unread_count(), 0);
        assert_eq!(ctl.items().len(), 1);
        assert!(ctl.last_error().is_none());
    }
}
