//! Word list with debounced search.
//!
//! Every reload is tagged with a sequence number. When a response arrives
//! after a newer reload has started, it is dropped, so a slow answer to an
//! old query can never replace the list for the current one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;

use super::record;
use crate::error::Result;
use crate::models::{Word, WordFilter};
use crate::words::WordRepository;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordListState {
    pub items: Vec<Word>,
    pub query: String,
    pub loading: bool,
    pub last_error: Option<String>,
}

/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct WordListController {
    inner: Arc<Inner>,
}

struct Inner {
    repo: WordRepository,
    debounce: Duration,
    state: RwLock<WordListState>,
    /// Sequence number of the newest reload.
    latest: AtomicU64,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl WordListController {
    pub fn new(repo: WordRepository, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                repo,
                debounce,
                state: RwLock::new(WordListState::default()),
                latest: AtomicU64::new(0),
                pending: Mutex::new(None),
            }),
        }
    }

    pub async fn snapshot(&self) -> WordListState {
        self.inner.state.read().await.clone()
    }

    /// Updates the query and schedules a reload once input has been quiet for
    /// the debounce interval. A newer call cancels the scheduled one.
    pub async fn set_query(&self, query: impl Into<String>) {
        self.inner.state.write().await.query = query.into();

        let mut pending = self.inner.pending.lock().await;
        if let Some(task) = pending.take() {
            task.abort();
        }
        let inner = Arc::clone(&self.inner);
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            // Failures are already in `last_error`.
            let _ = inner.reload().await;
        }));
    }

    /// Sets the query and reloads right away.
    pub async fn search(&self, query: impl Into<String>) -> Result<()> {
        if let Some(task) = self.inner.pending.lock().await.take() {
            task.abort();
        }
        self.inner.state.write().await.query = query.into();
        self.inner.reload().await
    }

    pub async fn reload(&self) -> Result<()> {
        self.inner.reload().await
    }

    /// Removes the word from the list at once; puts it back if the delete fails.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let removed = {
            let mut state = self.inner.state.write().await;
            let index = state.items.iter().position(|w| w.id == id);
            index.map(|i| (i, state.items.remove(i)))
        };

        let result = self.inner.repo.delete(id).await;
        {
            let mut state = self.inner.state.write().await;
            if result.is_err() {
                if let Some((index, word)) = removed {
                    let index = index.min(state.items.len());
                    state.items.insert(index, word);
                }
            }
            record(&mut state.last_error, result)?;
        }
        self.inner.reload().await
    }
}

impl Inner {
    async fn reload(&self) -> Result<()> {
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let filter = {
            let mut state = self.state.write().await;
            state.loading = true;
            WordFilter::query(state.query.clone())
        };

        let result = self.repo.list(&filter).await;

        let mut state = self.state.write().await;
        if seq != self.latest.load(Ordering::SeqCst) {
            debug!(seq, "dropping stale word list response");
            return Ok(());
        }
        state.loading = false;
        let items = record(&mut state.last_error, result)?;
        state.items = items;
        Ok(())
    }
}
