//! Word repository.
//!
//! Every call resolves the caller through the [`SessionManager`] first, so an
//! operation without a session fails with [`Error::Unauthenticated`] and never
//! reaches the store. Input is validated before the session is even looked up.

use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::SessionManager;
use crate::backend::WordStore;
use crate::error::{Error, Result};
use crate::models::{NewWord, Word, WordFilter, WordPatch};

#[derive(Clone)]
pub struct WordRepository {
    session: Arc<SessionManager>,
    store: Arc<dyn WordStore>,
}

impl WordRepository {
    pub fn new(session: Arc<SessionManager>, store: Arc<dyn WordStore>) -> Self {
        Self { session, store }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// The caller's words, newest first, optionally filtered by `hanzi`.
    pub async fn list(&self, filter: &WordFilter) -> Result<Vec<Word>> {
        let session = self.session.require_session().await?;
        let words = self.store.select_words(&session, filter).await?;
        debug!(
            count = words.len(),
            query = filter.effective_query().unwrap_or_default(),
            "listed words"
        );
        Ok(words)
    }

    pub async fn create(&self, word: NewWord) -> Result<Word> {
        let word = word.validated()?;
        let session = self.session.require_session().await?;
        let created = self.store.insert_word(&session, &word).await?;
        info!(word_id = %created.id, "word created");
        Ok(created)
    }

    pub async fn update(&self, id: &str, patch: WordPatch) -> Result<Word> {
        let id = require_id(id)?;
        let patch = patch.validated()?;
        let session = self.session.require_session().await?;
        let updated = self.store.update_word(&session, id, &patch).await?;
        info!(word_id = %id, "word updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let id = require_id(id)?;
        let session = self.session.require_session().await?;
        self.store.delete_word(&session, id).await?;
        info!(word_id = %id, "word deleted");
        Ok(())
    }

    /// Points a word at an uploaded image.
    pub async fn set_image(&self, id: &str, image_url: &str) -> Result<Word> {
        self.update(id, WordPatch::image_url(image_url)).await
    }
}

pub(crate) fn require_id(id: &str) -> Result<&str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(Error::Validation("id is required".into()));
    }
    Ok(id)
}
