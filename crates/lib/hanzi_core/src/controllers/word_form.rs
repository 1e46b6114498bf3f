//! Create/edit form for a single word.

use crate::error::Result;
use crate::models::{NewWord, Word, WordPatch};
use crate::words::WordRepository;

use super::record;

/// Raw form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordForm {
    pub hanzi: String,
    pub pinyin: String,
    pub meaning_th: String,
    pub hsk_level: Option<u8>,
}

impl From<&Word> for WordForm {
    fn from(word: &Word) -> Self {
        Self {
            hanzi: word.hanzi.clone(),
            pinyin: word.pinyin.clone().unwrap_or_default(),
            meaning_th: word.meaning_th.clone(),
            hsk_level: word.hsk_level,
        }
    }
}

impl WordForm {
    fn to_new_word(&self) -> NewWord {
        NewWord {
            hanzi: self.hanzi.clone(),
            pinyin: Some(self.pinyin.clone()),
            meaning_th: self.meaning_th.clone(),
            hsk_level: self.hsk_level,
            image_url: None,
        }
    }
}

pub struct WordFormController {
    repo: WordRepository,
    editing: Option<Word>,
    pub form: WordForm,
    last_error: Option<String>,
}

impl WordFormController {
    /// An empty form that creates a word.
    pub fn create(repo: WordRepository) -> Self {
        Self {
            repo,
            editing: None,
            form: WordForm::default(),
            last_error: None,
        }
    }

    /// A form prefilled from `word` that updates it.
    pub fn edit(repo: WordRepository, word: Word) -> Self {
        Self {
            repo,
            form: WordForm::from(&word),
            editing: Some(word),
            last_error: None,
        }
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    /// Selecting the current level again clears it.
    pub fn toggle_hsk_level(&mut self, level: u8) {
        self.form.hsk_level = match self.form.hsk_level {
            Some(current) if current == level => None,
            _ => Some(level),
        };
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Validates the form, then creates or updates the word.
    pub async fn save(&mut self) -> Result<Word> {
        let result = self.submit().await;
        let saved = record(&mut self.last_error, result)?;
        if self.editing.is_some() {
            self.editing = Some(saved.clone());
        }
        Ok(saved)
    }

    async fn submit(&self) -> Result<Word> {
        let word = self.form.to_new_word().validated()?;
        match &self.editing {
            Some(existing) => {
                self.repo
                    .update(&existing.id, WordPatch::replace_with(word))
                    .await
            }
            None => self.repo.create(word).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::SessionManager;
    use crate::backend::memory::MemoryBackend;
    use crate::error::Error;
    use crate::models::WordFilter;

    async fn repo() -> WordRepository {
        let backend = MemoryBackend::new();
        backend.add_account("a@b.c", "password1").await;
        let session = Arc::new(SessionManager::in_memory(Arc::new(backend.clone())));
        session.sign_in("a@b.c", "password1").await.unwrap();
        WordRepository::new(session, Arc::new(backend))
    }

    #[tokio::test]
    async fn blank_required_field_is_reported_without_saving() {
        let repo = repo().await;
        let mut form = WordFormController::create(repo.clone());
        form.form.hanzi = "学习".into();

        assert!(matches!(form.save().await, Err(Error::Validation(_))));
        assert!(form.last_error().unwrap().contains("meaning_th"));
        assert!(repo.list(&WordFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_then_edit_keeps_the_id() {
        let repo = repo().await;
        let mut form = WordFormController::create(repo.clone());
        form.form.hanzi = "学习".into();
        form.form.meaning_th = "เรียน".into();
        form.toggle_hsk_level(1);
        let created = form.save().await.unwrap();
        assert_eq!(created.hsk_level, Some(1));
        assert_eq!(created.pinyin, None);

        let mut edit = WordFormController::edit(repo.clone(), created.clone());
        assert!(edit.is_editing());
        assert_eq!(edit.form.hanzi, "学习");
        edit.form.pinyin = "xuéxí".into();
        edit.toggle_hsk_level(1);
        let updated = edit.save().await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.pinyin.as_deref(), Some("xuéxí"));
        assert_eq!(updated.hsk_level, None);
        assert!(edit.last_error().is_none());
    }
}
