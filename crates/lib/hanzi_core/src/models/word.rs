//! Vocabulary entries.
//!
//! [`NewWord`] and [`WordPatch`] carry their own validation so repositories can
//! reject bad input before touching the network.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lowest and highest HSK levels accepted.
pub const HSK_LEVELS: std::ops::RangeInclusive<u8> = 1..=6;

/// Row in the `words` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    #[serde(deserialize_with = "super::id_string")]
    pub id: String,
    pub user_id: String,
    pub hanzi: String,
    #[serde(default)]
    pub pinyin: Option<String>,
    pub meaning_th: String,
    #[serde(default)]
    pub hsk_level: Option<u8>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a word. Id, owner and timestamp are assigned by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewWord {
    pub hanzi: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinyin: Option<String>,
    pub meaning_th: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hsk_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl NewWord {
    pub fn new(hanzi: impl Into<String>, meaning_th: impl Into<String>) -> Self {
        Self {
            hanzi: hanzi.into(),
            meaning_th: meaning_th.into(),
            ..Default::default()
        }
    }

    pub fn with_pinyin(mut self, pinyin: impl Into<String>) -> Self {
        self.pinyin = Some(pinyin.into());
        self
    }

    pub fn with_hsk_level(mut self, level: u8) -> Self {
        self.hsk_level = Some(level);
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Trims text fields and checks required ones.
    ///
    /// Blank optional text collapses to `None`.
    pub fn validated(self) -> Result<Self> {
        Ok(Self {
            hanzi: required("hanzi", &self.hanzi)?,
            pinyin: optional(self.pinyin),
            meaning_th: required("meaning_th", &self.meaning_th)?,
            hsk_level: check_hsk(self.hsk_level)?,
            image_url: optional(self.image_url),
        })
    }
}

/// Partial update. `None` leaves a column untouched; for optional columns
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hanzi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinyin: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meaning_th: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hsk_level: Option<Option<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Option<String>>,
}

impl WordPatch {
    /// A patch that replaces every editable field with the values of `word`.
    pub fn replace_with(word: NewWord) -> Self {
        Self {
            hanzi: Some(word.hanzi),
            pinyin: Some(word.pinyin),
            meaning_th: Some(word.meaning_th),
            hsk_level: Some(word.hsk_level),
            image_url: None,
        }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self {
            image_url: Some(Some(url.into())),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Trims provided fields; required fields may be omitted but not blanked.
    pub fn validated(self) -> Result<Self> {
        if self.is_empty() {
            return Err(Error::Validation("nothing to update".into()));
        }
        Ok(Self {
            hanzi: self.hanzi.map(|h| required("hanzi", &h)).transpose()?,
            pinyin: self.pinyin.map(optional),
            meaning_th: self
                .meaning_th
                .map(|m| required("meaning_th", &m))
                .transpose()?,
            hsk_level: self.hsk_level.map(check_hsk).transpose()?,
            image_url: self.image_url.map(optional),
        })
    }

    /// Applies the patch to a stored row.
    pub fn apply(&self, word: &mut Word) {
        if let Some(hanzi) = &self.hanzi {
            word.hanzi = hanzi.clone();
        }
        if let Some(pinyin) = &self.pinyin {
            word.pinyin = pinyin.clone();
        }
        if let Some(meaning) = &self.meaning_th {
            word.meaning_th = meaning.clone();
        }
        if let Some(level) = self.hsk_level {
            word.hsk_level = level;
        }
        if let Some(url) = &self.image_url {
            word.image_url = url.clone();
        }
    }
}

/// Listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordFilter {
    /// Case-insensitive substring of `hanzi`.
    pub query: Option<String>,
}

impl WordFilter {
    pub fn query(q: impl Into<String>) -> Self {
        Self {
            query: Some(q.into()),
        }
    }

    /// The trimmed query, or `None` when it is absent or blank.
    pub fn effective_query(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    pub fn matches(&self, word: &Word) -> bool {
        match self.effective_query() {
            Some(q) => word.hanzi.to_lowercase().contains(&q.to_lowercase()),
            None => true,
        }
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_hsk(level: Option<u8>) -> Result<Option<u8>> {
    match level {
        Some(l) if !HSK_LEVELS.contains(&l) => Err(Error::Validation(format!(
            "hsk_level must be between {} and {}, got {l}",
            HSK_LEVELS.start(),
            HSK_LEVELS.end()
        ))),
        other => Ok(other),
    }
}
