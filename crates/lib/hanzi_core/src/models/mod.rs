//! Domain models.
//!
//! Field names follow the backend's column names (`meaning_th`, `hsk_level`, ...)
//! so rows deserialize without renames.

pub mod auth;
pub mod chat;
pub mod image;
pub mod notification;
pub mod word;

pub use auth::{Session, User};
pub use chat::{ChatMessage, Sender};
pub use image::Image;
pub use notification::Notification;
pub use word::{NewWord, Word, WordFilter, WordPatch};

use serde::{Deserialize, Deserializer};

/// Row ids are text or integer depending on the column type; both become a `String`.
pub(crate) fn id_string<'de, D>(deserializer: D) -> core::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Int(id) => id.to_string(),
    })
}
