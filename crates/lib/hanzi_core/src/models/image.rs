use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row in the `vocab_images` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(deserialize_with = "super::id_string")]
    pub id: String,
    pub user_id: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_id_decodes_as_text() {
        let image: Image = serde_json::from_value(serde_json::json!({
            "id": 3,
            "user_id": "u1",
            "image_url": "https://cdn.example/u1/1.png",
            "created_at": "2024-05-01T08:00:00Z"
        }))
        .unwrap();
        assert_eq!(image.id, "3");
    }
}
