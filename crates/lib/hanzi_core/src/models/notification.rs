use serde::{Deserialize, Serialize};

/// Entry in the notification feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(deserialize_with = "super::id_string")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub read: bool,
    /// Creation time, epoch milliseconds.
    pub ts: i64,
}

/// Sorts newest first. The backend does not guarantee an order.
pub fn sort_newest_first(items: &mut [Notification]) {
    items.sort_by(|a, b| b.ts.cmp(&a.ts));
}

impl Notification {
    /// Age relative to now, in Thai, as shown in the feed.
    pub fn age_label(&self) -> String {
        age_label_at(self.ts, chrono::Utc::now().timestamp_millis())
    }
}

/// Age of `ts` at `now` (both epoch milliseconds), in Thai.
pub fn age_label_at(ts: i64, now: i64) -> String {
    let secs = (now - ts).max(0) / 1000;
    match secs {
        s if s < 60 => "เมื่อสักครู่".to_string(),
        s if s < 3_600 => format!("{} นาทีที่แล้ว", s / 60),
        s if s < 86_400 => format!("{} ชั่วโมงที่แล้ว", s / 3_600),
        s => format!("{} วันที่แล้ว", s / 86_400),
    }
}
