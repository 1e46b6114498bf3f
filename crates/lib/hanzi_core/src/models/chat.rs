//! Transient chat messages. Never persisted.

use chrono::{DateTime, Local};

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    Me,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    /// Display time, `HH:MM`.
    pub time: String,
}

impl ChatMessage {
    pub fn new(id: impl Into<String>, text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sender,
            time: display_time(Local::now()),
        }
    }
}

fn display_time(at: DateTime<Local>) -> String {
    at.format("%H:%M").to_string()
}
