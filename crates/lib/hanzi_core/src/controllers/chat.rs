use std::sync::Arc;

use tracing::debug;

use super::record;
use crate::auth::SessionManager;
use crate::chat::{ChatService, ChatWord};
use crate::error::{Error, Result};
use crate::models::{ChatMessage, Sender, Word};

const GREETINGS: [&str; 2] = [
    "สวัสดี! ฉันคือ Chinese Buddy 👋",
    "พิมพ์คำศัพท์จีนที่อยากฝึกมาได้เลยนะ",
];

/// Conversation with the assistant. Messages live only as long as the
/// controller.
pub struct ChatController {
    chat: Arc<dyn ChatService>,
    session: Arc<SessionManager>,
    messages: Vec<ChatMessage>,
    context: Vec<ChatWord>,
    sending: bool,
    next_id: u64,
    last_error: Option<String>,
}

impl ChatController {
    pub fn new(chat: Arc<dyn ChatService>, session: Arc<SessionManager>) -> Self {
        let messages = GREETINGS
            .iter()
            .enumerate()
            .map(|(i, text)| ChatMessage::new(format!("m{}", i + 1), *text, Sender::Assistant))
            .collect();
        Self {
            chat,
            session,
            messages,
            context: Vec::new(),
            sending: false,
            next_id: 0,
            last_error: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Words sent along with every message.
    pub fn set_context(&mut self, words: &[Word]) {
        self.context = words.iter().map(ChatWord::from).collect();
    }

    /// Appends the user's message, then the reply once it arrives.
    ///
    /// Blank input is ignored. On failure the user's message stays in the
    /// conversation and the error is recorded.
    pub async fn send(&mut self, text: &str) -> Result<Option<ChatMessage>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let Some(user) = self.session.current_user() else {
            return record(&mut self.last_error, Err(Error::Unauthenticated));
        };

        self.next_id += 1;
        let n = self.next_id;
        self.messages
            .push(ChatMessage::new(format!("u-{n}"), text, Sender::Me));

        self.sending = true;
        let result = self.chat.send(text, &user.id, &self.context).await;
        self.sending = false;

        let reply = record(&mut self.last_error, result)?;
        debug!(reply_len = reply.len(), "chat reply received");
        let message = ChatMessage::new(format!("b-{n}"), reply, Sender::Assistant);
        self.messages.push(message.clone());
        Ok(Some(message))
    }
}
