use std::sync::atomic::{AtomicI64, Ordering};

use game_runtime::{ChatId, Keyboard, MessageId, OutboundFrame};
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("chat {0} is not connected")]
    NotConnected(ChatId),
    #[error("failed to deliver to chat {chat}: {message}")]
    Delivery { chat: ChatId, message: String },
}

/// Outbound side of the chat platform.
pub trait ChatTransport: Send + Sync {
    fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<MessageId, TransportError>;

    fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<(), TransportError>;

    fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError>;
}

/// Keeps every frame in memory; used offline and in tests.
#[derive(Default)]
pub struct RecordingTransport {
    next_message: AtomicI64,
    frames: Mutex<Vec<OutboundFrame>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<OutboundFrame> {
        self.frames.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.frames
            .lock()
            .iter()
            .filter_map(|frame| match frame {
                OutboundFrame::Message { text, .. } | OutboundFrame::Edit { text, .. } => {
                    Some(text.clone())
                }
                OutboundFrame::CallbackAnswer { .. } => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.frames.lock().clear();
    }
}

impl ChatTransport for RecordingTransport {
    fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<MessageId, TransportError> {
        let message_id = MessageId(self.next_message.fetch_add(1, Ordering::Relaxed) + 1);
        self.frames.lock().push(OutboundFrame::Message {
            chat_id: chat,
            message_id,
            text: text.to_string(),
            keyboard: keyboard.clone(),
        });
        Ok(message_id)
    }

    fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<(), TransportError> {
        self.frames.lock().push(OutboundFrame::Edit {
            chat_id: chat,
            message_id: message,
            text: text.to_string(),
            keyboard: keyboard.clone(),
        });
        Ok(())
    }

    fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        self.frames.lock().push(OutboundFrame::CallbackAnswer {
            callback_id: callback_id.to_string(),
        });
        Ok(())
    }
}
