use futures::StreamExt;
use log::debug;

use super::{ ApiClient, ClientError };
use crate::models::chat::{ HistoryMessage, Message, Role };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Ready,
    Streaming,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input, or a reply is still streaming. Nothing was sent.
    Ignored,
    Completed,
}

/// Conversation held by one chat screen. The history lives only as long as
/// the session does.
#[derive(Debug)]
pub struct ChatSession {
    history: Vec<Message>,
    state: SessionState,
    reply_index: Option<usize>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            state: SessionState::Ready,
            reply_index: None,
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == SessionState::Streaming
    }

    /// Assistant messages, most recent first.
    pub fn assistant_messages(&self) -> impl Iterator<Item = &Message> {
        self.history
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
    }

    /// Accepts `text` as the next user turn and returns the history to send,
    /// or `None` when the input is blank or a reply is still streaming.
    pub fn begin(&mut self, text: &str) -> Option<Vec<HistoryMessage>> {
        if self.is_streaming() || text.trim().is_empty() {
            return None;
        }

        self.history.push(Message::new(Role::User, text));
        self.state = SessionState::Streaming;
        self.reply_index = None;
        Some(
            self.history
                .iter()
                .map(Message::to_history)
                .collect()
        )
    }

    /// Grows the in-progress assistant message, creating it on the first chunk.
    pub fn apply_chunk(&mut self, chunk: &str) -> &Message {
        let index = match self.reply_index {
            Some(index) => {
                self.history[index].content.push_str(chunk);
                index
            }
            None => {
                self.history.push(Message::new(Role::Assistant, chunk));
                let index = self.history.len() - 1;
                self.reply_index = Some(index);
                index
            }
        };
        &self.history[index]
    }

    /// Returns to `Ready`. A partial reply stays in the history.
    pub fn finish(&mut self) {
        self.state = SessionState::Ready;
        self.reply_index = None;
    }

    /// Sends `text` with the full history and streams the reply into a single
    /// assistant message, calling `on_update` after every chunk.
    pub async fn submit<F>(
        &mut self,
        api: &ApiClient,
        text: &str,
        mut on_update: F
    ) -> Result<SubmitOutcome, ClientError>
        where F: FnMut(&Message)
    {
        let Some(history) = self.begin(text) else {
            debug!("Ignoring submission (blank input or reply in progress)");
            return Ok(SubmitOutcome::Ignored);
        };

        let result = self.stream_reply(api, history, &mut on_update).await;
        self.finish();
        result.map(|_| SubmitOutcome::Completed)
    }

    async fn stream_reply<F>(
        &mut self,
        api: &ApiClient,
        history: Vec<HistoryMessage>,
        on_update: &mut F
    ) -> Result<(), ClientError>
        where F: FnMut(&Message)
    {
        let mut chunks = api.chat_stream(history).await?;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            on_update(self.apply_chunk(&chunk));
        }
        Ok(())
    }
}
