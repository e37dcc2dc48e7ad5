use futures::{ stream, Stream, StreamExt };
use std::pin::Pin;

use super::ClientError;
use crate::models::chat::{ ChatRequest, ErrorBody, HistoryMessage };

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, ClientError>> + Send>>;

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Posts the full history and returns the reply as decoded text chunks.
    pub async fn chat_stream(&self, messages: Vec<HistoryMessage>) -> Result<ChunkStream, ClientError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));

        let response = self.client
            .post(&url)
            .json(&(ChatRequest { messages }))
            .send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let (error, details) = match serde_json::from_str::<ErrorBody>(&text) {
                Ok(body) => (body.error, body.details),
                Err(_) => (format!("Request failed: {}", status), text),
            };
            return Err(ClientError::Endpoint {
                status: status.as_u16(),
                error,
                details,
            });
        }

        let bytes = Box::pin(response.bytes_stream());
        let chunks = stream::unfold((bytes, Some(Utf8Decoder::default())), |(mut bytes, decoder)| async move {
            let Some(mut decoder) = decoder else {
                return None;
            };
            loop {
                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        let text = decoder.push(&chunk);
                        if !text.is_empty() {
                            return Some((Ok(text), (bytes, Some(decoder))));
                        }
                    }
                    Some(Err(e)) => {
                        return Some((Err(ClientError::from(e)), (bytes, None)));
                    }
                    None => {
                        return decoder.finish().map(|tail| (Ok(tail), (bytes, None)));
                    }
                }
            }
        });

        Ok(Box::pin(chunks))
    }
}

/// Decodes UTF-8 incrementally, carrying a split multi-byte sequence over
/// to the next chunk.
#[derive(Debug, Default)]
pub(crate) struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let text = text.to_string();
                self.pending.clear();
                text
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                self.pending.drain(..valid);
                text
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                text
            }
        }
    }

    /// Flushes bytes left over when the body ends inside a multi-byte
    /// sequence, replacing them with U+FFFD.
    pub(crate) fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(&self.pending).into_owned())
    }
}
