pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use super::{ LlmConfig, LlmError, LlmType, ProviderRequest, TokenStream };

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Starts a streamed completion. Transport failures surface as the first
    /// item of the returned stream; dropping the stream aborts the call.
    async fn stream_chat(&self, request: &ProviderRequest) -> Result<TokenStream, LlmError>;

    fn model(&self) -> &str;
    fn base_url(&self) -> &str;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// What one line of a provider stream means.
#[derive(Debug, PartialEq)]
pub(crate) enum LineEvent {
    Token(String),
    Skip,
    Done,
    Failed(String),
}

/// Splits a byte stream into lines, holding partial lines across chunks.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            lines.push(line.trim_end_matches(['\n', '\r']).to_string());
        }
        lines
    }

    pub(crate) fn finish(self) -> Option<String> {
        let line = String::from_utf8_lossy(&self.buf);
        let line = line.trim();
        if line.is_empty() { None } else { Some(line.to_string()) }
    }
}

/// Sends `request` on a background task and feeds parsed tokens into a
/// bounded channel. The task stops as soon as the receiving side is gone.
pub(crate) fn http_stream_generate(
    request: reqwest::RequestBuilder,
    line_parser: fn(&str) -> LineEvent
) -> TokenStream {
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let resp = tokio::select! {
            _ = tx.closed() => {
                debug!("Receiver dropped before provider responded");
                return;
            }
            resp = request.send() => resp,
        };

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                let _ = tx.send(Err(LlmError::Http(e))).await;
                return;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let _ = tx.send(Err(LlmError::Status { status: status.as_u16(), body })).await;
            return;
        }

        let mut bytes = resp.bytes_stream();
        let mut lines = LineBuffer::default();

        loop {
            let chunk = tokio::select! {
                _ = tx.closed() => {
                    debug!("Receiver dropped, aborting provider stream");
                    return;
                }
                chunk = bytes.next() => chunk,
            };

            let chunk = match chunk {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    let _ = tx.send(Err(LlmError::Http(e))).await;
                    return;
                }
                None => break,
            };

            for line in lines.push(&chunk) {
                if !forward_line(&tx, line_parser(&line)).await {
                    return;
                }
            }
        }

        if let Some(line) = lines.finish() {
            forward_line(&tx, line_parser(&line)).await;
        }
    });

    Box::pin(ReceiverStream::new(rx))
}

/// Returns false once the stream should stop.
async fn forward_line(
    tx: &mpsc::Sender<Result<String, LlmError>>,
    event: LineEvent
) -> bool {
    match event {
        LineEvent::Token(token) => tx.send(Ok(token)).await.is_ok(),
        LineEvent::Skip => true,
        LineEvent::Done => false,
        LineEvent::Failed(message) => {
            let _ = tx.send(Err(LlmError::Provider(message))).await;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_buffer_holds_partial_lines() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        assert_eq!(buf.push(b":1}\r\ndata: x\n"), vec!["data: {\"a\":1}", "data: x"]);
        assert!(buf.push(b"tail").is_empty());
        assert_eq!(buf.finish(), Some("tail".to_string()));
    }

    #[test]
    fn line_buffer_keeps_multibyte_chars_split_across_chunks() {
        let text = "héllo\n".as_bytes();
        let mut buf = LineBuffer::default();
        assert!(buf.push(&text[..2]).is_empty());
        assert_eq!(buf.push(&text[2..]), vec!["héllo"]);
        assert_eq!(buf.finish(), None);
    }
}
