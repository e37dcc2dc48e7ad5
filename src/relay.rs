use axum::{ body::Bytes, http::StatusCode, response::{ IntoResponse, Response }, Json };
use futures::{ stream, Stream, StreamExt };
use log::{ error, info, warn };
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{ timeout_at, Instant };

use crate::config::prompt::ARCANEA_SYSTEM_PROMPT;
use crate::llm::chat::ChatClient;
use crate::llm::{ LlmError, ProviderRequest };
use crate::models::chat::{ ChatRequest, ErrorBody, HistoryMessage };

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_duration: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            system_prompt: ARCANEA_SYSTEM_PROMPT.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_duration: DEFAULT_MAX_DURATION,
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    InvalidRequest(#[from] serde_json::Error),
    #[error(transparent)]
    Provider(#[from] LlmError),
    #[error("provider call exceeded the {}s time budget", .0.as_secs_f32())]
    Timeout(Duration),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: "Failed to process chat request".to_string(),
            details: self.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

pub type RelayBody = Pin<Box<dyn Stream<Item = Result<Bytes, RelayError>> + Send>>;

/// Stateless bridge between chat clients and the configured provider.
pub struct ChatRelay {
    client: Arc<dyn ChatClient>,
    settings: RelaySettings,
}

impl ChatRelay {
    pub fn new(client: Arc<dyn ChatClient>, settings: RelaySettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub fn parse_request(body: &[u8]) -> Result<ChatRequest, RelayError> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn build_request(&self, history: Vec<HistoryMessage>) -> ProviderRequest {
        ProviderRequest {
            system: self.settings.system_prompt.clone(),
            messages: history,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            max_duration: self.settings.max_duration,
        }
    }

    /// Parses a raw request body and opens the relayed stream.
    pub async fn handle(&self, body: &[u8]) -> Result<RelayBody, RelayError> {
        let request = Self::parse_request(body)?;
        self.open_stream(request.messages).await
    }

    /// Starts the provider call and waits only for its first item, so an
    /// immediate failure can still be reported as a structured error. Every
    /// later chunk is forwarded as it arrives.
    pub async fn open_stream(&self, history: Vec<HistoryMessage>) -> Result<RelayBody, RelayError> {
        let request = self.build_request(history);
        let budget = request.max_duration;
        let deadline = Instant::now() + budget;

        info!(
            "Relaying {} message(s) to {} at {}",
            request.messages.len(),
            self.client.model(),
            self.client.base_url()
        );

        let mut tokens = match timeout_at(deadline, self.client.stream_chat(&request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(RelayError::Timeout(budget));
            }
        };

        let first = match timeout_at(deadline, tokens.next()).await {
            Ok(Some(Ok(token))) => Some(token),
            Ok(Some(Err(e))) => {
                return Err(RelayError::Provider(e));
            }
            Ok(None) => None,
            Err(_) => {
                return Err(RelayError::Timeout(budget));
            }
        };

        let head = stream::iter(first.map(|token| Ok(Bytes::from(token))));
        let tail = stream::unfold(Some(tokens), move |state| async move {
            let Some(mut tokens) = state else {
                return None;
            };
            match timeout_at(deadline, tokens.next()).await {
                Ok(Some(Ok(token))) => Some((Ok(Bytes::from(token)), Some(tokens))),
                Ok(Some(Err(e))) => {
                    error!("Provider stream failed mid-response: {}", e);
                    Some((Err(RelayError::Provider(e)), None))
                }
                Ok(None) => None,
                Err(_) => {
                    warn!("Provider stream exceeded {:?}, closing response", budget);
                    Some((Err(RelayError::Timeout(budget)), None))
                }
            }
        });

        Ok(Box::pin(head.chain(tail)))
    }
}
