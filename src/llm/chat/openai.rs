use async_trait::async_trait;
use log::warn;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ http_stream_generate, ChatClient, LineEvent };
use crate::llm::{ LlmConfig, LlmError, ProviderRequest, TokenStream };

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub(crate) struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Serialize, Debug)]
pub(crate) struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    error: Option<OpenAIErrorDetail>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct OpenAIDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>
    ) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
                LlmError::Config(format!("Invalid API key format: {}", e))
            )?
        );

        let http = HttpClient::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::Config("OpenAI API key is required".to_string()))?;

        Self::new(api_key, config.completion_model.clone(), config.base_url.clone())
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn build_body(&self, request: &ProviderRequest) -> OpenAIChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(OpenAIMessage {
            role: "system".to_string(),
            content: request.system.clone(),
        });
        messages.extend(
            request.messages.iter().map(|m| OpenAIMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
        );

        OpenAIChatRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: true,
        }
    }
}

pub(crate) fn parse_sse_line(line: &str) -> LineEvent {
    let Some(data) = line.strip_prefix("data:") else {
        return LineEvent::Skip;
    };
    let data = data.trim();
    if data.is_empty() {
        return LineEvent::Skip;
    }
    if data == "[DONE]" {
        return LineEvent::Done;
    }

    match serde_json::from_str::<OpenAIStreamResponse>(data) {
        Ok(resp) => {
            if let Some(err) = resp.error {
                return LineEvent::Failed(err.message);
            }
            let mut text = String::new();
            let mut finished = false;
            for choice in resp.choices {
                if let Some(content) = choice.delta.content {
                    text.push_str(&content);
                }
                finished |= choice.finish_reason.is_some();
            }
            if !text.is_empty() {
                LineEvent::Token(text)
            } else if finished {
                LineEvent::Done
            } else {
                LineEvent::Skip
            }
        }
        Err(e) => {
            warn!("Skipping undecodable OpenAI stream line: {} ({})", data, e);
            LineEvent::Skip
        }
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn stream_chat(&self, request: &ProviderRequest) -> Result<TokenStream, LlmError> {
        let body = self.build_body(request);
        let req = self.http.post(self.endpoint()).json(&body);
        Ok(http_stream_generate(req, parse_sse_line))
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
