use async_trait::async_trait;
use log::warn;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };

use super::{ http_stream_generate, ChatClient, LineEvent };
use crate::llm::{ LlmConfig, LlmError, LlmType, ProviderRequest, TokenStream };

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize, Debug)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize, Debug)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize, Debug)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Deserialize)]
struct StreamResponse {
    message: Option<StreamMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Deserialize)]
struct StreamMessage {
    #[serde(default)]
    content: String,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, completion_model: Option<String>) -> Self {
        let model = completion_model.unwrap_or_else(|| "llama3".to_string());
        let url = base_url.unwrap_or_else(|| "http://localhost:11434".into());

        Self {
            http: HttpClient::new(),
            base_url: url,
            completion_model: model,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.llm_type != LlmType::Ollama {
            return Err(LlmError::Config("Invalid config type for OllamaClient".into()));
        }

        Ok(Self::new(config.base_url.clone(), config.completion_model.clone()))
    }

    fn build_body(&self, request: &ProviderRequest) -> OllamaChatRequest {
        let system = OllamaMessage {
            role: "system".to_string(),
            content: request.system.clone(),
        };
        let messages = std::iter
            ::once(system)
            .chain(
                request.messages.iter().map(|m| OllamaMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
            )
            .collect();

        OllamaChatRequest {
            model: self.completion_model.clone(),
            messages,
            stream: true,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }
}

fn parse_ndjson_line(line: &str) -> LineEvent {
    let line = line.trim();
    if line.is_empty() {
        return LineEvent::Skip;
    }

    match serde_json::from_str::<StreamResponse>(line) {
        Ok(resp) => {
            if let Some(err) = resp.error {
                return LineEvent::Failed(err);
            }
            let content = resp.message.map(|m| m.content).unwrap_or_default();
            if !content.is_empty() {
                LineEvent::Token(content)
            } else if resp.done {
                LineEvent::Done
            } else {
                LineEvent::Skip
            }
        }
        Err(e) => {
            warn!("Skipping undecodable Ollama stream line: {} ({})", line, e);
            LineEvent::Skip
        }
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn stream_chat(&self, request: &ProviderRequest) -> Result<TokenStream, LlmError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let req = self.http.post(&url).json(&self.build_body(request));
        Ok(http_stream_generate(req, parse_ndjson_line))
    }

    fn model(&self) -> &str {
        &self.completion_model
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{ HistoryMessage, Role };
    use std::time::Duration;

    #[test]
    fn ndjson_lines_map_to_events() {
        assert_eq!(
            parse_ndjson_line(r#"{"message":{"role":"assistant","content":"Once"},"done":false}"#),
            LineEvent::Token("Once".into())
        );
        assert_eq!(
            parse_ndjson_line(r#"{"message":{"role":"assistant","content":""},"done":true}"#),
            LineEvent::Done
        );
        assert_eq!(
            parse_ndjson_line(r#"{"error":"model not found"}"#),
            LineEvent::Failed("model not found".into())
        );
        assert_eq!(parse_ndjson_line("garbage"), LineEvent::Skip);
    }

    #[test]
    fn options_carry_sampling_parameters() {
        let client = OllamaClient::new(None, None);
        let body = client.build_body(
            &(ProviderRequest {
                system: "sys".into(),
                messages: vec![HistoryMessage::new(Role::User, "hi")],
                temperature: 0.7,
                max_tokens: 2048,
                max_duration: Duration::from_secs(30),
            })
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["options"]["num_predict"], 2048);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["stream"], true);
    }

    #[test]
    fn rejects_foreign_config() {
        let config = LlmConfig::default();
        assert!(OllamaClient::from_config(&config).is_err());
    }
}
