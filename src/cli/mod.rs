use crate::llm::{ LlmConfig, LlmType, ParseLlmTypeError };
use crate::relay::RelaySettings;
use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., https://api.openai.com/v1, http://localhost:11434)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider (required for OpenAI)
    #[arg(long, env = "CHAT_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model name for chat completion
    #[arg(long, env = "CHAT_MODEL", default_value = "gpt-4-turbo-preview")]
    pub chat_model: String,

    // The relay contract fixes these three; they stay overridable for
    // local testing but are left out of --help.
    /// Sampling temperature sent with every completion.
    #[arg(long, env = "CHAT_TEMPERATURE", default_value = "0.7", hide = true)]
    pub chat_temperature: f32,

    /// Maximum number of tokens the provider may generate per reply.
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value = "2048", hide = true)]
    pub chat_max_tokens: u32,

    /// Wall-clock budget in seconds for one provider call, streaming included.
    #[arg(long, env = "CHAT_MAX_DURATION_SECS", default_value = "30", hide = true)]
    pub chat_max_duration_secs: u64,

    /// Optional JSON file ({"system": "..."}) replacing the built-in persona prompt.
    #[arg(long, env = "SYSTEM_PROMPT_PATH")]
    pub system_prompt_path: Option<String>,

    // --- Server Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    pub fn llm_config(&self) -> Result<LlmConfig, ParseLlmTypeError> {
        Ok(LlmConfig {
            llm_type: self.chat_llm_type.parse::<LlmType>()?,
            api_key: Some(self.chat_api_key.clone()).filter(|k| !k.is_empty()),
            completion_model: Some(self.chat_model.clone()),
            base_url: self.chat_base_url.clone(),
        })
    }

    pub fn relay_settings(&self, system_prompt: String) -> RelaySettings {
        RelaySettings {
            system_prompt,
            temperature: self.chat_temperature,
            max_tokens: self.chat_max_tokens,
            max_duration: Duration::from_secs(self.chat_max_duration_secs),
        }
    }
}

/// Options for the `arcanea-chat` terminal client.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Terminal chat client for the Arcanea assistant", long_about = None)]
pub struct ChatArgs {
    /// Base URL of the Arcanea server.
    #[arg(long, env = "ARCANEA_SERVER_URL", default_value = "http://127.0.0.1:4000")]
    pub server_url: String,

    /// Program used to read assistant messages aloud (espeak, say, ...).
    #[arg(long, env = "TTS_COMMAND", default_value = "espeak")]
    pub tts_command: String,

    /// Send a single message, print the reply and exit.
    pub message: Option<String>,
}
