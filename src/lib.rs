pub mod cli;
pub mod client;
pub mod config;
pub mod llm;
pub mod models;
pub mod relay;
pub mod server;

use cli::Args;
use log::info;
use relay::ChatRelay;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model);
    info!("Chat Base URL: {}", args.chat_base_url.as_deref().unwrap_or("(provider default)"));
    info!("Chat API Key Set: {}", !args.chat_api_key.is_empty());
    info!("Temperature: {}", args.chat_temperature);
    info!("Max Tokens: {}", args.chat_max_tokens);
    info!("Max Duration: {}s", args.chat_max_duration_secs);
    info!(
        "System Prompt: {}",
        args.system_prompt_path.as_deref().unwrap_or("(built-in Arcanea persona)")
    );
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let system_prompt = config::prompt::load_system_prompt(args.system_prompt_path.as_deref())?;
    let llm_config = args.llm_config()?;
    let client = llm::chat::new_client(&llm_config)?;
    let relay = Arc::new(ChatRelay::new(client, args.relay_settings(system_prompt)));

    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, relay, args);
    server.run().await?;

    Ok(())
}
