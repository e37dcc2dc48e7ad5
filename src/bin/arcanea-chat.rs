use arcanea::cli::ChatArgs;
use arcanea::client::{ ApiClient, ChatSession, CommandSpeaker, Speaker, SpeechOptions, SubmitOutcome };
use clap::Parser;
use dotenv::dotenv;
use log::{ error, warn };
use std::error::Error;
use std::io::{ self, Write };
use std::sync::Arc;
use tokio::io::{ AsyncBufReadExt, BufReader };

const SEND_FAILED: &str = "Failed to send message. Please try again.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = ChatArgs::parse();

    let client = ApiClient::new(args.server_url.clone());
    let speaker: Arc<dyn Speaker> = Arc::new(
        CommandSpeaker::new(args.tts_command.clone(), SpeechOptions::default())
    );
    let mut session = ChatSession::new();

    if let Some(message) = args.message {
        send(&mut session, &client, &message).await;
        return Ok(());
    }

    println!("Arcanea chat ({}). Type /help for commands.\n", client.base_url());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "/quit" | "/exit" => {
                break;
            }
            "/help" => print_usage(),
            "/history" => {
                for message in session.history() {
                    println!("[{}] {}", message.role.as_str(), message.content);
                }
            }
            _ if input.starts_with("/speak") => {
                let nth = input
                    .trim_start_matches("/speak")
                    .trim()
                    .parse::<usize>()
                    .unwrap_or(1)
                    .max(1);
                match session.assistant_messages().nth(nth - 1) {
                    Some(message) => speak_in_background(speaker.clone(), message.content.clone()),
                    None => println!("No assistant message to speak."),
                }
            }
            _ => {
                println!();
                send(&mut session, &client, &line).await;
                println!("\n");
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

async fn send(session: &mut ChatSession, client: &ApiClient, text: &str) {
    let mut printed = 0;
    let outcome = session.submit(client, text, |message| {
        print!("{}", &message.content[printed..]);
        printed = message.content.len();
        io::stdout().flush().ok();
    }).await;

    match outcome {
        Ok(SubmitOutcome::Completed) => {}
        Ok(SubmitOutcome::Ignored) => {}
        Err(e) => {
            error!("Chat request failed: {}", e);
            eprintln!("\n❌ Error: {}", SEND_FAILED);
        }
    }
}

fn speak_in_background(speaker: Arc<dyn Speaker>, text: String) {
    tokio::spawn(async move {
        if let Err(e) = speaker.speak(&text).await {
            warn!("Text to speech failed: {}", e);
        }
    });
}

fn print_usage() {
    println!("Commands:");
    println!("  /speak [n]   Read the n-th most recent assistant reply aloud (default 1)");
    println!("  /history     Show the conversation so far");
    println!("  /quit        Leave the chat");
    println!("Anything else is sent to Arcanea.");
}
