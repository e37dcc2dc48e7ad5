use log::info;
use serde::Deserialize;
use std::fs;
use thiserror::Error;

pub const ARCANEA_SYSTEM_PROMPT: &str =
    "You are Arcanea, an advanced AI assistant specializing in creative projects. You help users with:

1. **Book Writing & Authoring** (Scripta): Help with story development, character creation, plot structure, writing techniques, and publishing guidance.

2. **Image Generation & Design** (Lumina): Assist with visual concepts, art direction, image descriptions, design principles, and creative visualization.

3. **Video Creation & Production** (Kinetix): Support with video concepts, storytelling, cinematography, editing workflows, and production planning.

You embody the \"Magic Ecosystem\" - you're knowledgeable, inspiring, and creative while remaining professional and helpful. Always provide practical, actionable advice tailored to the user's creative goals.

When users ask about specific features or capabilities, explain what Arcanea can do and guide them to the appropriate Luminor (Scripta, Lumina, or Kinetix) if needed.

Be encouraging, creative, and focus on helping users bring their ideas to life.";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Failed to read prompt file '{path}': {source}")] Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse prompt file '{path}': {source}")] Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("Prompt file '{0}' has an empty system prompt")] Empty(String),
}

#[derive(Deserialize, Debug)]
struct PromptFile {
    system: String,
}

/// Returns the persona instruction, replaced by the `system` entry of the
/// JSON file at `path` when one is given.
pub fn load_system_prompt(path: Option<&str>) -> Result<String, PromptError> {
    let Some(path) = path else {
        return Ok(ARCANEA_SYSTEM_PROMPT.to_string());
    };

    let file_content = fs::read_to_string(path).map_err(|source| PromptError::Io {
        path: path.to_string(),
        source,
    })?;
    let prompt: PromptFile = serde_json::from_str(&file_content).map_err(|source| PromptError::Json {
        path: path.to_string(),
        source,
    })?;

    if prompt.system.trim().is_empty() {
        return Err(PromptError::Empty(path.to_string()));
    }
    info!("Loaded system prompt override from {}", path);
    Ok(prompt.system)
}
