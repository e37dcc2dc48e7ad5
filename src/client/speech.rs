use async_trait::async_trait;
use log::{ info, warn };
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("failed to start '{program}': {source}")] Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("'{program}' exited with {status}")] Exit {
        program: String,
        status: std::process::ExitStatus,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechOptions {
    pub language: String,
    pub pitch: f32,
    pub rate: f32,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            pitch: 1.0,
            rate: 0.9,
        }
    }
}

#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;
}

/// Reads text aloud through an external program such as `espeak` or `say`.
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    program: String,
    options: SpeechOptions,
}

// Baseline words per minute for both espeak and say.
const BASE_WPM: f32 = 175.0;

impl CommandSpeaker {
    pub fn new(program: impl Into<String>, options: SpeechOptions) -> Self {
        Self { program: program.into(), options }
    }

    pub(crate) fn args(&self, text: &str) -> Vec<String> {
        let wpm = (BASE_WPM * self.options.rate).round().max(1.0) as u32;
        let program_name = Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(self.program.as_str());

        if program_name == "say" {
            return vec!["-r".to_string(), wpm.to_string(), text.to_string()];
        }

        let pitch = (50.0 * self.options.pitch).round().clamp(0.0, 99.0) as u32;
        vec![
            "-v".to_string(),
            self.options.language.clone(),
            "-p".to_string(),
            pitch.to_string(),
            "-s".to_string(),
            wpm.to_string(),
            text.to_string()
        ]
    }
}

#[async_trait]
impl Speaker for CommandSpeaker {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        info!("Speaking {} characters with {}", text.len(), self.program);
        let status = Command::new(&self.program)
            .args(self.args(text))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status().await
            .map_err(|source| SpeechError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            warn!("{} exited with {}", self.program, status);
            return Err(SpeechError::Exit {
                program: self.program.clone(),
                status,
            });
        }
        Ok(())
    }
}
