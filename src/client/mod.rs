pub mod api;
pub mod session;
pub mod speech;

pub use api::{ ApiClient, ChunkStream };
pub use session::{ ChatSession, SessionState, SubmitOutcome };
pub use speech::{ CommandSpeaker, Speaker, SpeechError, SpeechOptions };

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{error} (HTTP {status}): {details}")]
    Endpoint {
        status: u16,
        error: String,
        details: String,
    },
}
