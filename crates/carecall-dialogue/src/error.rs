//! Error types for the dialogue layer

use carecall_voice::VoiceError;
use thiserror::Error;

pub type DialogueResult<T> = Result<T, DialogueError>;

#[derive(Error, Debug)]
pub enum DialogueError {
    /// Device, capture or transcription failure from the voice layer
    #[error(transparent)]
    Voice(#[from] VoiceError),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DialogueError {
    /// Everything except a malformed function call ends the session.
    pub fn is_session_ending(&self) -> bool {
        !matches!(self, DialogueError::Dispatch(_))
    }
}

impl From<config::ConfigError> for DialogueError {
    fn from(err: config::ConfigError) -> Self {
        DialogueError::Config(err.to_string())
    }
}
