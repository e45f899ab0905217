//! Error types for the carecall voice layer

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors raised while selecting a device, capturing an utterance or transcribing it
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("No input device selected")]
    DeviceNotSelected,

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio capture error: {0}")]
    Capture(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<cpal::DevicesError> for VoiceError {
    fn from(err: cpal::DevicesError) -> Self {
        VoiceError::AudioDevice(err.to_string())
    }
}

impl From<cpal::DeviceNameError> for VoiceError {
    fn from(err: cpal::DeviceNameError) -> Self {
        VoiceError::AudioDevice(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for VoiceError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        VoiceError::AudioDevice(err.to_string())
    }
}

impl From<cpal::BuildStreamError> for VoiceError {
    fn from(err: cpal::BuildStreamError) -> Self {
        VoiceError::Capture(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for VoiceError {
    fn from(err: cpal::PlayStreamError) -> Self {
        VoiceError::Capture(err.to_string())
    }
}

impl From<cpal::StreamError> for VoiceError {
    fn from(err: cpal::StreamError) -> Self {
        VoiceError::Capture(err.to_string())
    }
}
