//! # carecall voice - endpointed capture and transcription
//!
//! The audio half of one interview turn:
//!
//! ```text
//! ┌──────────────┐   frames   ┌──────────────┐  stop  ┌──────────────┐  WAV  ┌──────────────┐
//! │   Mic In     │ ─────────→ │   Endpoint   │ ─────→ │ WAV Encoder  │ ────→ │     STT      │
//! │   (cpal)     │            │  (RMS+timer) │        │  (44-byte)   │       │ (Clova HTTP) │
//! └──────────────┘            └──────────────┘        └──────────────┘       └──────────────┘
//! ```

pub mod capture;
pub mod device;
pub mod endpoint;
pub mod error;
pub mod stt;
pub mod wav;

pub use capture::{record_utterance, AudioCapture, CaptureConfig, CpalFrameSource, FrameSource, UtteranceSource};
pub use device::{
    default_input_device, list_input_devices, parse_device_choice, print_device_list, prompt_device_selection,
    select_input_device, AudioDeviceHandle, InputDeviceInfo,
};
pub use endpoint::{calculate_rms, frame_duration, EndpointConfig, EndpointDetector, EndpointReason, EndpointState};
pub use error::{VoiceError, VoiceResult};
pub use stt::{parse_transcript, ClovaSpeechStt, PlaceholderStt, SttBackend, Transcript, DEFAULT_CLOVA_SPEECH_URL};
pub use wav::{encode_wav, extend_pcm_i16, WavAsset, WavHeader, WAV_HEADER_LEN};
