//! Application configuration
//!
//! Precedence: environment (`CARECALL__*`, plus `OPENAI_API_KEY` and
//! `CLOVA_SPEECH_API_KEY`) > file (`CARECALL_CONFIG` or `config/carecall.toml`) > defaults.

use crate::error::{DialogueError, DialogueResult};
use crate::llm::{DEFAULT_API_URL, DEFAULT_MODEL};
use crate::message::DialogueMessage;
use crate::orchestrator::{OrchestratorConfig, DEFAULT_TURN_LIMIT};
use carecall_voice::{CaptureConfig, EndpointConfig, DEFAULT_CLOVA_SPEECH_URL};
use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "config/carecall.toml";
pub const ENV_PREFIX: &str = "CARECALL";

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub openai_model: String,
    pub openai_api_url: String,
    #[serde(default)]
    pub openai_api_key: String,

    pub clova_speech_url: String,
    #[serde(default)]
    pub clova_speech_api_key: String,
    pub stt_language: String,

    /// System prompt text that seeds every session
    pub prompt_path: PathBuf,
    /// One JSON document per function; built-in catalog when missing
    pub function_dir: PathBuf,
    /// Where function-call records are written
    pub output_dir: PathBuf,
    /// Copy of the last capture; empty disables
    pub wav_output: String,

    pub turn_limit: usize,
    /// Deadline for each STT and LLM request; 0 waits forever
    pub request_timeout_secs: u64,
    /// Input device index; prompts interactively when unset
    #[serde(default)]
    pub device_index: Option<usize>,

    pub rms_threshold: f64,
    pub min_listen_secs: f64,
    pub max_silence_secs: f64,
    pub max_recording_secs: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_model: DEFAULT_MODEL.to_string(),
            openai_api_url: DEFAULT_API_URL.to_string(),
            openai_api_key: String::new(),
            clova_speech_url: DEFAULT_CLOVA_SPEECH_URL.to_string(),
            clova_speech_api_key: String::new(),
            stt_language: "Kor".to_string(),
            prompt_path: PathBuf::from("config/prompt"),
            function_dir: PathBuf::from("config/function"),
            output_dir: PathBuf::from("."),
            wav_output: "output.wav".to_string(),
            turn_limit: DEFAULT_TURN_LIMIT,
            request_timeout_secs: 30,
            device_index: None,
            rms_threshold: 500.0,
            min_listen_secs: 10.0,
            max_silence_secs: 3.0,
            max_recording_secs: 10.0,
        }
    }
}

// Keys stay out of logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("openai_model", &self.openai_model)
            .field("openai_api_url", &self.openai_api_url)
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("clova_speech_url", &self.clova_speech_url)
            .field("clova_speech_api_key", &redact(&self.clova_speech_api_key))
            .field("stt_language", &self.stt_language)
            .field("prompt_path", &self.prompt_path)
            .field("function_dir", &self.function_dir)
            .field("output_dir", &self.output_dir)
            .field("wav_output", &self.wav_output)
            .field("turn_limit", &self.turn_limit)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("device_index", &self.device_index)
            .field("rms_threshold", &self.rms_threshold)
            .field("min_listen_secs", &self.min_listen_secs)
            .field("max_silence_secs", &self.max_silence_secs)
            .field("max_recording_secs", &self.max_recording_secs)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl AppConfig {
    /// Load from file and environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("CARECALL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = Path::new(&config_path);
        let file = if path.exists() {
            info!("Loading configuration from {}", path.display());
            Some(path)
        } else {
            debug!("No configuration file at {}", path.display());
            None
        };

        Self::builder(file)?
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .set_override_option("openai_api_key", non_empty_env("OPENAI_API_KEY"))?
            .set_override_option("clova_speech_api_key", non_empty_env("CLOVA_SPEECH_API_KEY"))?
            .build()?
            .try_deserialize()
    }

    /// Defaults overlaid with a single file; the environment is not consulted.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
        Self::builder(Some(path.as_ref()))?.build()?.try_deserialize()
    }

    fn builder(file: Option<&Path>) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        let d = Self::default();
        let builder = config::Config::builder()
            .set_default("openai_model", d.openai_model)?
            .set_default("openai_api_url", d.openai_api_url)?
            .set_default("clova_speech_url", d.clova_speech_url)?
            .set_default("stt_language", d.stt_language)?
            .set_default("prompt_path", d.prompt_path.to_string_lossy().into_owned())?
            .set_default("function_dir", d.function_dir.to_string_lossy().into_owned())?
            .set_default("output_dir", d.output_dir.to_string_lossy().into_owned())?
            .set_default("wav_output", d.wav_output)?
            .set_default("turn_limit", d.turn_limit as i64)?
            .set_default("request_timeout_secs", d.request_timeout_secs as i64)?
            .set_default("rms_threshold", d.rms_threshold)?
            .set_default("min_listen_secs", d.min_listen_secs)?
            .set_default("max_silence_secs", d.max_silence_secs)?
            .set_default("max_recording_secs", d.max_recording_secs)?;

        Ok(match file {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder,
        })
    }

    /// Startup checks; any failure here is fatal before the first turn.
    pub fn validate(&self) -> DialogueResult<()> {
        if self.openai_api_key.trim().is_empty() {
            return Err(DialogueError::Config("OPENAI_API_KEY is not set".to_string()));
        }
        if self.clova_speech_api_key.trim().is_empty() {
            return Err(DialogueError::Config("CLOVA_SPEECH_API_KEY is not set".to_string()));
        }
        if self.turn_limit == 0 {
            return Err(DialogueError::Config("turn_limit must be at least 1".to_string()));
        }
        let endpoint = self.endpoint_config()?;
        if endpoint.max_recording.is_zero() {
            return Err(DialogueError::Config("max_recording_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn endpoint_config(&self) -> DialogueResult<EndpointConfig> {
        if !self.rms_threshold.is_finite() || self.rms_threshold < 0.0 {
            return Err(DialogueError::Config(format!("invalid rms_threshold: {}", self.rms_threshold)));
        }
        Ok(EndpointConfig {
            rms_threshold: self.rms_threshold,
            min_listen_window: secs("min_listen_secs", self.min_listen_secs)?,
            max_silence: secs("max_silence_secs", self.max_silence_secs)?,
            max_recording: secs("max_recording_secs", self.max_recording_secs)?,
        })
    }

    pub fn capture_config(&self) -> DialogueResult<CaptureConfig> {
        Ok(CaptureConfig {
            endpoint: self.endpoint_config()?,
            save_path: self.wav_save_path(),
            ..CaptureConfig::default()
        })
    }

    pub fn wav_save_path(&self) -> Option<PathBuf> {
        if self.wav_output.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.wav_output))
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_secs {
            0 => None,
            s => Some(Duration::from_secs(s)),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            turn_limit: self.turn_limit,
        }
    }
}

fn secs(field: &str, value: f64) -> DialogueResult<Duration> {
    Duration::try_from_secs_f64(value).map_err(|e| DialogueError::Config(format!("invalid {}: {} ({})", field, value, e)))
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read the system prompt that seeds the dialogue log.
pub fn load_system_prompt(path: impl AsRef<Path>) -> DialogueResult<DialogueMessage> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| DialogueError::Config(format!("Failed to read prompt file {}: {}", path.display(), e)))?;
    let text = text.trim();
    if text.is_empty() {
        return Err(DialogueError::Config(format!("Prompt file {} is empty", path.display())));
    }
    Ok(DialogueMessage::system(text))
}
