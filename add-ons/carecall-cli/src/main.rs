//! carecall: voice medical-interview assistant
//!
//! Picks an input device, then runs one interview session: listen, transcribe,
//! ask the model, repeat until the model ends the conversation or the turn limit.

use carecall_dialogue::{
    load_system_prompt, AppConfig, Collaborators, ConsoleDisplay, DialogueResult, FunctionCatalog,
    FunctionDispatcher, OpenAiChat, SessionEnd, TurnOrchestrator,
};
use carecall_voice::{prompt_device_selection, select_input_device, AudioCapture, AudioDeviceHandle, ClovaSpeechStt};
use std::io;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[carecall] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run() {
        Ok(SessionEnd::Aborted { .. }) => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "carecall failed to start");
            ExitCode::FAILURE
        }
    }
}

fn run() -> DialogueResult<SessionEnd> {
    let config = AppConfig::load()?;
    config.validate()?;
    tracing::debug!(?config, "configuration loaded");

    let system_prompt = load_system_prompt(&config.prompt_path)?;
    let catalog = FunctionCatalog::from_dir_or_builtin(Some(config.function_dir.as_path()))?;
    let device = choose_device(&config)?;
    tracing::info!(device = %device.name(), index = device.index(), "input device selected");

    let timeout = config.request_timeout();
    let stt = ClovaSpeechStt::new(&config.clova_speech_url, &config.clova_speech_api_key, timeout)?
        .with_language(&config.stt_language);
    let chat = OpenAiChat::new(&config.openai_api_url, &config.openai_api_key, &config.openai_model, timeout)?;
    let capture = AudioCapture::new(config.capture_config()?).with_device(device);

    let mut orchestrator = TurnOrchestrator::new(
        Collaborators {
            capture: Box::new(capture),
            stt: Box::new(stt),
            chat: Box::new(chat),
        },
        FunctionDispatcher::new(&config.output_dir),
        catalog,
        system_prompt,
        config.orchestrator_config(),
    )
    .with_display(ConsoleDisplay::stdout());

    let summary = orchestrator.run_session();
    tracing::info!(
        turns = summary.turns,
        reason = %summary.end.reason(),
        elapsed_secs = (summary.ended_at - summary.started_at).num_seconds(),
        "session finished"
    );
    Ok(summary.end)
}

fn choose_device(config: &AppConfig) -> DialogueResult<AudioDeviceHandle> {
    let device = match config.device_index {
        Some(index) => select_input_device(index)?,
        None => {
            let stdin = io::stdin();
            prompt_device_selection(&mut stdin.lock(), &mut io::stdout())?
        }
    };
    Ok(device)
}
