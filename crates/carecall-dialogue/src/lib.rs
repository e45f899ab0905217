//! # carecall dialogue - the interview loop
//!
//! Keeps the conversation log, asks the model for the next reply, routes
//! function calls, and drives capture/transcription turn by turn until the
//! model ends the interview or the turn limit is hit.

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod llm;
pub mod message;
pub mod orchestrator;

pub use crate::config::{load_system_prompt, AppConfig, DEFAULT_CONFIG_PATH};
pub use catalog::{FunctionCatalog, FunctionSpec, CALL_EMERGENCY, END_CONVERSATION, MEDICAL_INTERVIEW};
pub use dispatch::{
    DispatchOutcome, EmergencyCallArgs, EndConversationArgs, FunctionArgs, FunctionDispatcher, MedicalInterviewArgs,
};
pub use display::{ConsoleDisplay, DisplayConfig, SharedBuffer};
pub use error::{DialogueError, DialogueResult};
pub use llm::{parse_chat_response, ChatBackend, FunctionInvocation, ModelReply, OpenAiChat};
pub use message::{DialogueLog, DialogueMessage, Role};
pub use orchestrator::{
    Collaborators, OrchestratorConfig, SessionEnd, SessionSummary, TurnOrchestrator, TurnOutcome, TurnState,
    DEFAULT_TURN_LIMIT, TURN_LIMIT_REASON,
};
