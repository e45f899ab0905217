//! Turn orchestrator: capture → transcribe → ask the model → dispatch or reply.
//!
//! One session owns one `DialogueLog`. Each turn appends the user's transcript and,
//! when the model answers in text, its reply. Function calls never add log entries.
//! A failed turn leaves the log as it was after the last fully appended message.

use crate::catalog::FunctionCatalog;
use crate::dispatch::{DispatchOutcome, FunctionDispatcher};
use crate::display::ConsoleDisplay;
use crate::error::DialogueResult;
use crate::llm::{ChatBackend, ModelReply};
use crate::message::{DialogueLog, DialogueMessage};
use carecall_voice::{SttBackend, UtteranceSource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

pub const DEFAULT_TURN_LIMIT: usize = 20;
pub const TURN_LIMIT_REASON: &str = "turn limit reached";

/// Where the orchestrator is within the current turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TurnState {
    AwaitingUser,
    AwaitingModel,
    Continuing,
    Terminated,
}

/// Result of one completed turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The assistant reply appended this turn; `None` when the model called a
    /// non-terminating function, which leaves the turn as a lone user message
    Continue(Option<DialogueMessage>),
    Terminate(String),
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEnd {
    /// The model called the end function
    Completed { reason: String },
    TurnLimitReached,
    /// A capture, transcription or inference error ended the session
    Aborted { error: String },
}

impl SessionEnd {
    pub fn reason(&self) -> &str {
        match self {
            SessionEnd::Completed { reason } => reason,
            SessionEnd::TurnLimitReached => TURN_LIMIT_REASON,
            SessionEnd::Aborted { error } => error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub turns: usize,
    pub end: SessionEnd,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// The three external collaborators a turn calls, in order.
pub struct Collaborators {
    pub capture: Box<dyn UtteranceSource>,
    pub stt: Box<dyn SttBackend>,
    pub chat: Box<dyn ChatBackend>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub turn_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            turn_limit: DEFAULT_TURN_LIMIT,
        }
    }
}

pub struct TurnOrchestrator {
    collaborators: Collaborators,
    dispatcher: FunctionDispatcher,
    catalog: FunctionCatalog,
    log: DialogueLog,
    config: OrchestratorConfig,
    display: ConsoleDisplay,
    state: TurnState,
    turns: usize,
}

impl TurnOrchestrator {
    /// Start a session whose log is seeded with `system_prompt`. Output goes nowhere
    /// until a display is attached with [`TurnOrchestrator::with_display`].
    pub fn new(
        collaborators: Collaborators,
        dispatcher: FunctionDispatcher,
        catalog: FunctionCatalog,
        system_prompt: DialogueMessage,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            collaborators,
            dispatcher,
            catalog,
            log: DialogueLog::new(system_prompt),
            config,
            display: ConsoleDisplay::sink(),
            state: TurnState::AwaitingUser,
            turns: 0,
        }
    }

    pub fn with_display(mut self, display: ConsoleDisplay) -> Self {
        self.display = display;
        self
    }

    pub fn log(&self) -> &DialogueLog {
        &self.log
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Turns that reached the model (the user message was appended).
    pub fn turns(&self) -> usize {
        self.turns
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run one turn. Any error leaves the orchestrator `Terminated`.
    pub fn run_turn(&mut self) -> DialogueResult<TurnOutcome> {
        match self.advance() {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.state = TurnState::Terminated;
                Err(e)
            }
        }
    }

    fn advance(&mut self) -> DialogueResult<TurnOutcome> {
        self.state = TurnState::AwaitingUser;
        self.display.turn_header(self.turns + 1);
        self.display.listening();

        let wav = self.collaborators.capture.capture()?;
        let transcript = self.collaborators.stt.transcribe(&wav)?;
        debug!(quota = transcript.quota, chars = transcript.text.chars().count(), "transcribed");

        let user = DialogueMessage::user(transcript.text);
        self.display.message(&user);
        self.log.push(user);
        self.turns += 1;

        self.state = TurnState::AwaitingModel;
        let reply = self
            .collaborators
            .chat
            .complete(self.log.messages(), self.catalog.specs())?;

        let assistant = match reply {
            ModelReply::Content(text) => {
                let message = DialogueMessage::assistant(text);
                self.display.message(&message);
                self.log.push(message.clone());
                Some(message)
            }
            ModelReply::FunctionCall(invocation) => match self.dispatcher.dispatch(&invocation) {
                DispatchOutcome::Terminate(reason) => {
                    info!(turn = self.turns, reason = %reason, "end of conversation requested");
                    self.state = TurnState::Terminated;
                    return Ok(TurnOutcome::Terminate(reason));
                }
                DispatchOutcome::Handled(description) => {
                    info!(turn = self.turns, function = %invocation.name, "{}", description);
                    None
                }
                DispatchOutcome::Unknown(name) => {
                    debug!(turn = self.turns, function = %name, "ignored unknown function call");
                    None
                }
            },
        };

        self.state = TurnState::Continuing;
        Ok(TurnOutcome::Continue(assistant))
    }

    /// Run turns until the model ends the conversation, an error occurs or the turn
    /// limit is hit. The closing line is printed on every path.
    pub fn run_session(&mut self) -> SessionSummary {
        let started_at = Utc::now();
        self.display.welcome();

        let end = loop {
            if self.turns >= self.config.turn_limit {
                info!(turns = self.turns, "{}", TURN_LIMIT_REASON);
                break SessionEnd::TurnLimitReached;
            }
            match self.run_turn() {
                Ok(TurnOutcome::Continue(_)) => {}
                Ok(TurnOutcome::Terminate(reason)) => {
                    info!("finished conversation");
                    break SessionEnd::Completed { reason };
                }
                Err(e) if !e.is_session_ending() => {
                    warn!(error = %e, "recoverable turn error");
                    self.state = TurnState::Continuing;
                }
                Err(e) => {
                    error!("error processing turn: {}", e);
                    break SessionEnd::Aborted { error: e.to_string() };
                }
            }
        };

        self.state = TurnState::Terminated;
        self.display.closing();
        SessionSummary {
            turns: self.turns,
            end,
            started_at,
            ended_at: Utc::now(),
        }
    }
}
