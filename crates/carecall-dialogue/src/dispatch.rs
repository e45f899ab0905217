//! Function-call dispatch
//!
//! Routes a model-requested function call through a lookup table keyed by name.
//! Each entry validates the argument document into a typed record, performs its
//! side effect (persisting a pretty-printed record, or just logging) and says
//! whether the session ends. Unknown names are a logged no-op.

use crate::catalog::{CALL_EMERGENCY, END_CONVERSATION, MEDICAL_INTERVIEW};
use crate::error::{DialogueError, DialogueResult};
use crate::llm::FunctionInvocation;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// `end_conversation` arguments
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EndConversationArgs {
    pub reason: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// `medical_interview` arguments
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MedicalInterviewArgs {
    pub symptoms: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub age_group: Option<String>,
    #[serde(default)]
    pub onset: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `call_emergency` arguments
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmergencyCallArgs {
    pub reason: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Validated arguments, one variant per known function
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionArgs {
    EndConversation(EndConversationArgs),
    MedicalInterview(MedicalInterviewArgs),
    CallEmergency(EmergencyCallArgs),
}

impl FunctionArgs {
    /// Parse raw argument text for `name`. Names without a typed record are a dispatch error.
    pub fn parse(name: &str, arguments: &str) -> DialogueResult<Self> {
        let doc = parse_document(arguments)?;
        let invalid = |e: serde_json::Error| DialogueError::Dispatch(format!("invalid arguments for {}: {}", name, e));
        Ok(match name {
            END_CONVERSATION => FunctionArgs::EndConversation(serde_json::from_value(doc).map_err(invalid)?),
            MEDICAL_INTERVIEW => FunctionArgs::MedicalInterview(serde_json::from_value(doc).map_err(invalid)?),
            CALL_EMERGENCY => FunctionArgs::CallEmergency(serde_json::from_value(doc).map_err(invalid)?),
            _ => return Err(DialogueError::Dispatch(format!("no argument record for {}", name))),
        })
    }
}

fn parse_document(arguments: &str) -> DialogueResult<Value> {
    let doc: Value = serde_json::from_str(arguments)
        .map_err(|e| DialogueError::Dispatch(format!("failed to unmarshal JSON: {}", e)))?;
    if !doc.is_object() {
        return Err(DialogueError::Dispatch("function arguments must be a JSON object".to_string()));
    }
    Ok(doc)
}

/// Result of handling one function call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Side effect done (or a recoverable dispatch error); the session continues
    Handled(String),
    /// The designed end signal, with the model's reason
    Terminate(String),
    /// No handler for this name; the session continues
    Unknown(String),
}

impl DispatchOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchOutcome::Terminate(_))
    }
}

struct FunctionHandler {
    name: &'static str,
    /// Record file stem under the output directory, if the call is persisted
    record_name: Option<&'static str>,
}

const HANDLERS: &[FunctionHandler] = &[
    FunctionHandler {
        name: MEDICAL_INTERVIEW,
        record_name: Some(MEDICAL_INTERVIEW),
    },
    FunctionHandler {
        name: END_CONVERSATION,
        record_name: Some(END_CONVERSATION),
    },
    FunctionHandler {
        name: CALL_EMERGENCY,
        record_name: None,
    },
];

/// Dispatches function calls and writes their records under `output_dir`.
#[derive(Debug, Clone)]
pub struct FunctionDispatcher {
    output_dir: PathBuf,
}

impl FunctionDispatcher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the record for `record_name` is written (overwritten on each call).
    pub fn record_path(&self, record_name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.json", record_name))
    }

    pub fn handles(&self, name: &str) -> bool {
        HANDLERS.iter().any(|h| h.name == name)
    }

    /// Dispatch, folding validation errors into a `Handled` outcome so the session continues.
    pub fn dispatch(&self, invocation: &FunctionInvocation) -> DispatchOutcome {
        match self.try_dispatch(invocation) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(function = %invocation.name, error = %e, "function call rejected");
                DispatchOutcome::Handled(format!("{}: {}", invocation.name, e))
            }
        }
    }

    /// Dispatch, surfacing malformed arguments as `DialogueError::Dispatch`.
    pub fn try_dispatch(&self, invocation: &FunctionInvocation) -> DialogueResult<DispatchOutcome> {
        let Some(handler) = HANDLERS.iter().find(|h| h.name == invocation.name) else {
            warn!("Unknown function call: {}", invocation.name);
            return Ok(DispatchOutcome::Unknown(invocation.name.clone()));
        };

        let args = FunctionArgs::parse(handler.name, &invocation.arguments)?;

        let saved = match handler.record_name {
            Some(record_name) => self.persist(record_name, &invocation.arguments),
            None => None,
        };

        let outcome = match args {
            FunctionArgs::EndConversation(end) => {
                info!(reason = %end.reason, "end_conversation requested");
                DispatchOutcome::Terminate(end.reason)
            }
            FunctionArgs::MedicalInterview(record) => {
                info!(symptoms = %record.symptoms, "medical interview recorded");
                DispatchOutcome::Handled(match saved {
                    Some(path) => format!("{} saved to {}", handler.name, path.display()),
                    None => format!("{} handled, record not saved", handler.name),
                })
            }
            FunctionArgs::CallEmergency(call) => {
                warn!(reason = %call.reason, location = ?call.location, "🚨 emergency call requested");
                DispatchOutcome::Handled(format!("{} requested: {}", handler.name, call.reason))
            }
        };
        Ok(outcome)
    }

    /// Pretty-print the argument document to its record file. Failures are logged.
    fn persist(&self, record_name: &str, arguments: &str) -> Option<PathBuf> {
        let path = self.record_path(record_name);
        let pretty = match serde_json::from_str::<Value>(arguments).and_then(|v| serde_json::to_string_pretty(&v)) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to format {} record: {}", record_name, e);
                return None;
            }
        };
        info!("Function call: {}, {}", record_name, pretty);
        match std::fs::write(&path, pretty) {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Failed to write {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dispatcher() -> (tempfile::TempDir, FunctionDispatcher) {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = FunctionDispatcher::new(dir.path());
        (dir, dispatcher)
    }

    #[test]
    fn end_conversation_terminates_with_declared_reason() {
        let (_dir, dispatcher) = dispatcher();
        let call = FunctionInvocation::new(
            END_CONVERSATION,
            r#"{"reason":"sufficient info gathered","summary":"두통, 여성, 30대"}"#,
        );
        let outcome = dispatcher.dispatch(&call);
        assert_eq!(outcome, DispatchOutcome::Terminate("sufficient info gathered".to_string()));
        assert!(outcome.is_terminal());

        let saved = std::fs::read_to_string(dispatcher.record_path(END_CONVERSATION)).unwrap();
        let doc: Value = serde_json::from_str(&saved).unwrap();
        assert_eq!(doc["summary"], "두통, 여성, 30대");
        assert!(saved.contains("\n  \"reason\""), "expected two-space pretty JSON: {}", saved);
    }

    #[test]
    fn malformed_end_conversation_does_not_terminate() {
        let (_dir, dispatcher) = dispatcher();

        let missing_reason = FunctionInvocation::new(END_CONVERSATION, r#"{"summary":"x"}"#);
        assert!(matches!(dispatcher.try_dispatch(&missing_reason), Err(DialogueError::Dispatch(_))));
        let outcome = dispatcher.dispatch(&missing_reason);
        assert!(matches!(outcome, DispatchOutcome::Handled(ref d) if d.contains("Dispatch error")));

        let not_json = FunctionInvocation::new(END_CONVERSATION, "reason: done");
        assert!(!dispatcher.dispatch(&not_json).is_terminal());

        let wrong_type = FunctionInvocation::new(END_CONVERSATION, r#"{"reason": 42}"#);
        assert!(!dispatcher.dispatch(&wrong_type).is_terminal());

        // nothing persisted for rejected calls
        assert!(!dispatcher.record_path(END_CONVERSATION).exists());
    }

    #[test]
    fn medical_interview_persists_and_continues() {
        let (_dir, dispatcher) = dispatcher();
        let call = FunctionInvocation::new(
            MEDICAL_INTERVIEW,
            json!({"symptoms": "두통", "gender": "여성", "age_group": "30대", "blood_pressure": "120/80"}).to_string(),
        );
        let outcome = dispatcher.dispatch(&call);
        assert!(matches!(outcome, DispatchOutcome::Handled(ref d) if d.contains("medical_interview saved")));

        let doc: Value =
            serde_json::from_str(&std::fs::read_to_string(dispatcher.record_path(MEDICAL_INTERVIEW)).unwrap()).unwrap();
        assert_eq!(doc["blood_pressure"], "120/80");
    }

    #[test]
    fn second_record_overwrites_first() {
        let (_dir, dispatcher) = dispatcher();
        dispatcher.dispatch(&FunctionInvocation::new(MEDICAL_INTERVIEW, r#"{"symptoms":"기침"}"#));
        dispatcher.dispatch(&FunctionInvocation::new(MEDICAL_INTERVIEW, r#"{"symptoms":"발열"}"#));
        let doc: Value =
            serde_json::from_str(&std::fs::read_to_string(dispatcher.record_path(MEDICAL_INTERVIEW)).unwrap()).unwrap();
        assert_eq!(doc, json!({"symptoms": "발열"}));
    }

    #[test]
    fn emergency_call_is_logged_only() {
        let (dir, dispatcher) = dispatcher();
        let outcome = dispatcher.dispatch(&FunctionInvocation::new(CALL_EMERGENCY, r#"{"reason":"chest pain"}"#));
        assert_eq!(outcome, DispatchOutcome::Handled("call_emergency requested: chest pain".to_string()));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn unknown_function_fails_open() {
        let (_dir, dispatcher) = dispatcher();
        let outcome = dispatcher.dispatch(&FunctionInvocation::new("book_appointment", "{}"));
        assert_eq!(outcome, DispatchOutcome::Unknown("book_appointment".to_string()));
        assert!(!outcome.is_terminal());
        assert!(!dispatcher.handles("book_appointment"));
    }

    #[test]
    fn typed_parse_keeps_extra_fields() {
        let args = FunctionArgs::parse(END_CONVERSATION, r#"{"reason":"done","mood":"calm"}"#).unwrap();
        match args {
            FunctionArgs::EndConversation(end) => {
                assert_eq!(end.reason, "done");
                assert_eq!(end.details.get("mood"), Some(&json!("calm")));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            FunctionArgs::parse("other", r#"{"a":1}"#),
            Err(DialogueError::Dispatch(ref m)) if m.contains("other")
        ));
        assert!(FunctionArgs::parse(END_CONVERSATION, "[1]").is_err());
    }

    #[test]
    fn unwritable_output_dir_still_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = FunctionDispatcher::new(dir.path().join("missing").join("deeper"));
        let outcome = dispatcher.dispatch(&FunctionInvocation::new(END_CONVERSATION, r#"{"reason":"bye"}"#));
        assert_eq!(outcome, DispatchOutcome::Terminate("bye".to_string()));
    }
}
