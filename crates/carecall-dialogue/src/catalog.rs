//! Function catalog advertised to the model on every request.
//!
//! Entries are either built in or loaded from one JSON document per function;
//! both produce the same `FunctionSpec` shape.

use crate::error::{DialogueError, DialogueResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use tracing::{debug, info, warn};

pub const END_CONVERSATION: &str = "end_conversation";
pub const MEDICAL_INTERVIEW: &str = "medical_interview";
pub const CALL_EMERGENCY: &str = "call_emergency";

/// One callable function: name, description and JSON-Schema parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub parameters: Value,
}

impl FunctionSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionCatalog {
    specs: Vec<FunctionSpec>,
}

impl FunctionCatalog {
    pub fn new(specs: Vec<FunctionSpec>) -> Self {
        Self { specs }
    }

    /// The interviewer's own functions.
    pub fn builtin() -> Self {
        Self::new(vec![
            FunctionSpec::new(
                MEDICAL_INTERVIEW,
                "Record the structured result of the medical interview gathered so far.",
                json!({
                    "type": "object",
                    "properties": {
                        "symptoms": { "type": "string", "description": "Chief complaint and accompanying symptoms" },
                        "gender": { "type": "string", "description": "Patient gender" },
                        "age_group": { "type": "string", "description": "Patient age or age group, e.g. 30대" },
                        "onset": { "type": "string", "description": "When the symptoms started" },
                        "severity": { "type": "string", "description": "Self-reported severity" },
                        "notes": { "type": "string", "description": "Anything else the doctor should know" }
                    },
                    "required": ["symptoms"]
                }),
            ),
            FunctionSpec::new(
                END_CONVERSATION,
                "End the conversation once enough information has been gathered or the patient wants to stop.",
                json!({
                    "type": "object",
                    "properties": {
                        "reason": { "type": "string", "description": "Why the conversation is ending" },
                        "summary": { "type": "string", "description": "Short summary of the interview" }
                    },
                    "required": ["reason"]
                }),
            ),
            FunctionSpec::new(
                CALL_EMERGENCY,
                "Request emergency assistance when the patient describes a life-threatening situation.",
                json!({
                    "type": "object",
                    "properties": {
                        "reason": { "type": "string", "description": "The emergency situation" },
                        "location": { "type": "string", "description": "Where the patient is, if known" }
                    },
                    "required": ["reason"]
                }),
            ),
        ])
    }

    /// Load every `*.json` file in `dir`, sorted by file name.
    ///
    /// A file holding `{"description", "parameters"}` is taken as a full spec; any other
    /// object is the parameter schema itself. Unreadable or malformed files are skipped.
    pub fn load_dir(dir: impl AsRef<Path>) -> DialogueResult<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| DialogueError::Config(format!("Failed to read function directory {}: {}", dir.display(), e)))?;

        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let mut specs = Vec::new();
        for path in paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let file_name = path.file_name().and_then(|s| s.to_str()).unwrap_or(&name).to_string();

            let content = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Failed to read file {}: {}", path.display(), e);
                    continue;
                }
            };
            let doc: Value = match serde_json::from_str(&content) {
                Ok(v @ Value::Object(_)) => v,
                Ok(_) => {
                    warn!("Function document {} is not a JSON object", path.display());
                    continue;
                }
                Err(e) => {
                    warn!("Failed to unmarshal JSON from file {}: {}", path.display(), e);
                    continue;
                }
            };

            let spec = match (doc.get("description").and_then(Value::as_str), doc.get("parameters")) {
                (Some(description), Some(parameters)) => FunctionSpec::new(&name, description, parameters.clone()),
                _ => FunctionSpec::new(&name, format!("Description for {}", file_name), doc),
            };
            debug!(function = %spec.name, "loaded function spec");
            specs.push(spec);
        }
        Ok(Self::new(specs))
    }

    /// On-disk documents when `dir` exists, otherwise the built-in catalog.
    pub fn from_dir_or_builtin(dir: Option<&Path>) -> DialogueResult<Self> {
        match dir {
            Some(d) if d.is_dir() => {
                let catalog = Self::load_dir(d)?;
                info!("Loaded {} function specs from {}", catalog.len(), d.display());
                Ok(catalog)
            }
            _ => {
                info!("Using built-in function catalog");
                Ok(Self::builtin())
            }
        }
    }

    pub fn specs(&self) -> &[FunctionSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
