//! LLM collaborator: sends the full dialogue log plus the function catalog to an
//! OpenAI-compatible chat-completions endpoint and returns either text or one function call.

use crate::catalog::FunctionSpec;
use crate::error::{DialogueError, DialogueResult};
use crate::message::DialogueMessage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MODEL: &str = "gpt-4o-2024-08-06";
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// A function call requested by the model. `arguments` is the raw JSON text as returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInvocation {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

impl FunctionInvocation {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// What the model answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    Content(String),
    FunctionCall(FunctionInvocation),
}

/// The language-model collaborator.
pub trait ChatBackend {
    fn complete(&self, messages: &[DialogueMessage], functions: &[FunctionSpec]) -> DialogueResult<ModelReply>;
}

// OpenAI-compatible request/response structures
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [DialogueMessage],
    #[serde(skip_serializing_if = "is_empty_slice")]
    functions: &'a [FunctionSpec],
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<&'static str>,
}

fn is_empty_slice<T>(items: &&[T]) -> bool {
    items.is_empty()
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize, Debug)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionInvocation>,
}

/// Interpret a chat-completions body: first choice wins; a function call with a
/// non-empty name takes precedence over content.
pub fn parse_chat_response(body: &str) -> DialogueResult<ModelReply> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| DialogueError::Inference(format!("error unmarshalling response body: {}", e)))?;

    let Some(choice) = response.choices.into_iter().next() else {
        warn!("No response from the API.");
        return Err(DialogueError::Inference("no response from the API".to_string()));
    };

    match choice.message.function_call {
        Some(call) if !call.name.is_empty() => Ok(ModelReply::FunctionCall(call)),
        _ => Ok(ModelReply::Content(choice.message.content.unwrap_or_default())),
    }
}

/// Chat-completions client with function calling (`function_call: "auto"`).
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    client: reqwest::blocking::Client,
}

impl OpenAiChat {
    /// Create a client; `timeout` of `None` waits indefinitely.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Option<Duration>,
    ) -> DialogueResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DialogueError::Inference(e.to_string()))?;
        Ok(Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    fn request_body<'a>(&'a self, messages: &'a [DialogueMessage], functions: &'a [FunctionSpec]) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages,
            functions,
            function_call: if functions.is_empty() { None } else { Some("auto") },
        }
    }
}

impl ChatBackend for OpenAiChat {
    fn complete(&self, messages: &[DialogueMessage], functions: &[FunctionSpec]) -> DialogueResult<ModelReply> {
        debug!(model = %self.model, messages = messages.len(), "dispatching chat completion");
        let res = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(messages, functions))
            .send()
            .map_err(|e| DialogueError::Inference(format!("error making request: {}", e)))?;

        let status = res.status();
        let body = res
            .text()
            .map_err(|e| DialogueError::Inference(format!("error reading response body: {}", e)))?;
        if !status.is_success() {
            return Err(DialogueError::Inference(format!("API error: {} {}", status, body)));
        }
        parse_chat_response(&body)
    }
}
