//! Wire types of the backend's `/api/*` endpoints.
//!
//! - `POST /api/start`   `{thread_id, is_first_turn, llm_name}`
//! - `POST /api/message` `{message, thread_id}` answered either with a
//!   `text/event-stream` body (raw chunks are reply fragments) or with JSON
//! - `POST /api/end`     `{thread_id}`

use chorus_domain::SessionMode;
use serde::{Deserialize, Serialize};

/// Fallback reply text when a JSON answer carries no known text field.
pub const NO_RESPONSE: &str = "No response received";

/// Content type that marks a streamed reply.
pub const EVENT_STREAM: &str = "text/event-stream";

/// Body of `POST /api/start`
#[derive(Debug, Clone, Serialize)]
pub struct StartRequest<'a> {
    pub thread_id: &'a str,
    /// `null` for the default mode, `true` for the prompt assistant,
    /// `false` for the agent assistant.
    pub is_first_turn: Option<bool>,
    pub llm_name: &'a str,
}

impl<'a> StartRequest<'a> {
    pub fn new(thread_id: &'a str, llm_name: &'a str, mode: SessionMode) -> Self {
        Self {
            thread_id,
            is_first_turn: first_turn_flag(mode),
            llm_name,
        }
    }
}

fn first_turn_flag(mode: SessionMode) -> Option<bool> {
    match mode {
        SessionMode::Default => None,
        SessionMode::PromptAssistant => Some(true),
        SessionMode::AgentAssistant => Some(false),
    }
}

/// Body of `POST /api/message`
#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest<'a> {
    pub message: &'a str,
    pub thread_id: &'a str,
}

/// Body of `POST /api/end`
#[derive(Debug, Clone, Serialize)]
pub struct EndRequest<'a> {
    pub thread_id: &'a str,
}

/// Acknowledgement body of `/api/start` and `/api/end`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AckBody {
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Non-streamed reply body of `/api/message`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplyBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ReplyBody {
    /// First non-empty of `message`, `response`, `content`.
    pub fn into_text(self) -> String {
        [self.message, self.response, self.content]
            .into_iter()
            .flatten()
            .find(|text| !text.is_empty())
            .unwrap_or_else(|| NO_RESPONSE.to_string())
    }
}

/// Whether a `Content-Type` header value announces a streamed reply.
pub fn is_event_stream(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|value| value.to_ascii_lowercase().contains(EVENT_STREAM))
}
