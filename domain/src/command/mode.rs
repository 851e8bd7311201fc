//! Session mode requested when starting a peer session

use serde::{Deserialize, Serialize};

/// Mode a backend session is started in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    #[default]
    Default,
    PromptAssistant,
    AgentAssistant,
}

impl SessionMode {
    /// Human-readable label used in session notices.
    pub fn label(&self) -> &'static str {
        match self {
            SessionMode::Default => "Default",
            SessionMode::PromptAssistant => "Prompt Assistant",
            SessionMode::AgentAssistant => "Agent Assistant",
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
