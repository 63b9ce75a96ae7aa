//! Turn-level types exchanged with the flow controller.

use serde::{Deserialize, Serialize};

use super::state::{FlowProgress, SessionKey};

/// What kind of system utterance a turn produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Opening,
    FollowUp,
    ScriptedQuestion,
    Closing,
    /// Produced by a fallback responder rather than the script.
    Freeform,
}

impl ReplyKind {
    /// Scripted replies come from fixed templates; only `Freeform` does not.
    pub fn is_scripted(&self) -> bool {
        !matches!(self, Self::Freeform)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::FollowUp => "follow_up",
            Self::ScriptedQuestion => "scripted_question",
            Self::Closing => "closing",
            Self::Freeform => "freeform",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "opening" => Some(Self::Opening),
            "follow_up" => Some(Self::FollowUp),
            "scripted_question" => Some(Self::ScriptedQuestion),
            "closing" => Some(Self::Closing),
            "freeform" => Some(Self::Freeform),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReplyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One earlier exchange, used as context for fallback responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub user: String,
    pub system: String,
}

/// An incoming user turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub key: SessionKey,
    pub topic_index: usize,
    pub utterance: String,
    /// First turn of the session: initialize and greet.
    pub is_session_start: bool,
    /// Prior exchanges in this session, oldest first.
    pub history: Vec<HistoryTurn>,
}

impl TurnRequest {
    pub fn start(key: SessionKey, topic_index: usize) -> Self {
        Self {
            key,
            topic_index,
            utterance: String::new(),
            is_session_start: true,
            history: Vec::new(),
        }
    }

    pub fn reply(key: SessionKey, topic_index: usize, utterance: impl Into<String>) -> Self {
        Self {
            key,
            topic_index,
            utterance: utterance.into(),
            is_session_start: false,
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryTurn>) -> Self {
        self.history = history;
        self
    }
}

/// The controller's answer to a turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub utterance: String,
    pub kind: ReplyKind,
    pub progress: FlowProgress,
}
