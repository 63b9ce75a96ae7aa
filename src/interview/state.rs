//! Per-session flow state: the cursor into one topic's scripted questions.

use serde::{Deserialize, Serialize};

use crate::catalog::Topic;

/// Opaque key for one interview instance.
///
/// Built from the user and the topic instance; the string format is not a
/// contract and must only be compared, never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(user_id: &str, topic_instance_id: impl std::fmt::Display) -> Self {
        Self(format!("user_{user_id}:session_{topic_instance_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a session sits in the interview.
///
/// Progresses: Uninitialized → Initialized → Started →
/// (AskingScripted ⇄ FollowingUp)* → Completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    /// No state exists under the key.
    Uninitialized,
    /// State created, opening line not yet delivered.
    Initialized,
    /// Opening delivered, no scripted question served yet.
    Started,
    AskingScripted,
    FollowingUp,
    Completed,
}

impl FlowPhase {
    /// Whether this phase is terminal for the topic.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Started => "started",
            Self::AskingScripted => "asking_scripted",
            Self::FollowingUp => "following_up",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// Mutable interview state for one topic instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFlowState {
    pub topic_index: usize,
    pub topic_title: String,
    /// Copy of the topic's scripted questions. Never shrinks.
    pub questions: Vec<String>,
    /// Next question to serve. Non-decreasing, at most `questions.len()`.
    pub current_question_index: usize,
    /// User turns observed since initialization.
    pub conversation_count: u32,
    /// Follow-ups asked since the cursor last advanced.
    pub follow_up_count: u32,
    pub is_session_started: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_user_response: Option<String>,
}

impl SessionFlowState {
    /// Fresh state at the start of `topic`.
    pub fn new(topic: &Topic) -> Self {
        Self {
            topic_index: topic.index,
            topic_title: topic.title.clone(),
            questions: topic.questions.clone(),
            current_question_index: 0,
            conversation_count: 0,
            follow_up_count: 0,
            is_session_started: false,
            last_user_response: None,
        }
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn is_completed(&self) -> bool {
        self.current_question_index >= self.questions.len()
    }

    /// Serve the question at the cursor and advance. `None` once exhausted.
    pub fn advance(&mut self) -> Option<String> {
        let question = self.questions.get(self.current_question_index)?.clone();
        self.current_question_index += 1;
        self.follow_up_count = 0;
        Some(question)
    }

    pub fn phase(&self) -> FlowPhase {
        if self.is_completed() {
            FlowPhase::Completed
        } else if !self.is_session_started && self.current_question_index == 0 {
            FlowPhase::Initialized
        } else if self.current_question_index == 0 {
            FlowPhase::Started
        } else if self.follow_up_count > 0 {
            FlowPhase::FollowingUp
        } else {
            FlowPhase::AskingScripted
        }
    }

    pub fn progress(&self) -> FlowProgress {
        let total = self.questions.len();
        let progress_percent = if total == 0 {
            0.0
        } else {
            100.0 * self.current_question_index as f64 / total as f64
        };
        FlowProgress {
            topic_title: self.topic_title.clone(),
            total_questions: total,
            current_question_index: self.current_question_index,
            progress_percent,
            conversation_count: self.conversation_count,
            is_completed: self.is_completed(),
        }
    }
}

/// Snapshot of a session's progress through its topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowProgress {
    pub topic_title: String,
    pub total_questions: usize,
    pub current_question_index: usize,
    pub progress_percent: f64,
    pub conversation_count: u32,
    pub is_completed: bool,
}
