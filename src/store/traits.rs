//! Transcript storage: the durable record of every interview turn.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::interview::ReplyKind;

/// One user/system exchange within a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: Uuid,
    pub user_id: String,
    pub topic_index: usize,
    pub topic_title: String,
    /// Empty for the opening turn.
    pub user_utterance: String,
    pub system_utterance: String,
    pub kind: ReplyKind,
    pub created_at: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn new(
        user_id: impl Into<String>,
        topic_index: usize,
        topic_title: impl Into<String>,
        user_utterance: impl Into<String>,
        system_utterance: impl Into<String>,
        kind: ReplyKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            topic_index,
            topic_title: topic_title.into(),
            user_utterance: user_utterance.into(),
            system_utterance: system_utterance.into(),
            kind,
            created_at: Utc::now(),
        }
    }

    /// Scripted entries came from the question script; the rest are free-form.
    pub fn is_scripted(&self) -> bool {
        self.kind.is_scripted()
    }
}

/// Append-only transcript storage.
///
/// Reads return entries in the order they were appended.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn append(&self, entry: &TranscriptEntry) -> Result<(), DatabaseError>;

    /// Every entry for a user, across all topics.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<TranscriptEntry>, DatabaseError>;

    /// Every entry for one of a user's topics.
    async fn list_by_topic(
        &self,
        user_id: &str,
        topic_index: usize,
    ) -> Result<Vec<TranscriptEntry>, DatabaseError>;
}
