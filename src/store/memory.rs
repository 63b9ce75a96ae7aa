//! In-process transcript store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::DatabaseError;
use crate::store::traits::{TranscriptEntry, TranscriptStore};

/// Transcript held in memory for the life of the process.
#[derive(Default)]
pub struct InMemoryTranscriptStore {
    entries: RwLock<Vec<TranscriptEntry>>,
}

impl InMemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TranscriptStore for InMemoryTranscriptStore {
    async fn append(&self, entry: &TranscriptEntry) -> Result<(), DatabaseError> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<TranscriptEntry>, DatabaseError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_by_topic(
        &self,
        user_id: &str,
        topic_index: usize,
    ) -> Result<Vec<TranscriptEntry>, DatabaseError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.user_id == user_id && e.topic_index == topic_index)
            .cloned()
            .collect())
    }
}
