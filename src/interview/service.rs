//! InterviewService: one user turn end to end.
//!
//! Ties the flow controller to the transcript store: decides whether a turn
//! opens a session, rebuilds flow state lost across a restart, records each
//! exchange, and hands finished transcripts to the narrative compiler.
//!
//! A turn is written to the transcript before its flow state is saved, so
//! the transcript is never behind the cursor.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::autobiography::{
    AuthorProfile, GenerationStatus, Narrative, NarrativeCompiler, ReadinessReport, TopicStatus,
    validate_conversations,
};
use crate::error::{InterviewError, Result};
use crate::store::{TranscriptEntry, TranscriptStore};

use super::controller::FlowController;
use super::model::{HistoryTurn, TurnReply, TurnRequest};
use super::recovery::recover_flow_state;
use super::state::{FlowProgress, SessionKey};
use super::store::SessionLocks;

/// Result of one handled turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub reply: TurnReply,
    /// The transcript entry that was recorded for this turn.
    pub entry: TranscriptEntry,
    /// Flow state had to be rebuilt from the transcript first.
    pub recovered: bool,
}

pub struct InterviewService {
    controller: Arc<FlowController>,
    transcripts: Arc<dyn TranscriptStore>,
    compiler: NarrativeCompiler,
    history_window: usize,
    locks: SessionLocks,
}

impl InterviewService {
    pub fn new(
        controller: Arc<FlowController>,
        transcripts: Arc<dyn TranscriptStore>,
        compiler: NarrativeCompiler,
        history_window: usize,
    ) -> Self {
        Self {
            controller,
            transcripts,
            compiler,
            history_window,
            locks: SessionLocks::new(),
        }
    }

    /// Each topic is interviewed once per user, so the topic index is the instance id.
    pub fn session_key(user_id: &str, topic_index: usize) -> SessionKey {
        SessionKey::new(user_id, topic_index)
    }

    pub fn controller(&self) -> &FlowController {
        &self.controller
    }

    fn check_topic(&self, topic_index: usize) -> Result<()> {
        let len = self.controller.catalog().len();
        if topic_index >= len {
            return Err(InterviewError::InvalidTopicIndex {
                index: topic_index,
                len,
            }
            .into());
        }
        Ok(())
    }

    /// Make sure flow state exists for a session whose transcript is non-empty.
    async fn ensure_state(
        &self,
        key: &SessionKey,
        topic_index: usize,
        entries: &[TranscriptEntry],
    ) -> Result<bool> {
        if entries.is_empty() || self.controller.state(key).await?.is_some() {
            return Ok(false);
        }
        info!(
            session = %key,
            entries = entries.len(),
            "Flow state missing for an active session, recovering from transcript"
        );
        self.controller.recover(key, topic_index, entries).await?;
        Ok(true)
    }

    /// Handle one user turn in `topic_index` and record it.
    ///
    /// The first turn of a topic (empty transcript) opens the session.
    pub async fn handle_turn(
        &self,
        user_id: &str,
        topic_index: usize,
        utterance: &str,
    ) -> Result<TurnOutcome> {
        self.check_topic(topic_index)?;
        let key = Self::session_key(user_id, topic_index);
        self.locks
            .with_lock(&key, self.turn(&key, user_id, topic_index, utterance))
            .await
    }

    async fn turn(
        &self,
        key: &SessionKey,
        user_id: &str,
        topic_index: usize,
        utterance: &str,
    ) -> Result<TurnOutcome> {
        let entries = self.transcripts.list_by_topic(user_id, topic_index).await?;
        let is_start = entries.is_empty();
        let recovered = self.ensure_state(key, topic_index, &entries).await?;

        let request = if is_start {
            TurnRequest::start(key.clone(), topic_index)
        } else {
            let skip = entries.len().saturating_sub(self.history_window);
            let history = entries
                .iter()
                .skip(skip)
                .map(|e| HistoryTurn {
                    user: e.user_utterance.clone(),
                    system: e.system_utterance.clone(),
                })
                .collect();
            TurnRequest::reply(key.clone(), topic_index, utterance).with_history(history)
        };

        let pending = self.controller.decide(request).await?;
        let planned = pending.reply();
        let entry = TranscriptEntry::new(
            user_id,
            topic_index,
            planned.progress.topic_title.clone(),
            utterance,
            planned.utterance.clone(),
            planned.kind,
        );
        self.transcripts.append(&entry).await?;

        let reply = match self.controller.commit(pending).await {
            Ok(reply) => reply,
            Err(e) => {
                // The entry is recorded; without state the next turn rebuilds it.
                warn!(session = %key, error = %e, "Flow state not saved after recording turn");
                if let Err(e) = self.controller.discard_state(key).await {
                    warn!(session = %key, error = %e, "Failed to discard stale flow state");
                }
                return Err(e);
            }
        };

        info!(
            session = %key,
            kind = %reply.kind,
            progress = reply.progress.progress_percent,
            "Turn recorded"
        );
        Ok(TurnOutcome {
            reply,
            entry,
            recovered,
        })
    }

    /// The most recent recorded exchange of a topic, without taking a turn.
    ///
    /// A client reconnecting to a topic in progress repeats this instead of
    /// sending a turn, so the cursor stays where it was.
    pub async fn last_exchange(
        &self,
        user_id: &str,
        topic_index: usize,
    ) -> Result<Option<TranscriptEntry>> {
        self.check_topic(topic_index)?;
        let mut entries = self.transcripts.list_by_topic(user_id, topic_index).await?;
        Ok(entries.pop())
    }

    /// Progress through one topic, recovering flow state if needed.
    pub async fn progress(&self, user_id: &str, topic_index: usize) -> Result<FlowProgress> {
        self.check_topic(topic_index)?;
        let key = Self::session_key(user_id, topic_index);
        self.locks
            .with_lock(&key, async {
                let entries = self.transcripts.list_by_topic(user_id, topic_index).await?;
                self.ensure_state(&key, topic_index, &entries).await?;
                self.controller.progress(&key).await
            })
            .await
    }

    /// Every recorded entry for a user, across topics.
    pub async fn transcript(&self, user_id: &str) -> Result<Vec<TranscriptEntry>> {
        Ok(self.transcripts.list_by_user(user_id).await?)
    }

    /// Advisory check of whether there is enough material for a book.
    pub async fn readiness(&self, user_id: &str) -> Result<ReadinessReport> {
        let entries = self.transcripts.list_by_user(user_id).await?;
        Ok(validate_conversations(&entries))
    }

    /// Completion of every catalog topic and whether composing is allowed.
    ///
    /// Topics without flow state are judged from their transcript; nothing is
    /// saved.
    pub async fn status(&self, user_id: &str) -> Result<GenerationStatus> {
        let entries = self.transcripts.list_by_user(user_id).await?;
        let topics = self.controller.catalog().topics();
        let mut rows = Vec::with_capacity(topics.len());

        for (index, topic) in topics.iter().enumerate() {
            let recorded: Vec<TranscriptEntry> = entries
                .iter()
                .filter(|e| e.topic_index == index)
                .cloned()
                .collect();
            let key = Self::session_key(user_id, index);
            let state = match self.controller.state(&key).await? {
                Some(state) => Some(state),
                None if !recorded.is_empty() => Some(recover_flow_state(topic, &recorded)),
                None => None,
            };

            rows.push(TopicStatus {
                topic_index: index,
                title: topic.title.clone(),
                is_started: state.is_some(),
                is_completed: state.as_ref().is_some_and(|s| s.is_completed()),
                conversation_count: recorded.len(),
                progress_percent: state.map_or(0.0, |s| s.progress().progress_percent),
            });
        }

        Ok(GenerationStatus::from_topics(rows))
    }

    /// Compile the user's whole transcript into a narrative.
    ///
    /// Refused until enough topics are completed; see [`GenerationStatus`].
    pub async fn compose_autobiography(
        &self,
        user_id: &str,
        author: &AuthorProfile,
    ) -> Result<Narrative> {
        let status = self.status(user_id).await?;
        if !status.can_generate {
            info!(
                user = user_id,
                completed = status.completed_topics,
                turns = status.total_conversations,
                "Autobiography requested before enough topics were completed"
            );
            return Err(InterviewError::NotReadyToCompose {
                completed_topics: status.completed_topics,
                conversations: status.total_conversations,
            }
            .into());
        }

        let entries = self.transcripts.list_by_user(user_id).await?;
        let report = validate_conversations(&entries);
        if !report.is_ready {
            info!(
                user = user_id,
                topics = report.topics_covered,
                words = report.total_words,
                "Composing autobiography from a thin transcript"
            );
        }
        Ok(self.compiler.compile(&entries, author).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use crate::error::DatabaseError;
    use crate::catalog::Catalog;
    use crate::error::Error;
    use crate::interview::fallback::StaticFallback;
    use crate::interview::model::ReplyKind;
    use crate::interview::phrases::{PhrasePicker, SequencePicker};
    use crate::interview::store::InMemoryFlowStore;
    use crate::store::InMemoryTranscriptStore;

    const LONG_REPLY: &str =
        "We moved to Busan the winter I turned seven, and the harbour became my whole world.";

    /// Transcript store whose appends can be made to fail.
    #[derive(Default)]
    struct FlakyTranscripts {
        inner: InMemoryTranscriptStore,
        fail_appends: AtomicBool,
    }

    #[async_trait]
    impl TranscriptStore for FlakyTranscripts {
        async fn append(&self, entry: &TranscriptEntry) -> std::result::Result<(), DatabaseError> {
            if self.fail_appends.load(Ordering::SeqCst) {
                return Err(DatabaseError::Query("disk full".to_string()));
            }
            self.inner.append(entry).await
        }

        async fn list_by_user(&self, user_id: &str) -> std::result::Result<Vec<TranscriptEntry>, DatabaseError> {
            self.inner.list_by_user(user_id).await
        }

        async fn list_by_topic(
            &self,
            user_id: &str,
            topic_index: usize,
        ) -> std::result::Result<Vec<TranscriptEntry>, DatabaseError> {
            self.inner.list_by_topic(user_id, topic_index).await
        }
    }

    fn service_with(
        flow: Arc<InMemoryFlowStore>,
        transcripts: Arc<dyn TranscriptStore>,
    ) -> InterviewService {
        let catalog = Arc::new(Catalog::builtin());
        let picker: Arc<dyn PhrasePicker> = Arc::new(SequencePicker::first());
        let controller = Arc::new(FlowController::new(
            Arc::clone(&catalog),
            flow,
            Arc::clone(&picker),
            Arc::new(StaticFallback::new(picker)),
        ));
        let compiler = NarrativeCompiler::new(None, catalog);
        InterviewService::new(controller, transcripts, compiler, 3)
    }

    fn service() -> InterviewService {
        service_with(
            Arc::new(InMemoryFlowStore::new()),
            Arc::new(InMemoryTranscriptStore::new()),
        )
    }

    #[tokio::test]
    async fn first_turn_opens_and_is_recorded() {
        let svc = service();
        let outcome = svc.handle_turn("u1", 1, "").await.unwrap();
        assert_eq!(outcome.reply.kind, ReplyKind::Opening);
        assert!(!outcome.recovered);
        assert_eq!(outcome.entry.topic_title, "Treasured Memories of Childhood");

        let second = svc.handle_turn("u1", 1, "").await.unwrap();
        assert_eq!(second.reply.kind, ReplyKind::ScriptedQuestion);

        let recorded = svc.transcript("u1").await.unwrap();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1].system_utterance, second.reply.utterance);
    }

    #[tokio::test]
    async fn invalid_topic_is_rejected() {
        let svc = service();
        let err = svc.handle_turn("u1", 12, "hi").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Interview(InterviewError::InvalidTopicIndex { index: 12, len: 12 })
        ));
        assert!(svc.transcript("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lost_flow_state_is_rebuilt_from_transcript() {
        let transcripts = Arc::new(InMemoryTranscriptStore::new());
        let before = service_with(Arc::new(InMemoryFlowStore::new()), transcripts.clone());
        before.handle_turn("u1", 0, "").await.unwrap();
        before.handle_turn("u1", 0, "").await.unwrap();
        before.handle_turn("u1", 0, "Jinju").await.unwrap();

        // Fresh flow store, same transcript: a restart.
        let after = service_with(Arc::new(InMemoryFlowStore::new()), transcripts);
        let progress = after.progress("u1", 0).await.unwrap();
        assert_eq!(progress.current_question_index, 1);
        assert_eq!(progress.conversation_count, 2);

        let key = InterviewService::session_key("u1", 0);
        let state = after.controller().state(&key).await.unwrap().unwrap();
        assert_eq!(state.follow_up_count, 1);
    }

    #[tokio::test]
    async fn turn_after_restart_reports_recovery() {
        let transcripts = Arc::new(InMemoryTranscriptStore::new());
        let before = service_with(Arc::new(InMemoryFlowStore::new()), transcripts.clone());
        before.handle_turn("u1", 2, "").await.unwrap();

        let after = service_with(Arc::new(InMemoryFlowStore::new()), transcripts);
        let outcome = after.handle_turn("u1", 2, "").await.unwrap();
        assert!(outcome.recovered);
        assert_eq!(outcome.reply.kind, ReplyKind::ScriptedQuestion);
        assert_eq!(outcome.reply.progress.current_question_index, 1);
    }

    #[tokio::test]
    async fn progress_of_unstarted_topic_is_not_found() {
        let svc = service();
        assert!(matches!(
            svc.progress("u1", 4).await,
            Err(Error::Interview(InterviewError::SessionNotFound { .. }))
        ));
    }

    /// Opening, first question, then two follow-ups and an advance per question.
    async fn complete_topic(svc: &InterviewService, user: &str, topic: usize) {
        svc.handle_turn(user, topic, "").await.unwrap();
        svc.handle_turn(user, topic, "").await.unwrap();
        let questions = Catalog::builtin().get(topic).unwrap().questions.len();
        for _ in 0..questions * 3 {
            svc.handle_turn(user, topic, LONG_REPLY).await.unwrap();
        }
    }

    #[tokio::test]
    async fn readiness_is_advisory_and_compose_is_gated() {
        let svc = service();
        svc.handle_turn("u1", 0, "").await.unwrap();
        svc.handle_turn("u1", 0, "I was born in a small village near Jinju.")
            .await
            .unwrap();

        let report = svc.readiness("u1").await.unwrap();
        assert_eq!(report.topics_covered, 1);
        assert!(!report.is_ready);

        let err = svc
            .compose_autobiography("u1", &AuthorProfile::new("Kim"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Interview(InterviewError::NotReadyToCompose {
                completed_topics: 0,
                conversations: 2
            })
        ));
    }

    #[tokio::test]
    async fn status_lists_every_topic() {
        let svc = service();
        svc.handle_turn("u1", 4, "").await.unwrap();
        svc.handle_turn("u1", 4, "").await.unwrap();

        let status = svc.status("u1").await.unwrap();
        assert_eq!(status.topics.len(), Catalog::builtin().len());
        let row = &status.topics[4];
        assert!(row.is_started);
        assert!(!row.is_completed);
        assert_eq!(row.conversation_count, 2);
        assert_eq!(row.progress_percent, 25.0);
        assert!(!status.topics[3].is_started);
        assert_eq!(status.total_conversations, 2);
        assert!(!status.can_generate);
    }

    #[tokio::test]
    async fn two_completed_topics_cannot_compose_three_can() {
        let svc = service();
        complete_topic(&svc, "u1", 3).await;
        complete_topic(&svc, "u1", 4).await;

        let status = svc.status("u1").await.unwrap();
        assert_eq!(status.completed_topics, 2);
        assert!(status.total_conversations >= 20);
        assert!(!status.can_generate);
        assert!(svc
            .compose_autobiography("u1", &AuthorProfile::new("Kim"))
            .await
            .is_err());

        complete_topic(&svc, "u1", 5).await;
        let status = svc.status("u1").await.unwrap();
        assert_eq!(status.completed_topics, 3);
        assert!(status.can_generate);

        let book = svc
            .compose_autobiography("u1", &AuthorProfile::new("Kim"))
            .await
            .unwrap();
        assert!(!book.synthesized);
        assert!(book.text.starts_with("# Kim's Story"));
        assert!(book.text.contains(LONG_REPLY));
    }

    #[tokio::test]
    async fn status_judges_topics_without_flow_state_from_transcript() {
        let transcripts = Arc::new(InMemoryTranscriptStore::new());
        let before = service_with(Arc::new(InMemoryFlowStore::new()), transcripts.clone());
        complete_topic(&before, "u1", 6).await;

        let after = service_with(Arc::new(InMemoryFlowStore::new()), transcripts);
        let status = after.status("u1").await.unwrap();
        assert!(status.topics[6].is_completed);
        assert_eq!(status.topics[6].progress_percent, 100.0);

        // Nothing was saved while judging.
        let key = InterviewService::session_key("u1", 6);
        assert!(after.controller().state(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_exchange_does_not_move_the_cursor() {
        let svc = service();
        assert!(svc.last_exchange("u1", 0).await.unwrap().is_none());

        svc.handle_turn("u1", 0, "").await.unwrap();
        let question = svc.handle_turn("u1", 0, "").await.unwrap();

        for _ in 0..2 {
            let last = svc.last_exchange("u1", 0).await.unwrap().unwrap();
            assert_eq!(last.system_utterance, question.reply.utterance);
        }
        let progress = svc.progress("u1", 0).await.unwrap();
        assert_eq!(progress.current_question_index, 1);
        assert_eq!(svc.transcript("u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_append_leaves_flow_state_untouched() {
        let transcripts = Arc::new(FlakyTranscripts::default());
        let svc = service_with(Arc::new(InMemoryFlowStore::new()), transcripts.clone());
        svc.handle_turn("u1", 0, "").await.unwrap();

        transcripts.fail_appends.store(true, Ordering::SeqCst);
        let err = svc.handle_turn("u1", 0, "").await.unwrap_err();
        assert!(matches!(err, Error::Database(DatabaseError::Query(_))));
        assert_eq!(svc.progress("u1", 0).await.unwrap().current_question_index, 0);

        transcripts.fail_appends.store(false, Ordering::SeqCst);
        let retry = svc.handle_turn("u1", 0, "").await.unwrap();
        let catalog = Catalog::builtin();
        let first = &catalog.get(0).unwrap().questions[0];
        assert_eq!(&retry.reply.utterance, first);
        assert_eq!(retry.reply.progress.current_question_index, 1);
    }

    #[tokio::test]
    async fn failed_opening_append_leaves_no_session() {
        let transcripts = Arc::new(FlakyTranscripts::default());
        transcripts.fail_appends.store(true, Ordering::SeqCst);
        let svc = service_with(Arc::new(InMemoryFlowStore::new()), transcripts);
        assert!(svc.handle_turn("u1", 2, "").await.is_err());

        let key = InterviewService::session_key("u1", 2);
        assert!(svc.controller().state(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn finished_turns_leave_no_lock_entries() {
        let svc = service();
        for user in ["u1", "u2", "u3"] {
            svc.handle_turn(user, 1, "").await.unwrap();
            svc.progress(user, 1).await.unwrap();
        }
        assert!(svc.locks.is_empty().await);
    }
}
