//! FlowController: the interview state machine.
//!
//! Each operation loads the session's `SessionFlowState` from the injected
//! store, applies one transition, and saves it back. `respond` runs the full
//! per-turn decision procedure under a per-session lock; `decide` and
//! `commit` split it for callers that record the turn before saving.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::catalog::{Catalog, Topic};
use crate::error::{InterviewError, Result};
use crate::store::TranscriptEntry;

use super::fallback::{FallbackContext, FallbackResponder};
use super::model::{ReplyKind, TurnReply, TurnRequest};
use super::phrases::{self, EMPATHY_PHRASES, FOLLOW_UP_TEMPLATES, PhrasePicker, TRANSITION_PHRASE};
use super::recovery::recover_flow_state;
use super::state::{FlowPhase, FlowProgress, SessionFlowState, SessionKey};
use super::store::{FlowStateStore, SessionLocks};

/// Utterances shorter than this (in characters, after trimming) always get a follow-up.
pub const SHORT_ANSWER_CHARS: usize = 50;
/// Follow-ups asked per scripted question before a long answer may advance.
pub const MIN_FOLLOW_UPS: u32 = 2;
/// Follow-ups required before the cursor may advance.
pub const FOLLOW_UPS_TO_ADVANCE: u32 = 1;

/// Whether `utterance` should be answered with a follow-up rather than advancing.
pub fn needs_follow_up(state: &SessionFlowState, utterance: &str) -> bool {
    utterance.trim().chars().count() < SHORT_ANSWER_CHARS || state.follow_up_count < MIN_FOLLOW_UPS
}

/// Whether enough follow-ups happened to move to the next scripted question.
pub fn can_advance(state: &SessionFlowState) -> bool {
    state.follow_up_count >= FOLLOW_UPS_TO_ADVANCE
}

/// Count the follow-up, remember the answer, and pick the next template round-robin.
fn take_follow_up(state: &mut SessionFlowState, utterance: &str) -> &'static str {
    state.follow_up_count += 1;
    state.last_user_response = Some(utterance.to_string());
    FOLLOW_UP_TEMPLATES[state.follow_up_count as usize % FOLLOW_UP_TEMPLATES.len()]
}

/// Drives interview sessions through their topic's scripted questions.
pub struct FlowController {
    catalog: Arc<Catalog>,
    store: Arc<dyn FlowStateStore>,
    picker: Arc<dyn PhrasePicker>,
    fallback: Arc<dyn FallbackResponder>,
    locks: SessionLocks,
}

impl FlowController {
    pub fn new(
        catalog: Arc<Catalog>,
        store: Arc<dyn FlowStateStore>,
        picker: Arc<dyn PhrasePicker>,
        fallback: Arc<dyn FallbackResponder>,
    ) -> Self {
        Self {
            catalog,
            store,
            picker,
            fallback,
            locks: SessionLocks::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn topic(&self, index: usize) -> Result<&Topic> {
        self.catalog.get(index).map_err(|_| {
            InterviewError::InvalidTopicIndex {
                index,
                len: self.catalog.len(),
            }
            .into()
        })
    }

    async fn load(&self, key: &SessionKey) -> Result<SessionFlowState> {
        self.store.load(key).await?.ok_or_else(|| {
            InterviewError::SessionNotFound {
                key: key.to_string(),
            }
            .into()
        })
    }

    async fn save(&self, key: &SessionKey, state: &SessionFlowState) -> Result<()> {
        self.store.save(key, state).await?;
        Ok(())
    }

    /// Create fresh flow state for `topic_index`, replacing any existing state.
    pub async fn initialize(&self, key: &SessionKey, topic_index: usize) -> Result<SessionFlowState> {
        let topic = self.topic(topic_index)?;
        let state = SessionFlowState::new(topic);
        self.save(key, &state).await?;
        info!(
            session = %key,
            topic = topic_index,
            questions = state.total_questions(),
            "Interview session initialized"
        );
        Ok(state)
    }

    /// Greeting naming the topic. Marks the session started.
    pub async fn opening_utterance(&self, key: &SessionKey) -> Result<String> {
        let mut state = self.load(key).await?;
        state.is_session_started = true;
        self.save(key, &state).await?;
        Ok(phrases::opening(&state.topic_title))
    }

    /// Serve the question at the cursor and advance. `None` once the topic is exhausted.
    pub async fn next_scripted_question(&self, key: &SessionKey) -> Result<Option<String>> {
        let mut state = self.load(key).await?;
        let question = state.advance();
        if question.is_some() {
            self.save(key, &state).await?;
        }
        Ok(question)
    }

    pub async fn needs_follow_up(&self, key: &SessionKey, utterance: &str) -> Result<bool> {
        let state = self.load(key).await?;
        Ok(needs_follow_up(&state, utterance))
    }

    /// Count a follow-up and return the next template.
    pub async fn follow_up_utterance(&self, key: &SessionKey, utterance: &str) -> Result<String> {
        let mut state = self.load(key).await?;
        let follow_up = take_follow_up(&mut state, utterance);
        self.save(key, &state).await?;
        Ok(follow_up.to_string())
    }

    pub async fn can_advance(&self, key: &SessionKey) -> Result<bool> {
        let state = self.load(key).await?;
        Ok(can_advance(&state))
    }

    pub async fn closing_utterance(
        &self,
        key: &SessionKey,
        next_topic_title: Option<&str>,
    ) -> Result<String> {
        let state = self.load(key).await?;
        Ok(phrases::closing(&state.topic_title, next_topic_title))
    }

    pub async fn progress(&self, key: &SessionKey) -> Result<FlowProgress> {
        Ok(self.load(key).await?.progress())
    }

    /// Count one observed user turn.
    pub async fn record_turn(&self, key: &SessionKey) -> Result<()> {
        let mut state = self.load(key).await?;
        state.conversation_count += 1;
        self.save(key, &state).await
    }

    /// Current phase; `Uninitialized` when no state exists.
    pub async fn phase(&self, key: &SessionKey) -> Result<FlowPhase> {
        Ok(self
            .store
            .load(key)
            .await?
            .map(|s| s.phase())
            .unwrap_or(FlowPhase::Uninitialized))
    }

    /// Snapshot of the raw state, if any.
    pub async fn state(&self, key: &SessionKey) -> Result<Option<SessionFlowState>> {
        Ok(self.store.load(key).await?)
    }

    /// Drop a finished session's state.
    pub async fn end_session(&self, key: &SessionKey) -> Result<bool> {
        let removed = self.store.remove(key).await?;
        self.locks.release(key).await;
        if removed {
            info!(session = %key, "Interview session ended");
        }
        Ok(removed)
    }

    /// Rebuild lost flow state from a topic's persisted transcript.
    ///
    /// In-memory flow state does not survive a restart while the transcript
    /// does; this is the documented way to bring the two back in line.
    pub async fn recover(
        &self,
        key: &SessionKey,
        topic_index: usize,
        entries: &[TranscriptEntry],
    ) -> Result<SessionFlowState> {
        let topic = self.topic(topic_index)?;
        let state = recover_flow_state(topic, entries);
        self.save(key, &state).await?;
        info!(
            session = %key,
            topic = topic_index,
            cursor = state.current_question_index,
            follow_ups = state.follow_up_count,
            turns = state.conversation_count,
            "Flow state recovered from transcript"
        );
        Ok(state)
    }

    /// Decide the system's reply to one user turn and apply the transition.
    pub async fn respond(&self, request: TurnRequest) -> Result<TurnReply> {
        let key = request.key.clone();
        self.locks
            .with_lock(&key, async {
                let pending = self.decide(request).await?;
                self.commit(pending).await
            })
            .await
    }

    /// Work out the reply and the next state for one turn without saving.
    ///
    /// The caller must serialize turns of the session and hand the result to
    /// [`commit`](Self::commit) once anything it records alongside the turn
    /// has been written.
    pub async fn decide(&self, request: TurnRequest) -> Result<PendingTurn> {
        let key = request.key.clone();

        if request.is_session_start {
            let topic = self.topic(request.topic_index)?;
            let mut state = SessionFlowState::new(topic);
            state.is_session_started = true;
            info!(
                session = %key,
                topic = request.topic_index,
                questions = state.total_questions(),
                "Interview session initialized"
            );
            let reply = TurnReply {
                utterance: phrases::opening(&state.topic_title),
                kind: ReplyKind::Opening,
                progress: state.progress(),
            };
            return Ok(PendingTurn { key, reply, state });
        }

        let mut state = self.load(&key).await?;
        if state.topic_index != request.topic_index {
            debug!(
                session = %key,
                requested = request.topic_index,
                actual = state.topic_index,
                "Turn topic differs from session topic; using session topic"
            );
        }
        state.conversation_count += 1;

        let utterance = request.utterance.as_str();
        let scripted = if utterance.trim().is_empty() {
            None
        } else if needs_follow_up(&state, utterance) {
            let follow_up = take_follow_up(&mut state, utterance);
            let empathy = EMPATHY_PHRASES[self.picker.pick(EMPATHY_PHRASES.len())];
            Some((format!("{empathy} {follow_up}"), ReplyKind::FollowUp))
        } else if can_advance(&state) {
            match state.advance() {
                Some(question) => Some((
                    format!("{TRANSITION_PHRASE} {question}"),
                    ReplyKind::ScriptedQuestion,
                )),
                None => {
                    let next = self.catalog.next_title(state.topic_index);
                    Some((
                        phrases::closing(&state.topic_title, next),
                        ReplyKind::Closing,
                    ))
                }
            }
        } else {
            None
        };

        let (utterance, kind) = match scripted {
            Some(reply) => reply,
            None => match state.advance() {
                Some(question) => (question, ReplyKind::ScriptedQuestion),
                None => {
                    let topic = self.topic(state.topic_index)?.clone();
                    let ctx = FallbackContext {
                        topic,
                        utterance: request.utterance.clone(),
                        history: request.history.clone(),
                    };
                    warn!(
                        session = %key,
                        responder = self.fallback.name(),
                        "No scripted reply available, delegating to fallback"
                    );
                    (self.fallback.respond(&ctx).await, ReplyKind::Freeform)
                }
            },
        };

        let reply = TurnReply {
            utterance,
            kind,
            progress: state.progress(),
        };
        Ok(PendingTurn { key, reply, state })
    }

    /// Save the state produced by [`decide`](Self::decide) and release its reply.
    pub async fn commit(&self, pending: PendingTurn) -> Result<TurnReply> {
        let PendingTurn { key, reply, state } = pending;
        self.save(&key, &state).await?;
        debug!(
            session = %key,
            kind = %reply.kind,
            cursor = state.current_question_index,
            follow_ups = state.follow_up_count,
            phase = %state.phase(),
            "Turn handled"
        );
        Ok(reply)
    }

    /// Drop flow state without touching the session lock.
    pub async fn discard_state(&self, key: &SessionKey) -> Result<bool> {
        Ok(self.store.remove(key).await?)
    }
}

/// A decided turn whose flow state has not been saved yet.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    key: SessionKey,
    reply: TurnReply,
    state: SessionFlowState,
}

impl PendingTurn {
    pub fn reply(&self) -> &TurnReply {
        &self.reply
    }
}
