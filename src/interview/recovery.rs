//! Rebuild flow state from a topic's persisted transcript.
//!
//! The transcript survives a restart; an in-memory flow store does not. The
//! replay below reconstructs the cursor and counters the controller would
//! have reached by producing exactly those entries.

use crate::catalog::Topic;
use crate::store::TranscriptEntry;

use super::model::ReplyKind;
use super::state::SessionFlowState;

/// Replay `entries` (one topic, oldest first) on top of fresh state for `topic`.
///
/// Entries for other topics are ignored.
pub fn recover_flow_state(topic: &Topic, entries: &[TranscriptEntry]) -> SessionFlowState {
    let mut state = SessionFlowState::new(topic);
    let total = state.total_questions();

    for entry in entries.iter().filter(|e| e.topic_index == topic.index) {
        state.is_session_started = true;
        match entry.kind {
            ReplyKind::Opening => continue,
            ReplyKind::ScriptedQuestion => {
                if state.current_question_index < total {
                    state.current_question_index += 1;
                    state.follow_up_count = 0;
                }
            }
            ReplyKind::FollowUp => {
                state.follow_up_count += 1;
                state.last_user_response = Some(entry.user_utterance.clone());
            }
            ReplyKind::Closing => state.current_question_index = total,
            ReplyKind::Freeform => {}
        }
        state.conversation_count += 1;
    }

    state
}
