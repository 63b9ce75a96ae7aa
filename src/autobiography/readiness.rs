//! Readiness gate: is there enough material to write the book yet?
//!
//! Two views. `validate_conversations` scores how much was said per topic and
//! is advisory. `GenerationStatus` counts completed topics and recorded turns
//! and decides whether composing is allowed at all.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::store::TranscriptEntry;

/// Turns that earn a topic half of its adequacy score.
const TARGET_TURNS: f64 = 5.0;
/// Words that earn a topic the other half.
const TARGET_WORDS: f64 = 500.0;
const SUFFICIENT_ADEQUACY: f64 = 60.0;

const MIN_COVERED_TOPICS: usize = 3;
const MIN_TOTAL_WORDS: usize = 3000;
const MIN_SUFFICIENT_TOPICS: usize = 3;

/// Topics whose scripted questions must all have been served before composing.
pub const MIN_COMPLETED_TOPICS: usize = 3;
/// Recorded turns, across all topics, required before composing.
pub const MIN_CONVERSATIONS: usize = 20;

/// Coverage of a single topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicAdequacy {
    pub turns: usize,
    pub words: usize,
    /// 0–100.
    pub adequacy: f64,
    pub is_sufficient: bool,
}

impl TopicAdequacy {
    fn new(turns: usize, words: usize) -> Self {
        let adequacy = (turns as f64 / TARGET_TURNS * 50.0 + words as f64 / TARGET_WORDS * 50.0)
            .min(100.0);
        Self {
            turns,
            words,
            adequacy,
            is_sufficient: adequacy >= SUFFICIENT_ADEQUACY,
        }
    }
}

/// Advisory summary of a user's transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadinessReport {
    pub topics_covered: usize,
    pub total_turns: usize,
    pub total_words: usize,
    pub per_topic: BTreeMap<usize, TopicAdequacy>,
    pub is_ready: bool,
}

impl ReadinessReport {
    pub fn sufficient_topics(&self) -> usize {
        self.per_topic.values().filter(|t| t.is_sufficient).count()
    }
}

/// Where one catalog topic stands for a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicStatus {
    pub topic_index: usize,
    pub title: String,
    pub is_started: bool,
    pub is_completed: bool,
    /// Transcript entries recorded under the topic.
    pub conversation_count: usize,
    pub progress_percent: f64,
}

/// Per-topic completion and whether the autobiography may be composed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationStatus {
    pub can_generate: bool,
    pub completed_topics: usize,
    pub total_conversations: usize,
    /// One row per catalog topic, in catalog order.
    pub topics: Vec<TopicStatus>,
}

impl GenerationStatus {
    pub fn from_topics(topics: Vec<TopicStatus>) -> Self {
        let completed_topics = topics.iter().filter(|t| t.is_completed).count();
        let total_conversations = topics.iter().map(|t| t.conversation_count).sum();
        Self {
            can_generate: completed_topics >= MIN_COMPLETED_TOPICS
                && total_conversations >= MIN_CONVERSATIONS,
            completed_topics,
            total_conversations,
            topics,
        }
    }
}

/// Whitespace-separated words in the user's side of an entry.
fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Score every covered topic and decide whether compilation is worthwhile.
pub fn validate_conversations(entries: &[TranscriptEntry]) -> ReadinessReport {
    let mut counts: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
    for entry in entries {
        let slot = counts.entry(entry.topic_index).or_default();
        slot.0 += 1;
        slot.1 += word_count(&entry.user_utterance);
    }

    let per_topic: BTreeMap<usize, TopicAdequacy> = counts
        .into_iter()
        .map(|(index, (turns, words))| (index, TopicAdequacy::new(turns, words)))
        .collect();

    let total_turns = per_topic.values().map(|t| t.turns).sum();
    let total_words = per_topic.values().map(|t| t.words).sum();
    let sufficient = per_topic.values().filter(|t| t.is_sufficient).count();
    let topics_covered = per_topic.len();

    ReadinessReport {
        topics_covered,
        total_turns,
        total_words,
        is_ready: topics_covered >= MIN_COVERED_TOPICS
            && total_words >= MIN_TOTAL_WORDS
            && sufficient >= MIN_SUFFICIENT_TOPICS,
        per_topic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::ReplyKind;

    fn entries(topics: usize, turns: usize, words_per_turn: usize) -> Vec<TranscriptEntry> {
        let text = vec!["word"; words_per_turn].join(" ");
        (0..topics)
            .flat_map(|topic| {
                let text = text.clone();
                (0..turns).map(move |_| {
                    TranscriptEntry::new("u1", topic, "t", text.clone(), "q", ReplyKind::FollowUp)
                })
            })
            .collect()
    }

    #[test]
    fn empty_transcript_is_not_ready() {
        let report = validate_conversations(&[]);
        assert_eq!(report.topics_covered, 0);
        assert_eq!(report.total_words, 0);
        assert!(!report.is_ready);
    }

    #[test]
    fn adequacy_formula_and_cap() {
        let half = TopicAdequacy::new(5, 0);
        assert_eq!(half.adequacy, 50.0);
        assert!(!half.is_sufficient);

        let just = TopicAdequacy::new(5, 100);
        assert_eq!(just.adequacy, 60.0);
        assert!(just.is_sufficient);

        assert_eq!(TopicAdequacy::new(50, 5000).adequacy, 100.0);
    }

    #[test]
    fn sufficient_topics_but_too_few_words() {
        // Three topics, each at full adequacy, 1800 words in total.
        let report = validate_conversations(&entries(3, 10, 60));
        assert_eq!(report.topics_covered, 3);
        assert_eq!(report.total_words, 1800);
        assert_eq!(report.sufficient_topics(), 3);
        assert!(!report.is_ready);
    }

    #[test]
    fn enough_words_and_sufficient_topics_is_ready() {
        let report = validate_conversations(&entries(3, 10, 100));
        assert_eq!(report.total_words, 3000);
        assert_eq!(report.total_turns, 30);
        assert!(report.is_ready);
    }

    #[test]
    fn words_concentrated_in_two_topics_is_not_ready() {
        let mut all = entries(2, 10, 200);
        all.push(TranscriptEntry::new("u1", 5, "t", "just a few words", "q", ReplyKind::FollowUp));
        let report = validate_conversations(&all);
        assert_eq!(report.topics_covered, 3);
        assert!(report.total_words >= 3000);
        assert_eq!(report.sufficient_topics(), 2);
        assert!(!report.is_ready);
    }

    #[test]
    fn words_are_split_on_any_whitespace() {
        assert_eq!(word_count("  one\ttwo\nthree  "), 3);
        assert_eq!(word_count(""), 0);
    }

    fn topic_status(index: usize, completed: bool, conversations: usize) -> TopicStatus {
        TopicStatus {
            topic_index: index,
            title: format!("topic {index}"),
            is_started: conversations > 0,
            is_completed: completed,
            conversation_count: conversations,
            progress_percent: if completed { 100.0 } else { 0.0 },
        }
    }

    #[test]
    fn two_completed_topics_cannot_generate() {
        let status = GenerationStatus::from_topics(vec![
            topic_status(0, true, 15),
            topic_status(1, true, 15),
            topic_status(2, false, 5),
        ]);
        assert_eq!(status.completed_topics, 2);
        assert_eq!(status.total_conversations, 35);
        assert!(!status.can_generate);
    }

    #[test]
    fn three_completed_topics_with_twenty_turns_can_generate() {
        let status = GenerationStatus::from_topics(vec![
            topic_status(0, true, 7),
            topic_status(1, true, 7),
            topic_status(2, true, 6),
            topic_status(3, false, 0),
        ]);
        assert_eq!(status.completed_topics, 3);
        assert_eq!(status.total_conversations, 20);
        assert!(status.can_generate);
    }

    #[test]
    fn completed_topics_with_nineteen_turns_cannot_generate() {
        let status = GenerationStatus::from_topics(vec![
            topic_status(0, true, 7),
            topic_status(1, true, 6),
            topic_status(2, true, 6),
        ]);
        assert_eq!(status.total_conversations, 19);
        assert!(!status.can_generate);
    }
}
