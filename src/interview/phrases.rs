//! Fixed interviewer phrasing and the picker that chooses among variants.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Follow-up prompts, chosen round-robin by `follow_up_count % len`.
pub const FOLLOW_UP_TEMPLATES: [&str; 7] = [
    "How did you feel at that time?",
    "How did that experience affect you?",
    "Could you tell me about that moment in more detail?",
    "How did the people around you react back then?",
    "What changed after that happened?",
    "Thinking back now, what do you suppose was on your mind then?",
    "What did you learn from an experience like that?",
];

/// Acknowledgements placed before a follow-up. Chosen at random.
pub const EMPATHY_PHRASES: [&str; 5] = [
    "What a precious story.",
    "So that is what you went through.",
    "Thank you for sharing that with me.",
    "Ah, I see.",
    "That is a truly moving story.",
];

/// Lead-in before the next scripted question.
pub const TRANSITION_PHRASE: &str = "Shall we move on to the next part of your story?";

pub fn opening(topic_title: &str) -> String {
    format!(
        "Hello, I am your Guide of Memories. I am here to listen closely to the precious \
         story of your life and help record it as a beautiful autobiography. I will walk \
         beside you as your guide, so please simply speak as comfortably as you would with \
         an old friend.\n\n\
         Today I would like to talk with you about '{topic_title}'. \
         Whenever you are ready, please begin."
    )
}

pub fn closing(topic_title: &str, next_topic_title: Option<&str>) -> String {
    let mut closing = format!(
        "Thanks to your precious experiences, I now understand '{topic_title}' much more deeply."
    );
    if let Some(next) = next_topic_title {
        closing.push_str(&format!(" Next time, I would love to hear about '{next}'."));
    }
    closing.push_str(" Thank you so much for sharing your story with me today.");
    closing
}

/// Chooses an index among `len` phrase variants.
///
/// Production uses `RandomPhrasePicker`; tests inject `SequencePicker` for
/// reproducible output.
pub trait PhrasePicker: Send + Sync {
    /// Return an index in `0..len`. `len` is never zero.
    fn pick(&self, len: usize) -> usize;
}

/// Uniform random choice, optionally seeded.
pub struct RandomPhrasePicker {
    rng: Mutex<StdRng>,
}

impl RandomPhrasePicker {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomPhrasePicker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhrasePicker for RandomPhrasePicker {
    fn pick(&self, len: usize) -> usize {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(0..len),
            // A panic elsewhere poisoned the lock; any valid index will do.
            Err(_) => 0,
        }
    }
}

/// Replays a fixed sequence of choices, wrapping around, each reduced modulo `len`.
pub struct SequencePicker {
    sequence: Vec<usize>,
    cursor: Mutex<usize>,
}

impl SequencePicker {
    pub fn new(sequence: Vec<usize>) -> Self {
        Self {
            sequence,
            cursor: Mutex::new(0),
        }
    }

    /// Always picks the first variant.
    pub fn first() -> Self {
        Self::new(vec![0])
    }
}

impl PhrasePicker for SequencePicker {
    fn pick(&self, len: usize) -> usize {
        if self.sequence.is_empty() {
            return 0;
        }
        let mut cursor = match self.cursor.lock() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        };
        let choice = self.sequence[*cursor % self.sequence.len()];
        *cursor += 1;
        choice % len
    }
}
