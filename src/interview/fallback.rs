//! Fallback responders: what the interviewer says when the script has nothing.
//!
//! Two implementations behind one trait: `StaticFallback` draws from fixed
//! tables, `GenerativeFallback` asks the text-generation service and drops
//! back to the static tables when generation is unavailable.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::catalog::Topic;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

use super::model::HistoryTurn;
use super::phrases::PhrasePicker;

/// Persona instruction shared by every generated interviewer response.
pub const MEMORY_GUIDE_SYSTEM_PROMPT: &str = "\
You are the 'Guide of Memories', a warm and patient interviewer helping an elderly person \
tell the story of their life so it can become an autobiography.

Guidelines:
- Speak gently, respectfully, and in plain words. Keep each reply to 2-3 sentences.
- Acknowledge what the person shared before asking anything new.
- Ask only ONE question at a time, about concrete scenes, people, and feelings.
- Never judge, correct, or rush. If a memory is painful, offer comfort first.
- Stay within the current topic unless the person leads elsewhere.";

/// Reply for very short utterances when no topic-specific table applies.
pub const SHORT_ANSWER_PROMPT: &str = "I would love to hear a little more. \
Please feel free to tell me how you felt, or what happened, in your own words.";

/// Utterances shorter than this many characters get `SHORT_ANSWER_PROMPT`.
const SHORT_ANSWER_CHARS: usize = 10;

const GENERAL_RESPONSES: [&str; 7] = [
    "What a precious story. Could you tell me a little more about how you felt at the time?",
    "So that is what you went through. I wonder how it affected your life back then.",
    "Thank you for telling me. What made that moment so special?",
    "That is a truly moving story. If you learned something from that experience, what was it?",
    "You went through such a hard time. How did you overcome those difficulties?",
    "What a beautiful memory. Could you tell me more about the happy moments of that time?",
    "That must have been a meaningful time. What does that experience mean to you today?",
];

/// Topic-specific prompts for the opening topics, keyed by topic index.
fn topic_responses(topic_index: usize) -> Option<&'static [&'static str]> {
    match topic_index {
        0 => Some(&[
            "What did the neighbourhood you grew up in look like?",
            "Who in your family do you remember most vividly?",
            "What was your favourite game when you were little?",
        ]),
        1 => Some(&[
            "Which teacher from your early school years do you remember best?",
            "Could you tell me about a memory with your closest childhood friend?",
            "When was the most exciting moment of those years?",
        ]),
        2 => Some(&[
            "What future did you dream of in your school years?",
            "What was the hardest thing about being a teenager for you?",
            "Was there an activity you threw yourself into back then?",
        ]),
        _ => None,
    }
}

/// Everything a fallback responder may look at.
#[derive(Debug, Clone)]
pub struct FallbackContext {
    pub topic: Topic,
    pub utterance: String,
    /// Most recent exchanges, oldest first.
    pub history: Vec<HistoryTurn>,
}

/// Produces a free-form interviewer reply. Never fails.
#[async_trait]
pub trait FallbackResponder: Send + Sync {
    fn name(&self) -> &str;

    async fn respond(&self, ctx: &FallbackContext) -> String;
}

/// Fixed-table responder. Works with no collaborator at all.
pub struct StaticFallback {
    picker: Arc<dyn PhrasePicker>,
}

impl StaticFallback {
    pub fn new(picker: Arc<dyn PhrasePicker>) -> Self {
        Self { picker }
    }

    /// Pick a reply for `utterance` within topic `topic_index`.
    pub fn choose(&self, topic_index: usize, utterance: &str) -> String {
        if let Some(table) = topic_responses(topic_index) {
            return table[self.picker.pick(table.len())].to_string();
        }
        if utterance.chars().count() < SHORT_ANSWER_CHARS {
            return SHORT_ANSWER_PROMPT.to_string();
        }
        GENERAL_RESPONSES[self.picker.pick(GENERAL_RESPONSES.len())].to_string()
    }
}

#[async_trait]
impl FallbackResponder for StaticFallback {
    fn name(&self) -> &str {
        "static"
    }

    async fn respond(&self, ctx: &FallbackContext) -> String {
        self.choose(ctx.topic.index, &ctx.utterance)
    }
}

/// Generation-backed responder with a static safety net.
pub struct GenerativeFallback {
    llm: Arc<dyn LlmProvider>,
    fallback: StaticFallback,
    history_window: usize,
}

impl GenerativeFallback {
    pub fn new(llm: Arc<dyn LlmProvider>, fallback: StaticFallback, history_window: usize) -> Self {
        Self {
            llm,
            fallback,
            history_window,
        }
    }

    fn build_request(&self, ctx: &FallbackContext) -> CompletionRequest {
        let system = format!(
            "{MEMORY_GUIDE_SYSTEM_PROMPT}\n\n\
             Current topic: {}\n\
             Topic objective: {}\n\n\
             Respond as the Guide of Memories to what the person just said.",
            ctx.topic.title, ctx.topic.objective
        );

        let mut messages = vec![ChatMessage::system(system)];
        let skip = ctx.history.len().saturating_sub(self.history_window);
        for turn in ctx.history.iter().skip(skip) {
            if !turn.user.is_empty() {
                messages.push(ChatMessage::user(turn.user.as_str()));
            }
            if !turn.system.is_empty() {
                messages.push(ChatMessage::assistant(turn.system.as_str()));
            }
        }
        messages.push(ChatMessage::user(ctx.utterance.as_str()));

        CompletionRequest::new(messages)
            .with_temperature(0.7)
            .with_max_tokens(256)
    }
}

#[async_trait]
impl FallbackResponder for GenerativeFallback {
    fn name(&self) -> &str {
        "generative"
    }

    async fn respond(&self, ctx: &FallbackContext) -> String {
        let request = self.build_request(ctx);
        match self.llm.complete(request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                debug!(model = self.llm.model_name(), "Generated contextual response");
                response.content
            }
            Ok(_) => {
                warn!(model = self.llm.model_name(), "Empty contextual response, using static fallback");
                self.fallback.choose(ctx.topic.index, &ctx.utterance)
            }
            Err(e) => {
                warn!(error = %e, "Contextual generation unavailable, using static fallback");
                self.fallback.choose(ctx.topic.index, &ctx.utterance)
            }
        }
    }
}
