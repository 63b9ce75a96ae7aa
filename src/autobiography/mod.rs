//! Autobiography compilation: readiness scoring and narrative synthesis.

pub mod compiler;
pub mod readiness;

pub use compiler::{
    AuthorProfile, Narrative, NarrativeCompiler, SynthesisRequest, TopicTranscript,
    build_synthesis_request, group_by_topic, post_process,
};
pub use readiness::{
    GenerationStatus, MIN_COMPLETED_TOPICS, MIN_CONVERSATIONS, ReadinessReport, TopicAdequacy,
    TopicStatus, validate_conversations,
};
