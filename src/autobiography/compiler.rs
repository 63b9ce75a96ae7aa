//! Narrative compiler: turns the interview transcript into a chaptered book.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::error::LlmError;
use crate::interview::ReplyKind;
use crate::llm::LlmProvider;
use crate::store::TranscriptEntry;

/// User answers shorter than this (in characters) carry their question as context.
const SHORT_ANSWER_CHARS: usize = 50;
/// Questions quoted as context are cut to this many characters.
const QUESTION_EXCERPT_CHARS: usize = 100;

/// Who the book is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub full_name: Option<String>,
    pub birth_year: Option<i32>,
}

impl AuthorProfile {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: Some(full_name.into()),
            birth_year: None,
        }
    }

    pub fn with_birth_year(mut self, year: i32) -> Self {
        self.birth_year = Some(year);
        self
    }

    fn name(&self) -> Option<&str> {
        self.full_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// Book title, e.g. "Kim Younghee's Story" or "My Story".
    pub fn book_title(&self) -> String {
        match self.name() {
            Some(name) => format!("{name}'s Story"),
            None => "My Story".to_string(),
        }
    }
}

/// One exchange inside a topic group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user: String,
    pub system: String,
    pub kind: ReplyKind,
    pub created_at: DateTime<Utc>,
}

/// All exchanges for one topic, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTranscript {
    pub title: String,
    pub exchanges: Vec<Exchange>,
}

/// Group entries by topic index, chronological within each topic.
///
/// Topics without entries are absent from the map.
pub fn group_by_topic(entries: &[TranscriptEntry]) -> BTreeMap<usize, TopicTranscript> {
    let mut grouped: BTreeMap<usize, TopicTranscript> = BTreeMap::new();
    for entry in entries {
        grouped
            .entry(entry.topic_index)
            .or_insert_with(|| TopicTranscript {
                title: entry.topic_title.clone(),
                exchanges: Vec::new(),
            })
            .exchanges
            .push(Exchange {
                user: entry.user_utterance.clone(),
                system: entry.system_utterance.clone(),
                kind: entry.kind,
                created_at: entry.created_at,
            });
    }
    for topic in grouped.values_mut() {
        // Stable, so same-instant entries keep their stored order.
        topic.exchanges.sort_by_key(|e| e.created_at);
    }
    grouped
}

/// Instruction and material handed to the text-generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    /// Persona and writing rules, naming the author.
    pub instruction: String,
    /// The interview material, one section per topic.
    pub material: String,
}

/// Build the synthesis request for a grouped transcript.
pub fn build_synthesis_request(
    grouped: &BTreeMap<usize, TopicTranscript>,
    author: &AuthorProfile,
    catalog: &Catalog,
) -> SynthesisRequest {
    let name = author.name().unwrap_or("Anonymous");
    let birth_year = author
        .birth_year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let instruction = format!(
        "You are a professional autobiography writer.\n\
         Using the interview below, write a moving, well-structured autobiography.\n\n\
         About the author:\n\
         - Name: {name}\n\
         - Birth year: {birth_year}\n\n\
         Writing guidelines:\n\
         1. Write in the first person (I, me, my).\n\
         2. Follow chronological order while keeping a natural flow.\n\
         3. Bring concrete episodes and emotions to life.\n\
         4. Use each interview topic title, unchanged, as a chapter title.\n\
         5. Use a literary yet honest voice.\n\
         6. Help the reader understand and empathize with the author's life.\n\
         7. Write two to four pages per chapter.\n\n\
         Format:\n\
         - Start each chapter with a markdown '## ' heading.\n\
         - Break the text into readable paragraphs."
    );

    let mut material = String::from("Here is the interview. Please write the autobiography from it:\n\n");
    for (index, topic) in grouped {
        let (title, objective) = match catalog.get(*index) {
            Ok(t) => (t.title.as_str(), t.objective.as_str()),
            Err(_) => (topic.title.as_str(), ""),
        };
        let _ = writeln!(material, "\n## {title}");
        let _ = writeln!(material, "Topic description: {objective}\n");
        material.push_str("Conversation:\n");
        for exchange in topic.exchanges.iter().filter(|e| !e.user.is_empty()) {
            let _ = writeln!(material, "- My story: {}", exchange.user);
            if exchange.user.chars().count() < SHORT_ANSWER_CHARS {
                let excerpt: String = exchange.system.chars().take(QUESTION_EXCERPT_CHARS).collect();
                let _ = writeln!(material, "  (Question: {excerpt}...)");
            }
        }
        material.push('\n');
    }
    material.push_str(
        "\nPlease write a natural and moving autobiography based on the interview above.",
    );

    SynthesisRequest {
        instruction,
        material,
    }
}

/// Wrap a generated body with title, date, table of contents and epilogue.
///
/// The table of contents always lists every catalog topic.
pub fn post_process(raw: &str, author: &AuthorProfile, catalog: &Catalog, date: NaiveDate) -> String {
    let mut book = String::new();
    let _ = write!(book, "# {}\n\n", author.book_title());
    let _ = write!(book, "*Written on: {}*\n\n---\n\n", date.format("%B %-d, %Y"));

    book.push_str("## Contents\n\n");
    for topic in catalog.topics() {
        let _ = writeln!(book, "- {}", topic.title);
    }
    book.push_str("\n---\n\n");

    book.push_str(raw);

    let credited = author.name().unwrap_or("the author");
    let _ = write!(
        book,
        "\n\n---\n\n*This autobiography was written from the spoken recollections of {credited}.*"
    );
    book
}

/// Transcript-only draft used when prose synthesis is unavailable.
pub fn draft_body(grouped: &BTreeMap<usize, TopicTranscript>) -> String {
    let mut body = String::new();
    for topic in grouped.values() {
        let paragraphs: Vec<&str> = topic
            .exchanges
            .iter()
            .map(|e| e.user.trim())
            .filter(|u| !u.is_empty())
            .collect();
        if paragraphs.is_empty() {
            continue;
        }
        let _ = write!(body, "## {}\n\n", topic.title);
        body.push_str(&paragraphs.join("\n\n"));
        body.push_str("\n\n");
    }
    body.trim_end().to_string()
}

/// A compiled book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Narrative {
    pub text: String,
    /// False when the body is the transcript-only draft.
    pub synthesized: bool,
}

/// Compiles transcripts into narratives through an optional text-generation service.
pub struct NarrativeCompiler {
    llm: Option<Arc<dyn LlmProvider>>,
    catalog: Arc<Catalog>,
}

impl NarrativeCompiler {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>, catalog: Arc<Catalog>) -> Self {
        Self { llm, catalog }
    }

    /// Compile `entries` into a finished book dated today.
    pub async fn compile(&self, entries: &[TranscriptEntry], author: &AuthorProfile) -> Narrative {
        self.compile_on(entries, author, Utc::now().date_naive()).await
    }

    /// Compile with an explicit date stamp.
    pub async fn compile_on(
        &self,
        entries: &[TranscriptEntry],
        author: &AuthorProfile,
        date: NaiveDate,
    ) -> Narrative {
        let grouped = group_by_topic(entries);
        info!(topics = grouped.len(), entries = entries.len(), "Compiling autobiography");

        let (body, synthesized) = match self.synthesize(&grouped, author).await {
            Ok(body) => (body, true),
            Err(e) => {
                warn!(error = %e, "Synthesis unavailable, compiling transcript-only draft");
                (draft_body(&grouped), false)
            }
        };

        Narrative {
            text: post_process(&body, author, &self.catalog, date),
            synthesized,
        }
    }

    async fn synthesize(
        &self,
        grouped: &BTreeMap<usize, TopicTranscript>,
        author: &AuthorProfile,
    ) -> Result<String, LlmError> {
        let llm = self.llm.as_ref().ok_or(LlmError::NotConfigured)?;

        let request = build_synthesis_request(grouped, author, &self.catalog);
        let text = llm
            .generate(&request.material, Some(&request.instruction))
            .await?;
        if text.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: llm.model_name().to_string(),
                reason: "empty synthesis".to_string(),
            });
        }
        info!(model = llm.model_name(), chars = text.len(), "Autobiography synthesized");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;

    use std::sync::Mutex;

    use crate::llm::{CompletionRequest, CompletionResponse, FinishReason, Role};

    fn entry(topic: usize, user: &str, system: &str, offset_secs: i64) -> TranscriptEntry {
        let catalog = Catalog::builtin();
        let mut e = TranscriptEntry::new(
            "u1",
            topic,
            catalog.get(topic).unwrap().title.clone(),
            user,
            system,
            ReplyKind::FollowUp,
        );
        e.created_at = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
            + Duration::seconds(offset_secs);
        e
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn group_by_topic_orders_topics_and_time() {
        let entries = vec![
            entry(2, "teen b", "q", 30),
            entry(0, "root a", "q", 10),
            entry(2, "teen a", "q", 20),
        ];
        let grouped = group_by_topic(&entries);
        assert_eq!(grouped.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
        let teen: Vec<&str> = grouped[&2].exchanges.iter().map(|e| e.user.as_str()).collect();
        assert_eq!(teen, vec!["teen a", "teen b"]);
        assert!(!grouped.contains_key(&1));
    }

    #[test]
    fn synthesis_request_includes_question_only_for_short_answers() {
        let long_answer = "We lived in a house with a persimmon tree in the yard and three dogs.";
        let long_question = "q".repeat(150);
        let entries = vec![
            entry(0, "Jinju", &long_question, 1),
            entry(0, long_answer, "Where was the house?", 2),
            entry(0, "", "Opening line", 0),
        ];
        let catalog = Catalog::builtin();
        let request = build_synthesis_request(
            &group_by_topic(&entries),
            &AuthorProfile::new("Kim Younghee").with_birth_year(1948),
            &catalog,
        );

        assert!(request.instruction.contains("Kim Younghee"));
        assert!(request.instruction.contains("1948"));
        assert!(request.instruction.contains("first person"));

        let text = request.material;
        assert!(text.contains(&format!("## {}", catalog.get(0).unwrap().title)));
        assert!(text.contains(&catalog.get(0).unwrap().objective));
        assert!(text.contains("- My story: Jinju"));
        assert!(text.contains(&format!("(Question: {}...)", "q".repeat(100))));
        assert!(!text.contains(&"q".repeat(101)));
        assert!(text.contains(&format!("- My story: {long_answer}")));
        assert!(!text.contains("Where was the house?"));
        assert!(!text.contains("Opening line"));
    }

    #[test]
    fn anonymous_author() {
        let request = build_synthesis_request(&BTreeMap::new(), &AuthorProfile::default(), &Catalog::builtin());
        assert!(request.instruction.contains("Name: Anonymous"));
        assert!(request.instruction.contains("Birth year: Unknown"));
        assert_eq!(AuthorProfile::default().book_title(), "My Story");
        assert_eq!(AuthorProfile::new("  ").book_title(), "My Story");
    }

    #[test]
    fn post_process_layout() {
        let catalog = Catalog::builtin();
        let book = post_process("BODY", &AuthorProfile::new("Kim"), &catalog, date());

        assert!(book.starts_with("# Kim's Story\n\n*Written on: March 9, 2024*\n\n---\n\n## Contents\n\n"));
        for topic in catalog.topics() {
            assert!(book.contains(&format!("- {}\n", topic.title)));
        }
        let body_at = book.find("BODY").unwrap();
        assert!(book[..body_at].ends_with("\n---\n\n"));
        assert!(book.ends_with("spoken recollections of Kim.*"));
    }

    #[test]
    fn draft_body_uses_user_paragraphs() {
        let entries = vec![
            entry(1, "", "opening", 0),
            entry(1, "I had a red bicycle.", "q", 1),
            entry(1, "My friend Sunja rode it too.", "q", 2),
        ];
        let draft = draft_body(&group_by_topic(&entries));
        let catalog = Catalog::builtin();
        let title = &catalog.get(1).unwrap().title;
        assert_eq!(
            draft,
            format!("## {title}\n\nI had a red bicycle.\n\nMy friend Sunja rode it too.")
        );
    }

    struct FixedLlm {
        reply: Result<String, ()>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl FixedLlm {
        fn new(reply: Result<String, ()>) -> Self {
            Self {
                reply,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for FixedLlm {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.seen.lock().unwrap().push(request);
            match &self.reply {
                Ok(text) => Ok(CompletionResponse {
                    content: text.clone(),
                    input_tokens: 10,
                    output_tokens: 20,
                    finish_reason: FinishReason::Stop,
                }),
                Err(()) => Err(LlmError::RateLimited {
                    provider: "fixed".to_string(),
                    retry_after: None,
                }),
            }
        }
    }

    fn compiler(llm: Option<Arc<dyn LlmProvider>>) -> NarrativeCompiler {
        NarrativeCompiler::new(llm, Arc::new(Catalog::builtin()))
    }

    #[tokio::test]
    async fn compile_wraps_generated_prose() {
        let fixed = Arc::new(FixedLlm::new(Ok("## Chapter\n\nOnce I was young.".to_string())));
        let llm: Arc<dyn LlmProvider> = fixed.clone();
        let narrative = compiler(Some(llm))
            .compile_on(&[entry(0, "Jinju", "q", 0)], &AuthorProfile::new("Kim"), date())
            .await;
        assert!(narrative.synthesized);
        assert!(narrative.text.contains("Once I was young."));
        assert!(narrative.text.starts_with("# Kim's Story"));

        // One prompt: the writing instructions as system text, the material as the user turn.
        let seen = fixed.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let roles: Vec<Role> = seen[0].messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);
        assert!(seen[0].messages[0].content.contains("Kim"));
        assert!(seen[0].messages[1].content.contains("Jinju"));
    }

    #[tokio::test]
    async fn blank_synthesis_falls_back_to_draft() {
        let llm: Arc<dyn LlmProvider> = Arc::new(FixedLlm::new(Ok("  \n".to_string())));
        let narrative = compiler(Some(llm))
            .compile_on(&[entry(0, "Jinju", "q", 0)], &AuthorProfile::new("Kim"), date())
            .await;
        assert!(!narrative.synthesized);
        assert!(narrative.text.contains("Jinju"));
    }

    #[tokio::test]
    async fn compile_degrades_without_generation() {
        let entries = [entry(0, "I was born in Jinju.", "q", 0)];
        for llm in [None, Some(Arc::new(FixedLlm::new(Err(()))) as Arc<dyn LlmProvider>)] {
            let narrative = compiler(llm)
                .compile_on(&entries, &AuthorProfile::default(), date())
                .await;
            assert!(!narrative.synthesized);
            assert!(narrative.text.starts_with("# My Story"));
            assert!(narrative.text.contains("I was born in Jinju."));
        }
    }
}
