//! Curriculum catalog: the fixed, ordered list of interview topics.
//!
//! The catalog is built once at startup (either the built-in twelve-topic
//! curriculum or a JSON file) and shared read-only behind an `Arc`.

mod topics;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CatalogError;

/// One interview topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Position in the catalog.
    pub index: usize,
    pub title: String,
    /// What the interviewer is trying to learn in this topic.
    pub objective: String,
    /// Scripted questions, asked in order.
    pub questions: Vec<String>,
}

/// On-disk form of a topic. The index is implied by position.
#[derive(Debug, Deserialize)]
struct TopicFile {
    title: String,
    objective: String,
    questions: Vec<String>,
}

/// Immutable ordered list of topics.
#[derive(Debug, Clone)]
pub struct Catalog {
    topics: Vec<Topic>,
}

impl Catalog {
    /// The built-in twelve-topic life-story curriculum.
    pub fn builtin() -> Self {
        let topics = topics::BUILTIN_TOPICS
            .iter()
            .enumerate()
            .map(|(index, (title, objective, questions))| Topic {
                index,
                title: (*title).to_string(),
                objective: (*objective).to_string(),
                questions: questions.iter().map(|q| (*q).to_string()).collect(),
            })
            .collect();
        Self { topics }
    }

    /// Build a catalog from `(title, objective, questions)` triples.
    pub fn from_topics<I>(items: I) -> Self
    where
        I: IntoIterator<Item = (String, String, Vec<String>)>,
    {
        let topics = items
            .into_iter()
            .enumerate()
            .map(|(index, (title, objective, questions))| Topic {
                index,
                title,
                objective,
                questions,
            })
            .collect();
        Self { topics }
    }

    /// Parse a JSON array of `{title, objective, questions}` objects.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let files: Vec<TopicFile> =
            serde_json::from_str(json).map_err(|e| CatalogError::Load(e.to_string()))?;
        if files.is_empty() {
            return Err(CatalogError::Load("catalog has no topics".to_string()));
        }
        if let Some(pos) = files.iter().position(|t| t.questions.is_empty()) {
            return Err(CatalogError::Load(format!("topic {pos} has no questions")));
        }
        Ok(Self::from_topics(
            files
                .into_iter()
                .map(|t| (t.title, t.objective, t.questions)),
        ))
    }

    /// Load a catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Load(format!("{}: {e}", path.display())))?;
        let catalog = Self::from_json(&json)?;
        info!(path = %path.display(), topics = catalog.len(), "Catalog loaded");
        Ok(catalog)
    }

    /// Look up a topic by index.
    pub fn get(&self, index: usize) -> Result<&Topic, CatalogError> {
        self.topics.get(index).ok_or(CatalogError::IndexOutOfRange {
            index,
            len: self.topics.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Title of the topic after `index`, or `None` at the end of the curriculum.
    pub fn next_title(&self, index: usize) -> Option<&str> {
        self.topics.get(index + 1).map(|t| t.title.as_str())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
