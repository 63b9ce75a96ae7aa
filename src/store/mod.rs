//! Persistence layer: transcript and flow-state storage.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use memory::InMemoryTranscriptStore;
pub use traits::{TranscriptEntry, TranscriptStore};
