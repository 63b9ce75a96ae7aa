//! Interview flow: the per-turn state machine and its collaborators.

pub mod controller;
pub mod fallback;
pub mod model;
pub mod phrases;
pub mod recovery;
pub mod service;
pub mod state;
pub mod store;

pub use controller::{FlowController, PendingTurn};
pub use fallback::{FallbackContext, FallbackResponder, GenerativeFallback, StaticFallback};
pub use model::{HistoryTurn, ReplyKind, TurnReply, TurnRequest};
pub use phrases::{PhrasePicker, RandomPhrasePicker, SequencePicker};
pub use recovery::recover_flow_state;
pub use service::{InterviewService, TurnOutcome};
pub use state::{FlowPhase, FlowProgress, SessionFlowState, SessionKey};
pub use store::{FlowStateStore, InMemoryFlowStore, SessionLocks};
