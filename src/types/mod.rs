//! Shape of state, events, gaps, candidates, and ledger entries.

pub mod candidate;
pub mod event;
pub mod gap;
pub mod ids;
pub mod ledger;
pub mod state;

pub use candidate::{CandidateSafety, CandidateStatus, ExecutionClass, SkillCandidate};
pub use event::{EnqueueEventParams, Event, EventSource};
pub use gap::{Gap, GapCategory, GapStatus};
pub use ids::normalize_agent_id;
pub use ledger::{LedgerEntry, LedgerEventType};
pub use state::{
    AgentState, Approval, Augmentation, Budget, CycleRecord, CycleStatus, Goal, Metrics,
    PauseReason, Review, Task, TaskStatus, Transition,
};
