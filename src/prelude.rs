//! Import everything a host embedding one agent's autonomy loop needs:
//!
//! ```ignore
//! use autonomy_engine::prelude::*;
//! ```

pub use crate::config::{ConfigOverrides, EngineConfig};
pub use crate::error::EngineError;
pub use crate::orchestrator::{
    AutonomySignalHook, CycleStatusInput, Engine, FinalizeParams, HookEvent, HookInput,
    NoopSignalHook, PrepareOutcome, PrepareParams, Prepared, Skipped,
};
pub use crate::phase::Stage;
pub use crate::types::{AgentState, Event, EventSource};

#[cfg(test)]
mod tests {
    #[test]
    fn test_prelude_imports_compile() {
        use super::*;

        let _config = EngineConfig::default();
        let _stage = Stage::Discover;
    }
}
