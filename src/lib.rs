//! Per-agent autonomy control loop.
//!
//! Drains external signals, advances a nine-stage self-augmentation FSM,
//! generates and verifies candidate skills via the Skill Forge, enforces
//! safety policy on stage transitions, and records every transition and
//! decision to a tamper-evident append-only ledger.

pub mod canary;
pub mod config;
pub mod error;
pub mod eval;
pub mod forge;
pub mod fswrite;
pub mod gaps;
pub mod ledger;
pub mod orchestrator;
pub mod phase;
pub mod policy;
pub mod prelude;
pub mod signal;
pub mod store;
pub mod timekeys;
pub mod types;

pub use config::{ConfigOverrides, EngineConfig};
pub use error::EngineError;
pub use orchestrator::{
    AutonomySignalHook, CycleStatusInput, Engine, FinalizeParams, NoopSignalHook, PrepareOutcome,
    PrepareParams, Prepared, Skipped,
};

/// Install a `tracing_subscriber::fmt` subscriber honoring `RUST_LOG`,
/// defaulting to `info`. Optional: a host embedding one or more [`Engine`]s is
/// free to install its own subscriber instead; this just saves the
/// boilerplate for hosts that don't already have one.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();
}
