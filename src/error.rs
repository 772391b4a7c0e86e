//! Error taxonomy for the autonomy engine.
//!
//! Fallible public operations return `Result<T, EngineError>`. Subsystems
//! define their own narrower error type and fold into `EngineError` via
//! `#[from]`, mirroring how a production agent runtime nests its error types.

use thiserror::Error;

use crate::phase::Stage;

/// Top-level error type returned by every fallible `Engine`/`Store` method.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("skill forge error: {0}")]
    Forge(#[from] ForgeError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("illegal FSM transition requested: {from:?} -> {to:?}")]
    IllegalTransition { from: Stage, to: Stage },
}

/// Errors from the durable per-agent store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Errors from run-lock acquisition/release.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("run already in progress")]
    Contended,

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for LockError {
    fn from(e: std::io::Error) -> Self {
        LockError::Io(e.to_string())
    }
}

/// Errors from the Skill Forge (planner/synthesizer/verifier).
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("candidate {candidate} is missing explicit safety constraints")]
    MissingSafetyConstraints { candidate: String },

    #[error("generated skill file missing: {path}")]
    GeneratedFileMissing { path: String },

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ForgeError {
    fn from(e: std::io::Error) -> Self {
        ForgeError::Io(e.to_string())
    }
}

/// Errors from ledger append/read.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for LedgerError {
    fn from(e: std::io::Error) -> Self {
        LedgerError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}

/// Errors from configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("field {field} out of range: {value}")]
    OutOfRange { field: String, value: String },
}
