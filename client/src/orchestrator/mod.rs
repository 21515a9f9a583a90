//! Orchestrator - the marketplace flow engine
//!
//! Drives registration, subscribe, and create-product flows through an
//! explicit state machine over one ledger connection.
//!
//! See `engine.rs` for full implementation.

pub mod engine;

// Re-export main types for convenience
pub use engine::{
    EngineConfig, FlowEngine, FlowError, FlowKind, FlowProgress, FlowState, FlowStep, Notice,
};
