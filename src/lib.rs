//! Attune: Update Reconciliation for Remote Agent Configuration
//!
//! An editing core for a voice-agent configuration that lives behind two
//! whole-object remote endpoints (the root agent record and its nested LLM
//! record). Edits apply optimistically to an in-memory model, coalesce into
//! one write per namespace per settle window, and roll back when a write
//! fails.

pub mod coalescer;
pub mod config;
pub mod engine;
pub mod error;
pub mod field;
pub mod logging;
pub mod model;
pub mod remote;
