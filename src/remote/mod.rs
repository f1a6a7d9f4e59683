//! Remote configuration API: transport port and HTTP adapter.
//!
//! The reconciliation engine only ever sees the `ConfigTransport` port;
//! the HTTP adapter is wiring. Writers are stateless and idempotent given
//! the full merged payload.

pub mod contract;
pub mod http;
pub mod types;

pub use contract::ConfigTransport;
pub use http::HttpConfigTransport;
pub use types::{KnowledgeBase, Voice};
