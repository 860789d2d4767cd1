//! fetchdesk library
//!
//! Exposes the cache, fetch orchestration, enrichment and todo modules for
//! the binary and for integration tests.

pub mod app;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod data;
pub mod logging;
pub mod orchestrator;
pub mod random;
pub mod render;
pub mod todo;
