//! Common test utilities for eventgraph-compiler
//!
//! Shared fixtures and builders for integration tests.

#![allow(dead_code)]

mod builders;
mod fixtures;

// Re-export all utilities
pub use builders::*;
pub use fixtures::*;
