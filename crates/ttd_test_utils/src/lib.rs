//! # TTD Test Utilities
//!
//! Shared testing utilities for the workspace crates:
//! - World fixtures with a company, stations, a depot and buildable engines
//! - Determinism and lockstep harnesses
//! - Property-based testing strategies for orders and commands

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;

/// Re-export proptest for convenience.
pub use proptest;
