//! Deterministic, pure logic shared by the test orchestrator.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod aggregate;
pub mod events;
pub mod failure;
pub mod filter;
pub mod history;
pub mod scope;
pub mod selector;
pub mod types;
