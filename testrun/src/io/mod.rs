//! I/O helpers for testrun commands.

pub mod artifacts;
pub mod config;
pub mod engine;
pub mod history;
pub mod indented;
pub mod process;
