//! Incremental test orchestration for compiled units.
//!
//! A run decides per unit whether its cached results from the previous run can
//! be trusted, executes the rest through an external engine, and renders the
//! engine's lifecycle events as an indented console report. The architecture
//! enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (history model, selection,
//!   scopes, failures, aggregation, event dispatch). No I/O.
//! - **[`io`]**: Side-effecting operations (history file, configuration,
//!   artifact timestamps, engine processes, console output).
//!
//! [`reporter`] and [`run`] coordinate the two for a single invocation.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod reporter;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
