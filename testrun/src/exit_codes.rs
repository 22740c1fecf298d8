//! Stable exit codes for testrun CLI commands.

/// Command succeeded; for `testrun run`, every executed test passed or was skipped.
pub const OK: i32 = 0;
/// `testrun run` completed but at least one test failed.
pub const TESTS_FAILED: i32 = 1;
/// Invalid configuration or arguments, unreadable history, engine spawn or
/// output failures, and other errors.
pub const ERROR: i32 = 2;
