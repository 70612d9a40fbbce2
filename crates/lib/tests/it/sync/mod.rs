//! Sync integration tests
//!
//! These tests drive the poll scheduler and the client over the scripted
//! transport.

mod client_tests;
mod scheduler_tests;
