//! CLI integration tests.
//!
//! Each test runs the real binary against settings whose commands manage a
//! file inside a temporary directory.

mod common;
mod config_tests;
mod lifecycle_tests;
