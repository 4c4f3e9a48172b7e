//! Maestro CLI library: command implementations shared by the `maestro`
//! binary and its integration tests.

pub mod commands;
