//! Crewline CLI library: command implementations shared by the `crewline`
//! binary and its integration tests.

pub mod commands;
