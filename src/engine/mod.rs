//! Container engine readiness.
//!
//! - `runner`: command execution and sleep seams.
//! - `commands`: platform-specific command catalogue.
//! - `probe`: read-only status queries.
//! - `bootstrap`: the install → start → build state machine.

pub mod bootstrap;
pub mod commands;
pub mod probe;
pub mod runner;
