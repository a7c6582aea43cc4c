#![forbid(unsafe_code)]

//! Container bootstrap and scan-process bridge for the Inferno terminal
//! client.
//!
//! Brings the local container engine to a ready state, then supervises one
//! external scan process per session and streams its events.

pub mod bridge;
pub mod config;
pub mod engine;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod stream;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
