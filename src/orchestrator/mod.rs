//! Session orchestration.
//!
//! Covers the scan session lifecycle: environment readiness, configuration
//! hand-off and event streaming.

pub mod session;

pub use session::{SessionController, SessionObserver};
