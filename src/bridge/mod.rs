//! Bridge to the external scan process.
//!
//! The scan process reads one JSON configuration line from stdin and writes
//! newline-delimited JSON events to stdout.
//!
//! - `codec`: bounded line framing for the output stream.
//! - `reader`: line → [`ScanEvent`](crate::models::event::ScanEvent) parsing and ordered delivery.
//! - `process`: child process lifetime, configuration hand-off and teardown.

pub mod codec;
pub mod process;
pub mod reader;

pub use process::{ProcessSpec, ScanProcessBridge};
