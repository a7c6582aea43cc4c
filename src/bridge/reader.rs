//! Scan process output reader.
//!
//! Frames the child's stdout into lines with [`EventLineCodec`], parses each
//! line into a [`ScanEvent`] and hands events to the consumer one at a
//! time, in arrival order.
//!
//! Blank lines, non-JSON diagnostics and JSON that matches no event variant
//! are dropped and logged at `DEBUG`. Once a terminal event (`complete` or
//! `error`) has been delivered, later lines are dropped too.

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bridge::codec::EventLineCodec;
use crate::models::event::ScanEvent;
use crate::AppError;

/// How the output stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The producer closed its output.
    Eof,
    /// The cancellation token fired.
    Cancelled,
    /// Reading failed with an I/O error.
    Failed(String),
}

/// Summary of one pump over an output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpReport {
    /// Why the pump stopped.
    pub end: StreamEnd,
    /// Number of events handed to the consumer.
    pub delivered: usize,
    /// A `complete` or `error` event was handed to the consumer.
    pub terminal_delivered: bool,
}

/// Parse one output line into a [`ScanEvent`].
///
/// Returns `None` for blank lines and for anything that is not a single
/// well-formed event object.
#[must_use]
pub fn parse_event_line(line: &str) -> Option<ScanEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<ScanEvent>(trimmed) {
        Ok(event) => Some(event),
        Err(err) => {
            debug!(error = %err, raw_line = trimmed, "scan reader: discarding non-event line");
            None
        }
    }
}

/// Read `stdout` to the end, delivering parsed events to `on_event`.
///
/// Checks `cancel` before every line; once it fires no further events are
/// delivered even if output is still buffered.
pub async fn pump_events<R, F>(
    stdout: R,
    on_event: &mut F,
    cancel: &CancellationToken,
) -> PumpReport
where
    R: AsyncRead + Unpin,
    F: FnMut(ScanEvent),
{
    let mut framed = FramedRead::new(stdout, EventLineCodec::new());
    let mut delivered = 0usize;
    let mut terminal_delivered = false;
    // FramedRead yields one `None` after a decoder error before resuming.
    let mut resume_after_error = false;

    let end = loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("scan reader: cancellation received, stopping");
                break StreamEnd::Cancelled;
            }

            item = framed.next() => {
                match item {
                    None if resume_after_error => {
                        resume_after_error = false;
                    }

                    None => {
                        debug!(delivered, "scan reader: EOF detected");
                        break StreamEnd::Eof;
                    }

                    Some(Err(AppError::Bridge(ref msg))) => {
                        debug!(error = msg.as_str(), "scan reader: framing error, skipping");
                        resume_after_error = true;
                    }

                    Some(Err(e)) => {
                        debug!(error = %e, "scan reader: IO error, stopping");
                        break StreamEnd::Failed(e.to_string());
                    }

                    Some(Ok(line)) => {
                        resume_after_error = false;
                        let Some(event) = parse_event_line(&line) else {
                            continue;
                        };
                        if terminal_delivered {
                            debug!(kind = event.kind(), "scan reader: event after terminal event dropped");
                            continue;
                        }
                        if cancel.is_cancelled() {
                            break StreamEnd::Cancelled;
                        }
                        terminal_delivered = event.is_terminal();
                        delivered += 1;
                        on_event(event);
                    }
                }
            }
        }
    };

    PumpReport {
        end,
        delivered,
        terminal_delivered,
    }
}
