//! Progress events for long-running operations.
//!
//! Pipelines emit `ProgressEvent` values through a callback or channel;
//! the SSE wire encoding lives here as a separate serialization layer so
//! the progress model stays transport-independent.
//!
//! Event ordering contract (UI compatibility):
//! `status` → `fetching`* → `progress`/`batch`* → `complete`, with `error`
//! allowed at any point, then the stream closes.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde_json::{json, Value};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Phase transition with a human-readable message.
    Status { phase: String, message: String },
    /// One page of a paginated fetch finished.
    Fetching { page: u32, count: usize },
    /// Per-item progress with an optional current-item label.
    Progress {
        processed: usize,
        total: usize,
        percent: u32,
        current: Option<String>,
    },
    /// Ranking pipeline only: one elimination batch finished.
    Batch {
        batch: usize,
        total_batches: usize,
        winners_so_far: usize,
    },
    /// Terminal success payload.
    Complete { payload: Value },
    /// Terminal failure.
    Error { message: String },
}

impl ProgressEvent {
    pub fn status(phase: &str, message: impl Into<String>) -> Self {
        ProgressEvent::Status {
            phase: phase.to_string(),
            message: message.into(),
        }
    }

    pub fn progress(processed: usize, total: usize, current: Option<String>) -> Self {
        ProgressEvent::Progress {
            processed,
            total,
            percent: (processed * 100 / total.max(1)) as u32,
            current,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ProgressEvent::Error {
            message: message.into(),
        }
    }

    /// The SSE event name. This vocabulary is a wire contract with the UI.
    pub fn name(&self) -> &'static str {
        match self {
            ProgressEvent::Status { .. } => "status",
            ProgressEvent::Fetching { .. } => "fetching",
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::Batch { .. } => "batch",
            ProgressEvent::Complete { .. } => "complete",
            ProgressEvent::Error { .. } => "error",
        }
    }

    pub fn data(&self) -> Value {
        match self {
            ProgressEvent::Status { phase, message } => {
                json!({ "phase": phase, "message": message })
            }
            ProgressEvent::Fetching { page, count } => {
                json!({ "page": page, "count": count })
            }
            ProgressEvent::Progress {
                processed,
                total,
                percent,
                current,
            } => json!({
                "processed": processed,
                "total": total,
                "percent": percent,
                "current": current,
            }),
            ProgressEvent::Batch {
                batch,
                total_batches,
                winners_so_far,
            } => json!({
                "batch": batch,
                "totalBatches": total_batches,
                "winnersSoFar": winners_so_far,
            }),
            ProgressEvent::Complete { payload } => payload.clone(),
            ProgressEvent::Error { message } => json!({ "message": message }),
        }
    }

    /// Wire encoding: a named SSE event with a JSON data body.
    pub fn into_sse(self) -> Event {
        Event::default().event(self.name()).data(self.data().to_string())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete { .. } | ProgressEvent::Error { .. })
    }
}

/// Channel used by spawned pipeline tasks to push events to the SSE layer.
/// Sends to a disconnected client fail silently — the in-flight operation
/// runs to completion server-side.
pub fn progress_channel() -> (ProgressSender, UnboundedReceiver<ProgressEvent>) {
    let (tx, rx) = unbounded_channel();
    (ProgressSender { tx }, rx)
}

#[derive(Clone)]
pub struct ProgressSender {
    tx: UnboundedSender<ProgressEvent>,
}

impl ProgressSender {
    pub fn send(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

/// SSE response over a progress-event receiver. The stream ends when the
/// sender side is dropped (after a terminal event).
pub fn sse_response(
    rx: UnboundedReceiver<ProgressEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = UnboundedReceiverStream::new(rx).map(|event| Ok(event.into_sse()));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name_vocabulary_is_stable() {
        assert_eq!(ProgressEvent::status("fetch", "m").name(), "status");
        assert_eq!(ProgressEvent::Fetching { page: 1, count: 2 }.name(), "fetching");
        assert_eq!(ProgressEvent::progress(1, 2, None).name(), "progress");
        assert_eq!(
            ProgressEvent::Batch {
                batch: 1,
                total_batches: 3,
                winners_so_far: 10
            }
            .name(),
            "batch"
        );
        assert_eq!(
            ProgressEvent::Complete { payload: json!({}) }.name(),
            "complete"
        );
        assert_eq!(ProgressEvent::error("boom").name(), "error");
    }

    #[test]
    fn test_progress_percent_computation() {
        match ProgressEvent::progress(30, 120, None) {
            ProgressEvent::Progress { percent, .. } => assert_eq!(percent, 25),
            _ => unreachable!(),
        }
        // Zero total never divides by zero
        match ProgressEvent::progress(0, 0, None) {
            ProgressEvent::Progress { percent, .. } => assert_eq!(percent, 0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_terminal_classification() {
        assert!(ProgressEvent::Complete { payload: json!(null) }.is_terminal());
        assert!(ProgressEvent::error("x").is_terminal());
        assert!(!ProgressEvent::status("p", "m").is_terminal());
    }

    #[test]
    fn test_batch_data_shape() {
        let data = ProgressEvent::Batch {
            batch: 2,
            total_batches: 3,
            winners_so_far: 42,
        }
        .data();
        assert_eq!(data["batch"], 2);
        assert_eq!(data["totalBatches"], 3);
        assert_eq!(data["winnersSoFar"], 42);
    }
}
