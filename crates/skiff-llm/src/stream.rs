//! Turn worker and the caller-facing event stream.
//!
//! [`spawn_turn`] moves a backend's frame stream into a tokio task that decodes
//! frames and publishes [`StreamEvent`]s into a bounded queue. The caller drains
//! the queue through [`EventStream`].

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::{FrameStream, SharedBackend, StreamEvent};
use crate::decoder::TurnDecoder;
use crate::error::{LlmError, Result};
use crate::types::ConverseRequest;

/// Capacity of the per-turn event queue.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Event Stream
// ─────────────────────────────────────────────────────────────────────────────

/// Receiving side of one turn.
///
/// Yields events in decode order and ends after the first terminal event.
/// Dropping it aborts the worker.
pub struct EventStream {
    rx: mpsc::Receiver<StreamEvent>,
    worker: JoinHandle<()>,
}

impl EventStream {
    /// Receive the next event, or `None` once the turn is over.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Drain every remaining event.
    pub async fn collect_all(mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("finished", &self.worker.is_finished())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker
// ─────────────────────────────────────────────────────────────────────────────

/// Start the decode worker for one turn.
///
/// Must be called from within a tokio runtime.
pub fn spawn_turn(frames: FrameStream, cancel: CancellationToken) -> EventStream {
    spawn_turn_with_capacity(frames, cancel, DEFAULT_EVENT_QUEUE_CAPACITY)
}

/// Start the decode worker with an explicit queue capacity.
pub fn spawn_turn_with_capacity(
    frames: FrameStream,
    cancel: CancellationToken,
    capacity: usize,
) -> EventStream {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let worker = tokio::spawn(run_turn(frames, tx, cancel));
    EventStream { rx, worker }
}

/// Outcome of handing one event to the queue.
enum Delivery {
    Sent,
    Cancelled,
    Closed,
}

async fn deliver(
    tx: &mpsc::Sender<StreamEvent>,
    cancel: &CancellationToken,
    event: StreamEvent,
) -> Delivery {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Delivery::Cancelled,
        sent = tx.send(event) => match sent {
            Ok(()) => Delivery::Sent,
            Err(_) => Delivery::Closed,
        },
    }
}

async fn run_turn(
    mut frames: FrameStream,
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) {
    let mut decoder = TurnDecoder::new();
    let mut frame_count = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            next = frames.next() => Some(next),
        };

        let event = match next {
            None => {
                tracing::debug!(frame_count, "Turn cancelled");
                let _ = tx.send(StreamEvent::Error(LlmError::Cancelled)).await;
                return;
            }
            Some(Some(Ok(frame))) => {
                frame_count += 1;
                match decoder.decode(frame) {
                    Some(event) => event,
                    None => continue,
                }
            }
            Some(Some(Err(e))) => {
                tracing::warn!(error = %e, frame_count, "Wire stream failed");
                StreamEvent::Error(e)
            }
            Some(None) => match decoder.finish() {
                Some(event) => {
                    tracing::warn!(frame_count, "Wire stream ended early");
                    event
                }
                None => return,
            },
        };

        let terminal = event.is_terminal();
        match deliver(&tx, &cancel, event).await {
            Delivery::Sent if terminal => {
                tracing::debug!(frame_count, "Turn finished");
                return;
            }
            Delivery::Sent => {}
            Delivery::Cancelled => {
                tracing::debug!(frame_count, "Turn cancelled while queue was full");
                let _ = tx.send(StreamEvent::Error(LlmError::Cancelled)).await;
                return;
            }
            Delivery::Closed => {
                tracing::debug!(frame_count, "Event receiver dropped");
                return;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Streaming Client
// ─────────────────────────────────────────────────────────────────────────────

/// Entry point for streaming turns against a shared backend.
#[derive(Clone)]
pub struct StreamingClient {
    backend: SharedBackend,
}

impl StreamingClient {
    /// Create a client over the given backend.
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    /// Get the backend name.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Open one turn and start decoding it.
    ///
    /// Errors opening the turn (connection, auth, rate limit) are returned
    /// directly; everything after that arrives as events.
    pub async fn converse(
        &self,
        request: &ConverseRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream> {
        tracing::debug!(
            backend = self.backend.name(),
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Opening turn"
        );

        let frames = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            opened = self.backend.open_turn(request) => opened?,
        };

        Ok(spawn_turn(frames, cancel))
    }
}

impl std::fmt::Debug for StreamingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingClient")
            .field("backend", &self.backend.name())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{mock, Frame, MockBackend};
    use crate::types::{Message, StopReason};
    use std::sync::Arc;
    use std::time::Duration;

    fn frames_from(frames: Vec<Frame>) -> FrameStream {
        Box::pin(futures::stream::iter(frames.into_iter().map(Ok)))
    }

    #[tokio::test]
    async fn test_events_arrive_in_order_and_end_with_done() {
        let mut frames = vec![mock::message_start()];
        frames.extend(mock::text_block(0, &["a", "b", "c"]));
        frames.extend(mock::finish("end_turn"));

        let events = spawn_turn(frames_from(frames), CancellationToken::new())
            .collect_all()
            .await;

        let texts: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert!(matches!(events.last(), Some(StreamEvent::Done(StopReason::EndTurn))));
    }

    #[tokio::test]
    async fn test_backpressure_never_drops_events() {
        let deltas: Vec<String> = (0..50).map(|i| format!("d{i}")).collect();
        let refs: Vec<&str> = deltas.iter().map(String::as_str).collect();
        let mut frames = vec![mock::message_start()];
        frames.extend(mock::text_block(0, &refs));
        frames.extend(mock::finish("end_turn"));

        let mut stream = spawn_turn(frames_from(frames), CancellationToken::new());
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut texts = 0;
        while let Some(event) = stream.next_event().await {
            if matches!(event, StreamEvent::Text(_)) {
                texts += 1;
            }
        }
        assert_eq!(texts, 50);
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_yields_one_error() {
        let head = futures::stream::iter(
            {
                let mut frames = vec![mock::message_start()];
                frames.extend(mock::text_block(0, &["partial"]));
                frames
            }
            .into_iter()
            .map(Ok),
        );
        // Wire goes quiet after the first block.
        let frames: FrameStream = Box::pin(head.chain(futures::stream::pending()));
        let cancel = CancellationToken::new();
        let mut stream = spawn_turn(frames, cancel.clone());

        let first = stream.next_event().await;
        assert!(matches!(first, Some(StreamEvent::Text(_))));

        cancel.cancel();
        let rest: Vec<_> = stream.collect_all().await;
        assert_eq!(rest.len(), 1);
        assert!(matches!(&rest[0], StreamEvent::Error(e) if e.is_cancelled()));
    }

    #[tokio::test]
    async fn test_cancel_before_first_frame() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let events = spawn_turn(frames_from(mock::text_turn("hi")), cancel)
            .collect_all()
            .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::Error(LlmError::Cancelled)));
    }

    #[tokio::test]
    async fn test_wire_error_is_terminal() {
        let frames: FrameStream = Box::pin(futures::stream::iter(vec![
            Ok(mock::message_start()),
            Err(LlmError::Network("connection reset".into())),
            Ok(Frame::MessageStop),
        ]));
        let events = spawn_turn(frames, CancellationToken::new()).collect_all().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::Error(LlmError::Network(_))));
    }

    #[tokio::test]
    async fn test_truncated_wire_yields_error() {
        let mut frames = vec![mock::message_start()];
        frames.extend(mock::text_block(0, &["cut"]));
        let events = spawn_turn(frames_from(frames), CancellationToken::new())
            .collect_all()
            .await;
        assert!(matches!(events.last(), Some(StreamEvent::Error(LlmError::Decode(_)))));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_streaming_client_over_mock() {
        let backend = Arc::new(MockBackend::with_text("Hello"));
        let client = StreamingClient::new(backend.clone());
        let request = ConverseRequest::new("mock-model", vec![Message::user("hi")], 256);

        let events = client
            .converse(&request, CancellationToken::new())
            .await
            .unwrap()
            .collect_all()
            .await;

        assert!(matches!(&events[0], StreamEvent::Text(t) if t == "Hello"));
        assert_eq!(backend.request_count(), 1);
        assert_eq!(client.backend_name(), "mock");
    }

    #[tokio::test]
    async fn test_streaming_client_open_error() {
        let client = StreamingClient::new(Arc::new(MockBackend::new(vec![])));
        let request = ConverseRequest::new("m", vec![], 10);
        let result = client.converse(&request, CancellationToken::new()).await;
        assert!(matches!(result, Err(LlmError::Backend(_))));
    }
}
