//! Event bridge between the OS callback queue and the Tokio runtime
//!
//! The system extension manager invokes its delegate on a dispatch queue
//! that Tokio knows nothing about. Callbacks are pushed into an unbounded
//! channel without blocking that queue and consumed from async code.

use async_channel::{Receiver, Sender, TryRecvError, unbounded};
use protocol::ExtensionEvent;

/// Sending half, handed to every request delegate
#[derive(Debug, Clone)]
pub struct EventSink {
    event_tx: Sender<ExtensionEvent>,
}

impl EventSink {
    /// Push an event without blocking the caller
    pub fn send(&self, event: ExtensionEvent) -> crate::Result<()> {
        self.event_tx
            .try_send(event)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Whether the receiving side has gone away
    pub fn is_closed(&self) -> bool {
        self.event_tx.is_closed()
    }
}

/// Receiving half, polled by the presentation loop
#[derive(Debug, Clone)]
pub struct EventStream {
    event_rx: Receiver<ExtensionEvent>,
}

impl EventStream {
    /// Receive the next event
    pub async fn recv(&self) -> crate::Result<ExtensionEvent> {
        self.event_rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&self) -> Option<ExtensionEvent> {
        match self.event_rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }

    /// Number of events waiting to be received
    pub fn len(&self) -> usize {
        self.event_rx.len()
    }

    /// Whether no events are waiting
    pub fn is_empty(&self) -> bool {
        self.event_rx.is_empty()
    }
}

/// Create the event bridge
///
/// Returns (EventSink for delegates, EventStream for the async side)
pub fn create_event_bridge() -> (EventSink, EventStream) {
    let (event_tx, event_rx) = unbounded();

    (EventSink { event_tx }, EventStream { event_rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{ExtensionIdentifier, ExtensionRequest, RequestId, RequestKind};

    fn approval(id: u64) -> ExtensionEvent {
        ExtensionEvent::ApprovalNeeded {
            request: ExtensionRequest::new(
                RequestId(id),
                RequestKind::Activate,
                ExtensionIdentifier::default(),
            ),
        }
    }

    #[tokio::test]
    async fn test_event_bridge() {
        let (sink, stream) = create_event_bridge();

        // Simulate the OS delivering a callback on its own thread
        let handle = std::thread::spawn(move || sink.send(approval(1)).is_ok());
        assert!(handle.join().unwrap());

        let event = stream.recv().await.unwrap();
        assert_eq!(event.request().id, RequestId(1));
    }

    #[test]
    fn test_try_recv_preserves_order() {
        let (sink, stream) = create_event_bridge();
        assert!(stream.try_recv().is_none());

        sink.send(approval(1)).unwrap();
        sink.send(approval(2)).unwrap();
        assert_eq!(stream.len(), 2);

        assert_eq!(stream.try_recv().unwrap().request().id, RequestId(1));
        assert_eq!(stream.try_recv().unwrap().request().id, RequestId(2));
        assert!(stream.is_empty());
    }

    #[test]
    fn test_send_after_stream_dropped() {
        let (sink, stream) = create_event_bridge();
        drop(stream);

        assert!(sink.is_closed());
        assert!(matches!(
            sink.send(approval(1)),
            Err(crate::Error::Channel(_))
        ));
    }
}
