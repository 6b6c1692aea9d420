//! Unbounded, point-to-point event queue.
//!
//! The session is the only producer that matters and there is exactly one
//! consumer (the presentation sink), so the bus is a thin wrapper over
//! [`tokio::sync::mpsc::unbounded_channel`] rather than a broadcast fan-out.
//! Publishing never blocks the session loop; if the sink falls behind the
//! queue simply grows.
//!
//! ```
//! use mudgate_middleware::bus::EventBus;
//! use mudgate_types::EventPayload;
//!
//! let (bus, mut stream) = EventBus::channel();
//! bus.emit("doc", EventPayload::Notice("hello".into())).unwrap();
//! assert!(stream.try_recv().is_some());
//! ```

use mudgate_types::{Event, EventPayload, MudError};
use tokio::sync::mpsc;
use tracing::trace;

/// Producer half of the event queue. Clone it cheaply; all clones feed the
/// same [`EventStream`].
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: mpsc::UnboundedSender<Event>,
}

impl EventBus {
    /// Create a connected bus/stream pair.
    pub fn channel() -> (Self, EventStream) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, EventStream { receiver })
    }

    /// Enqueue an already-built event.
    ///
    /// # Errors
    ///
    /// [`MudError::Channel`] once the [`EventStream`] has been dropped.
    pub fn publish(&self, event: Event) -> Result<(), MudError> {
        trace!(source = %event.source, id = %event.id, "event published");
        self.sender
            .send(event)
            .map_err(|e| MudError::Channel(format!("event sink closed: {e}")))
    }

    /// Stamp `payload` with an id and timestamp, then enqueue it.
    pub fn emit(&self, source: &str, payload: EventPayload) -> Result<(), MudError> {
        self.publish(Event::new(source, payload))
    }

    /// `true` once the consumer is gone.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Consumer half of the event queue.
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    /// Wait for the next event. `None` once every [`EventBus`] clone is gone
    /// and the queue is drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Non-blocking poll; `None` when the queue is currently empty.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    /// Drain everything currently queued.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}
