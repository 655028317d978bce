use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::event::InputEvent;

/// Producer handle onto the event bus.
///
/// Cheap to clone; one lives in every adapter thread. Sending never blocks.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<InputEvent>,
}

impl EventSender {
    /// Enqueue an event for the main loop. A disconnected bus (consumer shut
    /// down) drops the event; producers must never crash over delivery.
    pub fn send(&self, event: InputEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("event bus disconnected; dropping event");
        }
    }
}

/// Single-consumer event queue between input producers and the main loop.
///
/// Per-sender FIFO: events from one producer arrive in the order they were
/// sent. Nothing is guaranteed across distinct producers.
pub struct EventBus {
    tx: Sender<InputEvent>,
    rx: Receiver<InputEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Non-blocking drain step for the main loop.
    pub fn try_recv(&self) -> Option<InputEvent> {
        self.rx.try_recv().ok()
    }

    /// Blocking drain step with a frame-interval timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<InputEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
