//! Session event definitions

use super::session::SessionState;
use tokio::sync::mpsc;

/// Events emitted by a capture session and its heartbeat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session moved to a new lifecycle state
    StateChanged(SessionState),

    /// Heartbeat thread launched
    HeartbeatStarted,

    /// Heartbeat action ran (`count` firings so far)
    HeartbeatFired { count: u64 },

    /// Heartbeat thread observed the stop and left its loop
    HeartbeatStopped,

    /// Output report forwarded to the device
    ReportWritten { seq: u64 },

    /// Device handle released
    HandleReleased,
}

/// Sender for session events - wraps a tokio unbounded channel so both the
/// heartbeat thread and async code can publish without blocking.
#[derive(Clone, Debug)]
pub struct SessionEventSender {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionEventSender {
    pub fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// Create a sender together with its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Publish an event; a dropped receiver is not an error
    pub fn send(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}
