//! Event delivery into the host application.

use crate::event::{EventName, EventPayload};

/// Receives named signals for an attached, ready host.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EventName, payload: EventPayload);
}
