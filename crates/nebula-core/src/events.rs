//! Engine events for UI observers

use crate::state::EnginePhase;
use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// Notification tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    /// Action succeeded
    Success,
    /// Neutral information
    Info,
    /// Action failed
    Error,
}

/// Something a UI may want to show
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// Busy indicator changed
    PhaseChanged {
        /// New phase
        phase: EnginePhase,
    },
    /// Transient toast
    Notification {
        /// Tone
        level: NotificationLevel,
        /// Text
        message: String,
    },
}

/// Broadcast sender; sending without subscribers is not an error
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }
}

impl EventBus {
    /// New receiver seeing events from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Publish an event
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    /// Publish a notification
    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        self.emit(EngineEvent::Notification {
            level,
            message: message.into(),
        });
    }
}
