//! Ordered delivery of run events to a single observer.
//!
//! The emitter is the sending half of a bounded channel whose receiving half
//! backs the observer's push stream. The observer going away closes the
//! channel, which is what [`EventEmitter::is_observer_connected`] reports.

use chrono::Utc;
use tokio::sync::mpsc;

use crate::events::types::{LogLine, LogStyle, RunEvent};
use crate::jobs::timefmt::display_clock;

/// Sending side of one job's event stream.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<RunEvent>,
}

impl EventEmitter {
    /// Create an emitter and the receiver the observer reads from.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RunEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Append one event. Returns `false` if the observer is gone.
    ///
    /// Waits while the observer's buffer is full, so events are never dropped
    /// or reordered while it is connected.
    pub async fn emit(&self, event: RunEvent) -> bool {
        let name = event.name();
        match self.tx.send(event).await {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!(event = name, "Observer gone, event discarded");
                false
            }
        }
    }

    /// Emit a `log` event stamped with the current display time.
    pub async fn log(&self, line: impl Into<String>, style: LogStyle) -> bool {
        self.emit(RunEvent::Log(LogLine {
            line: line.into(),
            time: display_clock(Utc::now()),
            style,
        }))
        .await
    }

    /// Whether the observer still holds the stream open.
    pub fn is_observer_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}
