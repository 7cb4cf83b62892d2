//! Stock [`EventSink`] implementations.

use herbie_protocols::{EngineEvent, EventSink, LogEntry, Progress, VerificationEvent};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_progress(&self, progress: Progress) {
        info!(line = progress.line, total = progress.total, "Progress");
    }

    fn on_log(&self, entry: LogEntry) {
        info!(line = entry.line, "{}", entry.description);
    }

    fn on_verification_result(&self, event: VerificationEvent) {
        if event.success {
            info!(src = %event.source_text, "✅ {}", event.message);
        } else {
            warn!(src = %event.source_text, "❌ {}", event.message);
        }
    }
}

/// Forwards events over an unbounded channel.
///
/// Events sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

impl EventSink for ChannelSink {
    fn on_progress(&self, progress: Progress) {
        self.send(EngineEvent::Progress(progress));
    }

    fn on_log(&self, entry: LogEntry) {
        self.send(EngineEvent::Log(entry));
    }

    fn on_verification_result(&self, event: VerificationEvent) {
        self.send(EngineEvent::Verification(event));
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    pub fn progress(&self) -> Vec<Progress> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn logs(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Log(entry) => Some(entry.description.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn verifications(&self) -> Vec<VerificationEvent> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Verification(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn on_progress(&self, progress: Progress) {
        self.events.lock().push(EngineEvent::Progress(progress));
    }

    fn on_log(&self, entry: LogEntry) {
        self.events.lock().push(EngineEvent::Log(entry));
    }

    fn on_verification_result(&self, event: VerificationEvent) {
        self.events.lock().push(EngineEvent::Verification(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.on_progress(Progress { line: 1, total: 2 });
        sink.on_log(LogEntry {
            line: 0,
            description: "Performed 'click' on 'Go'".to_string(),
        });

        assert_eq!(
            rx.recv().await,
            Some(EngineEvent::Progress(Progress { line: 1, total: 2 }))
        );
        assert!(matches!(rx.recv().await, Some(EngineEvent::Log(_))));
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.on_progress(Progress { line: 1, total: 1 });
    }

    #[test]
    fn test_recording_sink_views() {
        let sink = RecordingSink::new();
        sink.on_verification_result(VerificationEvent {
            source_text: "verify title contains \"x\"".to_string(),
            success: false,
            message: "nope".to_string(),
        });
        sink.on_log(LogEntry {
            line: 3,
            description: "hello".to_string(),
        });
        assert_eq!(sink.verifications().len(), 1);
        assert_eq!(sink.logs(), vec!["hello".to_string()]);
        assert!(sink.progress().is_empty());
        assert_eq!(sink.events().len(), 2);
    }
}
