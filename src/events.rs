use std::sync::mpsc::Sender;

/// Messages an operation emits while it runs. Log text is rendered
/// with a timestamp by whoever drains the channel.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Log(String),
    Progress { current: usize, total: usize },
}

/// Observer the engines write progress and log lines to. Operations
/// run on a worker thread, so a sink only needs to be `Send`; it is
/// owned by one worker at a time.
pub trait EventSink: Send {
    fn log(&self, message: String);
    fn progress(&self, current: usize, total: usize);
}

/// Forwards events over an `mpsc` channel back to the control thread.
pub struct ChannelSink {
    tx: Sender<EngineEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn log(&self, message: String) {
        let _ = self.tx.send(EngineEvent::Log(message));
    }

    fn progress(&self, current: usize, total: usize) {
        let _ = self.tx.send(EngineEvent::Progress { current, total });
    }
}

/// Discards everything; handy for tests and non-interactive callers.
pub struct NullSink;

impl EventSink for NullSink {
    fn log(&self, _message: String) {}

    fn progress(&self, _current: usize, _total: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn channel_sink_preserves_event_order() {
        let (tx, rx) = mpsc::channel();
        let sink = ChannelSink::new(tx);
        sink.log("first".to_string());
        sink.progress(1, 2);
        sink.log("second".to_string());
        drop(sink);

        let events: Vec<EngineEvent> = rx.iter().collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], EngineEvent::Log(msg) if msg == "first"));
        assert!(matches!(events[1], EngineEvent::Progress { current: 1, total: 2 }));
        assert!(matches!(&events[2], EngineEvent::Log(msg) if msg == "second"));
    }
}
