//! Outbound operator notifications.

use tracing::info;

/// Sink for messages meant for operators.
pub trait Notifier: Send + Sync {
    fn send_message(&self, message: &str);
}

/// Notifier writing to the log under the `notifier` target.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn send_message(&self, message: &str) {
        info!(target: "notifier", "{}", message);
    }
}

/// Notifier keeping every message in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: parking_lot::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn send_message(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}
