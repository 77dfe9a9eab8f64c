//! Human-readable status lines for whoever renders the chat.

use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::debug;

/// One line of chat output, stamped with the time since the node started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub elapsed: Duration,
    pub text: String,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", format_elapsed(self.elapsed), self.text)
    }
}

/// Render an elapsed duration as `HH:MM:SS`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    format!("{:02}:{:02}:{:02}", hours % 24, minutes % 60, seconds % 60)
}

/// Append-only stream of status lines. Cloning shares the same stream.
#[derive(Debug, Clone)]
pub struct StatusFeed {
    start_time: Instant,
    tx: broadcast::Sender<StatusLine>,
}

impl StatusFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            start_time: Instant::now(),
            tx,
        }
    }

    /// Publish a line. Lines emitted while nobody is subscribed are dropped.
    pub fn emit(&self, text: impl Into<String>) {
        let line = StatusLine {
            elapsed: self.start_time.elapsed(),
            text: text.into(),
        };
        debug!(status = %line.text);
        let _ = self.tx.send(line);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusLine> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(7)), "00:00:07");
        assert_eq!(format_elapsed(Duration::from_secs(3_725)), "01:02:05");
    }

    #[tokio::test]
    async fn test_subscribers_see_lines_in_order() {
        let feed = StatusFeed::new(8);
        let mut rx = feed.subscribe();
        feed.emit("first");
        feed.emit(String::from("second"));
        assert_eq!(rx.recv().await.unwrap().text, "first");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.text, "second");
        assert!(second.to_string().ends_with(" - second"));
    }

    #[test]
    fn test_emit_without_subscribers() {
        let feed = StatusFeed::new(1);
        feed.emit("nobody listening");
    }
}
