//! Engine events delivered to a subscriber over a channel.
//!
//! The executor and orchestrator never talk to a front end directly: they
//! push [`MigrationEvent`]s into an optional bounded `mpsc` channel. Every log
//! event is also mirrored into `tracing`, so a run without a subscriber still
//! leaves a trail.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::result::{JobResult, MigrationRun};

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Structured log line for the subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Source of the message, e.g. "Migration" or the backend name.
    pub category: String,
    pub message: String,
    pub level: LogLevel,
}

/// Everything the engine reports while it works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MigrationEvent {
    /// Row `current` of `total` of a job has been handled.
    Progress {
        item: String,
        current: u64,
        total: u64,
    },

    Log(LogEvent),

    JobFinished(JobResult),

    /// `completed` of `total` items of a batch run are done.
    RunProgress { completed: usize, total: usize },

    RunFinished(MigrationRun),
}

/// Sending half of the event channel. Cloning is cheap; a sink without a
/// channel only mirrors logs into `tracing`.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<MigrationEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<MigrationEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Sink with no subscriber.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Create a bounded channel and the sink feeding it.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<MigrationEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }

    /// Send an event if a subscriber is attached. A dropped receiver is not
    /// an error for the engine.
    pub async fn emit(&self, event: MigrationEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event).await;
        }
    }

    pub async fn progress(&self, item: &str, current: u64, total: u64) {
        self.emit(MigrationEvent::Progress {
            item: item.to_string(),
            current,
            total,
        })
        .await;
    }

    /// Emit a log event and mirror it into `tracing`.
    pub async fn log(&self, level: LogLevel, category: &str, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => debug!(category, "{}", message),
            LogLevel::Info => info!(category, "{}", message),
            LogLevel::Warning => warn!(category, "{}", message),
            LogLevel::Error => error!(category, "{}", message),
        }
        self.emit(MigrationEvent::Log(LogEvent {
            category: category.to_string(),
            message,
            level,
        }))
        .await;
    }

    pub async fn info(&self, category: &str, message: impl Into<String>) {
        self.log(LogLevel::Info, category, message).await;
    }

    pub async fn warning(&self, category: &str, message: impl Into<String>) {
        self.log(LogLevel::Warning, category, message).await;
    }

    pub async fn error(&self, category: &str, message: impl Into<String>) {
        self.log(LogLevel::Error, category, message).await;
    }

    pub async fn job_finished(&self, result: &JobResult) {
        self.emit(MigrationEvent::JobFinished(result.clone())).await;
    }

    pub async fn run_progress(&self, completed: usize, total: usize) {
        self.emit(MigrationEvent::RunProgress { completed, total }).await;
    }

    pub async fn run_finished(&self, run: &MigrationRun) {
        self.emit(MigrationEvent::RunFinished(run.clone())).await;
    }
}

impl MigrationEvent {
    /// Overall fraction for a `RunProgress` event.
    pub fn fraction(&self) -> Option<f64> {
        match self {
            MigrationEvent::RunProgress { completed, total } if *total > 0 => {
                Some(*completed as f64 / *total as f64)
            }
            MigrationEvent::RunProgress { .. } => Some(1.0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_delivers_in_order() {
        let (sink, mut rx) = EventSink::channel(8);
        sink.progress("users", 1, 2).await;
        sink.info("Migration", "hello").await;
        drop(sink);

        match rx.recv().await {
            Some(MigrationEvent::Progress { current, total, .. }) => {
                assert_eq!((current, total), (1, 2))
            }
            other => panic!("unexpected event {:?}", other),
        }
        match rx.recv().await {
            Some(MigrationEvent::Log(e)) => {
                assert_eq!(e.level, LogLevel::Info);
                assert_eq!(e.message, "hello");
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_sink_is_silent() {
        EventSink::disabled().error("Migration", "nobody listens").await;
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_ignored() {
        let (sink, rx) = EventSink::channel(1);
        drop(rx);
        sink.progress("t", 1, 1).await;
    }

    #[test]
    fn test_run_fraction() {
        let e = MigrationEvent::RunProgress { completed: 1, total: 4 };
        assert_eq!(e.fraction(), Some(0.25));
    }

    #[test]
    fn test_event_json_tag() {
        let e = MigrationEvent::Progress {
            item: "users".into(),
            current: 3,
            total: 10,
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"event\":\"progress\""));
    }
}
