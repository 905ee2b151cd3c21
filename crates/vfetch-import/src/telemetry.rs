use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::info;
use vfetch_store::ObjectKind;
use vfetch_types::NodeId;

/// A structured event emitted by the import engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    /// The backing store failed a key and the request was deferred to the
    /// secondary import path.
    FetchMiss {
        repo: String,
        kind: ObjectKind,
        node: NodeId,
        reason: String,
    },
}

/// Sink for [`LogEvent`]s.
pub trait StructuredLogger: Send + Sync {
    fn log_event(&self, event: LogEvent);
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    events: Mutex<Vec<LogEvent>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event logged so far, in order.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().expect("lock poisoned").clone()
    }

    /// Number of fetch-miss events for `kind`.
    pub fn miss_count(&self, kind: ObjectKind) -> usize {
        self.events
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|event| matches!(event, LogEvent::FetchMiss { kind: k, .. } if *k == kind))
            .count()
    }
}

impl StructuredLogger for MemoryLogger {
    fn log_event(&self, event: LogEvent) {
        self.events.lock().expect("lock poisoned").push(event);
    }
}

/// Forwards events to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl StructuredLogger for TracingLogger {
    fn log_event(&self, event: LogEvent) {
        match event {
            LogEvent::FetchMiss {
                repo,
                kind,
                node,
                reason,
            } => info!(repo = %repo, kind = %kind, node = %node, reason = %reason, "fetch miss"),
        }
    }
}

/// Hands every event to each of several sinks, in order.
#[derive(Default)]
pub struct FanoutLogger {
    sinks: Vec<Arc<dyn StructuredLogger>>,
}

impl FanoutLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn StructuredLogger>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl StructuredLogger for FanoutLogger {
    fn log_event(&self, event: LogEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.log_event(event.clone());
            }
            last.log_event(event);
        }
    }
}
