//! Outcome events
//!
//! Orchestrators publish [`MigrationEvent`]s through an [`EventBus`]: an
//! explicit list of [`EventSink`]s called synchronously in registration
//! order. Notification and audit consumers attach as sinks; tests attach an
//! [`EventCollector`].

use crate::record::MigrationRecord;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outcome of an apply or rollback
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MigrationEvent {
    /// Payload went live
    Applied {
        record: MigrationRecord,
        backup_path: Option<String>,
    },
    /// Apply did not go through
    Failed {
        record: MigrationRecord,
        error: String,
    },
    /// Prior content restored
    RolledBack {
        record: MigrationRecord,
        reason: String,
    },
}

impl MigrationEvent {
    /// Record the event is about
    #[inline]
    #[must_use]
    pub fn record(&self) -> &MigrationRecord {
        match self {
            Self::Applied { record, .. }
            | Self::Failed { record, .. }
            | Self::RolledBack { record, .. } => record,
        }
    }

    /// Short event name
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Failed { .. } => "failed",
            Self::RolledBack { .. } => "rolled_back",
        }
    }
}

/// Receiver of engine events
pub trait EventSink: Send + Sync + Debug {
    /// Handle one event. Must not block for long.
    fn emit(&self, event: &MigrationEvent);
}

/// Ordered list of sinks
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventBus {
    /// Create bus with no sinks
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Add a sink in place
    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Number of sinks
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Check for sinks
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliver an event to every sink
    pub fn publish(&self, event: &MigrationEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

/// Sink keeping every event in memory
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Mutex<Vec<MigrationEvent>>,
}

impl EventCollector {
    /// Create empty collector
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of collected events
    #[must_use]
    pub fn events(&self) -> Vec<MigrationEvent> {
        self.events.lock().clone()
    }

    /// Number of collected events named `kind`
    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }

    /// Drain collected events
    pub fn take(&self) -> Vec<MigrationEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for EventCollector {
    fn emit(&self, event: &MigrationEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Sink forwarding events onto an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<MigrationEvent>,
}

impl ChannelSink {
    /// Create sink and the receiving half of its queue
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MigrationEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &MigrationEvent) {
        if self.sender.send(event.clone()).is_err() {
            tracing::debug!(event = event.kind(), "event receiver dropped; event discarded");
        }
    }
}

/// Sink writing events to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &MigrationEvent) {
        let record = event.record();
        match event {
            MigrationEvent::Applied { backup_path, .. } => tracing::info!(
                migration_id = %record.id,
                filename = %record.filename,
                interface = %record.interface_origin,
                backup_path = backup_path.as_deref().unwrap_or("-"),
                "translation migration applied"
            ),
            MigrationEvent::Failed { error, .. } => tracing::error!(
                migration_id = %record.id,
                filename = %record.filename,
                interface = %record.interface_origin,
                error = %error,
                "translation migration failed"
            ),
            MigrationEvent::RolledBack { reason, .. } => tracing::info!(
                migration_id = %record.id,
                filename = %record.filename,
                interface = %record.interface_origin,
                reason = %reason,
                "translation migration rolled back"
            ),
        }
    }
}
