// crates/placer-core/src/core/event.rs
// ============================================================================
// Module: Event Log
// Description: Leveled, append-only structured log for engine runs.
// Purpose: Narrate resolution and apply passes for operators and APIs.
// Dependencies: crate::core::{errors, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! The event log is the engine's observability surface: resolution and apply
//! passes append leveled records with optional structured details, and
//! passive hooks project records into serialized API representations. The
//! log is injected, not global; records carry logical timestamps so runs
//! stay byte-identical across replays.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::errors::ErrorWithDetails;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Levels and Records
// ============================================================================

/// Log level for event records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    /// Diagnostic detail, shown in debug mode.
    Debug,
    /// Normal progress narration.
    Info,
    /// Recoverable anomaly.
    Warn,
    /// Failure requiring operator attention.
    Error,
}

impl EventLevel {
    /// Returns the stable string form of the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Single event log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Timestamp assigned when the record was appended.
    pub time: Timestamp,
    /// Record level.
    pub level: EventLevel,
    /// Human-readable message.
    pub message: String,
    /// Optional structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Simplified event representation returned from API surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEvent {
    /// Record timestamp.
    pub time: Timestamp,
    /// Record level as a stable string.
    pub level: String,
    /// Record message.
    pub message: String,
}

// ============================================================================
// SECTION: Hooks
// ============================================================================

/// Passive observer receiving every saved record.
pub trait EventHook {
    /// Processes a single record.
    fn fire(&mut self, record: &EventRecord);
}

/// Hook collecting records as [`ApiEvent`]s.
#[derive(Debug, Default)]
pub struct ApiEventHook {
    /// Collected API events.
    events: Vec<ApiEvent>,
}

impl ApiEventHook {
    /// Consumes the hook and returns the collected events.
    #[must_use]
    pub fn into_events(self) -> Vec<ApiEvent> {
        self.events
    }
}

impl EventHook for ApiEventHook {
    fn fire(&mut self, record: &EventRecord) {
        self.events.push(ApiEvent {
            time: record.time,
            level: record.level.as_str().to_string(),
            message: record.message.clone(),
        });
    }
}

// ============================================================================
// SECTION: Event Log
// ============================================================================

/// Shared state behind an event log handle.
#[derive(Debug, Default)]
struct LogInner {
    /// Appended records in order.
    records: Vec<EventRecord>,
    /// Logical clock for record timestamps.
    next_tick: u64,
}

/// Append-only, leveled event log.
///
/// Handles are cheap to clone and share the same underlying buffer.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    /// Shared record buffer.
    inner: Arc<Mutex<LogInner>>,
    /// True when debug records and error details are rendered.
    debug: bool,
}

impl EventLog {
    /// Creates an event log with debug rendering disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an event log with debug rendering enabled.
    #[must_use]
    pub fn with_debug() -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogInner::default())),
            debug: true,
        }
    }

    /// Returns true when debug rendering is enabled.
    #[must_use]
    pub const fn is_debug(&self) -> bool {
        self.debug
    }

    /// Appends a debug record.
    pub fn debug(&self, message: impl Into<String>) {
        self.append(EventLevel::Debug, message.into(), None);
    }

    /// Appends an info record.
    pub fn info(&self, message: impl Into<String>) {
        self.append(EventLevel::Info, message.into(), None);
    }

    /// Appends a warning record.
    pub fn warn(&self, message: impl Into<String>) {
        self.append(EventLevel::Warn, message.into(), None);
    }

    /// Appends an error record.
    pub fn error(&self, message: impl Into<String>) {
        self.append(EventLevel::Error, message.into(), None);
    }

    /// Appends an info record with structured details.
    pub fn info_with_details(&self, message: impl Into<String>, details: Value) {
        self.append(EventLevel::Info, message.into(), Some(details));
    }

    /// Appends an error record for a detailed error.
    ///
    /// The details map is rendered only when debug is enabled.
    pub fn error_with_details(&self, error: &ErrorWithDetails) {
        let details = if self.debug && !error.details.is_null() {
            Some(error.details.clone())
        } else {
            None
        };
        self.append(EventLevel::Error, error.message.clone(), details);
    }

    /// Returns a snapshot of all appended records.
    #[must_use]
    pub fn records(&self) -> Vec<EventRecord> {
        self.lock().records.clone()
    }

    /// Returns the number of appended records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Returns true when no records have been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Feeds every record through the hook in append order.
    pub fn save(&self, hook: &mut dyn EventHook) {
        for record in &self.lock().records {
            hook.fire(record);
        }
    }

    /// Projects the log into API events.
    #[must_use]
    pub fn as_api_events(&self) -> Vec<ApiEvent> {
        let mut hook = ApiEventHook::default();
        self.save(&mut hook);
        hook.into_events()
    }

    /// Appends a record with the next logical timestamp.
    fn append(&self, level: EventLevel, message: String, details: Option<Value>) {
        if level == EventLevel::Debug && !self.debug {
            return;
        }
        let mut inner = self.lock();
        let time = Timestamp::Logical(inner.next_tick);
        inner.next_tick += 1;
        inner.records.push(EventRecord {
            time,
            level,
            message,
            details,
        });
    }

    /// Locks the shared buffer, recovering from poisoned locks.
    fn lock(&self) -> std::sync::MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_carry_monotonic_logical_timestamps() {
        let log = EventLog::new();
        log.info("first");
        log.warn("second");

        let records = log.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].time, Timestamp::Logical(0));
        assert_eq!(records[1].time, Timestamp::Logical(1));
        assert!(records[0].time < records[1].time);
    }

    #[test]
    fn debug_records_are_dropped_unless_enabled() {
        let quiet = EventLog::new();
        quiet.debug("hidden");
        assert!(quiet.is_empty());

        let verbose = EventLog::with_debug();
        verbose.debug("visible");
        assert_eq!(verbose.len(), 1);
    }

    #[test]
    fn error_details_render_only_in_debug_mode() {
        let error = ErrorWithDetails::new("conflict", json!({"port": 5000}));

        let quiet = EventLog::new();
        quiet.error_with_details(&error);
        assert_eq!(quiet.records()[0].details, None);

        let verbose = EventLog::with_debug();
        verbose.error_with_details(&error);
        assert_eq!(verbose.records()[0].details, Some(json!({"port": 5000})));
    }

    #[test]
    fn api_events_preserve_order_and_levels() {
        let log = EventLog::new();
        log.info("resolving");
        log.error("failed");

        let events = log.as_api_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].level, "info");
        assert_eq!(events[1].level, "error");
        assert_eq!(events[1].message, "failed");
    }

    #[test]
    fn clones_share_the_same_buffer() {
        let log = EventLog::new();
        let handle = log.clone();
        handle.info("from the clone");
        assert_eq!(log.len(), 1);
    }
}
