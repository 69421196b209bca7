// crates/placer-core/src/core/time.rs
// ============================================================================
// Module: Placer Timestamps
// Description: Timestamps for event records and actual-state bookkeeping.
// Purpose: Support deterministic logical clocks alongside wall-clock time.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The engine core is deterministic, so anything persisted by it uses
//! timestamps supplied by the caller. Logical timestamps keep tests and
//! replays byte-identical; wall-clock timestamps are for deployments that
//! want real times in their revision history. The two kinds order among
//! themselves; a deployment should pick one and stay with it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Timestamp attached to events, revisions, and actual-state instances.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Timestamp {
    /// Monotonic logical tick, for deterministic runs and tests.
    Logical(u64),
    /// Milliseconds since the Unix epoch.
    UnixMillis(u64),
}

impl Timestamp {
    /// Returns the current wall-clock timestamp.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        Self::UnixMillis(u64::try_from(millis).unwrap_or(u64::MAX))
    }
}
