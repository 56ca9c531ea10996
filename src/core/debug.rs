//! Debug trace hooks.
//!
//! Generation and evaluation report every probe they make to an optional
//! [`DebugSink`]. A renderer or test harness can draw or record them; nothing
//! in the crate depends on a sink being present.

use std::sync::{Arc, Mutex, PoisonError};

use crate::core::types::Vec3;
use crate::cover::TileId;
use crate::math::Aabb;

/// Which probe produced a [`DebugEvent::Probe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    /// Short lateral step projected back onto the navigable surface.
    HoleCheck,
    /// Clearance-height trace looking for a standing obstruction.
    CoverTrace,
    /// Straight-down trace past the edge looking for a drop.
    CliffTrace,
    /// Slanted second cliff trace that rejects sloped terrain.
    SlantedCliffTrace,
    /// Downward trace that picks up the ground object of a cliff edge.
    GroundTrace,
    /// Outward sweep from the cover point at eye height.
    EvaluateSweep,
    /// Direct sweep to the target after the outward sweep missed.
    TargetSweep,
    /// Penetration test behind a lean position.
    LeanPenetration,
    /// Sweep from a lean position to the target.
    LeanSweep,
    /// Standing-height visibility sweep for crouch cover.
    StandingSweep,
}

/// A single traced event.
#[derive(Clone, Debug, PartialEq)]
pub enum DebugEvent {
    /// A trace or projection from `start` to `end`; `blocked` is true when it hit.
    Probe {
        kind: ProbeKind,
        start: Vec3,
        end: Vec3,
        blocked: bool,
    },
    /// A sample point was accepted as a cover candidate.
    CandidateAccepted { location: Vec3 },
    /// A candidate was dropped by the duplicate radius test.
    CandidateRejected { location: Vec3 },
    /// A tile finished scanning; `bounds` is the stale-removal area.
    TileScanned { tile: TileId, bounds: Aabb, candidates: usize },
}

/// Receiver for debug events. Must be cheap; it is called from worker threads.
pub trait DebugSink: Send + Sync {
    fn record(&self, event: DebugEvent);
}

/// Shared handle to a sink.
pub type SharedDebugSink = Arc<dyn DebugSink>;

/// Sink that forwards every event to `log::trace!`.
#[derive(Debug, Default)]
pub struct LogSink;

impl DebugSink for LogSink {
    fn record(&self, event: DebugEvent) {
        log::trace!("{:?}", event);
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DebugEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all recorded events, leaving the sink empty.
    pub fn take(&self) -> Vec<DebugEvent> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *events)
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DebugSink for RecordingSink {
    fn record(&self, event: DebugEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Forward `event` to `sink` if one is installed.
#[inline]
pub(crate) fn emit(sink: &Option<SharedDebugSink>, event: impl FnOnce() -> DebugEvent) {
    if let Some(sink) = sink {
        sink.record(event());
    }
}
