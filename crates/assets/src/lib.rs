//! Asset settlement: counts outstanding pending-asset markers of a scene load
//! and reports progress until everything has settled.
//!
//! The tracker never looks at components itself. Whoever owns component
//! storage reports marker enter/exit through [`SettlementTracker::pending_added`]
//! and [`SettlementTracker::pending_removed`].
//!
//! # Invariants
//! - Progress for one load never decreases and ends at 100.
//! - `SceneLoaded` is emitted exactly once per completed load phase.
//! - `begin()` discards everything belonging to a superseded load.

use serde::{Deserialize, Serialize};

/// Lifecycle of one scene load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SettlementState {
    #[default]
    Idle,
    Loading,
    Settled,
}

/// Signals for the renderer/UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementEvent {
    LoadingProgress { progress: u8 },
    SceneLoaded,
}

/// How an external asset fetch ended.
///
/// A failed asset still counts as settled so one broken URL can not block
/// the scene forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOutcome {
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct SettlementTracker {
    state: SettlementState,
    /// Markers seen entering during the current phase.
    peak: usize,
    remaining: usize,
    last_progress: u8,
    /// Set between `begin` and `finish_deserialization`; reaching zero does
    /// not settle while entities are still being created.
    deserializing: bool,
    generation: u64,
    events: Vec<SettlementEvent>,
}

impl SettlementTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SettlementState {
        self.state
    }

    /// Outstanding pending-asset markers.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Incremented on every `begin`; identifies the load being tracked.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn drain_events(&mut self) -> Vec<SettlementEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[SettlementEvent] {
        &self.events
    }

    /// Enter `Loading` for a new scene load, zeroing the counter.
    pub fn begin(&mut self) {
        if self.state == SettlementState::Loading {
            tracing::debug!(
                generation = self.generation,
                remaining = self.remaining,
                "discarding superseded load"
            );
        }
        self.generation += 1;
        self.state = SettlementState::Loading;
        self.peak = 0;
        self.remaining = 0;
        self.last_progress = 0;
        self.deserializing = true;
        self.events.clear();
    }

    /// Back to `Idle`, dropping counters and queued events.
    pub fn reset(&mut self) {
        self.state = SettlementState::Idle;
        self.peak = 0;
        self.remaining = 0;
        self.last_progress = 0;
        self.deserializing = false;
        self.events.clear();
    }

    /// Initial deserialization is done. Settles synchronously when nothing is
    /// pending.
    pub fn finish_deserialization(&mut self) {
        self.deserializing = false;
        if self.state == SettlementState::Loading && self.remaining == 0 {
            self.emit_progress(100);
            self.settle();
        }
    }

    /// A pending-asset marker was attached.
    pub fn pending_added(&mut self) {
        if self.state != SettlementState::Loading {
            // Late markers (incremental loads, dynamic materialization) open
            // a fresh phase.
            self.state = SettlementState::Loading;
            self.peak = 0;
            self.last_progress = 0;
        }
        self.remaining += 1;
        self.peak += 1;
    }

    /// A pending-asset marker was removed.
    pub fn pending_removed(&mut self) {
        if self.remaining == 0 {
            tracing::debug!("pending-asset marker removed with nothing outstanding");
            return;
        }
        self.remaining -= 1;

        let completed = self.peak - self.remaining;
        let progress = ((100.0 * completed as f64) / self.peak as f64).round() as u8;
        self.emit_progress(progress.min(100));

        if self.remaining == 0 && !self.deserializing {
            self.settle();
        }
    }

    fn emit_progress(&mut self, progress: u8) {
        let progress = progress.max(self.last_progress);
        self.last_progress = progress;
        tracing::trace!(progress, remaining = self.remaining, "scene loading progress");
        self.events
            .push(SettlementEvent::LoadingProgress { progress });
    }

    fn settle(&mut self) {
        tracing::debug!(generation = self.generation, peak = self.peak, "scene assets settled");
        self.state = SettlementState::Settled;
        self.peak = 0;
        self.events.push(SettlementEvent::SceneLoaded);
    }
}

pub fn crate_info() -> &'static str {
    "metaspace-assets v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress_values(events: &[SettlementEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                SettlementEvent::LoadingProgress { progress } => Some(*progress),
                SettlementEvent::SceneLoaded => None,
            })
            .collect()
    }

    #[test]
    fn starts_idle() {
        let t = SettlementTracker::new();
        assert_eq!(t.state(), SettlementState::Idle);
        assert_eq!(t.remaining(), 0);
    }

    #[test]
    fn nothing_pending_settles_synchronously() {
        let mut t = SettlementTracker::new();
        t.begin();
        t.finish_deserialization();
        assert_eq!(t.state(), SettlementState::Settled);
        assert_eq!(
            t.events(),
            &[
                SettlementEvent::LoadingProgress { progress: 100 },
                SettlementEvent::SceneLoaded
            ]
        );
    }

    #[test]
    fn settles_after_last_marker() {
        let mut t = SettlementTracker::new();
        t.begin();
        for _ in 0..4 {
            t.pending_added();
        }
        t.finish_deserialization();
        assert_eq!(t.state(), SettlementState::Loading);

        for _ in 0..4 {
            t.pending_removed();
        }
        assert_eq!(t.state(), SettlementState::Settled);
        let events = t.drain_events();
        assert_eq!(progress_values(&events), vec![25, 50, 75, 100]);
        assert_eq!(events.last(), Some(&SettlementEvent::SceneLoaded));
    }

    #[test]
    fn zero_during_deserialization_waits_for_finish() {
        let mut t = SettlementTracker::new();
        t.begin();
        t.pending_added();
        t.pending_removed();
        assert_eq!(t.state(), SettlementState::Loading);
        assert!(!t.events().contains(&SettlementEvent::SceneLoaded));

        t.finish_deserialization();
        assert_eq!(t.state(), SettlementState::Settled);
        let loaded = t
            .events()
            .iter()
            .filter(|e| **e == SettlementEvent::SceneLoaded)
            .count();
        assert_eq!(loaded, 1);
    }

    #[test]
    fn progress_never_decreases_when_markers_arrive_late() {
        let mut t = SettlementTracker::new();
        t.begin();
        t.pending_added();
        t.pending_added();
        t.finish_deserialization();
        t.pending_removed(); // 50
        t.pending_added();
        t.pending_added(); // peak 4, remaining 3
        t.pending_removed(); // raw 50
        t.pending_removed(); // raw 75
        t.pending_removed(); // 100

        let values = progress_values(t.events());
        assert!(values.windows(2).all(|w| w[0] <= w[1]), "{values:?}");
        assert_eq!(values.last(), Some(&100));
        assert_eq!(t.state(), SettlementState::Settled);
    }

    #[test]
    fn begin_discards_superseded_load() {
        let mut t = SettlementTracker::new();
        t.begin();
        t.pending_added();
        t.pending_added();
        let first = t.generation();

        t.begin();
        assert_eq!(t.remaining(), 0);
        assert!(t.generation() > first);
        t.pending_removed(); // stale marker from the old load
        assert!(t.events().is_empty());
        t.finish_deserialization();
        assert_eq!(t.state(), SettlementState::Settled);
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut t = SettlementTracker::new();
        t.begin();
        t.pending_added();
        t.reset();
        assert_eq!(t.state(), SettlementState::Idle);
        assert_eq!(t.remaining(), 0);
        assert!(t.events().is_empty());
    }

    #[test]
    fn late_marker_opens_new_phase() {
        let mut t = SettlementTracker::new();
        t.begin();
        t.finish_deserialization();
        t.drain_events();

        t.pending_added();
        assert_eq!(t.state(), SettlementState::Loading);
        t.pending_removed();
        assert_eq!(
            t.drain_events(),
            vec![
                SettlementEvent::LoadingProgress { progress: 100 },
                SettlementEvent::SceneLoaded
            ]
        );
    }
}
