use glam::Vec3;
use metaspace_common::EntityUuid;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::deferred::DeferredSet;

/// Dynamic-load configuration: proximity grid resolution and per-update budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Edge length of one grid cell in world units.
    pub cell_size: f32,
    /// Maximum number of deferred entities materialized per update.
    pub load_budget: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            cell_size: 16.0,
            load_budget: 8,
        }
    }
}

/// Per-update statistics for instrumentation.
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    pub triggered_this_update: usize,
    pub remaining_deferred: usize,
    pub update_time: Duration,
}

/// Picks which deferred entities an observer position triggers.
///
/// It only selects; removing entries and materializing them is up to the
/// caller, which owns the entity tree.
#[derive(Debug, Clone)]
pub struct ProximityStreamer {
    pub config: StreamConfig,
    stats: StreamStats,
}

impl ProximityStreamer {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            stats: StreamStats::default(),
        }
    }

    /// UUIDs to materialize for this observer position, within budget.
    pub fn update(&mut self, observer: Vec3, deferred: &DeferredSet) -> Vec<EntityUuid> {
        let _span = tracing::info_span!("dynamic_load_update").entered();
        let start = Instant::now();

        let due = deferred.due(observer, self.config.load_budget);

        self.stats = StreamStats {
            triggered_this_update: due.len(),
            remaining_deferred: deferred.len(),
            update_time: start.elapsed(),
        };
        tracing::trace!(
            triggered = due.len(),
            deferred = deferred.len(),
            "dynamic load update complete"
        );
        due
    }

    /// Statistics from the last update.
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }
}
