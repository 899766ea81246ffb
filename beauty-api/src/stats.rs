//! Per-frame processing cost aggregation
//!
//! Costs are summed over a fixed window; when the window elapses one
//! [`BeautyStats`] record is handed to the callback and the window restarts.

use crate::config::StatsCallback;
use bytemuck::{Pod, Zeroable};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Processing cost summary for one window
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct BeautyStats {
    pub min_cost_ms: f64,
    pub max_cost_ms: f64,
    pub average_cost_ms: f64,
    pub frames: u64,
}

pub struct StatsAggregator {
    window: Duration,
    callback: Option<StatsCallback>,
    window_start: Option<Instant>,
    frames: u64,
    total: Duration,
    min: Duration,
    max: Duration,
}

impl StatsAggregator {
    pub fn new(window: Duration, callback: Option<StatsCallback>) -> Self {
        Self {
            window,
            callback,
            window_start: None,
            frames: 0,
            total: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
        }
    }

    pub fn record(&mut self, cost: Duration) -> Option<BeautyStats> {
        self.record_at(cost, Instant::now())
    }

    /// Add one frame's cost measured at `now`.
    ///
    /// Returns the emitted record when this frame closed the window.
    pub fn record_at(&mut self, cost: Duration, now: Instant) -> Option<BeautyStats> {
        let start = *self.window_start.get_or_insert(now);

        self.frames += 1;
        self.total += cost;
        self.min = self.min.min(cost);
        self.max = self.max.max(cost);

        if now.duration_since(start) < self.window {
            return None;
        }

        let stats = self.snapshot();
        self.clear_window();
        self.window_start = Some(now);
        self.emit(stats);
        Some(stats)
    }

    /// Running figures for the open window
    pub fn snapshot(&self) -> BeautyStats {
        if self.frames == 0 {
            return BeautyStats::default();
        }
        BeautyStats {
            min_cost_ms: as_ms(self.min),
            max_cost_ms: as_ms(self.max),
            average_cost_ms: as_ms(self.total) / self.frames as f64,
            frames: self.frames,
        }
    }

    /// Drop the partial window
    pub fn reset(&mut self) {
        self.clear_window();
        self.window_start = None;
    }

    fn clear_window(&mut self) {
        self.frames = 0;
        self.total = Duration::ZERO;
        self.min = Duration::MAX;
        self.max = Duration::ZERO;
    }

    fn emit(&self, stats: BeautyStats) {
        let Some(callback) = &self.callback else {
            return;
        };
        if panic::catch_unwind(AssertUnwindSafe(|| callback(stats))).is_err() {
            log::warn!("stats callback panicked, record dropped");
        }
    }
}

fn as_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
