// Counts-per-second estimator for one channel

use crate::core::constants::{CPS_EMIT_INTERVAL_NS, NS_PER_SEC};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CpsState {
    Uninitialized,
    Armed {
        last_emit_time_ns: f64,
        last_cumulative_count: u64,
        current_cumulative_count: u64,
    },
}

/// Emits `Δcount / Δt` once more than 330 ms have passed since the previous
/// emission. The first sample only arms the estimator.
#[derive(Debug, Clone)]
pub struct CpsEstimator {
    state: CpsState,
    latest: Option<f64>,
}

impl CpsEstimator {
    pub fn new() -> Self {
        Self {
            state: CpsState::Uninitialized,
            latest: None,
        }
    }

    pub fn state(&self) -> CpsState {
        self.state
    }

    /// Last emitted rate.
    pub fn latest(&self) -> Option<f64> {
        self.latest
    }

    pub fn reset(&mut self) {
        self.state = CpsState::Uninitialized;
        self.latest = None;
    }

    pub fn ingest(&mut self, timestamp_ns: f64, count: u32) -> Option<f64> {
        match &mut self.state {
            CpsState::Uninitialized => {
                self.state = CpsState::Armed {
                    last_emit_time_ns: timestamp_ns,
                    last_cumulative_count: u64::from(count),
                    current_cumulative_count: u64::from(count),
                };
                None
            }
            CpsState::Armed {
                last_emit_time_ns,
                last_cumulative_count,
                current_cumulative_count,
            } => {
                *current_cumulative_count += u64::from(count);
                let elapsed_ns = timestamp_ns - *last_emit_time_ns;
                if elapsed_ns <= CPS_EMIT_INTERVAL_NS {
                    return None;
                }
                let delta = (*current_cumulative_count - *last_cumulative_count) as f64;
                let rate = delta / (elapsed_ns / NS_PER_SEC);
                *last_emit_time_ns = timestamp_ns;
                *last_cumulative_count = *current_cumulative_count;
                self.latest = Some(rate);
                Some(rate)
            }
        }
    }
}

impl Default for CpsEstimator {
    fn default() -> Self {
        Self::new()
    }
}
