// Live aggregation of per-bin samples into CPS figures and rolling display
// buffers. Not thread-safe by itself: one consumer owns it and ingests
// samples in arrival order.

use crate::core::constants::{
    DISPLAY_WINDOW_MAX_CHANNELS, DISPLAY_WINDOW_STEP_MS, NS_PER_SEC,
};
use crate::core::error::Result;
use crate::live::cps::CpsEstimator;
use crate::live::rolling::RollingBuffer;
use crate::utils::conf_helper::LiveConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::trace;

/// One sample from the acquisition driver. `counts` is indexed by hardware
/// channel, not by position in the enabled list.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSample {
    pub timestamp_ns: f64,
    pub counts: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CpsUpdate {
    pub channel: u32,
    pub rate: f64,
    pub threshold_exceeded: bool,
}

impl CpsUpdate {
    pub fn exceeds(&self, threshold: f64) -> bool {
        threshold > 0.0 && self.rate > threshold
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelSnapshot {
    pub cps: Option<f64>,
    pub threshold_exceeded: bool,
    pub points: Vec<(f64, f64)>,
}

/// Read-only copy of the aggregator state handed to renderers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatorSnapshot {
    pub samples_ingested: u64,
    pub last_timestamp_ns: Option<f64>,
    pub channels: BTreeMap<u32, ChannelSnapshot>,
}

fn sample_count(sample: &LiveSample, channel: u32) -> Option<&u32> {
    usize::try_from(channel)
        .ok()
        .and_then(|index| sample.counts.get(index))
}

/// Normalization window in ms for the number of displayed channels:
/// 1 -> 50, 2 -> 100, 3 -> 150, 4 or more -> 200.
pub fn display_window_ms(displayed_channels: usize) -> Option<u64> {
    if displayed_channels == 0 {
        return None;
    }
    let steps = displayed_channels.min(DISPLAY_WINDOW_MAX_CHANNELS) as u64;
    Some(steps * DISPLAY_WINDOW_STEP_MS)
}

/// Divisor turning a raw bin count into a display intensity.
pub fn adjustment_factor(displayed_channels: usize, bin_width_micros: u64) -> Option<f64> {
    if bin_width_micros == 0 {
        return None;
    }
    display_window_ms(displayed_channels).map(|ms| (ms * 1000) as f64 / bin_width_micros as f64)
}

pub struct StreamingAggregator {
    config: LiveConfig,
    adjustment: Option<f64>,
    cps: BTreeMap<u32, CpsEstimator>,
    threshold_exceeded: BTreeMap<u32, bool>,
    buffers: BTreeMap<u32, RollingBuffer>,
    samples_ingested: u64,
    last_timestamp_ns: Option<f64>,
}

impl StreamingAggregator {
    pub fn new(config: LiveConfig) -> Result<Self> {
        config.validate()?;
        let adjustment =
            adjustment_factor(config.displayed_channels.len(), config.bin_width_micros);
        let cps = config
            .cps_channels
            .iter()
            .map(|ch| (*ch, CpsEstimator::new()))
            .collect();
        let buffers = config
            .displayed_channels
            .iter()
            .map(|ch| (*ch, RollingBuffer::new(config.time_span_seconds)))
            .collect();
        Ok(Self {
            config,
            adjustment,
            cps,
            threshold_exceeded: BTreeMap::new(),
            buffers,
            samples_ingested: 0,
            last_timestamp_ns: None,
        })
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    pub fn samples_ingested(&self) -> u64 {
        self.samples_ingested
    }

    /// Feeds one sample. Returns the CPS figures emitted on this tick.
    pub fn ingest(&mut self, sample: &LiveSample) -> Vec<CpsUpdate> {
        if !sample.timestamp_ns.is_finite() {
            trace!("Ignoring sample with timestamp {}", sample.timestamp_ns);
            return Vec::new();
        }
        self.samples_ingested += 1;
        self.last_timestamp_ns = Some(sample.timestamp_ns);

        let threshold = self.config.cps_threshold;
        let mut updates = Vec::new();
        for (channel, estimator) in self.cps.iter_mut() {
            let Some(count) = sample_count(sample, *channel) else {
                continue;
            };
            if let Some(rate) = estimator.ingest(sample.timestamp_ns, *count) {
                let mut update = CpsUpdate {
                    channel: *channel,
                    rate,
                    threshold_exceeded: false,
                };
                update.threshold_exceeded = update.exceeds(threshold);
                self.threshold_exceeded
                    .insert(*channel, update.threshold_exceeded);
                trace!("Channel {} CPS {:.1}", channel, rate);
                updates.push(update);
            }
        }

        if let Some(adjustment) = self.adjustment {
            let time_seconds = sample.timestamp_ns / NS_PER_SEC;
            for (channel, buffer) in self.buffers.iter_mut() {
                if let Some(count) = sample_count(sample, *channel) {
                    buffer.push(time_seconds, f64::from(*count) / adjustment);
                }
            }
        }

        updates
    }

    pub fn cps(&self, channel: u32) -> Option<f64> {
        self.cps.get(&channel).and_then(CpsEstimator::latest)
    }

    pub fn rolling(&self, channel: u32) -> Option<&RollingBuffer> {
        self.buffers.get(&channel)
    }

    /// Time left in a fixed-duration acquisition; `None` when free-running.
    pub fn remaining_time(&self, timestamp_ns: f64) -> Option<Duration> {
        let total_seconds = self.config.acquisition_time_millis? as f64 / 1000.0;
        let elapsed_seconds = timestamp_ns / NS_PER_SEC;
        let remaining = total_seconds - elapsed_seconds;
        if !remaining.is_finite() {
            return Some(Duration::ZERO);
        }
        Some(Duration::from_secs_f64(remaining.clamp(0.0, total_seconds)))
    }

    /// Returns every channel to its pre-acquisition state.
    pub fn reset(&mut self) {
        for estimator in self.cps.values_mut() {
            estimator.reset();
        }
        for buffer in self.buffers.values_mut() {
            buffer.clear();
        }
        self.threshold_exceeded.clear();
        self.samples_ingested = 0;
        self.last_timestamp_ns = None;
    }

    pub fn snapshot(&self) -> AggregatorSnapshot {
        let mut channels: BTreeMap<u32, ChannelSnapshot> = BTreeMap::new();
        for (channel, estimator) in &self.cps {
            let entry = channels.entry(*channel).or_default();
            entry.cps = estimator.latest();
            entry.threshold_exceeded = self
                .threshold_exceeded
                .get(channel)
                .copied()
                .unwrap_or(false);
        }
        for (channel, buffer) in &self.buffers {
            channels.entry(*channel).or_default().points = buffer.to_vec();
        }
        AggregatorSnapshot {
            samples_ingested: self.samples_ingested,
            last_timestamp_ns: self.last_timestamp_ns,
            channels,
        }
    }
}
