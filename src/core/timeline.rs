// Dense timeline reconstruction
//
// Bins are anchored at absolute index 0 so leading silence before the first
// photon stays in the timeline. Every bin without a record reads as zero.

use crate::core::error::{Result, TraceError};
use crate::core::format::{DecodedTrace, ReconstructedTimeline};
use crate::core::sentinel::bin_index;
use tracing::warn;

fn zeroed<T: Copy>(len: usize, value: T) -> Result<Vec<T>> {
    let mut column = Vec::new();
    column
        .try_reserve_exact(len)
        .map_err(|_| TraceError::TimelineTooLarge { bins: len })?;
    column.resize(len, value);
    Ok(column)
}

/// Builds a timeline of exactly `expected_bins` bins spaced `bin_width_ns`
/// apart. Samples mapping outside `[0, expected_bins)` are dropped; a
/// repeated bin index keeps the last sample.
///
/// Fails with `TimelineTooLarge` when the bins cannot be allocated, which
/// happens when a corrupt timestamp or declared duration asks for an absurd
/// length.
pub fn reconstruct(
    channels: &[u32],
    bin_width_ns: f64,
    expected_bins: usize,
    trace: &DecodedTrace,
) -> Result<ReconstructedTimeline> {
    if expected_bins == 0 {
        return Ok(ReconstructedTimeline::empty(channels.to_vec(), bin_width_ns));
    }

    let mut timestamps = zeroed(expected_bins, 0.0f64)?;
    for (i, ts) in timestamps.iter_mut().enumerate() {
        *ts = i as f64 * bin_width_ns;
    }
    let mut counts = Vec::with_capacity(channels.len());
    for _ in channels {
        counts.push(zeroed(expected_bins, 0u32)?);
    }

    let mut dropped = 0usize;
    for (i, ts) in trace.timestamps.iter().enumerate() {
        let index = match bin_index(*ts, bin_width_ns) {
            Some(index) if index < expected_bins as u64 => index as usize,
            _ => {
                dropped += 1;
                continue;
            }
        };
        for (column, source) in counts.iter_mut().zip(&trace.counts) {
            column[index] = source.get(i).copied().unwrap_or(0);
        }
    }

    if dropped > 0 {
        warn!(
            "Dropped {} of {} samples outside the {} bin timeline",
            dropped,
            trace.len(),
            expected_bins
        );
    }

    Ok(ReconstructedTimeline {
        channels: channels.to_vec(),
        bin_width_ns,
        timestamps,
        counts,
    })
}

impl ReconstructedTimeline {
    /// Keeps every `step`-th bin, `step = max(1, floor(len * fraction))`,
    /// to bound the number of points handed to a plot.
    pub fn decimated(&self, fraction: f64) -> ReconstructedTimeline {
        let step = if fraction.is_finite() && fraction > 0.0 {
            ((self.len() as f64 * fraction) as usize).max(1)
        } else {
            1
        };
        ReconstructedTimeline {
            channels: self.channels.clone(),
            bin_width_ns: self.bin_width_ns,
            timestamps: self.timestamps.iter().step_by(step).copied().collect(),
            counts: self
                .counts
                .iter()
                .map(|column| column.iter().step_by(step).copied().collect())
                .collect(),
        }
    }
}
