// Trailing sentinel detection and timeline length inference
//
// The driver may close a file with an all-zero record whose only purpose is to
// carry the acquisition end time. Only the last record can be a sentinel; an
// all-zero record anywhere else is a real empty bin.

use crate::core::constants::NS_PER_MS;
use crate::core::format::{AcquisitionMetadata, DecodedTrace};
use tracing::debug;

/// Where the timeline length came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinSource {
    DeclaredTime,
    FinalMarker,
    LastSample,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinPlan {
    pub expected_bins: usize,
    pub source: BinSource,
    pub final_time_marker_ns: Option<f64>,
}

/// Removes a trailing all-zero record and returns its timestamp.
pub fn strip_sentinel(trace: &mut DecodedTrace) -> Option<f64> {
    if trace.is_empty() || trace.counts.is_empty() {
        return None;
    }
    let is_sentinel = trace.counts.iter().all(|column| column.last() == Some(&0));
    if !is_sentinel {
        return None;
    }
    let marker = trace.timestamps.pop();
    for column in trace.counts.iter_mut() {
        column.pop();
    }
    marker
}

/// `floor(time_ns / bin_width_ns)`, or `None` for negative or non-finite
/// times.
pub fn bin_index(time_ns: f64, bin_width_ns: f64) -> Option<u64> {
    let index = (time_ns / bin_width_ns).floor();
    if index.is_finite() && index >= 0.0 {
        Some(index as u64)
    } else {
        None
    }
}

fn to_len(bins: u64) -> usize {
    usize::try_from(bins).unwrap_or(usize::MAX)
}

/// Number of bins in the dense timeline. The declared acquisition time wins,
/// then the sentinel time, then the last remaining sample.
pub fn expected_bins(
    metadata: &AcquisitionMetadata,
    final_time_marker_ns: Option<f64>,
    timestamps: &[f64],
) -> (usize, BinSource) {
    if let Some(acq_ms) = metadata.acquisition_time_millis {
        let total_ns = u128::from(acq_ms) * u128::from(NS_PER_MS);
        let bin_ns = u128::from(metadata.bin_width_micros) * 1_000;
        let bins = u64::try_from(total_ns / bin_ns).unwrap_or(u64::MAX);
        return (to_len(bins), BinSource::DeclaredTime);
    }

    let bin_width_ns = metadata.bin_width_ns();
    if let Some(marker) = final_time_marker_ns {
        let bins = bin_index(marker, bin_width_ns).unwrap_or(0);
        return (to_len(bins), BinSource::FinalMarker);
    }

    match timestamps.last() {
        Some(last) => {
            let bins = bin_index(*last, bin_width_ns).map_or(0, |i| i.saturating_add(1));
            (to_len(bins), BinSource::LastSample)
        }
        None => (0, BinSource::Empty),
    }
}

/// Strips the sentinel (if any) from `trace` and works out the timeline
/// length.
pub fn plan_bins(metadata: &AcquisitionMetadata, trace: &mut DecodedTrace) -> BinPlan {
    let final_time_marker_ns = strip_sentinel(trace);
    let (expected_bins, source) = expected_bins(metadata, final_time_marker_ns, &trace.timestamps);
    debug!(
        "Sentinel: {:?}, expected bins: {} ({:?})",
        final_time_marker_ns, expected_bins, source
    );
    BinPlan {
        expected_bins,
        source,
        final_time_marker_ns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::format::RawSample;

    fn trace(samples: &[(f64, Vec<u32>)]) -> DecodedTrace {
        let channels = samples.first().map_or(2, |(_, c)| c.len());
        let mut trace = DecodedTrace::new(channels);
        for (ts, counts) in samples {
            trace.push(RawSample {
                timestamp_ns: *ts,
                counts: counts.clone(),
            });
        }
        trace
    }

    fn metadata(acq: Option<u64>) -> AcquisitionMetadata {
        let mut meta = AcquisitionMetadata::new(vec![0, 2], 1000);
        meta.acquisition_time_millis = acq;
        meta
    }

    #[test]
    fn test_trailing_zero_record_is_stripped() {
        let mut t = trace(&[(0.0, vec![5, 0]), (3_000_000.0, vec![0, 0])]);
        assert_eq!(strip_sentinel(&mut t), Some(3_000_000.0));
        assert_eq!(t.timestamps, vec![0.0]);
        assert_eq!(t.counts, vec![vec![5], vec![0]]);
    }

    #[test]
    fn test_mid_stream_zero_record_is_data() {
        let mut t = trace(&[(0.0, vec![0, 0]), (1_000_000.0, vec![1, 0])]);
        assert_eq!(strip_sentinel(&mut t), None);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_empty_trace_has_no_sentinel() {
        let mut t = DecodedTrace::new(2);
        assert_eq!(strip_sentinel(&mut t), None);
    }

    #[test]
    fn test_only_record_all_zero_is_a_sentinel() {
        let mut t = trace(&[(5_000_000.0, vec![0, 0])]);
        let plan = plan_bins(&metadata(None), &mut t);
        assert!(t.is_empty());
        assert_eq!(plan.final_time_marker_ns, Some(5_000_000.0));
        assert_eq!(plan.expected_bins, 5);
        assert_eq!(plan.source, BinSource::FinalMarker);
    }

    #[test]
    fn test_declared_time_takes_precedence() {
        let mut t = trace(&[(0.0, vec![1, 0]), (9_000_000.0, vec![0, 0])]);
        let plan = plan_bins(&metadata(Some(3)), &mut t);
        assert_eq!(plan.expected_bins, 3);
        assert_eq!(plan.source, BinSource::DeclaredTime);
        assert_eq!(plan.final_time_marker_ns, Some(9_000_000.0));
    }

    #[test]
    fn test_declared_time_floors() {
        let mut meta = AcquisitionMetadata::new(vec![0], 300);
        meta.acquisition_time_millis = Some(1);
        // 1 ms / 300 us = 3.33 bins
        assert_eq!(expected_bins(&meta, None, &[]), (3, BinSource::DeclaredTime));
    }

    #[test]
    fn test_free_running_falls_back_to_last_sample() {
        let mut t = trace(&[(0.0, vec![1, 0]), (4_500_000.0, vec![0, 2])]);
        let plan = plan_bins(&metadata(None), &mut t);
        assert_eq!(plan.final_time_marker_ns, None);
        assert_eq!(plan.expected_bins, 5);
        assert_eq!(plan.source, BinSource::LastSample);
    }

    #[test]
    fn test_nothing_to_infer_from() {
        assert_eq!(expected_bins(&metadata(None), None, &[]), (0, BinSource::Empty));
    }

    #[test]
    fn test_bin_index_rejects_negative_and_nan() {
        assert_eq!(bin_index(2_999_999.0, 1_000_000.0), Some(2));
        assert_eq!(bin_index(-1.0, 1_000_000.0), None);
        assert_eq!(bin_index(f64::NAN, 1_000_000.0), None);
        assert_eq!(bin_index(f64::INFINITY, 1_000_000.0), None);
    }
}
