// IT02 trace reader: header, record decode, sentinel handling and
// timeline reconstruction in one pass over the file

use crate::core::constants::NS_PER_SEC;
use crate::core::decoder::{decode_records, DecodeStats};
use crate::core::error::Result;
use crate::core::format::{AcquisitionMetadata, ReconstructedTimeline};
use crate::core::header::read_header;
use crate::core::sentinel::{plan_bins, BinPlan, BinSource};
use crate::core::timeline::reconstruct;
use crate::utils::channel_names::channel_name;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::info;

/// Per-channel view of a timeline, ready to plot.
#[derive(Debug, Clone)]
pub struct ChannelSeries<'a> {
    pub channel: u32,
    pub label: String,
    pub timestamps: &'a [f64],
    pub counts: &'a [u32],
}

#[derive(Debug, Clone)]
pub struct TraceReader {
    path: Option<PathBuf>,
    metadata: AcquisitionMetadata,
    plan: BinPlan,
    stats: DecodeStats,
    last_sample_ns: Option<f64>,
    timeline: ReconstructedTimeline,
}

impl TraceReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mut reader = Self::from_reader(BufReader::new(file))?;

        info!(
            "Loaded {}: {} channels, {} bins of {} us",
            path.display(),
            reader.metadata.channel_count(),
            reader.timeline.len(),
            reader.metadata.bin_width_micros
        );
        reader.path = Some(path);
        Ok(reader)
    }

    pub fn from_reader<R: Read>(mut source: R) -> Result<Self> {
        let (metadata, header_len) = read_header(&mut source)?;
        let (mut trace, stats) = decode_records(source, metadata.channel_count(), header_len)?;

        let plan = plan_bins(&metadata, &mut trace);
        let last_sample_ns = trace.timestamps.last().copied();
        let timeline = reconstruct(
            &metadata.channels,
            metadata.bin_width_ns(),
            plan.expected_bins,
            &trace,
        )?;

        Ok(Self {
            path: None,
            metadata,
            plan,
            stats,
            last_sample_ns,
            timeline,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn metadata(&self) -> &AcquisitionMetadata {
        &self.metadata
    }

    pub fn timeline(&self) -> &ReconstructedTimeline {
        &self.timeline
    }

    pub fn into_timeline(self) -> ReconstructedTimeline {
        self.timeline
    }

    pub fn decode_stats(&self) -> DecodeStats {
        self.stats
    }

    pub fn expected_bins(&self) -> usize {
        self.plan.expected_bins
    }

    pub fn bin_source(&self) -> BinSource {
        self.plan.source
    }

    pub fn final_time_marker_ns(&self) -> Option<f64> {
        self.plan.final_time_marker_ns
    }

    /// Channels in record order with their display labels.
    pub fn list_channels(&self) -> Vec<(u32, String)> {
        self.metadata
            .channels
            .iter()
            .map(|ch| (*ch, channel_name(*ch, &self.metadata.channel_names)))
            .collect()
    }

    pub fn channel_series(&self, channel: u32) -> Option<ChannelSeries<'_>> {
        let counts = self.timeline.channel_counts(channel)?;
        Some(ChannelSeries {
            channel,
            label: channel_name(channel, &self.metadata.channel_names),
            timestamps: &self.timeline.timestamps,
            counts,
        })
    }

    /// Time of the last reconstructed bin in seconds, rounded to 5 decimals.
    pub fn last_time_seconds(&self) -> Option<f64> {
        let last = *self.timeline.timestamps.last()?;
        Some((last / NS_PER_SEC * 1e5).round() / 1e5)
    }

    /// Acquisition length: declared time, else the sentinel time, else the
    /// last sample.
    pub fn acquisition_seconds(&self) -> Option<f64> {
        if let Some(ms) = self.metadata.acquisition_time_millis {
            return Some(ms as f64 / 1000.0);
        }
        self.plan
            .final_time_marker_ns
            .or(self.last_sample_ns)
            .map(|ns| ns / NS_PER_SEC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::decoder::test_support::encode_file;
    use crate::core::error::TraceError;
    use std::io::{Cursor, Write};

    const SCENARIO_META: &str =
        r#"{"channels":[0,2],"bin_width_micros":1000,"acquisition_time_millis":3}"#;

    fn scenario_records(with_sentinel: bool) -> Vec<(f64, Vec<u32>)> {
        let mut records = vec![(0.0, vec![5, 0]), (2_000_000.0, vec![0, 7])];
        if with_sentinel {
            records.push((3_000_000.0, vec![0, 0]));
        }
        records
    }

    #[test]
    fn test_two_channel_scenario() {
        let bytes = encode_file(SCENARIO_META, &scenario_records(true));
        let reader = TraceReader::from_reader(Cursor::new(bytes)).unwrap();

        assert_eq!(reader.expected_bins(), 3);
        assert_eq!(reader.final_time_marker_ns(), Some(3_000_000.0));
        let timeline = reader.timeline();
        assert_eq!(timeline.timestamps, vec![0.0, 1_000_000.0, 2_000_000.0]);
        assert_eq!(timeline.channel_counts(0).unwrap(), &[5, 0, 0]);
        assert_eq!(timeline.channel_counts(2).unwrap(), &[0, 0, 7]);
        assert!(timeline.channel_counts(1).is_none());
        assert_eq!(reader.acquisition_seconds(), Some(0.003));
        assert_eq!(reader.last_time_seconds(), Some(0.002));
    }

    #[test]
    fn test_sentinel_does_not_change_data() {
        let with = TraceReader::from_reader(Cursor::new(encode_file(
            SCENARIO_META,
            &scenario_records(true),
        )))
        .unwrap();
        let without = TraceReader::from_reader(Cursor::new(encode_file(
            SCENARIO_META,
            &scenario_records(false),
        )))
        .unwrap();
        assert_eq!(with.timeline(), without.timeline());
    }

    #[test]
    fn test_free_running_length_changes_with_sentinel() {
        let meta = r#"{"channels":[0,2],"bin_width_micros":1000,"acquisition_time_millis":null}"#;
        let with = TraceReader::from_reader(Cursor::new(encode_file(meta, &scenario_records(true))))
            .unwrap();
        let without =
            TraceReader::from_reader(Cursor::new(encode_file(meta, &scenario_records(false))))
                .unwrap();

        assert_eq!(with.bin_source(), BinSource::FinalMarker);
        assert_eq!(with.expected_bins(), 3);
        assert_eq!(without.bin_source(), BinSource::LastSample);
        assert_eq!(without.expected_bins(), 3);
        assert_eq!(with.timeline().counts, without.timeline().counts);
        assert_eq!(with.acquisition_seconds(), Some(0.003));
        assert_eq!(without.acquisition_seconds(), Some(0.002));
    }

    #[test]
    fn test_header_only_file() {
        let bytes = encode_file(r#"{"channels":[1],"bin_width_micros":10}"#, &[]);
        let reader = TraceReader::from_reader(Cursor::new(bytes)).unwrap();
        assert!(reader.timeline().is_empty());
        assert_eq!(reader.expected_bins(), 0);
        assert_eq!(reader.acquisition_seconds(), None);
        assert_eq!(reader.last_time_seconds(), None);
    }

    #[test]
    fn test_file_still_being_written() {
        let mut bytes = encode_file(SCENARIO_META, &scenario_records(false));
        bytes.truncate(bytes.len() - 2);
        let err = TraceReader::from_reader(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, TraceError::TruncatedRecord { record: 1, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_open_from_disk_with_labels() {
        let meta = r#"{"channels":[0,3],"bin_width_micros":500,"channel_names":{"3":"Acceptor"}}"#;
        let bytes = encode_file(meta, &[(250_000.0, vec![1, 2]), (1_000_000.0, vec![0, 0])]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();

        let reader = TraceReader::open(file.path()).unwrap();
        assert_eq!(reader.path(), Some(file.path()));
        assert_eq!(
            reader.list_channels(),
            vec![(0, "Channel 1".to_string()), (3, "Acceptor (Ch4)".to_string())]
        );
        let series = reader.channel_series(3).unwrap();
        assert_eq!(series.label, "Acceptor (Ch4)");
        assert_eq!(series.counts, &[2, 0]);
        assert_eq!(series.timestamps, &[0.0, 500_000.0]);
    }

    #[test]
    fn test_corrupt_final_timestamp_is_an_error() {
        let meta = r#"{"channels":[0],"bin_width_micros":1000}"#;
        let bytes = encode_file(meta, &[(0.0, vec![1]), (1e300, vec![2])]);
        let err = TraceReader::from_reader(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, TraceError::TimelineTooLarge { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_absurd_declared_duration_is_an_error() {
        let meta = format!(
            r#"{{"channels":[0],"bin_width_micros":1,"acquisition_time_millis":{}}}"#,
            u64::MAX
        );
        let bytes = encode_file(&meta, &[(0.0, vec![1])]);
        let err = TraceReader::from_reader(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, TraceError::TimelineTooLarge { .. }));
    }

    #[test]
    fn test_open_missing_file() {
        let err = TraceReader::open("/nonexistent/trace.bin").unwrap_err();
        assert!(matches!(err, TraceError::Io(_)));
    }
}
