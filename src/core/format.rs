// Data structures for the IT02 format

use crate::core::constants::{MAX_CHANNELS, NS_PER_US};
use crate::core::error::{Result, TraceError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

/// Acquisition settings stored as JSON in the file header.
///
/// Fields the reader does not know about are kept in `extra` so a file can be
/// inspected or re-exported without losing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionMetadata {
    /// Enabled hardware channels, in the order their bits appear in records.
    pub channels: Vec<u32>,
    pub bin_width_micros: u64,
    /// `None` means the acquisition was free-running.
    #[serde(default)]
    pub acquisition_time_millis: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub laser_period_ns: Option<f64>,
    /// Display labels keyed by the channel index as a decimal string.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub channel_names: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AcquisitionMetadata {
    pub fn new(channels: Vec<u32>, bin_width_micros: u64) -> Self {
        Self {
            channels,
            bin_width_micros,
            acquisition_time_millis: None,
            laser_period_ns: None,
            channel_names: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(TraceError::MalformedMetadata(
                "no enabled channels".to_string(),
            ));
        }
        if self.channels.len() > MAX_CHANNELS {
            return Err(TraceError::MalformedMetadata(format!(
                "{} channels enabled, at most {} fit in a record bitmask",
                self.channels.len(),
                MAX_CHANNELS
            )));
        }
        let mut seen = HashSet::with_capacity(self.channels.len());
        if let Some(dup) = self.channels.iter().find(|ch| !seen.insert(**ch)) {
            return Err(TraceError::MalformedMetadata(format!(
                "channel {} listed more than once",
                dup
            )));
        }
        if self.bin_width_micros == 0 {
            return Err(TraceError::MalformedMetadata(
                "bin_width_micros must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn bin_width_ns(&self) -> f64 {
        self.bin_width_micros as f64 * NS_PER_US as f64
    }

    pub fn is_free_running(&self) -> bool {
        self.acquisition_time_millis.is_none()
    }

    /// Position of a hardware channel within each record.
    pub fn position_of(&self, channel: u32) -> Option<usize> {
        self.channels.iter().position(|ch| *ch == channel)
    }

    pub fn custom_name(&self, channel: u32) -> Option<&str> {
        self.channel_names
            .get(&channel.to_string())
            .map(String::as_str)
    }
}

/// One decoded record: a timestamp and one count per enabled channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub timestamp_ns: f64,
    pub counts: Vec<u32>,
}

impl RawSample {
    pub fn is_all_zero(&self) -> bool {
        self.counts.iter().all(|c| *c == 0)
    }
}

/// Sparse decoder output: one timestamp per record and one count column per
/// channel, all of the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedTrace {
    pub timestamps: Vec<f64>,
    pub counts: Vec<Vec<u32>>,
}

impl DecodedTrace {
    pub fn new(channel_count: usize) -> Self {
        Self {
            timestamps: Vec::new(),
            counts: vec![Vec::new(); channel_count],
        }
    }

    pub fn push(&mut self, sample: RawSample) {
        self.timestamps.push(sample.timestamp_ns);
        for (column, count) in self.counts.iter_mut().zip(sample.counts) {
            column.push(count);
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn sample(&self, index: usize) -> Option<RawSample> {
        let timestamp_ns = *self.timestamps.get(index)?;
        let counts = self
            .counts
            .iter()
            .map(|column| column.get(index).copied().unwrap_or(0))
            .collect();
        Some(RawSample {
            timestamp_ns,
            counts,
        })
    }
}

/// One bin of a reconstructed timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBin {
    pub index: usize,
    pub timestamp_ns: f64,
    pub counts: Vec<u32>,
}

/// Dense, uniformly spaced count matrix covering an acquisition.
///
/// Stored column-wise: `counts[position][bin]`, where `position` follows the
/// metadata channel order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconstructedTimeline {
    pub channels: Vec<u32>,
    pub bin_width_ns: f64,
    pub timestamps: Vec<f64>,
    pub counts: Vec<Vec<u32>>,
}

impl ReconstructedTimeline {
    pub fn empty(channels: Vec<u32>, bin_width_ns: f64) -> Self {
        let columns = channels.len();
        Self {
            channels,
            bin_width_ns,
            timestamps: Vec::new(),
            counts: vec![Vec::new(); columns],
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn bin(&self, index: usize) -> Option<TimeBin> {
        let timestamp_ns = *self.timestamps.get(index)?;
        Some(TimeBin {
            index,
            timestamp_ns,
            counts: self
                .counts
                .iter()
                .map(|column| column.get(index).copied().unwrap_or(0))
                .collect(),
        })
    }

    pub fn bins(&self) -> impl Iterator<Item = TimeBin> + '_ {
        (0..self.len()).filter_map(move |i| self.bin(i))
    }

    /// Counts for a hardware channel index, `None` if it was not recorded.
    pub fn channel_counts(&self, channel: u32) -> Option<&[u32]> {
        let position = self.channels.iter().position(|ch| *ch == channel)?;
        self.counts.get(position).map(Vec::as_slice)
    }

    pub fn times_seconds(&self) -> Vec<f64> {
        self.timestamps
            .iter()
            .map(|t| t / crate::core::constants::NS_PER_SEC)
            .collect()
    }
}
