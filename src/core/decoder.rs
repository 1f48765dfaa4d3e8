// Sparse record stream decoder
//
// Each record is a timestamp, a channel bitmask and one count per set bit.
// Channels whose bit is clear read as zero without consuming bytes.

use crate::core::constants::{BITMASK_SIZE, COUNT_SIZE, MAX_CHANNELS, TIMESTAMP_SIZE};
use crate::core::error::{Result, TraceError};
use crate::core::format::{DecodedTrace, RawSample};
use crate::core::header::read_full;
use std::io::Read;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub records: usize,
    pub count_fields: usize,
    /// Offset just past the last complete record.
    pub end_offset: u64,
}

/// Single forward pass over a record stream. Yields one sample per record and
/// stops after the first error.
pub struct RecordDecoder<R> {
    reader: R,
    channel_count: usize,
    offset: u64,
    stats: DecodeStats,
    finished: bool,
}

impl<R: Read> RecordDecoder<R> {
    /// `base_offset` is only used to report positions in errors, usually the
    /// header length.
    pub fn new(reader: R, channel_count: usize, base_offset: u64) -> Self {
        Self {
            reader,
            channel_count,
            offset: base_offset,
            stats: DecodeStats::default(),
            finished: false,
        }
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    fn truncated(&mut self) -> TraceError {
        self.finished = true;
        TraceError::TruncatedRecord {
            record: self.stats.records,
            offset: self.offset,
        }
    }

    fn read_record(&mut self) -> Result<Option<RawSample>> {
        let mut ts_buf = [0u8; TIMESTAMP_SIZE];
        let got = read_full(&mut self.reader, &mut ts_buf)?;
        if got == 0 {
            return Ok(None);
        }
        if got < TIMESTAMP_SIZE {
            self.offset += got as u64;
            return Err(self.truncated());
        }
        self.offset += TIMESTAMP_SIZE as u64;
        let timestamp_ns = f64::from_le_bytes(ts_buf);

        let mut mask_buf = [0u8; BITMASK_SIZE];
        if read_full(&mut self.reader, &mut mask_buf)? < BITMASK_SIZE {
            return Err(self.truncated());
        }
        self.offset += BITMASK_SIZE as u64;
        let bitmask = mask_buf[0];

        let mut counts = vec![0u32; self.channel_count];
        for (bit, slot) in counts.iter_mut().enumerate() {
            if bit >= MAX_CHANNELS || bitmask & (1 << bit) == 0 {
                continue;
            }
            let mut count_buf = [0u8; COUNT_SIZE];
            let got = read_full(&mut self.reader, &mut count_buf)?;
            if got < COUNT_SIZE {
                self.offset += got as u64;
                return Err(self.truncated());
            }
            self.offset += COUNT_SIZE as u64;
            self.stats.count_fields += 1;
            *slot = u32::from_le_bytes(count_buf);
        }

        self.stats.records += 1;
        self.stats.end_offset = self.offset;
        Ok(Some(RawSample {
            timestamp_ns,
            counts,
        }))
    }
}

impl<R: Read> Iterator for RecordDecoder<R> {
    type Item = Result<RawSample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_record() {
            Ok(Some(sample)) => Some(Ok(sample)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Decodes every record into per-channel columns. Any truncated record fails
/// the whole decode.
pub fn decode_records<R: Read>(
    reader: R,
    channel_count: usize,
    base_offset: u64,
) -> Result<(DecodedTrace, DecodeStats)> {
    let mut decoder = RecordDecoder::new(reader, channel_count, base_offset);
    let mut trace = DecodedTrace::new(channel_count);
    for sample in decoder.by_ref() {
        trace.push(sample?);
    }
    let stats = decoder.stats();
    debug!(
        "Decoded {} records ({} count fields, ends at byte {})",
        stats.records, stats.count_fields, stats.end_offset
    );
    Ok((trace, stats))
}
