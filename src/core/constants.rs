// Format constants for IT02 intensity tracing files

pub const MAGIC: &[u8; 4] = b"IT02";

// Header: MAGIC(4) metadata_len(u32)
pub const MAGIC_SIZE: usize = 4;
pub const METADATA_LEN_SIZE: usize = 4;

// Record: timestamp(f64) bitmask(u8) then one count(u32) per set bit
pub const TIMESTAMP_SIZE: usize = 8;
pub const BITMASK_SIZE: usize = 1;
pub const COUNT_SIZE: usize = 4;

// The bitmask is a single byte
pub const MAX_CHANNELS: usize = 8;

pub const NS_PER_US: u64 = 1_000;
pub const NS_PER_MS: u64 = 1_000_000;
pub const NS_PER_SEC: f64 = 1_000_000_000.0;

// Minimum elapsed time before a new CPS figure is emitted
pub const CPS_EMIT_INTERVAL_NS: f64 = 330_000_000.0;

// Display normalization window per displayed channel, capped at 4 channels
pub const DISPLAY_WINDOW_STEP_MS: u64 = 50;
pub const DISPLAY_WINDOW_MAX_CHANNELS: usize = 4;

// Fraction of bins kept when decimating a timeline for plotting
pub const DEFAULT_DECIMATION_FRACTION: f64 = 0.004;
