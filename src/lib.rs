// IT02 intensity tracing reader
// Main library entry point

pub mod core;
pub mod live;
pub mod utils;

// Re-export main types
pub use core::error::{Result, TraceError};
pub use core::format::{AcquisitionMetadata, RawSample, ReconstructedTimeline, TimeBin};
pub use core::reader::{ChannelSeries, TraceReader};
pub use live::aggregator::{AggregatorSnapshot, CpsUpdate, LiveSample, StreamingAggregator};
pub use live::feed::{FeedEvent, FeedSender, LiveSession, SessionSummary};
pub use utils::conf_helper::{load_config, LiveConfig};
