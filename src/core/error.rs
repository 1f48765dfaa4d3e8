// Error handling for IT02 decoding and the live aggregation path

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TraceError>;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not an intensity tracing file: expected magic {expected:?}, got {got:?}")]
    InvalidFormat { expected: Vec<u8>, got: Vec<u8> },

    #[error("Truncated header: expected {expected} bytes, {available} available")]
    TruncatedHeader { expected: usize, available: usize },

    #[error("Malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error("Truncated record #{record} at byte offset {offset}")]
    TruncatedRecord { record: usize, offset: u64 },

    #[error("Timeline of {bins} bins cannot be allocated")]
    TimelineTooLarge { bins: usize },

    #[error("Invalid live configuration: {0}")]
    InvalidConfig(String),

    #[error("Live feed closed")]
    FeedClosed,
}

impl TraceError {
    /// True when the input simply ended early, e.g. a file the acquisition
    /// driver is still writing. Reading again later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TraceError::TruncatedRecord { .. } | TraceError::TruncatedHeader { .. }
        )
    }
}
