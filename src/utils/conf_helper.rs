use crate::core::error::{Result, TraceError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::info;

fn default_time_span() -> f64 {
    5.0
}

fn default_queue_capacity() -> usize {
    1024
}

/// Settings for a live acquisition session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveConfig {
    pub bin_width_micros: u64,
    /// Width of the rolling display window.
    #[serde(default = "default_time_span")]
    pub time_span_seconds: f64,
    /// `None` for free-running acquisitions.
    #[serde(default)]
    pub acquisition_time_millis: Option<u64>,
    /// Channels that get a CPS estimator.
    #[serde(default)]
    pub cps_channels: Vec<u32>,
    /// Channels that get a rolling display buffer.
    #[serde(default)]
    pub displayed_channels: Vec<u32>,
    /// 0 disables the threshold.
    #[serde(default)]
    pub cps_threshold: f64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl LiveConfig {
    pub fn new(bin_width_micros: u64) -> Self {
        Self {
            bin_width_micros,
            time_span_seconds: default_time_span(),
            acquisition_time_millis: None,
            cps_channels: Vec::new(),
            displayed_channels: Vec::new(),
            cps_threshold: 0.0,
            queue_capacity: default_queue_capacity(),
        }
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        let config: LiveConfig = serde_json::from_str(data)
            .map_err(|e| TraceError::InvalidConfig(format!("JSON parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bin_width_micros == 0 {
            return Err(TraceError::InvalidConfig(
                "bin_width_micros must be positive".to_string(),
            ));
        }
        if !(self.time_span_seconds.is_finite() && self.time_span_seconds > 0.0) {
            return Err(TraceError::InvalidConfig(format!(
                "time_span_seconds must be positive, got {}",
                self.time_span_seconds
            )));
        }
        if self.queue_capacity == 0 {
            return Err(TraceError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<LiveConfig> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).await?;
    let config = LiveConfig::from_json_str(&data)?;
    info!(
        "Live config loaded from {}: bin width {} us, span {} s",
        path.display(),
        config.bin_width_micros,
        config.time_span_seconds
    );
    Ok(config)
}
