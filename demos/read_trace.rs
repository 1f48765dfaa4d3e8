// Example usage of the IT02 trace reader

use it_reader::core::constants::DEFAULT_DECIMATION_FRACTION;
use it_reader::{Result, TraceReader};
use tracing::{debug, info, Level};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/intensity-tracing.bin".to_string());

    let reader = match TraceReader::open(&path) {
        Ok(reader) => reader,
        Err(e) if e.is_retryable() => {
            info!("{} is incomplete, try again once the acquisition stops: {}", path, e);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let meta = reader.metadata();
    info!("Bin width: {} us", meta.bin_width_micros);
    match reader.acquisition_seconds() {
        Some(secs) if meta.is_free_running() => info!("Acquisition time: {:.3} s (free running)", secs),
        Some(secs) => info!("Acquisition time: {} s", secs),
        None => info!("No data available to infer the acquisition time"),
    }
    if let Some(period) = meta.laser_period_ns {
        info!("Laser period: {} ns", period);
    }

    info!("Channels:");
    for (channel, label) in reader.list_channels() {
        let Some(series) = reader.channel_series(channel) else {
            continue;
        };
        let total: u64 = series.counts.iter().map(|c| u64::from(*c)).sum();
        info!("  {}: {} photons in {} bins", label, total, series.counts.len());
    }

    let preview = reader.timeline().decimated(DEFAULT_DECIMATION_FRACTION);
    debug!("Plot preview keeps {} of {} bins", preview.len(), reader.timeline().len());
    for bin in preview.bins().take(5) {
        debug!("  t={:.6} s counts={:?}", bin.timestamp_ns / 1e9, bin.counts);
    }

    Ok(())
}
