// Simulated acquisition driving a live session

use it_reader::utils::format_helper::format_cps;
use it_reader::{LiveConfig, LiveSample, LiveSession};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => it_reader::load_config(path).await?,
        None => {
            let mut config = LiveConfig::new(1000);
            config.acquisition_time_millis = Some(2000);
            config.cps_channels = vec![0, 1];
            config.displayed_channels = vec![0, 1];
            config.cps_threshold = 60_000.0;
            config
        }
    };

    let bin_ns = config.bin_width_micros as f64 * 1000.0;
    let total_bins = config.acquisition_time_millis.unwrap_or(2000) * 1000 / config.bin_width_micros;
    let session = LiveSession::start(config)?;
    let sender = session.sender();
    let mut snapshots = session.subscribe();

    let producer = tokio::spawn(async move {
        let mut rng = StdRng::seed_from_u64(7);
        for bin in 0..total_bins {
            let counts = (0..8).map(|ch| rng.gen_range(0..=(40 + ch * 20))).collect();
            let sample = LiveSample {
                timestamp_ns: bin as f64 * bin_ns,
                counts,
            };
            if sender.send(sample).await.is_err() {
                break;
            }
            if bin % 100 == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
        if let Err(e) = sender.end().await {
            warn!("Could not signal end of acquisition: {}", e);
        }
    });

    let watcher = tokio::spawn(async move {
        let mut shown: BTreeMap<u32, f64> = BTreeMap::new();
        while snapshots.changed().await.is_ok() {
            let snap = snapshots.borrow_and_update().clone();
            for (channel, state) in &snap.channels {
                let Some(cps) = state.cps else { continue };
                if shown.insert(*channel, cps) != Some(cps) {
                    let flag = if state.threshold_exceeded { " (!)" } else { "" };
                    info!("Channel {}: {} CPS{}", channel + 1, format_cps(cps), flag);
                }
            }
        }
    });

    producer.await?;
    let summary = session.finished().await;
    watcher.await?;
    info!(
        "Ingested {} samples, {} CPS updates, {} dropped",
        summary.samples_ingested, summary.cps_emissions, summary.samples_dropped
    );
    Ok(())
}
