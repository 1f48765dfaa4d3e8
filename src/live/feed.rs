// Bounded producer/consumer feed between the acquisition driver and the
// aggregator.
//
// The driver pushes samples into a bounded mpsc channel. A single consumer
// task drains it in arrival order, feeds the aggregator and publishes
// snapshots through a watch channel for renderers.

use crate::core::error::{Result, TraceError};
use crate::live::aggregator::{AggregatorSnapshot, LiveSample, StreamingAggregator};
use crate::utils::conf_helper::LiveConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// Samples handled before a snapshot is published
const MAX_DRAIN_BATCH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Sample(LiveSample),
    /// The driver finished the acquisition.
    End,
}

#[derive(Clone)]
pub struct FeedSender {
    tx: mpsc::Sender<FeedEvent>,
    dropped: Arc<AtomicU64>,
}

impl FeedSender {
    /// Waits for queue space.
    pub async fn send(&self, sample: LiveSample) -> Result<()> {
        self.tx
            .send(FeedEvent::Sample(sample))
            .await
            .map_err(|_| TraceError::FeedClosed)
    }

    /// Never waits. A full queue drops this sample and returns `false`.
    pub fn try_send(&self, sample: LiveSample) -> bool {
        match self.tx.try_send(FeedEvent::Sample(sample)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % 1000 == 0 {
                    warn!("Live feed full, {} samples dropped so far", dropped);
                }
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub async fn end(&self) -> Result<()> {
        self.tx
            .send(FeedEvent::End)
            .await
            .map_err(|_| TraceError::FeedClosed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub samples_ingested: u64,
    pub cps_emissions: u64,
    pub samples_dropped: u64,
    /// State just before the aggregator was reset.
    pub final_snapshot: AggregatorSnapshot,
}

pub struct LiveSession {
    sender: FeedSender,
    snapshots: watch::Receiver<AggregatorSnapshot>,
    cancel: CancellationToken,
    handle: JoinHandle<SessionSummary>,
}

impl LiveSession {
    /// Spawns the consumer task; must be called inside a Tokio runtime.
    pub fn start(config: LiveConfig) -> Result<Self> {
        let capacity = config.queue_capacity;
        let aggregator = StreamingAggregator::new(config)?;
        let (tx, rx) = mpsc::channel(capacity);
        let (snapshot_tx, snapshot_rx) = watch::channel(aggregator.snapshot());
        let cancel = CancellationToken::new();
        let dropped = Arc::new(AtomicU64::new(0));

        info!("Live session started (queue capacity {})", capacity);
        let handle = tokio::spawn(run_consumer(
            rx,
            aggregator,
            snapshot_tx,
            cancel.clone(),
            Arc::clone(&dropped),
        ));

        Ok(Self {
            sender: FeedSender { tx, dropped },
            snapshots: snapshot_rx,
            cancel,
            handle,
        })
    }

    pub fn sender(&self) -> FeedSender {
        self.sender.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AggregatorSnapshot> {
        self.snapshots.clone()
    }

    pub fn latest(&self) -> AggregatorSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Stops consuming immediately; queued samples are discarded.
    pub async fn stop(self) -> SessionSummary {
        self.cancel.cancel();
        self.join().await
    }

    /// Waits for the driver to send `End` or for every sender to be dropped.
    pub async fn finished(self) -> SessionSummary {
        let LiveSession { sender, handle, .. } = self;
        drop(sender);
        join_handle(handle).await
    }

    async fn join(self) -> SessionSummary {
        join_handle(self.handle).await
    }
}

async fn join_handle(handle: JoinHandle<SessionSummary>) -> SessionSummary {
    match handle.await {
        Ok(summary) => summary,
        Err(e) => {
            warn!("Live consumer task failed: {}", e);
            SessionSummary {
                samples_ingested: 0,
                cps_emissions: 0,
                samples_dropped: 0,
                final_snapshot: AggregatorSnapshot::default(),
            }
        }
    }
}

async fn run_consumer(
    mut rx: mpsc::Receiver<FeedEvent>,
    mut aggregator: StreamingAggregator,
    snapshots: watch::Sender<AggregatorSnapshot>,
    cancel: CancellationToken,
    dropped: Arc<AtomicU64>,
) -> SessionSummary {
    let mut cps_emissions = 0u64;

    'outer: loop {
        let first = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!("Live session stopped");
                break;
            }

            event = rx.recv() => match event {
                Some(event) => event,
                None => {
                    info!("Live feed closed by producer");
                    break;
                }
            }
        };

        let mut next = Some(first);
        let mut handled = 0;
        while let Some(event) = next.take() {
            match event {
                FeedEvent::Sample(sample) => {
                    cps_emissions += aggregator.ingest(&sample).len() as u64;
                }
                FeedEvent::End => {
                    info!("Acquisition ended");
                    break 'outer;
                }
            }
            handled += 1;
            if handled < MAX_DRAIN_BATCH {
                next = rx.try_recv().ok();
            }
        }
        snapshots.send_replace(aggregator.snapshot());
    }

    let final_snapshot = aggregator.snapshot();
    let samples_ingested = aggregator.samples_ingested();
    aggregator.reset();
    snapshots.send_replace(aggregator.snapshot());

    SessionSummary {
        samples_ingested,
        cps_emissions,
        samples_dropped: dropped.load(Ordering::Relaxed),
        final_snapshot,
    }
}
