use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;
use tokio::time::{self, Duration};
use tracing::{info, warn};

use crate::loadviz::snapshot::{MetricsFeed, Snapshot};
use crate::loadviz::units::MemoryConvention;

use super::{FeedSource, MetricsClient};

/// Polls the API endpoint on a fixed interval and swaps a freshly built
/// snapshot into the shared slot. The snapshot is immutable once stored;
/// readers clone the `Arc` and never see partial updates.
pub struct Poller<S = MetricsClient> {
    source: S,
    convention: MemoryConvention,
    interval: Duration,
    current: RwLock<Option<Arc<Snapshot>>>,
    // Monotonic poll tags: a response from an older poll than the one
    // last applied is dropped instead of clobbering newer data.
    next_seq: AtomicU64,
    applied_seq: AtomicU64,
    in_flight: AtomicBool,
}

impl<S: FeedSource> Poller<S> {
    pub fn new(source: S, convention: MemoryConvention, interval: Duration) -> Self {
        Self {
            source,
            convention,
            interval,
            current: RwLock::new(None),
            next_seq: AtomicU64::new(1),
            applied_seq: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
        }
    }

    pub async fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.current.read().await.clone()
    }

    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<()>) {
        // Initial poll so the first requests have data to serve
        self.poll_once().await;

        let mut interval = time::interval(self.interval);
        interval.tick().await; // skip first immediate tick

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.poll_once().await;
                }
                _ = shutdown.changed() => {
                    info!("metrics poller shutting down");
                    return;
                }
            }
        }
    }

    pub async fn poll_once(&self) {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            warn!("previous poll still in flight, skipping tick");
            return;
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        match self.source.fetch_feed().await {
            Ok(feed) => self.apply(seq, &feed).await,
            Err(e) => {
                // reject the whole refresh, keep the previous snapshot live
                warn!("fetching metrics feed from {}: {}", self.source.endpoint(), e);
            }
        }

        // released only after the snapshot (or the error) is fully handled
        self.in_flight.store(false, Ordering::Release);
    }

    async fn apply(&self, seq: u64, feed: &MetricsFeed) {
        let snapshot = Snapshot::build(feed, self.convention);
        for w in &snapshot.warnings {
            warn!("snapshot: {}", w);
        }

        // Sequence check and swap share the write lock, so a response
        // from an older poll can never overwrite a newer snapshot.
        let mut current = self.current.write().await;
        if self.applied_seq.load(Ordering::Acquire) >= seq {
            warn!("discarding stale poll response (seq {})", seq);
            return;
        }

        info!(
            nodes = snapshot.nodes.len(),
            warnings = snapshot.warnings.len(),
            "applied snapshot (seq {})",
            seq
        );
        self.applied_seq.store(seq, Ordering::Release);
        *current = Some(Arc::new(snapshot));
    }
}
