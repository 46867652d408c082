//! Metric catalog cache.
//!
//! Process-wide cache of the global metric list with a fixed TTL.
//! Concurrent callers during a fetch wait on the same request instead of
//! issuing duplicates; a failed fetch invalidates the cache and the error
//! reaches every waiting caller for that attempt.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::METRICS_CACHE_TTL_SECS;
use crate::error::EvalError;
use crate::types::Metric;

pub trait MetricSource {
    async fn fetch_metrics(&self) -> Result<Vec<Metric>, EvalError>;
}

impl<T: MetricSource> MetricSource for &T {
    async fn fetch_metrics(&self) -> Result<Vec<Metric>, EvalError> {
        (**self).fetch_metrics().await
    }
}

#[derive(Default)]
struct CacheSlot {
    metrics: Option<Vec<Metric>>,
    fetched_at: Option<Instant>,
}

pub struct MetricCatalog<S> {
    source: S,
    ttl: Duration,
    // The lock spans the whole fetch: whoever holds it does the request,
    // everyone else queues behind it and then reads the fresh cache.
    slot: Mutex<CacheSlot>,
}

impl<S: MetricSource> MetricCatalog<S> {
    pub fn new(source: S) -> Self {
        Self::with_ttl(source, Duration::from_secs(METRICS_CACHE_TTL_SECS))
    }

    pub fn with_ttl(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            slot: Mutex::new(CacheSlot::default()),
        }
    }

    /// Return the cached metric list, fetching if stale or absent. An empty
    /// list means the backend reported zero metrics; fetch errors propagate.
    pub async fn get_metrics(&self) -> Result<Vec<Metric>, EvalError> {
        let mut slot = self.slot.lock().await;

        if let (Some(metrics), Some(at)) = (&slot.metrics, slot.fetched_at) {
            if at.elapsed() < self.ttl {
                return Ok(metrics.clone());
            }
            debug!("Metric cache expired after {:?}", self.ttl);
        }

        match self.source.fetch_metrics().await {
            Ok(metrics) => {
                slot.metrics = Some(metrics.clone());
                slot.fetched_at = Some(Instant::now());
                debug!("Metric cache refreshed: {} metrics", metrics.len());
                Ok(metrics)
            }
            Err(e) => {
                // Never leave a stale value behind a failed refresh.
                slot.metrics = None;
                slot.fetched_at = None;
                warn!("Failed to load metrics: {}", e);
                Err(e)
            }
        }
    }

    /// Drop the cached value; the next `get_metrics` refetches.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.lock().await;
        slot.metrics = None;
        slot.fetched_at = None;
    }
}
