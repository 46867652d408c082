//! Record loading: resolve a target to a normalized record list.
//!
//! An assignment id that 404s is not fatal — the id may be an image or
//! worklist handle, so loading falls back to the unified assigned-images
//! list. A `FetchGuard` keyed by target stops duplicate fetch storms from
//! re-entrant callers.

use std::collections::HashSet;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::adapters::{transform_assigned_images_to_records, transform_assignment_to_records};
use crate::api::wire::RawImageList;
use crate::catalog::{MetricCatalog, MetricSource};
use crate::error::EvalError;
use crate::types::Record;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSource {
    /// The unified worklist of every assigned image.
    All,
    /// One specific assignment, with fallback to the unified list on 404.
    Assignment(String),
}

impl RecordSource {
    pub fn cache_key(&self) -> &str {
        match self {
            RecordSource::All => "all",
            RecordSource::Assignment(id) => id,
        }
    }
}

pub trait RecordFetcher {
    async fn assignment_detail(&self, assignment_id: &str) -> Result<RawImageList, EvalError>;
    async fn assigned_images(&self) -> Result<RawImageList, EvalError>;
}

/// Load and normalize the records for a target. The metric catalog is
/// consulted (and fetched if stale) to map raw score keys.
pub async fn load_records<F, M>(
    fetcher: &F,
    catalog: &MetricCatalog<M>,
    source: &RecordSource,
) -> Result<Vec<Record>, EvalError>
where
    F: RecordFetcher,
    M: MetricSource,
{
    let metrics = catalog.get_metrics().await?;

    let records = match source {
        RecordSource::All => {
            let payload = fetcher.assigned_images().await?;
            transform_assigned_images_to_records(&payload, &metrics)
        }
        RecordSource::Assignment(id) => match fetcher.assignment_detail(id).await {
            Ok(payload) => transform_assignment_to_records(id, &payload, &metrics),
            Err(e) if e.is_not_found() => {
                info!("{} is not an assignment, loading unified worklist", id);
                let payload = fetcher.assigned_images().await?;
                transform_assigned_images_to_records(&payload, &metrics)
            }
            Err(e) => return Err(e),
        },
    };

    if records.is_empty() {
        warn!("No assigned images found for {:?}", source.cache_key());
    } else if records[0].image_url.is_empty() {
        warn!("First record is missing its ground-truth image URL");
    }
    Ok(records)
}

/// One-shot guard: the initial records load for a given key must happen at
/// most once per surface lifetime.
#[derive(Default)]
pub struct FetchGuard {
    seen: Mutex<HashSet<String>>,
}

impl FetchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` exactly once per key; later calls report the fetch as
    /// already taken.
    pub fn try_begin(&self, key: &str) -> bool {
        self.seen
            .lock()
            .expect("fetch guard lock poisoned")
            .insert(key.to_string())
    }

    pub fn reset(&self) {
        self.seen.lock().expect("fetch guard lock poisoned").clear();
    }
}
