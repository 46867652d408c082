//! Image URL resolution.
//!
//! Asset URLs are presigned and expire. Render order: the primary URL if
//! non-empty, then — only on an actual load failure — one refresh request
//! keyed by asset type and id, then a deterministic seeded placeholder.
//! Refreshes are deduplicated per asset key so a broken refreshed URL
//! cannot loop back into another refresh.

use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::warn;

use crate::config::{PLACEHOLDER_HEIGHT, PLACEHOLDER_WIDTH};
use crate::error::EvalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetType {
    Image,
    Model,
    Stage2,
    S3Record,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Image => "image",
            AssetType::Model => "model",
            AssetType::Stage2 => "stage2",
            AssetType::S3Record => "s3_record",
        }
    }
}

pub trait UrlRefresher {
    /// Ask the backend for a fresh URL. `Ok(None)` is an explicitly empty
    /// refresh result (the asset has no URL server-side).
    async fn refresh_url(&self, asset: AssetType, id: &str) -> Result<Option<String>, EvalError>;
}

impl<T: UrlRefresher> UrlRefresher for &T {
    async fn refresh_url(&self, asset: AssetType, id: &str) -> Result<Option<String>, EvalError> {
        (**self).refresh_url(asset, id).await
    }
}

/// Deterministic placeholder: same seed, same image on every reload.
pub fn placeholder_url(width: u32, height: u32, seed: &str) -> String {
    format!(
        "https://picsum.photos/seed/{}/{}/{}?grayscale",
        seed, width, height
    )
}

/// Initial render choice: the primary URL when it has content, otherwise
/// the seeded placeholder (absence is not a load failure and triggers no
/// refresh).
pub fn initial_url(primary: &str, width: u32, height: u32, seed: &str) -> String {
    if primary.trim().is_empty() {
        placeholder_url(width, height, seed)
    } else {
        primary.to_string()
    }
}

#[derive(Debug, Clone)]
enum SlotState {
    Refreshing,
    Resolved(String),
}

pub struct ImageResolver<R> {
    refresher: R,
    width: u32,
    height: u32,
    // Presence of a key means a refresh is in flight or already done;
    // either way further failure events for that asset are no-ops.
    slots: Mutex<HashMap<String, SlotState>>,
}

impl<R: UrlRefresher> ImageResolver<R> {
    pub fn new(refresher: R) -> Self {
        Self::with_dimensions(refresher, PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT)
    }

    pub fn with_dimensions(refresher: R, width: u32, height: u32) -> Self {
        Self {
            refresher,
            width,
            height,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// URL to render for an asset before any failure has been observed.
    pub fn display_url(&self, primary: &str, seed: &str) -> String {
        initial_url(primary, self.width, self.height, seed)
    }

    /// React to a load failure for one asset. Returns the replacement URL,
    /// or `None` when this failure is a duplicate (refresh in flight or
    /// already resolved) and the surface should keep what it has.
    pub async fn handle_load_failure(&self, asset: AssetType, id: &str) -> Option<String> {
        {
            let mut slots = self.slots.lock().await;
            if slots.contains_key(id) {
                return None;
            }
            slots.insert(id.to_string(), SlotState::Refreshing);
        }

        let url = match self.refresher.refresh_url(asset, id).await {
            Ok(Some(url)) => url,
            Ok(None) => placeholder_url(self.width, self.height, id),
            Err(e) => {
                warn!("Failed to refresh {} URL for {}: {}", asset.as_str(), id, e);
                placeholder_url(self.width, self.height, id)
            }
        };

        self.slots
            .lock()
            .await
            .insert(id.to_string(), SlotState::Resolved(url.clone()));
        Some(url)
    }

    /// Whatever a finished refresh settled on for this asset, if any.
    pub async fn resolved_url(&self, id: &str) -> Option<String> {
        match self.slots.lock().await.get(id) {
            Some(SlotState::Resolved(url)) => Some(url.clone()),
            _ => None,
        }
    }

    /// Forget all refresh outcomes (for a fresh page of assets).
    pub async fn reset(&self) {
        self.slots.lock().await.clear();
    }
}
