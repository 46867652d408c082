//! Stage-2 gallery session: quick AI-likelihood scoring over a flat image
//! list. Scoring is optimistic — the flip happens immediately for the
//! keyboard-driven flow and rolls back if the save fails.

use tracing::info;

use crate::api::wire::Stage2ImageList;
use crate::error::EvalError;
use crate::mutation::{apply_mutation, MutationPolicy};

pub trait Stage2Store {
    async fn stage2_images(&self) -> Result<Stage2ImageList, EvalError>;
    async fn save_stage2_score(&self, image_id: &str, score: i64) -> Result<(), EvalError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryImage {
    pub id: String,
    pub image_url: String,
    pub source: String,
    pub score: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalleryStats {
    pub total: u64,
    pub completed: u64,
}

#[derive(Debug, Clone, Default)]
pub struct GalleryState {
    pub images: Vec<GalleryImage>,
    pub stats: GalleryStats,
    pub selected: Option<usize>,
}

pub struct GallerySession<S> {
    store: S,
    state: GalleryState,
}

impl<S: Stage2Store> GallerySession<S> {
    pub async fn load(store: S) -> Result<Self, EvalError> {
        let payload = store.stage2_images().await?;
        let images = payload
            .images
            .into_iter()
            .map(|img| GalleryImage {
                id: img.id,
                image_url: img.image_url,
                source: img.source,
                score: img.score,
            })
            .collect::<Vec<_>>();
        info!("Loaded stage-2 gallery: {} images", images.len());
        Ok(Self {
            store,
            state: GalleryState {
                stats: GalleryStats {
                    total: payload.total_count,
                    completed: payload.completed_count,
                },
                images,
                selected: None,
            },
        })
    }

    pub fn images(&self) -> &[GalleryImage] {
        &self.state.images
    }

    pub fn stats(&self) -> &GalleryStats {
        &self.state.stats
    }

    pub fn selected(&self) -> Option<&GalleryImage> {
        self.state.selected.map(|i| &self.state.images[i])
    }

    pub fn select(&mut self, index: Option<usize>) {
        match index {
            Some(i) if i < self.state.images.len() => self.state.selected = Some(i),
            Some(_) => {}
            None => self.state.selected = None,
        }
    }

    pub fn next(&mut self) {
        if let Some(i) = self.state.selected {
            if i + 1 < self.state.images.len() {
                self.state.selected = Some(i + 1);
            }
        }
    }

    pub fn prev(&mut self) {
        if let Some(i) = self.state.selected {
            if i > 0 {
                self.state.selected = Some(i - 1);
            }
        }
    }

    /// Score one image. The score and completed-count flip immediately;
    /// both revert if the save fails. Out-of-range indices are a no-op.
    pub async fn score(&mut self, index: usize, score: i64) -> Result<(), EvalError> {
        if index >= self.state.images.len() {
            return Ok(());
        }

        let image_id = self.state.images[index].id.clone();
        let was_unscored = self.state.images[index].score.is_none();

        let persist = self.store.save_stage2_score(&image_id, score);
        apply_mutation(
            MutationPolicy::Optimistic,
            &mut self.state,
            move |state| {
                state.images[index].score = Some(score);
                if was_unscored {
                    state.stats.completed += 1;
                }
            },
            persist,
        )
        .await
    }
}
