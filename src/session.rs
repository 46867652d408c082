//! Evaluation session state machine.
//!
//! The live, mutable core of the evaluator flow: one `CaseRecord` tree,
//! the active image pointer, the active model-output selection, and the
//! denormalized score map. All mutations are serialized through the
//! operations here; completion counters and case progress are recomputed
//! from the tree after every change, never accumulated incrementally.

use futures::future::join_all;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::api::wire::{SaveEvaluationsRequest, WireEvaluation};
use crate::case_builder::{image_status, total_progress, BuiltCase};
use crate::error::EvalError;
use crate::mutation::{apply_mutation, MutationPolicy};
use crate::types::{
    CaseRecord, CompletionStatus, ImageRecord, Metric, MetricScore, ModelOutput, ScoreMap,
};

/// Remote persistence for evaluation scores. The bulk endpoint is an
/// idempotent upsert; re-sending an output's evaluation list is safe.
pub trait EvaluationStore {
    async fn save_evaluations(&self, request: SaveEvaluationsRequest) -> Result<(), EvalError>;
    async fn complete_assignment(&self, assignment_id: &str) -> Result<(), EvalError>;
}

impl<T: EvaluationStore> EvaluationStore for &T {
    async fn save_evaluations(&self, request: SaveEvaluationsRequest) -> Result<(), EvalError> {
        (**self).save_evaluations(request).await
    }

    async fn complete_assignment(&self, assignment_id: &str) -> Result<(), EvalError> {
        (**self).complete_assignment(assignment_id).await
    }
}

/// Everything the session mutates, grouped so mutations can be applied or
/// rolled back as one unit.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub case: CaseRecord,
    pub active_image: usize,
    pub active_model: Option<String>,
    pub scores: ScoreMap,
    pub metrics: Vec<Metric>,
}

pub struct EvaluationSession<S> {
    store: S,
    state: SessionState,
}

impl<S: EvaluationStore> EvaluationSession<S> {
    /// `start_index` resumes navigation at a previously shared position;
    /// out-of-range values clamp to the last image.
    pub fn new(store: S, built: BuiltCase, metrics: Vec<Metric>, start_index: usize) -> Self {
        let BuiltCase {
            case_record,
            initial_scores,
        } = built;
        let last = case_record.images.len().saturating_sub(1);
        Self {
            store,
            state: SessionState {
                active_image: start_index.min(last),
                active_model: None,
                scores: initial_scores,
                metrics,
                case: case_record,
            },
        }
    }

    pub fn case(&self) -> &CaseRecord {
        &self.state.case
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.state.metrics
    }

    pub fn active_image_index(&self) -> usize {
        self.state.active_image
    }

    /// Externally observable position, fit for a shareable navigation
    /// state so a reload resumes at the same image.
    pub fn resume_point(&self) -> usize {
        self.state.active_image
    }

    pub fn active_image(&self) -> &ImageRecord {
        &self.state.case.images[self.state.active_image]
    }

    pub fn active_model(&self) -> Option<&ModelOutput> {
        let id = self.state.active_model.as_deref()?;
        self.active_image().model_outputs.iter().find(|m| m.id == id)
    }

    /// Saved scores for a model output, for overlay prefill.
    pub fn scores_for(&self, model_output_id: &str) -> Option<&HashMap<String, i64>> {
        self.state.scores.get(model_output_id)
    }

    pub fn completed_images(&self) -> usize {
        self.state
            .case
            .images
            .iter()
            .filter(|img| img.evaluation_status == CompletionStatus::Completed)
            .count()
    }

    /// Move the active pointer. Out-of-range indices are a no-op; image
    /// order never changes, so the index remains meaningful across calls.
    pub fn select_image(&mut self, index: usize) {
        if index < self.state.case.images.len() {
            self.state.active_image = index;
        } else {
            warn!(
                "Ignoring image selection {} outside 0..{}",
                index,
                self.state.case.images.len()
            );
        }
    }

    pub fn next_image(&mut self) {
        self.select_image(self.state.active_image + 1);
    }

    pub fn prev_image(&mut self) {
        if self.state.active_image > 0 {
            self.select_image(self.state.active_image - 1);
        }
    }

    /// Open an evaluation focus on one of the active image's outputs, or
    /// close it with `None`. Ids not on the active image are ignored.
    pub fn select_model(&mut self, model_output_id: Option<&str>) {
        match model_output_id {
            None => self.state.active_model = None,
            Some(id) => {
                if self.active_image().model_outputs.iter().any(|m| m.id == id) {
                    self.state.active_model = Some(id.to_string());
                } else {
                    warn!("Ignoring selection of unknown model output {}", id);
                }
            }
        }
    }

    /// Persist one model output's scores and fold the result into the
    /// tree. No local state changes until the backend confirms; on failure
    /// the score map and statuses are exactly their pre-call values.
    pub async fn submit_scores(
        &mut self,
        model_output_id: &str,
        scores: &HashMap<String, i64>,
    ) -> Result<(), EvalError> {
        // UI-level gate: every catalog metric must be scored before any
        // network traffic happens.
        for metric in &self.state.metrics {
            if !scores.contains_key(&metric.id) {
                return Err(EvalError::Validation(format!(
                    "Metric '{}' has not been scored",
                    metric.name
                )));
            }
        }

        let image = &self.state.case.images[self.state.active_image];
        if !image.model_outputs.iter().any(|m| m.id == model_output_id) {
            return Err(EvalError::Validation(format!(
                "Model output {} is not part of the active image",
                model_output_id
            )));
        }
        let Some(internal_id) = image.internal_id.clone() else {
            return Err(EvalError::Validation(
                "Internal image id missing".to_string(),
            ));
        };
        // Bind to the image's own assignment when the worklist carries one.
        let assignment_id = image
            .assignment_id
            .clone()
            .unwrap_or_else(|| self.state.case.id.clone());

        let request = SaveEvaluationsRequest {
            assignment_id,
            ground_truth_image_id: internal_id,
            model_output_id: model_output_id.to_string(),
            evaluations: wire_evaluations(&self.state.metrics, scores),
        };

        let image_index = self.state.active_image;
        let model_id = model_output_id.to_string();
        let saved_scores = scores.clone();
        let catalog_size = self.state.metrics.len();

        let persist = self.store.save_evaluations(request);
        apply_mutation(
            MutationPolicy::Confirmed,
            &mut self.state,
            move |state| {
                record_saved_scores(state, image_index, &model_id, saved_scores, catalog_size);
            },
            persist,
        )
        .await?;

        info!(
            "Saved evaluation for model output {} (case progress {}%)",
            model_output_id, self.state.case.total_progress
        );
        Ok(())
    }

    /// Bulk finalize: re-send every completed output's evaluation list,
    /// then mark the case complete. At-least-once — submissions that
    /// landed before a failure stay persisted, and the whole batch can be
    /// retried safely. The completion call goes out only after every
    /// submission has resolved.
    pub async fn submit_all(&mut self) -> Result<(), EvalError> {
        let name_by_id: HashMap<&str, &str> = self
            .state
            .metrics
            .iter()
            .map(|m| (m.id.as_str(), m.name.as_str()))
            .collect();

        let mut requests = Vec::new();
        for image in &self.state.case.images {
            let Some(internal_id) = image.internal_id.clone() else {
                warn!(
                    "Skipping image index {}: missing internal id",
                    image.image_index
                );
                continue;
            };
            let assignment_id = image
                .assignment_id
                .clone()
                .unwrap_or_else(|| self.state.case.id.clone());

            for model in &image.model_outputs {
                if model.status != CompletionStatus::Completed || model.evaluations.is_empty() {
                    continue;
                }
                let evaluations = model
                    .evaluations
                    .iter()
                    .map(|e| WireEvaluation {
                        metric_name: name_by_id
                            .get(e.metric_id.as_str())
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| {
                                warn!("No metric name for id {}", e.metric_id);
                                "Unknown Metric".to_string()
                            }),
                        score: e.score,
                    })
                    .collect();
                requests.push(SaveEvaluationsRequest {
                    assignment_id: assignment_id.clone(),
                    ground_truth_image_id: internal_id.clone(),
                    model_output_id: model.id.clone(),
                    evaluations,
                });
            }
        }

        let total = requests.len();
        let results = join_all(
            requests
                .into_iter()
                .map(|request| self.store.save_evaluations(request)),
        )
        .await;

        let mut failures: Vec<EvalError> = results.into_iter().filter_map(Result::err).collect();
        if !failures.is_empty() {
            let failed = failures.len();
            let first = failures.remove(0);
            return Err(EvalError::Bulk {
                failed,
                total,
                detail: first.user_message(),
            });
        }

        self.store
            .complete_assignment(&self.state.case.id)
            .await?;
        info!(
            "Case {} submitted: {} evaluations finalized",
            self.state.case.id, total
        );
        Ok(())
    }
}

/// Convert a metric-id keyed score map to the `{metric_name, score}` wire
/// shape, in catalog order. Ids absent from the catalog keep their score
/// under a placeholder name rather than failing the save.
fn wire_evaluations(metrics: &[Metric], scores: &HashMap<String, i64>) -> Vec<WireEvaluation> {
    let mut out = Vec::with_capacity(scores.len());
    for metric in metrics {
        if let Some(score) = scores.get(&metric.id) {
            out.push(WireEvaluation {
                metric_name: metric.name.clone(),
                score: *score,
            });
        }
    }
    let known: usize = out.len();
    if known < scores.len() {
        for (metric_id, score) in scores {
            if !metrics.iter().any(|m| &m.id == metric_id) {
                warn!("Unknown metric id {} in score submission", metric_id);
                out.push(WireEvaluation {
                    metric_name: "Unknown Metric".to_string(),
                    score: *score,
                });
            }
        }
    }
    out
}

/// Fold a confirmed save into the tree: sync the denormalized score map
/// and the output's evaluation list, then re-derive every counter above it.
fn record_saved_scores(
    state: &mut SessionState,
    image_index: usize,
    model_output_id: &str,
    scores: HashMap<String, i64>,
    catalog_size: usize,
) {
    let evaluations: Vec<MetricScore> = scores
        .iter()
        .map(|(metric_id, score)| MetricScore {
            metric_id: metric_id.clone(),
            score: *score,
        })
        .collect();
    let scored = scores.len().min(catalog_size);
    state.scores.insert(model_output_id.to_string(), scores);

    let image = &mut state.case.images[image_index];
    if let Some(model) = image
        .model_outputs
        .iter_mut()
        .find(|m| m.id == model_output_id)
    {
        model.evaluations = evaluations;
        model.status = crate::types::derive_status(scored, catalog_size);
    }

    image.completed_models = image
        .model_outputs
        .iter()
        .filter(|m| m.status == CompletionStatus::Completed)
        .count();
    image.evaluation_status = image_status(image.completed_models, image.total_models);
    state.case.total_progress = total_progress(&state.case.images);
}
