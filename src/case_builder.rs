//! Builds the case aggregate from normalized records, plus the pure
//! progress math the evaluation session re-derives after every mutation.

use std::collections::HashMap;

use crate::config::{UNIFIED_CASE_ID, UNIFIED_STUDY_ID};
use crate::types::{
    CaseRecord, CompletionStatus, ImageRecord, ModelOutput, Record, ScoreMap,
};

#[derive(Debug, Clone)]
pub struct BuiltCase {
    pub case_record: CaseRecord,
    /// Denormalized prefill index reconstructed from prior evaluations.
    pub initial_scores: ScoreMap,
}

/// Overall case progress, 0–100: completed outputs over all outputs,
/// re-derivable at any time from the tree alone.
pub fn total_progress(images: &[ImageRecord]) -> u8 {
    let total_outputs: usize = images.iter().map(|img| img.total_models).sum();
    if total_outputs == 0 {
        return 0;
    }
    let completed: usize = images.iter().map(|img| img.completed_models).sum();
    (100.0 * completed as f64 / total_outputs as f64).round() as u8
}

/// Image-level status from its completion counter.
pub fn image_status(completed_models: usize, total_models: usize) -> CompletionStatus {
    if total_models > 0 && completed_models >= total_models {
        CompletionStatus::Completed
    } else if completed_models > 0 {
        CompletionStatus::InProgress
    } else {
        CompletionStatus::Pending
    }
}

/// Assemble the case tree. `None` means nothing to show — a valid outcome
/// for an empty worklist, not an error.
///
/// Image order follows the input order and defines navigation order.
/// Completion here is whatever the backend reported; the evaluation
/// session owns all recomputation from this point on.
pub fn build_case(records: &[Record]) -> Option<BuiltCase> {
    if records.is_empty() {
        return None;
    }

    let mut initial_scores: ScoreMap = HashMap::new();

    let images = records
        .iter()
        .enumerate()
        .map(|(index, rec)| {
            let model_outputs: Vec<ModelOutput> = rec
                .model_outputs
                .iter()
                .enumerate()
                .map(|(model_index, mo)| {
                    if !mo.evaluations.is_empty() {
                        let scores: HashMap<String, i64> = mo
                            .evaluations
                            .iter()
                            .map(|e| (e.metric_id.clone(), e.score))
                            .collect();
                        initial_scores.insert(mo.response_id.clone(), scores);
                    }

                    ModelOutput {
                        id: mo.response_id.clone(),
                        model_name: if mo.display_label.is_empty() {
                            format!("Model {}", model_index + 1)
                        } else {
                            mo.display_label.clone()
                        },
                        image_url: mo.generated_image_url.clone(),
                        response: mo.response.clone(),
                        evaluations: mo.evaluations.clone(),
                        status: if mo.is_completed {
                            CompletionStatus::Completed
                        } else {
                            CompletionStatus::Pending
                        },
                    }
                })
                .collect();

            let completed_models = rec.model_outputs.iter().filter(|m| m.is_completed).count();
            let total_models = rec.model_outputs.len();

            ImageRecord {
                image_index: index,
                image_url: rec.image_url.clone(),
                image_id: rec.image_id.clone(),
                internal_id: if rec.internal_id.is_empty() {
                    None
                } else {
                    Some(rec.internal_id.clone())
                },
                assignment_id: if rec.assignment_id.is_empty() {
                    None
                } else {
                    Some(rec.assignment_id.clone())
                },
                study_id: rec.study_id.clone(),
                ground_truth: rec.ground_truth.clone(),
                model_outputs,
                evaluation_status: rec.status,
                completed_models,
                total_models,
            }
        })
        .collect::<Vec<_>>();

    let progress = total_progress(&images);
    Some(BuiltCase {
        case_record: CaseRecord {
            id: UNIFIED_CASE_ID.to_string(),
            study_id: UNIFIED_STUDY_ID.to_string(),
            images,
            total_progress: progress,
        },
        initial_scores,
    })
}
