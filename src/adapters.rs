//! Pure transforms from wire payloads to the normalized record model.
//!
//! No I/O and no input mutation; malformed or partial payloads degrade to
//! defaulted fields or dropped evaluation entries (with a warning), never
//! to an error.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::warn;

use crate::api::wire::{coerce_score, RawAssignmentList, RawImage, RawImageList};
use crate::types::{
    CaseListSummary, CaseSummary, CompletionStatus, GroundTruth, Metric, MetricScore, Record,
    RecordModelOutput,
};

/// Normalization key for a metric name: lower-cased, spaces → underscores.
/// Raw score payloads are keyed this way.
pub fn normalize_metric_key(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// Build the raw-key → metric-id lookup. Collisions resolve last-write-wins;
/// the warning keeps the condition detectable in logs.
pub fn metric_key_map(metrics: &[Metric]) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(metrics.len());
    for metric in metrics {
        let key = normalize_metric_key(&metric.name);
        if let Some(previous) = map.insert(key.clone(), metric.id.clone()) {
            warn!(
                "Metric key collision on '{}': {} shadows {}",
                key, metric.id, previous
            );
        }
    }
    map
}

/// Normalize a single-assignment detail payload: every image is bound to
/// the one assignment id the caller fetched.
pub fn transform_assignment_to_records(
    assignment_id: &str,
    payload: &RawImageList,
    metrics: &[Metric],
) -> Vec<Record> {
    let key_map = metric_key_map(metrics);
    payload
        .images
        .iter()
        .enumerate()
        .map(|(index, img)| record_from_image(assignment_id, index, img, &key_map))
        .collect()
}

/// Normalize the flattened assigned-images payload: each image carries its
/// own assignment id. Converges on the same `Record` shape as the
/// assignment-detail variant.
pub fn transform_assigned_images_to_records(
    payload: &RawImageList,
    metrics: &[Metric],
) -> Vec<Record> {
    let key_map = metric_key_map(metrics);
    payload
        .images
        .iter()
        .enumerate()
        .map(|(index, img)| {
            let assignment_id = img.assignment_id.as_deref().unwrap_or_default();
            record_from_image(assignment_id, index, img, &key_map)
        })
        .collect()
}

fn record_from_image(
    assignment_id: &str,
    index: usize,
    img: &RawImage,
    key_map: &HashMap<String, String>,
) -> Record {
    let model_outputs = img
        .model_outputs
        .iter()
        .map(|mo| {
            let mut evaluations = Vec::with_capacity(mo.evaluations.len());
            for (raw_key, raw_score) in &mo.evaluations {
                let Some(metric_id) = key_map.get(raw_key) else {
                    warn!("Metric mapping failed for key: {}", raw_key);
                    continue;
                };
                let Some(score) = coerce_score(raw_score) else {
                    warn!("Unparseable score for metric key {}: {}", raw_key, raw_score);
                    continue;
                };
                evaluations.push(MetricScore {
                    metric_id: metric_id.clone(),
                    score,
                });
            }

            RecordModelOutput {
                response_id: mo.id.clone(),
                response: mo.response_text.clone(),
                display_label: mo.display_label.clone().unwrap_or_default(),
                generated_image_url: mo.generated_image_url.clone().unwrap_or_default(),
                is_completed: mo.is_completed,
                evaluations,
            }
        })
        .collect();

    Record {
        assignment_id: assignment_id.to_string(),
        internal_id: img.id.clone(),
        image_url: img.ground_truth_image_url.clone(),
        image_id: img
            .image_id
            .clone()
            .unwrap_or_else(|| format!("img-{}", index)),
        study_id: img.study_id.clone(),
        status: CompletionStatus::parse(&img.progress.status),
        ground_truth: GroundTruth {
            findings: img.ground_truth.findings.clone(),
            impressions: img.ground_truth.impressions.clone(),
        },
        model_outputs,
    }
}

/// Summarize the evaluator's assignment worklist, tallying statuses.
pub fn summarize_assignments(payload: &RawAssignmentList) -> CaseListSummary {
    let mut summary = CaseListSummary::default();

    for assignment in &payload.assignments {
        let status = CompletionStatus::parse(&assignment.status);
        match status {
            CompletionStatus::Completed => summary.completed_cases += 1,
            CompletionStatus::InProgress => summary.in_progress_cases += 1,
            CompletionStatus::Pending => summary.pending_cases += 1,
        }
        summary.total_cases += 1;

        let last_updated = assignment
            .last_activity_at
            .as_deref()
            .or(assignment.assigned_at.as_deref())
            .and_then(parse_timestamp);

        summary.cases.push(CaseSummary {
            id: assignment.id.clone(),
            study_id: assignment.evaluation_set.study_id.clone(),
            status,
            completed_evaluations: assignment.progress.completed_evaluations,
            total_evaluations: assignment.progress.total_evaluations,
            last_updated,
            evaluation_set_id: assignment.evaluation_set.id.clone(),
        });
    }

    summary
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            warn!("Unparseable timestamp '{}': {}", raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::wire::{
        RawAssignment, RawAssignmentProgress, RawEvaluationSet, RawGroundTruth, RawModelOutput,
        RawProgress,
    };
    use serde_json::json;

    fn metric(id: &str, name: &str) -> Metric {
        Metric {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
        }
    }

    fn sample_metrics() -> Vec<Metric> {
        vec![
            metric("m-1", "Anatomical Validity"),
            metric("m-2", "Pathology Presence"),
        ]
    }

    fn raw_output(id: &str, evaluations: serde_json::Value) -> RawModelOutput {
        RawModelOutput {
            id: id.to_string(),
            response_text: "No acute findings.".to_string(),
            display_label: Some("A".to_string()),
            generated_image_url: Some("https://cdn/generated.png".to_string()),
            is_completed: true,
            evaluations: serde_json::from_value(evaluations).unwrap(),
        }
    }

    fn raw_image(id: &str, assignment_id: Option<&str>, outputs: Vec<RawModelOutput>) -> RawImage {
        RawImage {
            id: id.to_string(),
            image_id: Some(format!("display-{}", id)),
            assignment_id: assignment_id.map(str::to_string),
            ground_truth_image_url: "https://cdn/gt.png".to_string(),
            study_id: Some("STUDY-9".to_string()),
            progress: RawProgress {
                status: "in_progress".to_string(),
            },
            ground_truth: RawGroundTruth {
                findings: "Left pleural effusion.".to_string(),
                impressions: "Effusion, likely reactive.".to_string(),
            },
            model_outputs: outputs,
        }
    }

    #[test]
    fn test_normalize_metric_key() {
        assert_eq!(normalize_metric_key("Anatomical Validity"), "anatomical_validity");
        assert_eq!(normalize_metric_key("x"), "x");
    }

    #[test]
    fn test_metric_key_map_collision_is_last_write_wins() {
        let metrics = vec![metric("m-1", "Similarity Index"), metric("m-2", "similarity index")];
        let map = metric_key_map(&metrics);
        assert_eq!(map.len(), 1);
        assert_eq!(map["similarity_index"], "m-2");
    }

    #[test]
    fn test_assignment_transform_maps_known_keys() {
        let payload = RawImageList {
            images: vec![raw_image(
                "img-1",
                None,
                vec![raw_output(
                    "mo-1",
                    json!({"anatomical_validity": 1, "pathology_presence": "0"}),
                )],
            )],
            ..Default::default()
        };

        let records = transform_assignment_to_records("assign-7", &payload, &sample_metrics());
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.assignment_id, "assign-7");
        assert_eq!(record.internal_id, "img-1");
        assert_eq!(record.image_id, "display-img-1");
        assert_eq!(record.status, CompletionStatus::InProgress);
        assert_eq!(record.ground_truth.findings, "Left pleural effusion.");

        let mut scores: Vec<_> = record.model_outputs[0]
            .evaluations
            .iter()
            .map(|e| (e.metric_id.as_str(), e.score))
            .collect();
        scores.sort();
        assert_eq!(scores, vec![("m-1", 1), ("m-2", 0)]);
    }

    #[test]
    fn test_unmapped_key_drops_entry_not_record() {
        let payload = RawImageList {
            images: vec![raw_image(
                "img-1",
                None,
                vec![raw_output(
                    "mo-1",
                    json!({"anatomical_validity": 1, "nonexistent_metric": 1}),
                )],
            )],
            ..Default::default()
        };

        let records = transform_assignment_to_records("assign-7", &payload, &sample_metrics());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].model_outputs[0].evaluations.len(), 1);
        assert_eq!(records[0].model_outputs[0].evaluations[0].metric_id, "m-1");
    }

    #[test]
    fn test_unparseable_score_is_dropped() {
        let payload = RawImageList {
            images: vec![raw_image(
                "img-1",
                None,
                vec![raw_output("mo-1", json!({"anatomical_validity": "good"}))],
            )],
            ..Default::default()
        };

        let records = transform_assignment_to_records("assign-7", &payload, &sample_metrics());
        assert!(records[0].model_outputs[0].evaluations.is_empty());
    }

    #[test]
    fn test_assigned_images_transform_uses_per_image_assignment_id() {
        let payload = RawImageList {
            images: vec![
                raw_image("img-1", Some("assign-1"), vec![]),
                raw_image("img-2", Some("assign-2"), vec![]),
            ],
            ..Default::default()
        };

        let records = transform_assigned_images_to_records(&payload, &sample_metrics());
        assert_eq!(records[0].assignment_id, "assign-1");
        assert_eq!(records[1].assignment_id, "assign-2");
    }

    #[test]
    fn test_both_variants_converge_on_same_record_shape() {
        let image = raw_image(
            "img-1",
            Some("assign-1"),
            vec![raw_output("mo-1", json!({"anatomical_validity": 1}))],
        );
        let payload = RawImageList {
            images: vec![image],
            ..Default::default()
        };

        let from_detail = transform_assignment_to_records("assign-1", &payload, &sample_metrics());
        let from_list = transform_assigned_images_to_records(&payload, &sample_metrics());
        assert_eq!(from_detail, from_list);
    }

    #[test]
    fn test_missing_image_id_falls_back_to_position() {
        let mut image = raw_image("img-1", None, vec![]);
        image.image_id = None;
        let payload = RawImageList {
            images: vec![image],
            ..Default::default()
        };

        let records = transform_assignment_to_records("a", &payload, &sample_metrics());
        assert_eq!(records[0].image_id, "img-0");
    }

    #[test]
    fn test_empty_payload_gives_empty_records() {
        let records =
            transform_assignment_to_records("a", &RawImageList::default(), &sample_metrics());
        assert!(records.is_empty());
    }

    #[test]
    fn test_summarize_assignments_tallies_statuses() {
        let payload = RawAssignmentList {
            assignments: vec![
                RawAssignment {
                    id: "a-1".into(),
                    status: "completed".into(),
                    assigned_at: Some("2026-08-01T10:00:00Z".into()),
                    last_activity_at: Some("2026-08-02T09:30:00Z".into()),
                    progress: RawAssignmentProgress {
                        completed_evaluations: 36,
                        total_evaluations: 36,
                    },
                    evaluation_set: RawEvaluationSet {
                        id: "set-1".into(),
                        study_id: "STUDY-1".into(),
                    },
                },
                RawAssignment {
                    id: "a-2".into(),
                    status: "in_progress".into(),
                    ..Default::default()
                },
                RawAssignment {
                    id: "a-3".into(),
                    status: "assigned".into(),
                    ..Default::default()
                },
            ],
        };

        let summary = summarize_assignments(&payload);
        assert_eq!(summary.total_cases, 3);
        assert_eq!(summary.completed_cases, 1);
        assert_eq!(summary.in_progress_cases, 1);
        assert_eq!(summary.pending_cases, 1);

        let first = &summary.cases[0];
        assert_eq!(first.study_id, "STUDY-1");
        // last_activity_at wins over assigned_at
        assert_eq!(
            first.last_updated.unwrap().to_rfc3339(),
            "2026-08-02T09:30:00+00:00"
        );
    }

    #[test]
    fn test_summarize_assignments_bad_timestamp_degrades_to_none() {
        let payload = RawAssignmentList {
            assignments: vec![RawAssignment {
                id: "a-1".into(),
                last_activity_at: Some("yesterday".into()),
                ..Default::default()
            }],
        };
        let summary = summarize_assignments(&payload);
        assert!(summary.cases[0].last_updated.is_none());
    }
}
