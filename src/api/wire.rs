//! Wire-level payload shapes.
//!
//! The backend is loosely typed; every optional field is defaulted once
//! here so the domain model in `types` never re-checks optionality.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawImageList {
    #[serde(default)]
    pub images: Vec<RawImage>,
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub completed_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawImage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub image_id: Option<String>,
    /// Present on the flattened assigned-images list, absent on the
    /// single-assignment detail payload.
    #[serde(default)]
    pub assignment_id: Option<String>,
    #[serde(default)]
    pub ground_truth_image_url: String,
    #[serde(default)]
    pub study_id: Option<String>,
    #[serde(default)]
    pub progress: RawProgress,
    #[serde(default)]
    pub ground_truth: RawGroundTruth,
    #[serde(default)]
    pub model_outputs: Vec<RawModelOutput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProgress {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGroundTruth {
    #[serde(default)]
    pub findings: String,
    #[serde(default)]
    pub impressions: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawModelOutput {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub response_text: String,
    #[serde(default)]
    pub display_label: Option<String>,
    #[serde(default)]
    pub generated_image_url: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
    /// Raw metric key → score; the backend sends numbers or numeric strings.
    #[serde(default)]
    pub evaluations: HashMap<String, serde_json::Value>,
}

/// Coerce a raw score value to an integer score. Returns `None` for values
/// that are neither numeric nor a numeric string.
pub fn coerce_score(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64)),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsResponse {
    #[serde(default)]
    pub metrics: Vec<crate::types::Metric>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WireEvaluation {
    pub metric_name: String,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SaveEvaluationsRequest {
    pub assignment_id: String,
    pub ground_truth_image_id: String,
    pub model_output_id: String,
    pub evaluations: Vec<WireEvaluation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshUrlResponse {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAssignmentList {
    #[serde(default)]
    pub assignments: Vec<RawAssignment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAssignment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub assigned_at: Option<String>,
    #[serde(default)]
    pub last_activity_at: Option<String>,
    #[serde(default)]
    pub progress: RawAssignmentProgress,
    #[serde(default)]
    pub evaluation_set: RawEvaluationSet,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAssignmentProgress {
    #[serde(default)]
    pub completed_evaluations: i64,
    #[serde(default)]
    pub total_evaluations: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvaluationSet {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub study_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub user: LoginUser,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserDetails {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stage2ImageList {
    #[serde(default)]
    pub images: Vec<RawStage2Image>,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub completed_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStage2Image {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub score: Option<i64>,
}
