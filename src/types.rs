use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Strict domain model. Wire payloads are parsed once at the boundary
// (api::wire); nothing here is optional unless absence is meaningful.
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Completion state shared by model outputs and images. Transitions are
/// monotone (pending → in_progress → completed) and always derived from
/// score counts, never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Pending,
    InProgress,
    Completed,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Pending => "pending",
            CompletionStatus::InProgress => "in_progress",
            CompletionStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "completed" => CompletionStatus::Completed,
            "in_progress" => CompletionStatus::InProgress,
            _ => CompletionStatus::Pending,
        }
    }
}

/// Derive a status purely from how many catalog metrics have a recorded
/// score. The sole authority for status transitions.
pub fn derive_status(scored_metrics: usize, catalog_size: usize) -> CompletionStatus {
    if catalog_size > 0 && scored_metrics >= catalog_size {
        CompletionStatus::Completed
    } else if scored_metrics > 0 {
        CompletionStatus::InProgress
    } else {
        CompletionStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricScore {
    pub metric_id: String,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOutput {
    pub id: String,
    /// Short display label ("A".."F" in current deployments).
    pub model_name: String,
    pub image_url: String,
    pub response: String,
    pub evaluations: Vec<MetricScore>,
    pub status: CompletionStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub findings: String,
    pub impressions: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Position in the case, 0-based; stable for the lifetime of the case.
    pub image_index: usize,
    pub image_url: String,
    pub image_id: String,
    /// Backend identity used by the persistence endpoints.
    pub internal_id: Option<String>,
    /// Assignment the image was served under, when the unified worklist
    /// carries one per image.
    pub assignment_id: Option<String>,
    pub study_id: Option<String>,
    pub ground_truth: GroundTruth,
    pub model_outputs: Vec<ModelOutput>,
    pub evaluation_status: CompletionStatus,
    pub completed_models: usize,
    pub total_models: usize,
}

/// Root aggregate. Exactly one lives in an evaluation session at a time and
/// all mutations go through the session's operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: String,
    pub study_id: String,
    pub images: Vec<ImageRecord>,
    /// 0–100, recomputed whenever any image's completed count changes.
    pub total_progress: u8,
}

/// Denormalized score index: model output id → (metric id → score).
/// Kept in sync with `ModelOutput::evaluations` after every save.
pub type ScoreMap = HashMap<String, HashMap<String, i64>>;

// ============================================================================
// Normalized adapter output, endpoint-agnostic.
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordModelOutput {
    pub response_id: String,
    pub response: String,
    pub display_label: String,
    pub generated_image_url: String,
    pub is_completed: bool,
    pub evaluations: Vec<MetricScore>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Assignment identifier this image was served under.
    pub assignment_id: String,
    /// Backend identity for persistence calls.
    pub internal_id: String,
    pub image_url: String,
    pub image_id: String,
    pub study_id: Option<String>,
    pub status: CompletionStatus,
    pub ground_truth: GroundTruth,
    pub model_outputs: Vec<RecordModelOutput>,
}

// ============================================================================
// Worklist summaries (case-list screen data).
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseSummary {
    pub id: String,
    pub study_id: String,
    pub status: CompletionStatus,
    pub completed_evaluations: i64,
    pub total_evaluations: i64,
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
    pub evaluation_set_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaseListSummary {
    pub cases: Vec<CaseSummary>,
    pub total_cases: usize,
    pub pending_cases: usize,
    pub in_progress_cases: usize,
    pub completed_cases: usize,
}
