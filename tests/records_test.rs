//! Record loading: assignment detail, the 404 fallback to the unified
//! assigned-images list, and error propagation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;

use radeval::api::wire::RawImageList;
use radeval::catalog::{MetricCatalog, MetricSource};
use radeval::error::EvalError;
use radeval::records::{load_records, RecordFetcher, RecordSource};
use radeval::types::{CompletionStatus, Metric};

struct StaticMetrics(Vec<Metric>);

impl MetricSource for StaticMetrics {
    async fn fetch_metrics(&self) -> Result<Vec<Metric>, EvalError> {
        Ok(self.0.clone())
    }
}

struct FailingMetrics;

impl MetricSource for FailingMetrics {
    async fn fetch_metrics(&self) -> Result<Vec<Metric>, EvalError> {
        Err(EvalError::Server(503))
    }
}

fn catalog_metrics() -> Vec<Metric> {
    vec![
        Metric {
            id: "m-1".to_string(),
            name: "Anatomical Validity".to_string(),
            description: None,
        },
        Metric {
            id: "m-2".to_string(),
            name: "Pathology Presence".to_string(),
            description: None,
        },
    ]
}

fn detail_payload() -> RawImageList {
    serde_json::from_value(json!({
        "images": [{
            "id": "img-1",
            "image_id": "display-img-1",
            "ground_truth_image_url": "https://cdn/gt-1.png",
            "progress": {"status": "in_progress"},
            "model_outputs": [{
                "id": "mo-1",
                "response_text": "No acute findings.",
                "display_label": "A",
                "is_completed": true,
                "evaluations": {"anatomical_validity": 1, "pathology_presence": "0"}
            }]
        }]
    }))
    .unwrap()
}

fn unified_payload() -> RawImageList {
    serde_json::from_value(json!({
        "images": [
            {
                "id": "img-7",
                "assignment_id": "assign-7",
                "ground_truth_image_url": "https://cdn/gt-7.png"
            },
            {
                "id": "img-8",
                "assignment_id": "assign-8",
                "ground_truth_image_url": "https://cdn/gt-8.png"
            }
        ]
    }))
    .unwrap()
}

enum DetailReply {
    Payload,
    NotFound,
    Server,
}

struct ScriptedFetcher {
    reply: DetailReply,
    detail_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl ScriptedFetcher {
    fn new(reply: DetailReply) -> Self {
        Self {
            reply,
            detail_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }
}

impl RecordFetcher for ScriptedFetcher {
    async fn assignment_detail(&self, assignment_id: &str) -> Result<RawImageList, EvalError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            DetailReply::Payload => Ok(detail_payload()),
            DetailReply::NotFound => {
                Err(EvalError::NotFound(format!("assignments/{}/", assignment_id)))
            }
            DetailReply::Server => Err(EvalError::Server(502)),
        }
    }

    async fn assigned_images(&self) -> Result<RawImageList, EvalError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(unified_payload())
    }
}

fn catalog() -> MetricCatalog<StaticMetrics> {
    MetricCatalog::with_ttl(StaticMetrics(catalog_metrics()), Duration::from_secs(300))
}

#[tokio::test]
async fn test_assignment_detail_binds_the_fetched_assignment_id() {
    let fetcher = ScriptedFetcher::new(DetailReply::Payload);
    let source = RecordSource::Assignment("assign-1".to_string());

    let records = load_records(&fetcher, &catalog(), &source).await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].assignment_id, "assign-1");
    assert_eq!(records[0].internal_id, "img-1");
    assert_eq!(records[0].status, CompletionStatus::InProgress);

    // Raw score keys map through the catalog onto metric ids.
    let mut scores: Vec<_> = records[0].model_outputs[0]
        .evaluations
        .iter()
        .map(|e| (e.metric_id.as_str(), e.score))
        .collect();
    scores.sort();
    assert_eq!(scores, vec![("m-1", 1), ("m-2", 0)]);

    assert_eq!(fetcher.detail_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fetcher.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_assignment_falls_back_to_unified_list() {
    let fetcher = ScriptedFetcher::new(DetailReply::NotFound);
    let source = RecordSource::Assignment("img-7".to_string());

    let records = load_records(&fetcher, &catalog(), &source).await.unwrap();

    assert_eq!(records.len(), 2);
    // Per-image assignment binding from the unified payload.
    assert_eq!(records[0].assignment_id, "assign-7");
    assert_eq!(records[1].assignment_id, "assign-8");

    assert_eq!(fetcher.detail_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fetcher.list_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_non_404_detail_errors_propagate_without_fallback() {
    let fetcher = ScriptedFetcher::new(DetailReply::Server);
    let source = RecordSource::Assignment("assign-1".to_string());

    let err = load_records(&fetcher, &catalog(), &source)
        .await
        .unwrap_err();

    assert!(matches!(err, EvalError::Server(502)));
    assert_eq!(fetcher.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_all_source_loads_unified_list_directly() {
    let fetcher = ScriptedFetcher::new(DetailReply::Payload);

    let records = load_records(&fetcher, &catalog(), &RecordSource::All)
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(fetcher.detail_calls.load(Ordering::SeqCst), 0);
    assert_eq!(fetcher.list_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_metric_fetch_failure_stops_the_load() {
    let fetcher = ScriptedFetcher::new(DetailReply::Payload);
    let catalog = MetricCatalog::with_ttl(FailingMetrics, Duration::from_secs(300));
    let source = RecordSource::Assignment("assign-1".to_string());

    let err = load_records(&fetcher, &catalog, &source).await.unwrap_err();

    assert!(matches!(err, EvalError::Server(503)));
    assert_eq!(fetcher.detail_calls.load(Ordering::SeqCst), 0);
    assert_eq!(fetcher.list_calls.load(Ordering::SeqCst), 0);
}
