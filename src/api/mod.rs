//! HTTP transport against the evaluation backend.
//!
//! One `ApiClient` per process: bearer-token auth on every request except
//! login, uniform status classification into `EvalError`, and wire-payload
//! parsing. The rest of the crate reaches the backend only through the
//! seam traits (`MetricSource`, `EvaluationStore`, `UrlRefresher`,
//! `RecordFetcher`, `Stage2Store`) this client implements.

pub mod wire;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::RwLock;
use tracing::{error, info, warn};
use url::Url;

use crate::catalog::MetricSource;
use crate::config::ClientConfig;
use crate::error::EvalError;
use crate::gallery::Stage2Store;
use crate::images::{AssetType, UrlRefresher};
use crate::records::RecordFetcher;
use crate::session::EvaluationStore;
use crate::types::Metric;
use wire::{
    LoginResponse, MetricsResponse, RawAssignmentList, RawImageList, RefreshUrlResponse,
    SaveEvaluationsRequest, Stage2ImageList, UserDetails,
};

pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, EvalError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EvalError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            token: RwLock::new(None),
        })
    }

    pub fn set_token(&self, token: &str) {
        *self.token.write().expect("token lock poisoned") = Some(token.to_string());
    }

    pub fn has_session(&self) -> bool {
        self.token.read().expect("token lock poisoned").is_some()
    }

    /// Drop all local session state. Called on 401 and on explicit logout.
    pub fn clear_session(&self) {
        *self.token.write().expect("token lock poisoned") = None;
    }

    fn endpoint(&self, path: &str) -> Result<Url, EvalError> {
        self.base_url
            .join(path)
            .map_err(|e| EvalError::Validation(format!("invalid endpoint {}: {}", path, e)))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.read().expect("token lock poisoned").as_deref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Map a non-2xx response to the error taxonomy. 401 clears the local
    /// session before surfacing.
    async fn classify(&self, path: &str, resp: reqwest::Response) -> Result<reqwest::Response, EvalError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        if status == StatusCode::UNAUTHORIZED {
            self.clear_session();
            return Err(EvalError::AuthExpired);
        }
        if status == StatusCode::FORBIDDEN {
            return Err(EvalError::Forbidden);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(EvalError::NotFound(path.to_string()));
        }
        if status.is_server_error() {
            return Err(EvalError::Server(status.as_u16()));
        }

        // Pull `detail`/`message` out of the body when the backend sent one.
        let detail = match resp.json::<serde_json::Value>().await {
            Ok(body) => body["detail"]
                .as_str()
                .or_else(|| body["message"].as_str())
                .unwrap_or_default()
                .to_string(),
            Err(_) => String::new(),
        };
        Err(EvalError::Api {
            status: status.as_u16(),
            detail,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, EvalError> {
        let url = self.endpoint(path)?;
        let resp = self.authorize(self.http.get(url)).send().await?;
        let resp = self.classify(path, resp).await?;
        Ok(resp.json::<T>().await?)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, EvalError> {
        let url = self.endpoint(path)?;
        let resp = self.authorize(self.http.post(url)).json(body).send().await?;
        let resp = self.classify(path, resp).await?;
        Ok(resp.json::<T>().await?)
    }

    async fn post_ack<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), EvalError> {
        let url = self.endpoint(path)?;
        let resp = self.authorize(self.http.post(url)).json(body).send().await?;
        self.classify(path, resp).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Auth & users
    // ------------------------------------------------------------------

    /// Log in and capture the session token for subsequent requests.
    pub async fn login(&self, email: &str, password: Option<&str>) -> Result<LoginResponse, EvalError> {
        let mut payload = serde_json::json!({ "email": email });
        if let Some(pw) = password {
            payload["password"] = serde_json::Value::String(pw.to_string());
        }
        let resp: LoginResponse = self
            .post_json("auth/login/", &payload)
            .await
            .map_err(|e| {
                error!("Login failed: {}", e);
                e
            })?;
        self.set_token(&resp.access_token);
        info!("Logged in as {} ({})", email, resp.user.role);
        Ok(resp)
    }

    /// Fetch user details; `None` resolves the current token's user.
    pub async fn user_details(&self, user_id: Option<&str>) -> Result<UserDetails, EvalError> {
        let path = match user_id {
            Some(id) => format!("users/{}/", id),
            None => "auth/me/".to_string(),
        };
        self.get_json(&path).await.map_err(|e| {
            error!("Error fetching user details: {}", e);
            e
        })
    }

    /// Role check that degrades to `false` on any failure; the caller gets
    /// a usable answer either way.
    pub async fn is_supervisor(&self, user_id: &str) -> bool {
        match self.user_details(Some(user_id)).await {
            Ok(user) => user.role == "supervisor",
            Err(e) => {
                warn!("Supervisor check failed for {}: {}", user_id, e);
                false
            }
        }
    }

    /// Connectivity probe against the metrics endpoint.
    pub async fn test_connection(&self) -> bool {
        match self.get_json::<MetricsResponse>("metrics/").await {
            Ok(_) => true,
            Err(e) => {
                warn!("Backend connection check failed: {}", e);
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Assignments & evaluations
    // ------------------------------------------------------------------

    pub async fn my_assignments(&self) -> Result<RawAssignmentList, EvalError> {
        self.get_json("evaluations/my-assignments/").await.map_err(|e| {
            error!("Error fetching assignments: {}", e);
            e
        })
    }

    /// Mark an assignment started. Non-fatal: a failure is logged and
    /// swallowed, evaluation proceeds regardless.
    pub async fn start_assignment(&self, assignment_id: &str) {
        let path = format!("evaluations/assignments/{}/start/", assignment_id);
        if let Err(e) = self.post_ack(&path, &serde_json::json!({})).await {
            warn!("Error starting assignment {}: {}", assignment_id, e);
        }
    }
}

impl MetricSource for ApiClient {
    async fn fetch_metrics(&self) -> Result<Vec<Metric>, EvalError> {
        let resp: MetricsResponse = self.get_json("metrics/").await.map_err(|e| {
            error!("Error fetching metrics: {}", e);
            e
        })?;
        Ok(resp.metrics)
    }
}

impl RecordFetcher for ApiClient {
    async fn assignment_detail(&self, assignment_id: &str) -> Result<RawImageList, EvalError> {
        let path = format!("evaluations/assignments/{}/", assignment_id);
        self.get_json(&path).await.map_err(|e| {
            if e.is_not_found() {
                // Valid branch: the id was not an assignment, the caller
                // falls back to the unified image list.
                warn!("Assignment {} not found, fallback will handle this", assignment_id);
            } else {
                error!("Error fetching assignment details: {}", e);
            }
            e
        })
    }

    async fn assigned_images(&self) -> Result<RawImageList, EvalError> {
        self.get_json("evaluations/assigned-images/").await.map_err(|e| {
            error!("Error fetching assigned images: {}", e);
            e
        })
    }
}

impl EvaluationStore for ApiClient {
    async fn save_evaluations(&self, request: SaveEvaluationsRequest) -> Result<(), EvalError> {
        self.post_ack("evaluations/bulk/", &request).await.map_err(|e| {
            error!(
                "Error saving evaluations for model output {}: {}",
                request.model_output_id, e
            );
            e
        })
    }

    async fn complete_assignment(&self, assignment_id: &str) -> Result<(), EvalError> {
        let path = format!("evaluations/assignments/{}/complete/", assignment_id);
        self.post_ack(&path, &serde_json::json!({})).await.map_err(|e| {
            error!("Error completing assignment {}: {}", assignment_id, e);
            e
        })
    }
}

impl UrlRefresher for ApiClient {
    async fn refresh_url(&self, asset: AssetType, id: &str) -> Result<Option<String>, EvalError> {
        let body = serde_json::json!({ "type": asset.as_str(), "id": id });
        let resp: RefreshUrlResponse = self
            .post_json("evaluations/refresh-url/", &body)
            .await
            .map_err(|e| {
                error!("Error refreshing {} URL for {}: {}", asset.as_str(), id, e);
                e
            })?;
        Ok(resp.url.filter(|u| !u.is_empty()))
    }
}

impl Stage2Store for ApiClient {
    async fn stage2_images(&self) -> Result<Stage2ImageList, EvalError> {
        self.get_json("stage2/images/").await.map_err(|e| {
            error!("Error fetching stage 2 images: {}", e);
            e
        })
    }

    async fn save_stage2_score(&self, image_id: &str, score: i64) -> Result<(), EvalError> {
        let body = serde_json::json!({ "image_id": image_id, "score": score });
        self.post_ack("stage2/evaluations/", &body).await.map_err(|e| {
            error!("Error saving stage 2 score for {}: {}", image_id, e);
            e
        })
    }
}
