use clap::Parser;
use std::time::Duration;
use url::Url;

use crate::error::EvalError;

/// Radeval — evaluation client for AI-generated radiology images/reports.
#[derive(Parser, Debug, Clone)]
#[command(name = "radeval")]
pub struct CliArgs {
    /// Backend base URL (the `api/` prefix is appended automatically)
    #[arg(long = "base-url")]
    pub base_url: String,

    /// Evaluator email for login
    #[arg(long = "email")]
    pub email: Option<String>,

    /// Password for login (omit for passwordless evaluator accounts)
    #[arg(long = "password")]
    pub password: Option<String>,

    /// Bearer token to use directly instead of logging in
    #[arg(long = "token", env = "RADEVAL_TOKEN")]
    pub token: Option<String>,

    /// Assignment id to load (omit to load the unified worklist)
    #[arg(long = "assignment")]
    pub assignment: Option<String>,

    /// Image index to resume at
    #[arg(long = "start-index", default_value_t = 0)]
    pub start_index: usize,
}

// Cache constants
pub const METRICS_CACHE_TTL_SECS: u64 = 5 * 60;

// Transport constants
pub const HTTP_TIMEOUT_SECS: u64 = 30;

// Placeholder image constants
pub const PLACEHOLDER_WIDTH: u32 = 800;
pub const PLACEHOLDER_HEIGHT: u32 = 600;

// Identity of the case aggregate built from the unified worklist
pub const UNIFIED_CASE_ID: &str = "unified-worklist";
pub const UNIFIED_STUDY_ID: &str = "Unified Worklist";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, EvalError> {
        // Backend convention: every endpoint lives under `api/`.
        let trimmed = base_url.trim_end_matches('/');
        let base = Url::parse(&format!("{}/api/", trimmed))
            .map_err(|e| EvalError::Validation(format!("invalid base URL: {}", e)))?;
        Ok(Self {
            base_url: base,
            timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
        })
    }
}
