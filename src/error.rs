#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// No response received (connect failure, timeout, closed socket).
    #[error("Network error: {0}")]
    Network(String),

    /// 401 — the session token is no longer valid.
    #[error("Authentication expired. Please log in again.")]
    AuthExpired,

    /// 403 — the operation does not proceed, the session stays valid.
    #[error("You do not have permission to perform this action.")]
    Forbidden,

    /// 404 — fatal for most operations, an expected branch signal for the
    /// assignment-vs-unified-list fallback.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// 5xx — retryable by the user, never auto-retried.
    #[error("Server error ({0}). Please try again later.")]
    Server(u16),

    /// Any other non-2xx with whatever detail the backend attached.
    #[error("Request failed ({status}): {detail}")]
    Api { status: u16, detail: String },

    /// Rejected locally before any network call.
    #[error("{0}")]
    Validation(String),

    /// Bulk finalize aggregate: some submissions failed, nothing was rolled back.
    #[error("Bulk save failed for {failed} of {total} evaluations: {detail}")]
    Bulk {
        failed: usize,
        total: usize,
        detail: String,
    },

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl EvalError {
    /// Whether re-invoking the same operation is a sensible recovery.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EvalError::Network(_) | EvalError::Server(_) | EvalError::Bulk { .. }
        )
    }

    /// Expected-branch signal for the assignment-detail fallback.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EvalError::NotFound(_))
    }

    /// Plain-language message for the single user-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            EvalError::Network(_) => "No response received from the server.".to_string(),
            EvalError::Api { detail, .. } if !detail.is_empty() => detail.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for EvalError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            EvalError::Decode(e.to_string())
        } else {
            // Transport-level: no usable response came back. Status-bearing
            // failures are classified in ApiClient before reaching here.
            EvalError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_and_server_errors_are_retryable() {
        assert!(EvalError::Network("connection refused".into()).is_retryable());
        assert!(EvalError::Server(503).is_retryable());
    }

    #[test]
    fn test_auth_and_validation_errors_are_not_retryable() {
        assert!(!EvalError::AuthExpired.is_retryable());
        assert!(!EvalError::Forbidden.is_retryable());
        assert!(!EvalError::Validation("missing scores".into()).is_retryable());
    }

    #[test]
    fn test_not_found_is_branch_signal() {
        assert!(EvalError::NotFound("evaluations/assignments/x/".into()).is_not_found());
        assert!(!EvalError::Server(500).is_not_found());
    }

    #[test]
    fn test_user_message_prefers_backend_detail() {
        let err = EvalError::Api {
            status: 422,
            detail: "score out of range".into(),
        };
        assert_eq!(err.user_message(), "score out of range");
    }

    #[test]
    fn test_user_message_for_network_failure() {
        let err = EvalError::Network("timed out".into());
        assert_eq!(err.user_message(), "No response received from the server.");
    }

    #[test]
    fn test_bulk_error_names_counts() {
        let err = EvalError::Bulk {
            failed: 2,
            total: 12,
            detail: "Server error (500). Please try again later.".into(),
        };
        assert!(err.to_string().contains("2 of 12"));
        assert!(err.is_retryable());
    }
}
