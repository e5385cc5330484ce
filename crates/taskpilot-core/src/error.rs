//! Error types for the provider client and the agent run

use reqwest::StatusCode;
use thiserror::Error;

/// Failure talking to the chat completion provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider rejected the credential (HTTP {status})")]
    Unauthorized { status: u16 },
    #[error("provider quota exceeded (HTTP 429)")]
    QuotaExceeded,
    #[error("model not found or not accessible (HTTP 404)")]
    ModelNotFound,
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Classify a non-success HTTP response
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized {
                status: status.as_u16(),
            },
            StatusCode::TOO_MANY_REQUESTS => Self::QuotaExceeded,
            StatusCode::NOT_FOUND => Self::ModelNotFound,
            _ => Self::Status {
                status: status.as_u16(),
                body,
            },
        }
    }
}

/// Run-level failure kinds, each with a fixed user-facing message
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid credential: {0}")]
    AuthInvalid(#[source] ProviderError),
    #[error("quota exceeded")]
    QuotaExceeded,
    #[error("model access denied")]
    ModelAccessDenied,
    #[error("upstream failure: {0}")]
    UnknownUpstreamFailure(#[source] ProviderError),
    #[error("task execution failed: {0}")]
    TaskExecutionFailure(#[source] ProviderError),
    #[error("follow-up task generation failed: {0}")]
    FollowupGenerationFailure(#[source] ProviderError),
    #[error("no API key supplied and no fallback key configured")]
    MissingCredential,
}

pub const POLICY_VIOLATION_MESSAGE: &str =
    "ERROR adding additional task(s). It might have been against our model's policies to run them. Continuing.";

impl AgentError {
    /// Map a failure from the initial task fetch
    pub fn from_provider(err: ProviderError) -> Self {
        match err {
            ProviderError::Unauthorized { .. } => Self::AuthInvalid(err),
            ProviderError::QuotaExceeded => Self::QuotaExceeded,
            ProviderError::ModelNotFound => Self::ModelAccessDenied,
            other => Self::UnknownUpstreamFailure(other),
        }
    }

    /// Map a failure while executing a queued task
    pub fn from_execution(err: ProviderError) -> Self {
        match err {
            ProviderError::Unauthorized { .. } => Self::AuthInvalid(err),
            ProviderError::QuotaExceeded => Self::QuotaExceeded,
            ProviderError::ModelNotFound => Self::ModelAccessDenied,
            other => Self::TaskExecutionFailure(other),
        }
    }

    /// Map a connectivity probe failure; anything unclassified blames the key
    pub fn from_probe(err: ProviderError) -> Self {
        match err {
            ProviderError::QuotaExceeded => Self::QuotaExceeded,
            ProviderError::ModelNotFound => Self::ModelAccessDenied,
            other => Self::AuthInvalid(other),
        }
    }

    /// Message delivered to the rendering sink
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthInvalid(_) => {
                "ERROR accessing the model API. Please check your API key or try again later."
                    .to_string()
            }
            Self::QuotaExceeded => {
                "ERROR using your API key. You've exceeded your current quota, please check your plan and billing details."
                    .to_string()
            }
            Self::ModelAccessDenied => {
                "ERROR your API key does not have access to the selected model.".to_string()
            }
            Self::UnknownUpstreamFailure(_) => {
                "ERROR retrieving initial tasks array. Retry, make your goal more clear, or revise your goal such that it is within our model's policies to run. Shutting Down."
                    .to_string()
            }
            Self::TaskExecutionFailure(_) => {
                "ERROR executing task. The model could not complete the request, try again later. Shutting Down."
                    .to_string()
            }
            Self::FollowupGenerationFailure(_) => POLICY_VIOLATION_MESSAGE.to_string(),
            Self::MissingCredential => {
                "ERROR no API key available. Provide your own key or configure a fallback key."
                    .to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ProviderError::from_status(StatusCode::UNAUTHORIZED, String::new()),
            ProviderError::Unauthorized { status: 401 }
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::FORBIDDEN, String::new()),
            ProviderError::Unauthorized { status: 403 }
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            ProviderError::QuotaExceeded
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::NOT_FOUND, String::new()),
            ProviderError::ModelNotFound
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::BAD_GATEWAY, "down".into()),
            ProviderError::Status { status: 502, .. }
        ));
    }

    #[test]
    fn test_agent_error_mapping() {
        let err = AgentError::from_provider(ProviderError::QuotaExceeded);
        assert!(matches!(err, AgentError::QuotaExceeded));
        assert!(err.user_message().contains("quota"));

        let err = AgentError::from_provider(ProviderError::InvalidResponse("empty".into()));
        assert!(matches!(err, AgentError::UnknownUpstreamFailure(_)));
        assert!(err.user_message().contains("Retry"));
    }

    #[test]
    fn test_probe_failures_blame_the_key() {
        let err = AgentError::from_probe(ProviderError::Status {
            status: 500,
            body: String::new(),
        });
        assert!(matches!(err, AgentError::AuthInvalid(_)));
        assert!(err.user_message().contains("API key"));

        let err = AgentError::from_probe(ProviderError::ModelNotFound);
        assert!(matches!(err, AgentError::ModelAccessDenied));
    }

    #[test]
    fn test_execution_failure_has_its_own_message() {
        let err = AgentError::from_execution(ProviderError::Status {
            status: 500,
            body: "boom".into(),
        });
        assert!(matches!(err, AgentError::TaskExecutionFailure(_)));
        assert!(err.user_message().starts_with("ERROR executing task"));
        assert!(!err.user_message().contains("initial tasks"));

        let err = AgentError::from_execution(ProviderError::QuotaExceeded);
        assert!(matches!(err, AgentError::QuotaExceeded));
    }

    #[test]
    fn test_followup_failure_message() {
        let err = AgentError::FollowupGenerationFailure(ProviderError::InvalidResponse(
            "bad".into(),
        ));
        assert_eq!(err.user_message(), POLICY_VIOLATION_MESSAGE);
    }
}
