// src/recommend/error.rs
//! Error taxonomy. Only `RecommendError` and `ValidationError` reach the HTTP boundary;
//! upstream and rationale errors are absorbed inside the pipeline.

use serde::Serialize;

/// A single provider call failed outright.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{provider} API error: {message}")]
    Api {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} payload could not be decoded: {source}")]
    Decode {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl UpstreamError {
    pub fn provider(&self) -> &'static str {
        match self {
            UpstreamError::Status { provider, .. }
            | UpstreamError::Api { provider, .. }
            | UpstreamError::Transport { provider, .. }
            | UpstreamError::Decode { provider, .. } => provider,
        }
    }

    /// Build a `Status` error from a non-2xx response, keeping the raw body.
    pub async fn from_response(provider: &'static str, resp: reqwest::Response) -> Self {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        UpstreamError::Status { provider, status, body }
    }
}

/// Rationale generation failed; callers fall back to templated reasons.
#[derive(Debug, thiserror::Error)]
pub enum RationaleError {
    #[error("rationale request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rationale backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("rationale backend returned no content")]
    EmptyCompletion,
    #[error("no JSON object found in rationale response")]
    MissingJson,
    #[error("rationale JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Request-level failures, each distinguishable by the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecommendError {
    #[error("사용 가능한 자료 소스가 없습니다. 환경변수를 확인해주세요.")]
    NoProviderAvailable,
    #[error("자료 소스에서 검색 결과를 찾지 못했습니다.")]
    EmptyUpstream,
    #[error("검증을 통과한 자료가 없습니다.")]
    NothingVerified,
}

impl RecommendError {
    pub fn code(&self) -> &'static str {
        match self {
            RecommendError::NoProviderAvailable => "RECOMMEND_PROVIDER_MISSING",
            RecommendError::EmptyUpstream => "RECOMMENDATION_EMPTY",
            RecommendError::NothingVerified => "RECOMMENDATION_UNVERIFIED",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            RecommendError::NoProviderAvailable => 400,
            RecommendError::EmptyUpstream | RecommendError::NothingVerified => 502,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", self.message())]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![ValidationIssue::new(path, message)],
        }
    }

    /// Issue messages joined the way clients already display them.
    pub fn message(&self) -> String {
        self.issues
            .iter()
            .map(|i| i.message.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
