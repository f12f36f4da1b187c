// src/recommend/types.rs
//! Request, candidate and response types for the recommendation pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::recommend::error::{ValidationError, ValidationIssue};

pub const DEFAULT_LIMIT: usize = 3;
pub const MAX_LIMIT: usize = 5;
pub const MAX_KEYWORDS: usize = 8;
pub const DEFAULT_CONTEXT: &str = "금융 학습";

/// External source that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Tavily,
    Dart,
    KifEdu,
}

impl ProviderKind {
    /// Iteration order used when the caller does not pick providers.
    pub const ALL: [ProviderKind; 3] =
        [ProviderKind::Tavily, ProviderKind::Dart, ProviderKind::KifEdu];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Tavily => "tavily",
            ProviderKind::Dart => "dart",
            ProviderKind::KifEdu => "kif_edu",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tavily" => Ok(ProviderKind::Tavily),
            "dart" => Ok(ProviderKind::Dart),
            "kif_edu" => Ok(ProviderKind::KifEdu),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// One recommendation before ranking. Created per request by a provider,
/// then enriched in place with `verified` and `reason`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub source: ProviderKind,
    pub title: String,
    pub description: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Candidate {
    /// Returns `None` when `title`, `description` or `link` is blank; such records never
    /// enter the pipeline.
    pub fn new(
        source: ProviderKind,
        title: impl Into<String>,
        description: impl Into<String>,
        link: impl Into<String>,
    ) -> Option<Self> {
        let title = title.into();
        let description = description.into();
        let link = link.into();
        if [&title, &description, &link].iter().any(|s| s.trim().is_empty()) {
            return None;
        }
        Some(Self {
            source,
            title,
            description,
            link,
            score: None,
            published_at: None,
            meta: Map::new(),
            verified: None,
            reason: None,
        })
    }

    pub fn with_score(mut self, score: Option<f64>) -> Self {
        self.score = score;
        self
    }

    pub fn with_published_at(mut self, published_at: Option<String>) -> Self {
        self.published_at = published_at.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = meta;
        self
    }

    /// Case-insensitive `title:link` identity used for deduplication.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.title, self.link).to_lowercase()
    }
}

/// Inbound body of `POST /api/recommend`, as sent by the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub providers: Option<Vec<String>>,
}

/// Validated request, ready for the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendQuery {
    /// Search string handed to every provider.
    pub query: String,
    /// Learning context handed to the rationale stage.
    pub context: String,
    pub limit: usize,
    /// Explicit provider selection, duplicates removed, caller order kept.
    pub providers: Option<Vec<ProviderKind>>,
}

impl RecommendQuery {
    /// Convenience constructor for callers that already have a topic.
    pub fn for_topic(topic: &str, limit: usize) -> Self {
        Self {
            query: topic.trim().to_string(),
            context: topic.trim().to_string(),
            limit: limit.clamp(1, MAX_LIMIT),
            providers: None,
        }
    }

    pub fn with_providers(mut self, providers: Vec<ProviderKind>) -> Self {
        self.providers = Some(providers);
        self
    }
}

impl RecommendRequest {
    /// Check every field and collect all issues before failing.
    pub fn validate(self) -> Result<RecommendQuery, ValidationError> {
        let mut issues = Vec::new();

        let topic = match self.topic {
            Some(t) if t.trim().is_empty() => {
                issues.push(ValidationIssue::new("topic", "topic must not be empty"));
                None
            }
            Some(t) => Some(t.trim().to_string()),
            None => None,
        };

        let keywords = match self.keywords {
            Some(list) => {
                if list.is_empty() {
                    issues.push(ValidationIssue::new(
                        "keywords",
                        "keywords must contain at least 1 entry",
                    ));
                } else if list.len() > MAX_KEYWORDS {
                    issues.push(ValidationIssue::new(
                        "keywords",
                        format!("keywords must contain at most {MAX_KEYWORDS} entries"),
                    ));
                }
                let mut cleaned = Vec::with_capacity(list.len());
                for (i, kw) in list.iter().enumerate() {
                    let kw = kw.trim();
                    if kw.is_empty() {
                        issues.push(ValidationIssue::new(
                            format!("keywords.{i}"),
                            "keyword must not be empty",
                        ));
                    } else {
                        cleaned.push(kw.to_string());
                    }
                }
                Some(cleaned).filter(|c| !c.is_empty())
            }
            None => None,
        };

        let limit = match self.limit {
            None => DEFAULT_LIMIT,
            Some(n) if (1..=MAX_LIMIT as i64).contains(&n) => n as usize,
            Some(_) => {
                issues.push(ValidationIssue::new(
                    "limit",
                    format!("limit must be between 1 and {MAX_LIMIT}"),
                ));
                DEFAULT_LIMIT
            }
        };

        let providers = match self.providers {
            None => None,
            Some(list) if list.is_empty() => {
                issues.push(ValidationIssue::new(
                    "providers",
                    "providers must contain at least 1 entry",
                ));
                None
            }
            Some(list) => {
                let mut kinds: Vec<ProviderKind> = Vec::with_capacity(list.len());
                for (i, raw) in list.iter().enumerate() {
                    match raw.parse::<ProviderKind>() {
                        Ok(kind) if !kinds.contains(&kind) => kinds.push(kind),
                        Ok(_) => {}
                        Err(msg) => {
                            issues.push(ValidationIssue::new(format!("providers.{i}"), msg))
                        }
                    }
                }
                Some(kinds)
            }
        };

        if topic.is_none() && keywords.is_none() && !issues.iter().any(|i| i.path == "topic") {
            issues.push(ValidationIssue::new("topic", "Provide at least a topic or one keyword."));
        }

        if !issues.is_empty() {
            return Err(ValidationError { issues });
        }

        Ok(RecommendQuery {
            query: build_query(topic.as_deref(), keywords.as_deref()),
            context: build_context(topic.as_deref(), keywords.as_deref()),
            limit,
            providers,
        })
    }
}

/// `topic` followed by the space-joined keywords.
pub fn build_query(topic: Option<&str>, keywords: Option<&[String]>) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(t) = topic {
        parts.push(t.to_string());
    }
    if let Some(kw) = keywords.filter(|k| !k.is_empty()) {
        parts.push(kw.join(" "));
    }
    parts.join(" ").trim().to_string()
}

/// Topic, else comma-joined keywords, else the generic learning context.
pub fn build_context(topic: Option<&str>, keywords: Option<&[String]>) -> String {
    if let Some(t) = topic {
        return t.to_string();
    }
    match keywords {
        Some(kw) if !kw.is_empty() => kw.join(", "),
        _ => DEFAULT_CONTEXT.to_string(),
    }
}

/// Outbound item; `reason` is always populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendItem {
    pub source: ProviderKind,
    pub title: String,
    pub description: String,
    pub link: String,
    pub reason: String,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl From<Candidate> for RecommendItem {
    fn from(c: Candidate) -> Self {
        let reason = c
            .reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| c.description.clone());
        Self {
            source: c.source,
            title: c.title,
            description: c.description,
            link: c.link,
            reason,
            verified: c.verified.unwrap_or(false),
            meta: Some(c.meta).filter(|m| !m.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub items: Vec<RecommendItem>,
}

impl From<Vec<Candidate>> for RecommendResponse {
    fn from(items: Vec<Candidate>) -> Self {
        Self {
            items: items.into_iter().map(RecommendItem::from).collect(),
        }
    }
}
