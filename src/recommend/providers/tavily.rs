// src/recommend/providers/tavily.rs
//! General web/document search via the Tavily API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{clean_text, page_size, SearchProvider};
use crate::recommend::error::UpstreamError;
use crate::recommend::types::{Candidate, ProviderKind};

const NAME: &str = "tavily";
const MIN_RESULTS: usize = 5;
const MAX_RESULTS: usize = 20;

#[derive(Debug, Serialize)]
struct SearchReq<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
    include_images: bool,
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResp {
    #[serde(default)]
    results: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    title: Option<String>,
    url: Option<String>,
    content: Option<String>,
    score: Option<f64>,
    published_date: Option<String>,
}

pub struct TavilyProvider {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl TavilyProvider {
    pub fn new(http: reqwest::Client, api_key: Option<String>, endpoint: String) -> Self {
        Self { http, api_key, endpoint }
    }

    fn to_candidate(hit: Hit) -> Option<Candidate> {
        let content = hit.content.filter(|c| !c.trim().is_empty())?;
        let title = clean_text(hit.title.as_deref()?);
        let link = hit.url?.trim().to_string();

        let mut meta = Map::new();
        if let Some(p) = &hit.published_date {
            meta.insert("publishedAt".into(), Value::String(p.clone()));
        }

        Some(
            Candidate::new(ProviderKind::Tavily, title, clean_text(&content), link)?
                .with_score(hit.score)
                .with_published_at(hit.published_date)
                .with_meta(meta),
        )
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Tavily
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, UpstreamError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(Vec::new());
        };

        let req = SearchReq {
            api_key,
            query,
            max_results: page_size(limit, MIN_RESULTS, MAX_RESULTS),
            search_depth: "advanced",
            include_images: false,
            include_answer: false,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .json(&req)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport { provider: NAME, source })?;

        if !resp.status().is_success() {
            return Err(UpstreamError::from_response(NAME, resp).await);
        }

        let body: SearchResp = resp
            .json()
            .await
            .map_err(|source| UpstreamError::Decode { provider: NAME, source })?;

        Ok(body
            .results
            .into_iter()
            .take(limit)
            .filter_map(Self::to_candidate)
            .collect())
    }
}
