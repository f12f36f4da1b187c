// src/recommend/providers/kif_edu.rs
//! Financial-education content search over a public-data dataset (odcloud).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{clean_text, page_size, SearchProvider};
use crate::recommend::error::UpstreamError;
use crate::recommend::types::{Candidate, ProviderKind};

const NAME: &str = "kif_edu";
const MIN_PAGE: usize = 10;
const MAX_PAGE: usize = 100;
const CONTENT_SCORE: f64 = 0.7;
const DEFAULT_DESCRIPTION: &str = "금융교육 자료";

const TITLE_KEYS: [&str; 4] = ["TITLE", "CONTENTS_NM", "LECTURE_NM", "SUBJECT"];
const DESCRIPTION_KEYS: [&str; 4] = ["SUMMARY", "DESCRIPTION", "OUTLINE", "CONTENT"];
const LINK_KEYS: [&str; 4] = ["URL", "LINK", "HOMEPAGE", "CONTENT_URL"];

#[derive(Debug, Deserialize)]
struct DatasetResp {
    #[serde(default)]
    data: Vec<Map<String, Value>>,
}

pub struct KifEduProvider {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    dataset_id: String,
}

impl KifEduProvider {
    pub fn new(
        http: reqwest::Client,
        api_key: Option<String>,
        base_url: String,
        dataset_id: String,
    ) -> Self {
        Self {
            http,
            api_key,
            base_url,
            dataset_id,
        }
    }

    fn dataset_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.dataset_id.trim_start_matches('/')
        )
    }

    fn to_candidate(row: Map<String, Value>) -> Option<Candidate> {
        let title = pick_field(&row, &TITLE_KEYS)?;
        let link = pick_field(&row, &LINK_KEYS)?;
        let description = pick_field(&row, &DESCRIPTION_KEYS)
            .map(clean_text)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

        Some(
            Candidate::new(ProviderKind::KifEdu, clean_text(title), description, link.trim())?
            .with_score(Some(CONTENT_SCORE))
            .with_meta(row.clone()),
        )
    }
}

/// First non-blank string among `keys`, accepting upper- or lower-case field names.
fn pick_field<'a>(row: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| {
        row.get(*key)
            .or_else(|| row.get(&key.to_ascii_lowercase()))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    })
}

#[async_trait]
impl SearchProvider for KifEduProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::KifEdu
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, UpstreamError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(Vec::new());
        };

        let per_page = page_size(limit, MIN_PAGE, MAX_PAGE).to_string();
        let mut params: Vec<(&str, &str)> = vec![("page", "1"), ("perPage", per_page.as_str())];
        if !query.trim().is_empty() {
            params.push(("cond[TITLE::LIKE]", query));
        }
        params.push(("serviceKey", api_key));

        let resp = self
            .http
            .get(self.dataset_url())
            .query(&params)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport { provider: NAME, source })?;

        if !resp.status().is_success() {
            return Err(UpstreamError::from_response(NAME, resp).await);
        }

        let body: DatasetResp = resp
            .json()
            .await
            .map_err(|source| UpstreamError::Decode { provider: NAME, source })?;

        Ok(body
            .data
            .into_iter()
            .take(limit)
            .filter_map(Self::to_candidate)
            .collect())
    }
}
