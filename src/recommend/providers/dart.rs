// src/recommend/providers/dart.rs
//! Regulatory filings search via Open DART, keyed by a company name pulled from the query.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{clean_text, page_size, SearchProvider};
use crate::recommend::error::UpstreamError;
use crate::recommend::types::{Candidate, ProviderKind};

const NAME: &str = "dart";
const MIN_PAGE: usize = 10;
const MAX_PAGE: usize = 100;
const FILING_SCORE: f64 = 0.9;
const VIEWER_URL: &str = "https://dart.fss.or.kr/dsaf001/main.do";

const STATUS_OK: &str = "000";
// "조회된 데이타가 없습니다."
const STATUS_NO_DATA: &str = "013";

#[derive(Debug, Deserialize)]
struct ListResp {
    status: String,
    message: Option<String>,
    #[serde(default)]
    list: Vec<Filing>,
}

#[derive(Debug, Deserialize)]
struct Filing {
    corp_name: Option<String>,
    report_nm: Option<String>,
    rcept_no: Option<String>,
    rcept_dt: Option<String>,
}

pub struct DartProvider {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl DartProvider {
    pub fn new(http: reqwest::Client, api_key: Option<String>, endpoint: String) -> Self {
        Self { http, api_key, endpoint }
    }

    fn to_candidate(f: Filing, fallback_corp: &str) -> Option<Candidate> {
        let report = clean_text(f.report_nm.as_deref()?);
        let rcept_no = f.rcept_no.filter(|r| !r.trim().is_empty())?;
        let corp = f
            .corp_name
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| fallback_corp.to_string());

        let link = format!("{VIEWER_URL}?rcpNo={}", rcept_no.trim());
        let description = format!("{corp} - {report}");

        let mut meta = Map::new();
        meta.insert("corp".into(), Value::String(corp));
        meta.insert(
            "rcept_dt".into(),
            f.rcept_dt.clone().map(Value::String).unwrap_or(Value::Null),
        );
        meta.insert("rcept_no".into(), Value::String(rcept_no));

        Some(
            Candidate::new(ProviderKind::Dart, report, description, link)?
                .with_score(Some(FILING_SCORE))
                .with_published_at(f.rcept_dt)
                .with_meta(meta),
        )
    }
}

/// First token of the query, split on `,`, `/` or whitespace.
pub fn extract_corp_name(query: &str) -> Option<String> {
    query
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl SearchProvider for DartProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Dart
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, UpstreamError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(Vec::new());
        };
        let Some(corp) = extract_corp_name(query) else {
            return Ok(Vec::new());
        };

        let page_count = page_size(limit, MIN_PAGE, MAX_PAGE).to_string();
        let resp = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("crtfc_key", api_key),
                ("corp_name", corp.as_str()),
                ("page_no", "1"),
                ("page_count", page_count.as_str()),
            ])
            .send()
            .await
            .map_err(|source| UpstreamError::Transport { provider: NAME, source })?;

        if !resp.status().is_success() {
            return Err(UpstreamError::from_response(NAME, resp).await);
        }

        let body: ListResp = resp
            .json()
            .await
            .map_err(|source| UpstreamError::Decode { provider: NAME, source })?;

        match body.status.as_str() {
            STATUS_OK => {}
            STATUS_NO_DATA => return Ok(Vec::new()),
            _ => {
                return Err(UpstreamError::Api {
                    provider: NAME,
                    message: body
                        .message
                        .unwrap_or_else(|| "Open DART returned an error.".to_string()),
                })
            }
        }

        Ok(body
            .list
            .into_iter()
            .take(limit)
            .filter_map(|f| Self::to_candidate(f, &corp))
            .collect())
    }
}
