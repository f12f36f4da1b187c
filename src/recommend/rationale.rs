// src/recommend/rationale.rs
//! Rationale stage: one batched LLM call explains why each item fits the learner's
//! context. Any failure degrades to a deterministic templated reason.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::recommend::RecommendSettings;
use crate::recommend::error::RationaleError;
use crate::recommend::types::{Candidate, ProviderKind};

pub const MAX_REASON_CHARS: usize = 400;

const REPLY_SHAPE: &str = r#"Respond with {"items":[{"link":"","reason":""},...]}."#;

const SYSTEM_PROMPT: &str = "당신은 금융 학습 추천 엔진입니다. \
각 자료가 왜 학습자에게 도움이 되는지 한국어로 2문장 이하 rationale을 제공합니다. \
JSON만 출력하세요.";

/// What the backend sees of each candidate.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RationaleItem {
    pub link: String,
    pub source: ProviderKind,
    pub title: String,
    pub description: String,
}

impl From<&Candidate> for RationaleItem {
    fn from(c: &Candidate) -> Self {
        Self {
            link: c.link.clone(),
            source: c.source,
            title: c.title.clone(),
            description: c.description.clone(),
        }
    }
}

/// Rationale capability. `generate` may fail; callers own the fallback.
#[async_trait]
pub trait RationaleGenerator: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Returns `link -> reason` for whichever items the backend answered.
    async fn generate(
        &self,
        items: &[RationaleItem],
        context: &str,
    ) -> Result<HashMap<String, String>, RationaleError>;

    fn name(&self) -> &'static str;
}

/// Used when no answer-generation backend is configured.
pub struct DisabledRationale;

#[async_trait]
impl RationaleGenerator for DisabledRationale {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn generate(
        &self,
        _items: &[RationaleItem],
        _context: &str,
    ) -> Result<HashMap<String, String>, RationaleError> {
        Ok(HashMap::new())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// OpenAI Chat Completions backend.
pub struct OpenAiRationale {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OpenAiRationale {
    pub fn new(http: reqwest::Client, api_key: String, base_url: String, model: String) -> Self {
        Self {
            http,
            api_key,
            base_url,
            model,
            timeout: Duration::from_secs(crate::config::recommend::DEFAULT_RATIONALE_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct ChatResp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Value,
}

/// Message content is either a plain string or a list of `{text}` parts.
fn content_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

#[async_trait]
impl RationaleGenerator for OpenAiRationale {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        items: &[RationaleItem],
        context: &str,
    ) -> Result<HashMap<String, String>, RationaleError> {
        let context = if context.trim().is_empty() {
            crate::recommend::types::DEFAULT_CONTEXT
        } else {
            context
        };
        let items_json = serde_json::to_string(items)?;
        let user = format!("CONTEXT: {context}\nITEMS: {items_json}\n\n{REPLY_SHAPE}");

        let req = ChatReq {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&req)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(RationaleError::Status { status, body });
        }

        let body: ChatResp = resp.json().await?;
        let text = body
            .choices
            .first()
            .map(|c| content_text(&c.message.content))
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(RationaleError::EmptyCompletion);
        }

        let json = extract_json(&text)?;
        Ok(parse_reason_map(&json))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Pick the backend the settings allow.
pub fn build_rationale(
    settings: &RecommendSettings,
    http: &reqwest::Client,
) -> std::sync::Arc<dyn RationaleGenerator> {
    match (settings.rationale_enabled(), settings.openai_api_key.clone()) {
        (true, Some(key)) => std::sync::Arc::new(
            OpenAiRationale::new(
                http.clone(),
                key,
                settings.openai_base_url.clone(),
                settings.openai_model.clone(),
            )
            .with_timeout(Duration::from_secs(settings.rationale_timeout_secs)),
        ),
        _ => std::sync::Arc::new(DisabledRationale),
    }
}

/// Text-scraping fallback for backends that ignore structured output: strip a code fence
/// if present, then parse the span between the first `{` and the last `}`.
pub fn extract_json(raw: &str) -> Result<Value, RationaleError> {
    static RE_FENCE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)```(?:json)?(.*?)```").expect("static regex"));

    let target = RE_FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw);

    let start = target.find('{').ok_or(RationaleError::MissingJson)?;
    let end = target.rfind('}').ok_or(RationaleError::MissingJson)?;
    if end < start {
        return Err(RationaleError::MissingJson);
    }
    Ok(serde_json::from_str(&target[start..=end])?)
}

/// Accepts `{"items":[{"link","reason"}]}` or a flat `{link: reason}` object.
pub fn parse_reason_map(json: &Value) -> HashMap<String, String> {
    let mut out = HashMap::new();
    if let Some(items) = json.get("items").and_then(Value::as_array) {
        for it in items {
            let link = it.get("link").and_then(Value::as_str);
            let reason = it.get("reason").and_then(Value::as_str);
            if let (Some(link), Some(reason)) = (link, reason) {
                let reason = clean_reason(reason);
                if !reason.is_empty() {
                    out.insert(link.to_string(), reason);
                }
            }
        }
        return out;
    }
    if let Some(obj) = json.as_object() {
        for (link, reason) in obj {
            if let Some(reason) = reason.as_str().map(clean_reason).filter(|r| !r.is_empty()) {
                out.insert(link.clone(), reason);
            }
        }
    }
    out
}

/// Deterministic reason built from the context and the item's description.
pub fn fallback_reason(item: &Candidate, context: &str) -> String {
    let context = context.trim();
    if context.is_empty() {
        format!("학습에 참고할 만한 자료입니다: {}", item.description)
    } else {
        let description = &item.description;
        format!("{context}와 직접적으로 연관된 최신 자료입니다: {description}")
    }
}

/// Single line, collapsed whitespace, capped at `MAX_REASON_CHARS` characters.
pub fn clean_reason(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(MAX_REASON_CHARS * 3));
    let mut count = 0usize;
    for word in input.split_whitespace() {
        if count > 0 {
            if count + 1 >= MAX_REASON_CHARS {
                break;
            }
            out.push(' ');
            count += 1;
        }
        for ch in word.chars() {
            if count >= MAX_REASON_CHARS {
                break;
            }
            out.push(ch);
            count += 1;
        }
        if count >= MAX_REASON_CHARS {
            break;
        }
    }
    out
}

/// Template a reason for every item still missing one. Returns how many were filled.
fn with_fallback(items: &mut [Candidate], context: &str) -> usize {
    let mut filled = 0;
    for it in items.iter_mut() {
        if it.reason.as_deref().map_or(true, |r| r.trim().is_empty()) {
            it.reason = Some(fallback_reason(it, context));
            filled += 1;
        }
    }
    filled
}

/// Populate `reason` on every item. Never fails.
pub async fn attach_reasons(
    mut items: Vec<Candidate>,
    context: &str,
    generator: &dyn RationaleGenerator,
) -> Vec<Candidate> {
    if items.is_empty() {
        return items;
    }

    if generator.is_enabled() {
        let payload: Vec<RationaleItem> = items.iter().map(RationaleItem::from).collect();
        match generator.generate(&payload, context).await {
            Ok(reasons) => {
                debug!(
                    target: "recommend",
                    backend = generator.name(),
                    answered = reasons.len(),
                    requested = items.len(),
                    "rationales generated"
                );
                for it in items.iter_mut() {
                    if let Some(r) = reasons.get(&it.link) {
                        it.reason = Some(r.clone());
                    }
                }
            }
            Err(e) => {
                warn!(
                    target: "recommend",
                    backend = generator.name(),
                    error = %e,
                    "failed to build LLM reasons"
                );
            }
        }
    }

    let filled = with_fallback(&mut items, context);
    counter!("recommend_rationale_fallback_total").increment(filled as u64);
    items
}
