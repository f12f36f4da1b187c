// src/config/recommend.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, fs};

pub const DEFAULT_CONFIG_PATH: &str = "config/recommend.toml";
pub const ENV_CONFIG_PATH: &str = "RECOMMEND_CONFIG_PATH";

pub const DEFAULT_TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";
pub const DEFAULT_DART_ENDPOINT: &str = "https://opendart.fss.or.kr/api/list.json";
pub const DEFAULT_KIF_EDU_BASE_URL: &str = "https://api.odcloud.kr/api";
pub const DEFAULT_KIF_EDU_DATASET: &str = "15001075/v1/uddi:75baabad-0d5f-4484-9979-0ee45e401e33";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_RATIONALE_TIMEOUT_SECS: u64 = 20;

/// Answer-generation backend. Only `OpenAi` produces LLM rationales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatProvider {
    #[serde(rename = "openai")]
    OpenAi,
    N8n,
    Disabled,
}

impl ChatProvider {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(ChatProvider::OpenAi),
            "n8n" => Some(ChatProvider::N8n),
            "disabled" | "off" | "none" => Some(ChatProvider::Disabled),
            _ => None,
        }
    }
}

/// Effective runtime settings. Secrets only ever come from the environment.
#[derive(Debug, Clone)]
pub struct RecommendSettings {
    pub tavily_api_key: Option<String>,
    pub tavily_endpoint: String,
    pub dart_api_key: Option<String>,
    pub dart_endpoint: String,
    pub kif_edu_api_key: Option<String>,
    pub kif_edu_base_url: String,
    pub kif_edu_dataset_id: String,
    pub chat_provider: ChatProvider,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub rationale_timeout_secs: u64,
    pub allowed_origins: Vec<String>,
}

impl Default for RecommendSettings {
    fn default() -> Self {
        Self {
            tavily_api_key: None,
            tavily_endpoint: DEFAULT_TAVILY_ENDPOINT.to_string(),
            dart_api_key: None,
            dart_endpoint: DEFAULT_DART_ENDPOINT.to_string(),
            kif_edu_api_key: None,
            kif_edu_base_url: DEFAULT_KIF_EDU_BASE_URL.to_string(),
            kif_edu_dataset_id: DEFAULT_KIF_EDU_DATASET.to_string(),
            chat_provider: ChatProvider::OpenAi,
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            rationale_timeout_secs: DEFAULT_RATIONALE_TIMEOUT_SECS,
            allowed_origins: Vec::new(),
        }
    }
}

/// Non-secret keys accepted in `config/recommend.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    tavily_endpoint: Option<String>,
    dart_endpoint: Option<String>,
    kif_edu_base_url: Option<String>,
    kif_edu_dataset_id: Option<String>,
    chat_provider: Option<ChatProvider>,
    openai_base_url: Option<String>,
    openai_model: Option<String>,
    rationale_timeout_secs: Option<u64>,
    allowed_origins: Option<Vec<String>>,
}

impl RecommendSettings {
    /// Defaults, then the optional TOML file, then environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(path) = config_path()? {
            cfg.apply_file(&path)?;
        }
        cfg.apply_env_from(|key| env::var(key).ok());
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_file(path.as_ref())?;
        Ok(cfg)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading recommend config from {}", path.display()))?;
        let file: FileSettings = toml::from_str(&data)
            .with_context(|| format!("parsing recommend config {}", path.display()))?;

        if let Some(v) = non_blank(file.tavily_endpoint) {
            self.tavily_endpoint = v;
        }
        if let Some(v) = non_blank(file.dart_endpoint) {
            self.dart_endpoint = v;
        }
        if let Some(v) = non_blank(file.kif_edu_base_url) {
            self.kif_edu_base_url = v;
        }
        if let Some(v) = non_blank(file.kif_edu_dataset_id) {
            self.kif_edu_dataset_id = v;
        }
        if let Some(v) = file.chat_provider {
            self.chat_provider = v;
        }
        if let Some(v) = non_blank(file.openai_base_url) {
            self.openai_base_url = v;
        }
        if let Some(v) = non_blank(file.openai_model) {
            self.openai_model = v;
        }
        if let Some(v) = file.rationale_timeout_secs.filter(|s| *s > 0) {
            self.rationale_timeout_secs = v;
        }
        if let Some(v) = file.allowed_origins {
            self.allowed_origins = clean_origins(v);
        }
        Ok(())
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_blank(lookup(key));

        self.tavily_api_key = get("TAVILY_API_KEY");
        self.dart_api_key = get("DART_API_KEY");
        self.kif_edu_api_key = get("KIF_EDU_API_KEY");
        self.openai_api_key = get("OPENAI_API_KEY");

        if let Some(v) = get("TAVILY_ENDPOINT") {
            self.tavily_endpoint = v;
        }
        if let Some(v) = get("DART_ENDPOINT") {
            self.dart_endpoint = v;
        }
        if let Some(v) = get("KIF_EDU_BASE_URL") {
            self.kif_edu_base_url = v;
        }
        if let Some(v) = get("KIF_EDU_DATASET_ID") {
            self.kif_edu_dataset_id = v;
        }
        if let Some(v) = get("CHAT_PROVIDER") {
            match ChatProvider::parse(&v) {
                Some(p) => self.chat_provider = p,
                None => tracing::warn!(value = %v, "ignoring unknown CHAT_PROVIDER"),
            }
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.openai_base_url = v;
        }
        if let Some(v) = get("OPENAI_MODEL") {
            self.openai_model = v;
        }
        if let Some(v) = get("RATIONALE_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
            if v > 0 {
                self.rationale_timeout_secs = v;
            }
        }
        if let Some(v) = get("ALLOWED_ORIGINS") {
            self.allowed_origins = clean_origins(v.split(',').map(str::to_string).collect());
        }
    }

    /// LLM rationales run only in `openai` mode with a key present.
    pub fn rationale_enabled(&self) -> bool {
        self.chat_provider == ChatProvider::OpenAi && self.openai_api_key.is_some()
    }
}

/// $RECOMMEND_CONFIG_PATH (must exist), else the default path when present.
fn config_path() -> Result<Option<PathBuf>> {
    if let Some(p) = non_blank(env::var(ENV_CONFIG_PATH).ok()) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            anyhow::bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
        }
        return Ok(Some(pb));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
    Ok(default.exists().then_some(default))
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn clean_origins(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}
