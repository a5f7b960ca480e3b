use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::NewsCheckError;

const DEFAULT_CONFIG_PATH: &str = "newscheck.toml";
const CONFIG_PATH_ENV: &str = "NEWSCHECK_CONFIG";

/// Top-level configuration, built once and shared read-only by router and agents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Resolve the generative service secret, if the provider needs one.
    pub fn llm_api_key(&self) -> Result<Option<SecretValue>, NewsCheckError> {
        match self.llm.provider {
            LlmProvider::Ollama => Ok(optional_env(&self.llm.api_key_env)),
            LlmProvider::OpenAi => require_env(&self.llm.api_key_env).map(Some),
        }
    }

    /// Resolve the search service secret. `None` disables search.
    pub fn search_api_key(&self) -> Option<SecretValue> {
        optional_env(&self.search.resolved_api_key_env())
    }
}

/// Helper to load configuration with guard rails.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument.
    /// 2. `NEWSCHECK_CONFIG` environment variable.
    /// 3. `newscheck.toml` in the current working directory.
    ///
    /// Built-in defaults are used only when no file was requested and the
    /// default file does not exist.
    pub fn load(path: Option<PathBuf>) -> Result<Config, NewsCheckError> {
        let (candidate, explicit) = resolve_path(path);
        if !explicit && !candidate.exists() {
            tracing::debug!(path = %candidate.display(), "no config file found, using defaults");
            let config = Config::default();
            Self::validate(&config)?;
            return Ok(config);
        }

        let raw = fs::read_to_string(&candidate)
            .map_err(|err| NewsCheckError::config_io(candidate.clone(), err))?;
        Self::parse(&raw)
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(raw: &str) -> Result<Config, NewsCheckError> {
        let config: Config = toml::from_str(raw)
            .map_err(|err| NewsCheckError::InvalidConfiguration(err.to_string()))?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &Config) -> Result<(), NewsCheckError> {
        if config.llm.model.trim().is_empty() {
            return Err(NewsCheckError::InvalidConfiguration(
                "llm.model must not be empty".into(),
            ));
        }
        if config.verification.language.trim().is_empty() {
            return Err(NewsCheckError::InvalidConfiguration(
                "verification.language must not be empty".into(),
            ));
        }
        if config.search.max_queries == 0 || config.search.max_results == 0 {
            return Err(NewsCheckError::InvalidConfiguration(
                "search.max_queries and search.max_results must be positive".into(),
            ));
        }

        // Providers that need a key must find it in the environment at load time.
        config.llm_api_key()?;
        Ok(())
    }
}

fn resolve_path(path: Option<PathBuf>) -> (PathBuf, bool) {
    if let Some(path) = path {
        return (path, true);
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return (PathBuf::from(from_env), true);
        }
    }

    (Path::new(DEFAULT_CONFIG_PATH).to_path_buf(), false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "LlmConfig::default_provider")]
    pub provider: LlmProvider,
    #[serde(default = "LlmConfig::default_model")]
    pub model: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "LlmConfig::default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "LlmConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "LlmConfig::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "LlmConfig::default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "LlmConfig::default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "LlmConfig::default_temperature")]
    pub temperature: f32,
}

impl LlmConfig {
    const fn default_provider() -> LlmProvider {
        LlmProvider::Ollama
    }

    fn default_model() -> String {
        "llama3.1".to_string()
    }

    fn default_api_key_env() -> String {
        "OPENAI_API_KEY".to_string()
    }

    const fn default_timeout_secs() -> u64 {
        60
    }

    const fn default_max_retries() -> u32 {
        2
    }

    const fn default_initial_backoff_ms() -> u64 {
        1_000
    }

    const fn default_max_backoff_ms() -> u64 {
        30_000
    }

    const fn default_temperature() -> f32 {
        0.2
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Self::default_provider(),
            model: Self::default_model(),
            endpoint: None,
            api_key_env: Self::default_api_key_env(),
            timeout_secs: Self::default_timeout_secs(),
            max_retries: Self::default_max_retries(),
            initial_backoff_ms: Self::default_initial_backoff_ms(),
            max_backoff_ms: Self::default_max_backoff_ms(),
            temperature: Self::default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchProvider {
    #[serde(rename = "scrapingdog")]
    ScrapingDog,
    #[serde(rename = "serpapi")]
    SerpApi,
    #[serde(rename = "disabled")]
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "SearchConfig::default_provider")]
    pub provider: SearchProvider,
    /// Environment variable holding the key; provider-specific default when unset.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "SearchConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "SearchConfig::default_max_queries")]
    pub max_queries: usize,
    #[serde(default = "SearchConfig::default_news_per_query")]
    pub news_per_query: usize,
    #[serde(default = "SearchConfig::default_general_per_query")]
    pub general_per_query: usize,
    #[serde(default = "SearchConfig::default_max_results")]
    pub max_results: usize,
    #[serde(default = "SearchConfig::default_snippet_chars")]
    pub snippet_chars: usize,
    /// Hits requested per publication lookup in the study sub-analysis.
    #[serde(default = "SearchConfig::default_study_results")]
    pub study_results: usize,
}

impl SearchConfig {
    const fn default_provider() -> SearchProvider {
        SearchProvider::ScrapingDog
    }

    const fn default_timeout_secs() -> u64 {
        20
    }

    const fn default_max_queries() -> usize {
        2
    }

    const fn default_news_per_query() -> usize {
        2
    }

    const fn default_general_per_query() -> usize {
        1
    }

    const fn default_max_results() -> usize {
        6
    }

    const fn default_snippet_chars() -> usize {
        200
    }

    const fn default_study_results() -> usize {
        3
    }

    pub fn resolved_api_key_env(&self) -> String {
        if let Some(name) = self.api_key_env.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }
        match self.provider {
            SearchProvider::ScrapingDog => "SCRAPINGDOG_API_KEY".to_string(),
            SearchProvider::SerpApi => "SERPAPI_API_KEY".to_string(),
            SearchProvider::Disabled => String::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: Self::default_provider(),
            api_key_env: None,
            endpoint: None,
            timeout_secs: Self::default_timeout_secs(),
            max_queries: Self::default_max_queries(),
            news_per_query: Self::default_news_per_query(),
            general_per_query: Self::default_general_per_query(),
            max_results: Self::default_max_results(),
            snippet_chars: Self::default_snippet_chars(),
            study_results: Self::default_study_results(),
        }
    }
}

/// Pauses that keep upstream search services within their rate limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "PacingConfig::default_between_calls_ms")]
    pub between_calls_ms: u64,
    #[serde(default = "PacingConfig::default_between_queries_ms")]
    pub between_queries_ms: u64,
}

impl PacingConfig {
    const fn default_between_calls_ms() -> u64 {
        500
    }

    const fn default_between_queries_ms() -> u64 {
        1_000
    }

    /// No pauses at all; used by tests and offline runs.
    pub const fn none() -> Self {
        Self {
            between_calls_ms: 0,
            between_queries_ms: 0,
        }
    }

    pub fn between_calls(&self) -> Duration {
        Duration::from_millis(self.between_calls_ms)
    }

    pub fn between_queries(&self) -> Duration {
        Duration::from_millis(self.between_queries_ms)
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            between_calls_ms: Self::default_between_calls_ms(),
            between_queries_ms: Self::default_between_queries_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    #[serde(default = "VerificationConfig::default_language")]
    pub language: String,
    #[serde(default = "VerificationConfig::default_agent_timeout_ms")]
    pub agent_timeout_ms: u64,
    #[serde(default = "VerificationConfig::default_routing_max_tokens")]
    pub routing_max_tokens: u32,
    #[serde(default = "VerificationConfig::default_query_max_tokens")]
    pub query_max_tokens: u32,
    #[serde(default = "VerificationConfig::default_evaluation_max_tokens")]
    pub evaluation_max_tokens: u32,
    #[serde(default = "VerificationConfig::default_analysis_max_tokens")]
    pub analysis_max_tokens: u32,
}

impl VerificationConfig {
    fn default_language() -> String {
        "it".to_string()
    }

    const fn default_agent_timeout_ms() -> u64 {
        120_000
    }

    const fn default_routing_max_tokens() -> u32 {
        800
    }

    const fn default_query_max_tokens() -> u32 {
        300
    }

    const fn default_evaluation_max_tokens() -> u32 {
        800
    }

    const fn default_analysis_max_tokens() -> u32 {
        1_000
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_timeout_ms)
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            language: Self::default_language(),
            agent_timeout_ms: Self::default_agent_timeout_ms(),
            routing_max_tokens: Self::default_routing_max_tokens(),
            query_max_tokens: Self::default_query_max_tokens(),
            evaluation_max_tokens: Self::default_evaluation_max_tokens(),
            analysis_max_tokens: Self::default_analysis_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// Wrapper around sensitive values to reduce accidental logging.
#[derive(Clone)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***redacted***")
    }
}

/// Require that a given environment variable is set and non-empty.
pub fn require_env(var: &str) -> Result<SecretValue, NewsCheckError> {
    optional_env(var).ok_or_else(|| NewsCheckError::MissingSecret(var.to_string()))
}

/// Read an environment variable, treating blank values as absent.
pub fn optional_env(var: &str) -> Option<SecretValue> {
    if var.trim().is_empty() {
        return None;
    }
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Some(SecretValue(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = ConfigLoader::parse("").expect("defaults should validate");
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.search.max_queries, 2);
        assert_eq!(config.search.max_results, 6);
        assert_eq!(config.pacing.between_calls_ms, 500);
        assert_eq!(config.verification.language, "it");
    }

    #[test]
    fn sections_override_defaults() {
        let raw = r#"
            [search]
            provider = "serpapi"
            max_results = 10

            [pacing]
            between_calls_ms = 0
            between_queries_ms = 0

            [verification]
            language = "en"
            agent_timeout_ms = 5000
        "#;
        let config = ConfigLoader::parse(raw).expect("config should parse");
        assert_eq!(config.search.provider, SearchProvider::SerpApi);
        assert_eq!(config.search.max_results, 10);
        assert_eq!(config.search.resolved_api_key_env(), "SERPAPI_API_KEY");
        assert_eq!(config.pacing.between_queries(), Duration::ZERO);
        assert_eq!(config.verification.agent_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn openai_provider_requires_its_key() {
        let raw = r#"
            [llm]
            provider = "openai"
            model = "gpt-4o-mini"
            api_key_env = "NEWSCHECK_TEST_MISSING_OPENAI_KEY"
        "#;
        unsafe { std::env::remove_var("NEWSCHECK_TEST_MISSING_OPENAI_KEY") };
        let err = ConfigLoader::parse(raw).unwrap_err();
        assert!(matches!(err, NewsCheckError::MissingSecret(_)));
    }

    #[test]
    fn empty_model_is_rejected() {
        let err = ConfigLoader::parse("[llm]\nmodel = \"  \"\n").unwrap_err();
        assert!(matches!(err, NewsCheckError::InvalidConfiguration(_)));
    }

    #[test]
    fn explicit_path_is_loaded_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[logging]\nlevel = \"debug\"").expect("write config");
        let config = ConfigLoader::load(Some(file.path().to_path_buf())).expect("load config");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = ConfigLoader::load(Some(dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, NewsCheckError::ConfigIo { .. }));
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        unsafe { std::env::set_var("NEWSCHECK_TEST_SECRET", "value") };
        let secret = require_env("NEWSCHECK_TEST_SECRET").expect("secret should load");
        assert_eq!(secret.expose(), "value");
        assert_eq!(format!("{secret:?}"), "***redacted***");
    }
}
