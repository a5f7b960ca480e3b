//! Web search collaborator and its HTTP adapters.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{Config, SearchConfig, SearchProvider, SecretValue};
use crate::error::{NewsCheckError, ServiceError};
use crate::http::{build_client, status_error, transport_error};

const SCRAPINGDOG_ENDPOINT: &str = "https://api.scrapingdog.com/google";
const SERPAPI_ENDPOINT: &str = "https://serpapi.com/search";

/// News-flavored searches favor dated press coverage; general searches hit the open web.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchFlavor {
    News,
    General,
}

impl fmt::Display for SearchFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchFlavor::News => f.write_str("news"),
            SearchFlavor::General => f.write_str("general"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl SearchHit {
    pub fn new(title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            snippet: snippet.into(),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}

#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(
        &self,
        query: &str,
        language: &str,
        count: usize,
        flavor: SearchFlavor,
    ) -> Result<Vec<SearchHit>, ServiceError>;

    fn name(&self) -> &str;
}

pub type DynSearch = Arc<dyn SearchService>;

/// Google country code paired with a UI language.
fn country_for(language: &str) -> &'static str {
    if language.eq_ignore_ascii_case("it") {
        "it"
    } else {
        "us"
    }
}

/// Map a Google-style SERP payload into hits. News searches fall back to
/// organic results when the provider returns no news block.
pub fn hits_from_payload(payload: &Value, flavor: SearchFlavor) -> Vec<SearchHit> {
    let block = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_array)
            .filter(|items| !items.is_empty())
    };

    let items = match flavor {
        SearchFlavor::News => block("news_results").or_else(|| block("organic_results")),
        SearchFlavor::General => block("organic_results"),
    };

    items
        .map(|items| items.iter().filter_map(hit_from_item).collect())
        .unwrap_or_default()
}

fn hit_from_item(item: &Value) -> Option<SearchHit> {
    let text = |key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let title = text("title")?;
    let source = match item.get("source") {
        Some(Value::String(name)) => Some(name.trim().to_string()),
        Some(Value::Object(map)) => map.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
    .or_else(|| text("displayed_link"))
    .unwrap_or_default();

    Some(SearchHit {
        title,
        snippet: text("snippet").unwrap_or_default(),
        link: text("link").unwrap_or_default(),
        source,
        date: text("date"),
    })
}

async fn fetch_json(
    client: &reqwest::Client,
    service: &str,
    timeout: Duration,
    url: &str,
    params: &[(&str, String)],
) -> Result<Value, ServiceError> {
    let response = client
        .get(url)
        .query(params)
        .send()
        .await
        .map_err(|err| transport_error(service, timeout, err))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(status_error(service, status, &text));
    }

    response
        .json()
        .await
        .map_err(|err| ServiceError::invalid_response(service, err.to_string()))
}

/// Google results through ScrapingDog.
pub struct ScrapingDogSearch {
    endpoint: String,
    api_key: SecretValue,
    timeout: Duration,
    client: reqwest::Client,
}

impl ScrapingDogSearch {
    pub fn from_config(config: &SearchConfig, api_key: SecretValue) -> Result<Self, NewsCheckError> {
        Ok(Self {
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| SCRAPINGDOG_ENDPOINT.to_string()),
            api_key,
            timeout: config.timeout(),
            client: build_client(config.timeout())?,
        })
    }

    fn params(&self, query: &str, language: &str, count: usize, flavor: SearchFlavor) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("api_key", self.api_key.expose().to_string()),
            ("query", query.to_string()),
            ("num", count.to_string()),
            ("hl", language.to_string()),
            ("gl", country_for(language).to_string()),
        ];
        if flavor == SearchFlavor::News {
            params.push(("tbm", "nws".to_string()));
        }
        params
    }
}

#[async_trait]
impl SearchService for ScrapingDogSearch {
    async fn search(
        &self,
        query: &str,
        language: &str,
        count: usize,
        flavor: SearchFlavor,
    ) -> Result<Vec<SearchHit>, ServiceError> {
        let params = self.params(query, language, count, flavor);
        let payload = fetch_json(&self.client, self.name(), self.timeout, &self.endpoint, &params).await?;
        Ok(hits_from_payload(&payload, flavor))
    }

    fn name(&self) -> &str {
        "scrapingdog"
    }
}

/// Google and Google News results through SerpAPI.
pub struct SerpApiSearch {
    endpoint: String,
    api_key: SecretValue,
    timeout: Duration,
    client: reqwest::Client,
}

impl SerpApiSearch {
    pub fn from_config(config: &SearchConfig, api_key: SecretValue) -> Result<Self, NewsCheckError> {
        Ok(Self {
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| SERPAPI_ENDPOINT.to_string()),
            api_key,
            timeout: config.timeout(),
            client: build_client(config.timeout())?,
        })
    }

    fn params(&self, query: &str, language: &str, count: usize, flavor: SearchFlavor) -> Vec<(&'static str, String)> {
        let engine = match flavor {
            SearchFlavor::News => "google_news",
            SearchFlavor::General => "google",
        };
        vec![
            ("api_key", self.api_key.expose().to_string()),
            ("engine", engine.to_string()),
            ("q", query.to_string()),
            ("num", count.to_string()),
            ("hl", language.to_string()),
            ("gl", country_for(language).to_string()),
        ]
    }
}

#[async_trait]
impl SearchService for SerpApiSearch {
    async fn search(
        &self,
        query: &str,
        language: &str,
        count: usize,
        flavor: SearchFlavor,
    ) -> Result<Vec<SearchHit>, ServiceError> {
        let params = self.params(query, language, count, flavor);
        let payload = fetch_json(&self.client, self.name(), self.timeout, &self.endpoint, &params).await?;
        let mut hits = hits_from_payload(&payload, flavor);
        hits.truncate(count);
        Ok(hits)
    }

    fn name(&self) -> &str {
        "serpapi"
    }
}

/// Used when no search key is configured: every search comes back empty.
#[derive(Debug, Default)]
pub struct DisabledSearch;

#[async_trait]
impl SearchService for DisabledSearch {
    async fn search(
        &self,
        _query: &str,
        _language: &str,
        _count: usize,
        _flavor: SearchFlavor,
    ) -> Result<Vec<SearchHit>, ServiceError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

/// Build the configured search collaborator. A missing key disables search
/// instead of failing, since verification still runs on template evidence.
pub fn build_search(config: &Config) -> Result<DynSearch, NewsCheckError> {
    if config.search.provider == SearchProvider::Disabled {
        return Ok(Arc::new(DisabledSearch));
    }

    let Some(key) = config.search_api_key() else {
        tracing::warn!(
            provider = ?config.search.provider,
            env = %config.search.resolved_api_key_env(),
            "search API key missing; web search disabled"
        );
        return Ok(Arc::new(DisabledSearch));
    };

    let search: DynSearch = match config.search.provider {
        SearchProvider::ScrapingDog => Arc::new(ScrapingDogSearch::from_config(&config.search, key)?),
        SearchProvider::SerpApi => Arc::new(SerpApiSearch::from_config(&config.search, key)?),
        SearchProvider::Disabled => Arc::new(DisabledSearch),
    };
    Ok(search)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn news_payload_maps_object_sources_and_dates() {
        let payload = json!({
            "news_results": [
                {"title": "Trial succeeds", "snippet": "Phase 3 data", "link": "https://a", "source": {"name": "Reuters"}, "date": "2 days ago"},
                {"snippet": "missing title is skipped"}
            ]
        });
        let hits = hits_from_payload(&payload, SearchFlavor::News);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "Reuters");
        assert_eq!(hits[0].date.as_deref(), Some("2 days ago"));
    }

    #[test]
    fn news_search_falls_back_to_organic_results() {
        let payload = json!({
            "news_results": [],
            "organic_results": [{"title": "Org", "snippet": "s", "displayed_link": "example.org"}]
        });
        let hits = hits_from_payload(&payload, SearchFlavor::News);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "example.org");
        assert!(hits[0].date.is_none());
    }

    #[test]
    fn general_search_ignores_news_block() {
        let payload = json!({"news_results": [{"title": "N"}]});
        assert!(hits_from_payload(&payload, SearchFlavor::General).is_empty());
    }

    #[test]
    fn scrapingdog_news_params_use_tbm() {
        let search = ScrapingDogSearch::from_config(&SearchConfig::default(), SecretValue::new("k"))
            .expect("client builds");
        let params = search.params("q", "it", 2, SearchFlavor::News);
        assert!(params.contains(&("tbm", "nws".to_string())));
        assert!(params.contains(&("gl", "it".to_string())));
        let general = search.params("q", "en", 1, SearchFlavor::General);
        assert!(general.contains(&("gl", "us".to_string())));
        assert!(!general.iter().any(|(key, _)| *key == "tbm"));
    }

    #[test]
    fn missing_key_disables_search() {
        let mut config = Config::default();
        config.search.api_key_env = Some("NEWSCHECK_TEST_NO_SEARCH_KEY".into());
        unsafe { std::env::remove_var("NEWSCHECK_TEST_NO_SEARCH_KEY") };
        let search = build_search(&config).expect("disabled search builds");
        assert_eq!(search.name(), "disabled");
    }
}
