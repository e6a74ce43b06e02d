//! Web search tool backed by DuckDuckGo's HTML endpoint (no API key).

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use super::Tool;

/// Name agents use to call the search tool.
pub const SEARCH_TOOL_NAME: &str = "search";

const SEARCH_DESCRIPTION: &str = "Useful for search-based queries. Use this to find current \
     information about markets, companies, and trends.";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Search tool settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub endpoint: String,
    /// DuckDuckGo region code, e.g. `us-en`.
    pub region: String,
    pub max_results: usize,
    pub timeout: Duration,
}

impl SearchConfig {
    pub const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
    pub const DEFAULT_REGION: &str = "us-en";
    pub const DEFAULT_MAX_RESULTS: usize = 5;
    pub const MAX_RESULTS_CAP: usize = 10;
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            region: Self::DEFAULT_REGION.to_string(),
            max_results: Self::DEFAULT_MAX_RESULTS,
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("request failed: {0}")]
    Http(String),

    #[error("search endpoint returned status {0}")]
    Status(u16),

    #[error("search temporarily blocked by bot detection")]
    Blocked,
}

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// DuckDuckGo HTML search.
pub struct SearchTool {
    client: Client,
    config: SearchConfig,
}

impl SearchTool {
    pub fn new(config: SearchConfig) -> Self {
        // Builder only fails when the TLS backend cannot initialise; fall back
        // to a default client and let requests surface the problem.
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build search HTTP client, using defaults");
                Client::new()
            });
        Self { client, config }
    }

    /// Run a query and return parsed hits.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let query = normalize_query(query);
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        debug!(query = %query, region = %self.config.region, "searching DuckDuckGo");

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Referer", "https://html.duckduckgo.com/")
            .form(&[("q", query.as_str()), ("kl", self.config.region.as_str())])
            .send()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SearchError::Status(response.status().as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))?;

        if html.contains("anomaly-modal") {
            return Err(SearchError::Blocked);
        }

        let max = self.config.max_results.clamp(1, SearchConfig::MAX_RESULTS_CAP);
        Ok(parse_results(&html, max))
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        SEARCH_DESCRIPTION
    }

    async fn run(&self, input: &str) -> String {
        match self.search(input).await {
            Ok(hits) if hits.is_empty() => "No results found.".to_string(),
            Ok(hits) => format_hits(&hits),
            Err(e) => {
                warn!(error = %e, "search tool failed");
                format!("Error performing search: {e}")
            }
        }
    }
}

/// Agents sometimes pass `{"query": "..."}` or a quoted string instead of
/// bare text.
fn normalize_query(input: &str) -> String {
    let trimmed = input.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(q) = value.get("query").and_then(|q| q.as_str()) {
            return q.trim().to_string();
        }
        if let Some(s) = value.as_str() {
            return s.trim().to_string();
        }
    }
    trimmed.trim_matches('"').trim().to_string()
}

fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, h)| format!("{}. {}\n   {}\n   {}", i + 1, h.title, h.url, h.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<a[^>]+class="result__a"[^>]+href="([^"]*)"[^>]*>(.*?)</a>"#)
            .expect("valid title regex")
    })
}

fn snippet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<a[^>]+class="result__snippet"[^>]*>(.*?)</a>"#)
            .expect("valid snippet regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid tag regex"))
}

/// Pair result titles with snippets by position.
fn parse_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let snippets: Vec<String> = snippet_re()
        .captures_iter(html)
        .map(|cap| strip_tags(&cap[1]))
        .collect();

    title_re()
        .captures_iter(html)
        .enumerate()
        .map(|(i, cap)| SearchHit {
            title: strip_tags(&cap[2]),
            url: real_url(&cap[1]),
            snippet: snippets.get(i).cloned().unwrap_or_default(),
        })
        .filter(|hit| !hit.url.is_empty() && !hit.title.is_empty())
        .take(max_results)
        .collect()
}

/// DuckDuckGo wraps links as `//duckduckgo.com/l/?uddg=<encoded>&...`.
fn real_url(raw: &str) -> String {
    let Some(pos) = raw.find("uddg=") else {
        return raw.to_string();
    };
    let rest = &raw[pos + 5..];
    let encoded = &rest[..rest.find('&').unwrap_or(rest.len())];
    urlencoding::decode(encoded)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| encoded.to_string())
}

fn strip_tags(s: &str) -> String {
    tag_re()
        .replace_all(s, "")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}
