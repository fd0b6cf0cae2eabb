use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::KnowledgeConfig;

pub const NO_RESULTS: &str = "No good Wikipedia Search Result was found";

/// External encyclopedia lookup used by the knowledge tool.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Summary text for `topic`. An `Err` means the service could not be reached.
    async fn lookup(&self, topic: &str) -> Result<String>;
}

/// MediaWiki search followed by a REST summary per hit.
pub struct WikipediaClient {
    client: reqwest::Client,
    config: KnowledgeConfig,
}

#[derive(Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Deserialize)]
struct PageSummary {
    title: String,
    #[serde(default)]
    extract: String,
}

impl WikipediaClient {
    pub fn new(config: KnowledgeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("shodh-blog/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build Wikipedia HTTP client")?;
        Ok(Self { client, config })
    }

    async fn search_titles(&self, topic: &str) -> Result<Vec<String>> {
        let limit = self.config.top_k_results.to_string();
        let response = self
            .client
            .get(&self.config.api_url)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", topic),
                ("srlimit", limit.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .with_context(|| format!("Wikipedia search request to {} failed", self.config.api_url))?
            .error_for_status()
            .context("Wikipedia search returned an error status")?;

        let body: SearchResponse = response
            .json()
            .await
            .context("Failed to parse Wikipedia search response")?;
        Ok(body
            .query
            .map(|q| q.search.into_iter().map(|h| h.title).collect())
            .unwrap_or_default())
    }

    async fn summary(&self, title: &str) -> Result<Option<PageSummary>> {
        let mut url = reqwest::Url::parse(&self.config.summary_url)
            .with_context(|| format!("Invalid summary URL: {}", self.config.summary_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Summary URL cannot be a base: {}", self.config.summary_url))?
            .push(&title.replace(' ', "_"));

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Wikipedia summary request for '{}' failed", title))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let summary = response
            .error_for_status()
            .context("Wikipedia summary returned an error status")?
            .json::<PageSummary>()
            .await
            .context("Failed to parse Wikipedia summary")?;
        Ok(Some(summary))
    }
}

#[async_trait]
impl KnowledgeSource for WikipediaClient {
    async fn lookup(&self, topic: &str) -> Result<String> {
        let titles = self.search_titles(topic).await?;
        tracing::debug!(topic, hits = titles.len(), "Wikipedia search");

        let mut pages = Vec::new();
        for title in titles {
            match self.summary(&title).await {
                Ok(Some(page)) => pages.push((page.title, page.extract)),
                Ok(None) => {}
                Err(e) => tracing::warn!(title = %title, error = %e, "Skipping Wikipedia page"),
            }
        }

        Ok(format_pages(&pages, self.config.max_chars))
    }
}

/// `Page:`/`Summary:` blocks separated by blank lines, cut to `max_chars` chars.
pub fn format_pages(pages: &[(String, String)], max_chars: usize) -> String {
    let blocks: Vec<String> = pages
        .iter()
        .filter(|(_, extract)| !extract.trim().is_empty())
        .map(|(title, extract)| format!("Page: {}\nSummary: {}", title, extract.trim()))
        .collect();

    if blocks.is_empty() {
        return NO_RESULTS.to_string();
    }
    blocks.join("\n\n").chars().take(max_chars).collect()
}
