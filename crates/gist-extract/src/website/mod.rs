//! Web page extraction.
//!
//! A page is fetched with a bounded body, stripped of non-content markup,
//! reduced to its main content block, and optionally refined by a
//! [`ContentSelector`].

mod clean;
mod refine;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use gist_models::{ExtractionOutcome, ExtractionStrategy};

use crate::error::{ExtractError, ExtractResult};

pub use clean::{clean_html, CleanedPage};
pub use refine::{ContentSelector, GeminiContentSelector};

#[cfg(test)]
pub use refine::MockContentSelector;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Website extraction configuration.
#[derive(Debug, Clone)]
pub struct WebsiteConfig {
    pub user_agent: String,
    pub timeout: Duration,
    /// Largest response body read, in bytes
    pub max_bytes: u64,
    /// Enables Gemini refinement when set
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
}

impl Default for WebsiteConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            max_bytes: 10 * 1024 * 1024,
            gemini_api_key: None,
            gemini_model: "gemini-2.0-flash".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

impl WebsiteConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            user_agent: std::env::var("WEBSITE_USER_AGENT").unwrap_or(defaults.user_agent),
            timeout: std::env::var("WEBSITE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_bytes: std::env::var("WEBSITE_MAX_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_bytes),
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            gemini_model: std::env::var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
        }
    }
}

/// A fetched page body.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects
    pub url: String,
    pub html: String,
    /// Body was cut at the size limit
    pub truncated: bool,
}

/// HTTP fetcher with a browser user agent and bounded body size.
#[derive(Clone)]
pub struct WebsiteFetcher {
    client: Client,
    max_bytes: u64,
}

impl WebsiteFetcher {
    pub fn new(config: &WebsiteConfig) -> ExtractResult<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            max_bytes: config.max_bytes,
        })
    }

    /// Fetch `url`. Only http and https are accepted.
    pub async fn fetch(&self, url: &str) -> ExtractResult<FetchedPage> {
        let parsed = validate_url(url)?;

        let response = self
            .client
            .get(parsed)
            .header("Accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| ExtractError::fetch_failed(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::fetch_failed(format!("{} returned HTTP {}", url, status)));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(ExtractError::TooLarge {
                    size: length,
                    limit: self.max_bytes,
                });
            }
        }

        let final_url = response.url().to_string();
        let limit = self.max_bytes as usize;
        let mut body = Vec::new();
        let mut truncated = false;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ExtractError::fetch_failed(format!("{}: {}", url, e)))?;
            let remaining = limit.saturating_sub(body.len());
            if chunk.len() > remaining {
                body.extend_from_slice(&chunk[..remaining]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }

        if truncated {
            warn!(url = %url, limit, "Response body truncated at size limit");
        }
        debug!(url = %final_url, bytes = body.len(), "Fetched page");

        Ok(FetchedPage {
            url: final_url,
            html: String::from_utf8_lossy(&body).to_string(),
            truncated,
        })
    }
}

fn validate_url(url: &str) -> ExtractResult<Url> {
    let parsed = Url::parse(url.trim()).map_err(|e| ExtractError::invalid_url(format!("{}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        "http" | "https" => Err(ExtractError::invalid_url(format!("{}: missing host", url))),
        scheme => Err(ExtractError::invalid_url(format!(
            "{}: unsupported scheme '{}'",
            url, scheme
        ))),
    }
}

/// Result of extracting one page.
#[derive(Debug, Clone)]
pub struct WebsiteExtraction {
    pub url: String,
    pub title: Option<String>,
    /// Body as fetched, for archiving
    pub raw_html: String,
    pub outcome: ExtractionOutcome,
}

/// Fetch, clean and optionally refine a page.
pub struct WebsiteExtractor {
    fetcher: WebsiteFetcher,
    selector: Option<Arc<dyn ContentSelector>>,
}

impl WebsiteExtractor {
    pub fn new(fetcher: WebsiteFetcher, selector: Option<Arc<dyn ContentSelector>>) -> Self {
        Self { fetcher, selector }
    }

    /// Build from config; refinement is enabled when a Gemini key is set.
    pub fn from_config(config: &WebsiteConfig) -> ExtractResult<Self> {
        let fetcher = WebsiteFetcher::new(config)?;
        let selector = GeminiContentSelector::from_config(config)?
            .map(|s| Arc::new(s) as Arc<dyn ContentSelector>);
        Ok(Self::new(fetcher, selector))
    }

    pub async fn extract(&self, url: &str) -> ExtractResult<WebsiteExtraction> {
        let page = self.fetcher.fetch(url).await?;
        let cleaned = clean_html(&page.html);

        if cleaned.text.is_empty() {
            return Err(ExtractError::empty_content(format!("no readable text at {}", url)));
        }

        let title = cleaned.title.as_deref().unwrap_or_default();
        let mut outcome = self.refine(url, title, cleaned.text).await;
        if page.truncated {
            outcome = outcome.with_diagnostic("Page body truncated at the size limit");
        }

        info!(
            url = %page.url,
            strategy = %outcome.strategy.as_str(),
            chars = outcome.text.len(),
            "Extracted website content"
        );

        Ok(WebsiteExtraction {
            url: page.url,
            title: cleaned.title,
            raw_html: page.html,
            outcome,
        })
    }

    /// Refinement never fails extraction; the scraped text is the fallback.
    async fn refine(&self, url: &str, title: &str, scraped: String) -> ExtractionOutcome {
        let Some(selector) = &self.selector else {
            return ExtractionOutcome::new(scraped, ExtractionStrategy::WebsiteScrape);
        };

        match selector.select_content(title, &scraped).await {
            Ok(Some(refined)) if !refined.trim().is_empty() => {
                ExtractionOutcome::new(refined.trim(), ExtractionStrategy::WebsiteRefined)
            }
            Ok(_) => {
                warn!(url = %url, "Content selector returned nothing, keeping scraped content");
                ExtractionOutcome::new(scraped, ExtractionStrategy::WebsiteScrape)
            }
            Err(e) => {
                warn!(url = %url, "Content selection failed, keeping scraped content: {}", e);
                ExtractionOutcome::new(scraped, ExtractionStrategy::WebsiteScrape)
            }
        }
    }
}
