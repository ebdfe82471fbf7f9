use async_trait::async_trait;
use reqwest::Client;
use tracing::info;
use url::Url;

use crate::config::CrawlConfig;
use crate::error::ScrapeError;

/// A fetched page: the final URL (after redirects) and its raw HTML.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub url: Url,
    pub body: String,
}

impl FetchedDocument {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            url,
            body: body.into(),
        }
    }

    /// Resolves an href against this document's URL.
    pub fn absolute_url(&self, href: &str) -> Option<Url> {
        self.url.join(href.trim()).ok()
    }
}

#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, ScrapeError>;
}

pub struct HttpDocumentSource {
    client: Client,
}

impl HttpDocumentSource {
    pub fn new(config: &CrawlConfig) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, ScrapeError> {
        let url = Url::parse(url)?;
        info!("Visiting {}", url);

        let response = self.client.get(url).send().await?.error_for_status()?;
        let final_url = response.url().clone();
        let body = response.text().await?;

        Ok(FetchedDocument::new(final_url, body))
    }
}
