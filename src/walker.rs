use std::collections::HashSet;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{error, info, warn};
use url::Url;

use crate::config::CrawlConfig;
use crate::error::{PipelineError, ScrapeError};
use crate::extractor::ProductExtractor;
use crate::fetcher::{DocumentSource, FetchedDocument};
use crate::models::ProductRecord;
use crate::repository::ProductRepository;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub pages_visited: u32,
    pub pages_failed: u32,
    pub pages_empty: u32,
    pub products_written: usize,
    pub products_failed: usize,
    /// Links skipped because they were already tried, or resolved to a URL
    /// already written.
    pub repeated_links: usize,
}

pub struct CatalogWalker<'a, S: DocumentSource + ?Sized> {
    source: &'a S,
    extractor: &'a ProductExtractor,
    config: &'a CrawlConfig,
    anchors: Selector,
    product_link: Regex,
}

impl<'a, S: DocumentSource + ?Sized> CatalogWalker<'a, S> {
    pub fn new(
        source: &'a S,
        extractor: &'a ProductExtractor,
        config: &'a CrawlConfig,
    ) -> Result<Self, ScrapeError> {
        let anchors = Selector::parse("a[href]").map_err(|e| ScrapeError::Selector(e.to_string()))?;
        let pattern = format!(
            r"^{}/products/[^/]+$",
            regex::escape(config.origin.trim_end_matches('/'))
        );
        let product_link = Regex::new(&pattern).map_err(|e| ScrapeError::Selector(e.to_string()))?;

        Ok(Self {
            source,
            extractor,
            config,
            anchors,
            product_link,
        })
    }

    /// Walks listing pages `1..=max_pages` of `base_url`, writing one row per
    /// product. Only a store failure aborts the walk.
    pub async fn walk<R: ProductRepository>(
        &self,
        base_url: &str,
        repo: &mut R,
    ) -> Result<CrawlReport, PipelineError> {
        let mut report = CrawlReport::default();
        let mut attempted: HashSet<String> = HashSet::new();
        let mut written: HashSet<String> = HashSet::new();
        let mut accepted = 0usize;
        let mut next_row = self.config.first_row;

        for page in 1..=self.config.max_pages {
            // No later page can contribute once the cap is hit, so stop paging early.
            if accepted >= self.config.max_products {
                info!("Product cap of {} reached, stopping", self.config.max_products);
                break;
            }

            let page_url = match page_url(base_url, page) {
                Ok(url) => url,
                Err(e) => {
                    error!("Bad category url {}: {}", base_url, e);
                    report.pages_failed += 1;
                    continue;
                }
            };

            info!("Visiting category page: {}", page_url);
            let doc = match self.source.fetch(&page_url).await {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("Failed to visit page {}: {}", page_url, e);
                    report.pages_failed += 1;
                    continue;
                }
            };
            report.pages_visited += 1;

            let links = self.discover_links(&doc);
            if links.is_empty() {
                info!("No products found on this page, skipping...");
                report.pages_empty += 1;
                continue;
            }

            for link in links {
                if accepted >= self.config.max_products {
                    break;
                }
                // One attempt per link per run, whether or not it succeeded.
                if !attempted.insert(link.clone()) {
                    report.repeated_links += 1;
                    continue;
                }
                accepted += 1;

                info!("Processing product link {}: {}", accepted, link);
                match self.scrape_link(&link, repo, next_row, &mut written).await {
                    Ok(Some(record)) => {
                        attempted.insert(record.url);
                        next_row += 1;
                        report.products_written += 1;
                    }
                    Ok(None) => {
                        info!("{} resolves to a product already written, skipping", link);
                        report.repeated_links += 1;
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!("Failed to visit product URL {}: {}", link, e);
                        report.products_failed += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Fetches `link` and writes it at `row` unless its final URL already has a
    /// row. Returns `None` for such a duplicate.
    async fn scrape_link<R: ProductRepository>(
        &self,
        link: &str,
        repo: &mut R,
        row: u32,
        written: &mut HashSet<String>,
    ) -> Result<Option<ProductRecord>, PipelineError> {
        let record = self.extractor.fetch_record(self.source, link).await?;
        if written.contains(&record.url) {
            return Ok(None);
        }

        self.extractor.save_record(repo, row, &record)?;
        written.insert(record.url.clone());
        Ok(Some(record))
    }

    /// Product links on one listing page, deduplicated in first-seen order.
    pub fn discover_links(&self, doc: &FetchedDocument) -> Vec<String> {
        let html = Html::parse_document(&doc.body);
        let mut seen = HashSet::new();

        html.select(&self.anchors)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| doc.absolute_url(href))
            .map(String::from)
            .filter(|link| self.product_link.is_match(link))
            .filter(|link| seen.insert(link.clone()))
            .collect()
    }
}

/// Page 1 is the base URL itself; later pages carry `page=k`.
pub fn page_url(base_url: &str, page: u32) -> Result<String, ScrapeError> {
    let mut url = Url::parse(base_url)?;
    if page <= 1 {
        return Ok(url.into());
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("page", &page.to_string());

    Ok(url.into())
}
