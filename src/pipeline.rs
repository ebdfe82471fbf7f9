use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::browser::{ChromeSession, RenderSession};
use crate::config::{EnrichConfig, PipelineConfig};
use crate::enrichment::EnrichmentExtractor;
use crate::error::PipelineError;
use crate::extractor::ProductExtractor;
use crate::fetcher::HttpDocumentSource;
use crate::merge::{MergeEngine, MergeReport};
use crate::repository::{ProductRepository, SheetRepository};
use crate::store::TabularStore;
use crate::walker::{CatalogWalker, CrawlReport};

/// Phase 1: crawl the category into a fresh sheet at `output_path`.
pub async fn crawl_category(config: &PipelineConfig) -> Result<CrawlReport> {
    let source = HttpDocumentSource::new(&config.crawl)?;
    let extractor = ProductExtractor::new(&config.crawl.origin)?;
    let walker = CatalogWalker::new(&source, &extractor, &config.crawl)?;

    let mut repo = SheetRepository::create(&config.output_path);
    repo.persist()
        .with_context(|| format!("Could not save file {}", config.output_path.display()))?;

    let report = walker
        .walk(&config.crawl.category_url(), &mut repo)
        .await
        .context("Could not save file")?;

    info!(
        "Crawl finished: {} pages visited ({} empty, {} failed), {} products written, {} failed, {} repeated links skipped",
        report.pages_visited,
        report.pages_empty,
        report.pages_failed,
        report.products_written,
        report.products_failed,
        report.repeated_links
    );
    Ok(report)
}

/// Phase 2 over any render session: enrich every URL in the sheet and merge
/// each result back before moving to the next.
pub async fn enrich_store<S, R>(
    session: &S,
    config: &EnrichConfig,
    repo: &mut R,
) -> Result<MergeReport, PipelineError>
where
    S: RenderSession + ?Sized,
    R: ProductRepository,
{
    let urls = repo.list();
    let extractor = EnrichmentExtractor::new(session, config)?;
    let mut engine = MergeEngine::new(repo);

    for (idx, (url, _)) in urls.iter().enumerate() {
        info!("[{}/{}] Enriching: {}", idx + 1, urls.len(), url);
        let result = extractor.enrich(url).await;
        engine.merge(url, &result)?;
    }

    Ok(engine.finish())
}

/// Phase 2: reopen the sheet from disk and enrich it with a real browser.
pub async fn enrich_saved_store(path: &Path, config: &EnrichConfig) -> Result<MergeReport> {
    let store = TabularStore::open(path)
        .with_context(|| format!("Error opening file {}", path.display()))?;
    let mut repo = SheetRepository::new(store);

    let session = ChromeSession::launch(config).await?;
    let report = enrich_store(&session, config, &mut repo).await;
    session.close().await?;
    let report = report.context("Error saving updated Excel file")?;

    info!(
        "Enrichment finished: {} rows merged, {} URLs not found, {} without data, {} repeated",
        report.merged, report.not_found, report.no_data, report.repeated
    );
    Ok(report)
}

pub async fn run_pipeline(config: &PipelineConfig) -> Result<()> {
    crawl_category(config).await?;
    enrich_saved_store(&config.output_path, &config.enrich).await?;
    Ok(())
}
