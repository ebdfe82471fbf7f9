mod browser;
mod config;
mod enrichment;
mod error;
mod extractor;
mod fetcher;
mod merge;
mod models;
mod pipeline;
mod repository;
mod store;
mod walker;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::PipelineConfig;
use crate::pipeline::run_pipeline;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = PipelineConfig::default();
    info!(
        "Starting catalog scrape of {} into {}",
        config.crawl.category_url(),
        config.output_path.display()
    );

    run_pipeline(&config).await?;

    info!("Scraping complete! Data saved to {}", config.output_path.display());
    Ok(())
}
