use thiserror::Error;

/// Failures that are contained to a single page, product or enrichment call.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("script failed: {0}")]
    Script(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid selector: {0}")]
    Selector(String),
}

/// Either kind of failure, as seen by the loops that drive a phase.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Only persistence failures may unwind past the current page or product.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Persistence failures. These end the run.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("bad cell address: {0}")]
    BadAddress(String),
}
