use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::EnrichmentResult;
use crate::repository::ProductRepository;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub merged: usize,
    pub not_found: usize,
    pub no_data: usize,
    pub repeated: usize,
}

/// Writes enrichment results back into the rows they belong to, keyed by URL.
/// Single writer: nothing else may touch the repository while a merge runs.
pub struct MergeEngine<'a, R: ProductRepository> {
    repo: &'a mut R,
    merged: HashSet<String>,
    report: MergeReport,
}

impl<'a, R: ProductRepository> MergeEngine<'a, R> {
    pub fn new(repo: &'a mut R) -> Self {
        Self {
            repo,
            merged: HashSet::new(),
            report: MergeReport::default(),
        }
    }

    /// Patches the row for `url` and saves. A missing row is reported, not fatal.
    pub fn merge(&mut self, url: &str, result: &EnrichmentResult) -> Result<bool, StoreError> {
        if result.is_empty() {
            info!("No enrichment data for {}, leaving row as is", url);
            self.report.no_data += 1;
            return Ok(false);
        }
        if self.merged.contains(url) {
            debug!("{} already merged in this run", url);
            self.report.repeated += 1;
            return Ok(false);
        }

        let found = self.repo.patch(url, result)?;
        if found {
            self.merged.insert(url.to_string());
            self.report.merged += 1;
        } else {
            warn!("URL not found in sheet: {}", url);
            self.report.not_found += 1;
        }

        self.repo.persist()?;
        Ok(found)
    }

    pub fn finish(self) -> MergeReport {
        self.report
    }
}
