use tracing::debug;

use crate::error::StoreError;
use crate::models::{EnrichmentResult, ProductRecord, COLUMNS, ENRICHMENT_FIRST_COLUMN, URL_COLUMN};
use crate::store::{column_name, TabularStore};

/// Keyed access to product rows. The key is the product URL.
pub trait ProductRepository {
    /// Writes a full record at a physical row.
    fn insert(&mut self, row: u32, record: &ProductRecord) -> Result<(), StoreError>;

    /// `(url, row)` for every data row, in sheet order.
    fn list(&self) -> Vec<(String, u32)>;

    /// Writes the enrichment cells of the row keyed by `url`.
    /// Returns `false` when no row carries that URL.
    fn patch(&mut self, url: &str, enrichment: &EnrichmentResult) -> Result<bool, StoreError>;

    fn persist(&self) -> Result<(), StoreError>;
}

pub struct SheetRepository {
    store: TabularStore,
}

impl SheetRepository {
    pub fn new(store: TabularStore) -> Self {
        Self { store }
    }

    /// Starts an empty sheet carrying the fixed header row.
    pub fn create(path: impl Into<std::path::PathBuf>) -> Self {
        Self::new(TabularStore::create(path, &COLUMNS))
    }

    #[cfg(test)]
    pub fn store(&self) -> &TabularStore {
        &self.store
    }

    fn find_row(&self, url: &str) -> Option<u32> {
        let url_idx = (URL_COLUMN - 1) as usize;
        self.store
            .rows()
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, cells)| cells.get(url_idx).map(String::as_str) == Some(url))
            .map(|(idx, _)| idx as u32 + 1)
    }
}

impl ProductRepository for SheetRepository {
    fn insert(&mut self, row: u32, record: &ProductRecord) -> Result<(), StoreError> {
        self.store.write_row(row, &record.to_row())
    }

    fn list(&self) -> Vec<(String, u32)> {
        let url_idx = (URL_COLUMN - 1) as usize;
        self.store
            .rows()
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(idx, cells)| {
                cells
                    .get(url_idx)
                    .filter(|url| !url.is_empty())
                    .map(|url| (url.clone(), idx as u32 + 1))
            })
            .collect()
    }

    fn patch(&mut self, url: &str, enrichment: &EnrichmentResult) -> Result<bool, StoreError> {
        let Some(row) = self.find_row(url) else {
            return Ok(false);
        };

        for (offset, value) in enrichment.to_cells().into_iter().enumerate() {
            if let Some(value) = value {
                let column = column_name(ENRICHMENT_FIRST_COLUMN + offset as u16);
                self.store.set_cell_at(&column, row, value)?;
            }
        }
        debug!("Patched row {} for {}", row, url);
        Ok(true)
    }

    fn persist(&self) -> Result<(), StoreError> {
        self.store.save()
    }
}

#[cfg(test)]
pub mod testing {
    use std::cell::Cell;
    use std::io;

    use super::*;

    /// Keeps rows in memory but every save fails, like a full disk.
    pub struct UnsavableRepo {
        pub inner: SheetRepository,
        pub save_attempts: Cell<usize>,
    }

    impl UnsavableRepo {
        pub fn new(inner: SheetRepository) -> Self {
            Self {
                inner,
                save_attempts: Cell::new(0),
            }
        }
    }

    impl ProductRepository for UnsavableRepo {
        fn insert(&mut self, row: u32, record: &ProductRecord) -> Result<(), StoreError> {
            self.inner.insert(row, record)
        }

        fn list(&self) -> Vec<(String, u32)> {
            self.inner.list()
        }

        fn patch(&mut self, url: &str, enrichment: &EnrichmentResult) -> Result<bool, StoreError> {
            self.inner.patch(url, enrichment)
        }

        fn persist(&self) -> Result<(), StoreError> {
            self.save_attempts.set(self.save_attempts.get() + 1);
            Err(StoreError::Io(io::Error::new(io::ErrorKind::Other, "no space left on device")))
        }
    }
}
