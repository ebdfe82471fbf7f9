use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Writer};
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook};
use tracing::debug;

use crate::error::StoreError;

/// A single-sheet grid persisted as xlsx, with a csv sidecar so the grid can
/// be read back. Rows and columns are 1-based; row 1 is the header.
pub struct TabularStore {
    path: PathBuf,
    grid: Vec<Vec<String>>,
}

impl TabularStore {
    pub fn create(path: impl Into<PathBuf>, header: &[&str]) -> Self {
        Self {
            path: path.into(),
            grid: vec![header.iter().map(|h| h.to_string()).collect()],
        }
    }

    /// Loads the grid previously written by [`TabularStore::save`].
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(sidecar_path(&path))?;

        let mut grid = Vec::new();
        for record in reader.records() {
            grid.push(record?.iter().map(str::to_string).collect());
        }

        Ok(Self { path, grid })
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.grid
    }

    #[cfg(test)]
    pub fn cell(&self, row: u32, col: u16) -> Option<&str> {
        let r = (row as usize).checked_sub(1)?;
        let c = (col as usize).checked_sub(1)?;
        self.grid.get(r)?.get(c).map(String::as_str)
    }

    pub fn set_cell(&mut self, row: u32, col: u16, value: impl Into<String>) -> Result<(), StoreError> {
        if row == 0 || col == 0 {
            return Err(StoreError::BadAddress(format!("row {} col {}", row, col)));
        }
        let (r, c) = (row as usize - 1, col as usize - 1);
        if self.grid.len() <= r {
            self.grid.resize_with(r + 1, Vec::new);
        }
        let cells = &mut self.grid[r];
        if cells.len() <= c {
            cells.resize(c + 1, String::new());
        }
        cells[c] = value.into();
        Ok(())
    }

    /// Sets a cell by A1-style column letters, e.g. `("R", 5)`.
    pub fn set_cell_at(&mut self, column: &str, row: u32, value: impl Into<String>) -> Result<(), StoreError> {
        let col = column_number(column)
            .ok_or_else(|| StoreError::BadAddress(format!("{}{}", column, row)))?;
        self.set_cell(row, col, value)
    }

    pub fn write_row(&mut self, row: u32, values: &[String]) -> Result<(), StoreError> {
        for (idx, value) in values.iter().enumerate() {
            self.set_cell(row, idx as u16 + 1, value.as_str())?;
        }
        Ok(())
    }

    /// Overwrites the xlsx and its sidecar. Each file is written next to its
    /// target and renamed into place so a crash never leaves a torn file.
    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let xlsx_tmp = temp_path(&self.path);
        self.write_workbook(&xlsx_tmp)?;
        fs::rename(&xlsx_tmp, &self.path)?;

        let sidecar = sidecar_path(&self.path);
        let csv_tmp = temp_path(&sidecar);
        self.write_sidecar(&csv_tmp)?;
        fs::rename(&csv_tmp, &sidecar)?;

        debug!("Saved {} rows to {}", self.grid.len(), self.path.display());
        Ok(())
    }

    fn write_workbook(&self, path: &Path) -> Result<(), StoreError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        let header_format = Format::new()
            .set_bold()
            .set_background_color(Color::RGB(0x000080))
            .set_font_color(Color::White)
            .set_border(FormatBorder::Thin);

        for (r, cells) in self.grid.iter().enumerate() {
            for (c, value) in cells.iter().enumerate() {
                if r == 0 {
                    worksheet.write_with_format(0, c as u16, value.as_str(), &header_format)?;
                } else if !value.is_empty() {
                    worksheet.write(r as u32, c as u16, value.as_str())?;
                }
            }
        }

        for col in 0..self.grid.first().map_or(0, Vec::len) as u16 {
            let width = match col {
                0..=16 => 50,
                17..=19 => 60,
                _ => 20,
            };
            worksheet.set_column_width(col, width)?;
        }
        worksheet.set_row_height(0, 30)?;
        worksheet.set_freeze_panes(1, 0)?;

        workbook.save(path)?;
        Ok(())
    }

    fn write_sidecar(&self, path: &Path) -> Result<(), StoreError> {
        let mut writer = Writer::from_path(path)?;
        let width = self.grid.iter().map(Vec::len).max().unwrap_or(0);
        for cells in &self.grid {
            let mut padded = cells.clone();
            padded.resize(width, String::new());
            writer.write_record(&padded)?;
        }
        writer.flush()?;
        Ok(())
    }
}

pub fn sidecar_path(path: &Path) -> PathBuf {
    path.with_extension("csv")
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// "A" -> 1, "Z" -> 26, "AA" -> 27.
pub fn column_number(letters: &str) -> Option<u16> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u16, |acc, ch| {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u16) - ('A' as u16) + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })
}

pub fn column_name(mut number: u16) -> String {
    let mut name = Vec::new();
    while number > 0 {
        let rem = (number - 1) % 26;
        name.push((b'A' + rem as u8) as char);
        number = (number - 1) / 26;
    }
    name.iter().rev().collect()
}
