//! In-memory workbook model
//!
//! The codec lays out rows and columns on this grid first; writing to and
//! reading from `.xlsx` is a thin layer on top (see `exporter` / `importer`).
//! Cells are `Option<String>`: `None` is a blank cell.

use std::collections::HashMap;

/// Header name → zero-based column index, decided once per sheet
pub type ColumnKey = HashMap<String, usize>;

/// Fill used for a header cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// Plain PO field
    Regular,
    /// Additional data extracted from the comment
    AdditionalData,
}

impl HeaderKind {
    /// Background colour of the header cell (RGB)
    pub fn fill(self) -> u32 {
        match self {
            HeaderKind::Regular => 0xFFFF4D,
            HeaderKind::AdditionalData => 0xB3B3FF,
        }
    }
}

/// One worksheet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    rows: Vec<Vec<Option<String>>>,
    /// Styling of header row cells, empty for sheets without a header row
    header_kinds: Vec<HeaderKind>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn set(&mut self, row: usize, col: usize, value: Option<String>) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, None);
        }
        cells[col] = value;
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .and_then(|cell| cell.as_deref())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|cells| cells.iter().all(Option::is_none))
    }

    pub fn row_is_blank(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .map_or(true, |cells| cells.iter().all(Option::is_none))
    }

    pub fn header_kinds(&self) -> &[HeaderKind] {
        &self.header_kinds
    }

    /// Write consecutive header cells starting at `col`, registering each one
    /// in `column_key` under `prefix + header`. Returns the next free column.
    pub fn write_header_part(
        &mut self,
        row: usize,
        mut col: usize,
        column_key: &mut ColumnKey,
        prefix: &str,
        kind: HeaderKind,
        headers: &[String],
    ) -> usize {
        for header in headers {
            self.set(row, col, Some(header.clone()));
            if self.header_kinds.len() <= col {
                self.header_kinds.resize(col + 1, HeaderKind::Regular);
            }
            self.header_kinds[col] = kind;
            column_key.insert(format!("{}{}", prefix, header), col);
            col += 1;
        }
        col
    }

    /// Rebuild the header index from an existing row
    pub fn read_header_row(&self, row: usize) -> ColumnKey {
        let mut column_key = ColumnKey::new();
        for col in 0..self.column_count() {
            if let Some(name) = self.cell(row, col) {
                column_key.insert(name.to_string(), col);
            }
        }
        column_key
    }
}

/// Ordered set of worksheets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetBook {
    pub sheets: Vec<Sheet>,
}

impl SheetBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn add_sheet(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_grows_grid() {
        let mut sheet = Sheet::new("data");
        sheet.set(2, 3, Some("x".to_string()));
        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.column_count(), 4);
        assert_eq!(sheet.cell(2, 3), Some("x"));
        assert_eq!(sheet.cell(0, 0), None);
        assert!(sheet.row_is_blank(1));
    }

    #[test]
    fn test_header_part_registers_prefixed_keys() {
        let mut sheet = Sheet::new("data");
        let mut key = ColumnKey::new();
        let next = sheet.write_header_part(
            0,
            0,
            &mut key,
            "",
            HeaderKind::Regular,
            &["Source".to_string(), "Translation".to_string()],
        );
        let next = sheet.write_header_part(
            0,
            next,
            &mut key,
            "[DNE]",
            HeaderKind::AdditionalData,
            &["Ticket".to_string()],
        );
        assert_eq!(next, 3);
        assert_eq!(key["[DNE]Ticket"], 2);
        assert_eq!(sheet.cell(0, 2), Some("Ticket"));
        assert_eq!(sheet.header_kinds()[2], HeaderKind::AdditionalData);
    }

    #[test]
    fn test_read_header_row() {
        let mut sheet = Sheet::new("data");
        sheet.set(0, 0, Some("Source".to_string()));
        sheet.set(0, 2, Some("Context".to_string()));
        let key = sheet.read_header_row(0);
        assert_eq!(key.len(), 2);
        assert_eq!(key["Context"], 2);
    }
}
