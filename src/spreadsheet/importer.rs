//! Excel workbook → PO

use std::path::{Path, PathBuf};

use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use tracing::{debug, warn};

use crate::error::{TransyncError, TransyncResult};
use crate::format::{PoFile, StoreUnit};

use super::sheet::{ColumnKey, Sheet, SheetBook};
use super::{
    CONTEXT_COLUMN, DATA_SHEET, METADATA_SHEET, OBSOLETE_SHEET, REVISION_KEY,
    TRANSLATION_COLUMN,
};

const HEADER_ROW: usize = 0;
const FIRST_DATA_ROW: usize = 1;

/// Reads an exported (and possibly edited) workbook back
pub struct SpreadsheetImporter {
    path: PathBuf,
}

impl SpreadsheetImporter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load every sheet into the grid model
    pub fn read_book(&self) -> TransyncResult<SheetBook> {
        let mut workbook: Xlsx<_> = open_workbook(&self.path).map_err(|e| {
            TransyncError::Spreadsheet(format!(
                "Failed to open Excel file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let mut book = SheetBook::new();
        for name in workbook.sheet_names().to_vec() {
            match workbook.worksheet_range(&name) {
                Ok(range) => book.add_sheet(range_to_sheet(&name, &range)),
                Err(e) => warn!("Skipping sheet '{}': {}", name, e),
            }
        }
        Ok(book)
    }

    /// Entries and the revision marker of the workbook
    pub fn import(
        &self,
        simple_mode: bool,
        alt_translation_column_name: Option<&str>,
    ) -> TransyncResult<(PoFile, Option<String>)> {
        let book = self.read_book()?;
        Ok(parse_workbook(&book, simple_mode, alt_translation_column_name))
    }
}

fn range_to_sheet(name: &str, range: &Range<Data>) -> Sheet {
    let mut sheet = Sheet::new(name);
    let Some((last_row, last_col)) = range.end() else {
        return sheet;
    };
    for row in 0..=last_row {
        for col in 0..=last_col {
            if let Some(value) = range.get_value((row, col)).and_then(cell_text) {
                sheet.set(row as usize, col as usize, Some(value));
            }
        }
    }
    sheet
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        other => Some(other.to_string()),
    }
}

/// Header index of an entry sheet, with the translation column aliased
/// when the workbook used a language code as its title
fn sheet_column_key(sheet: &Sheet, alt_translation_column_name: Option<&str>) -> ColumnKey {
    let mut column_key = sheet.read_header_row(HEADER_ROW);
    if let Some(alt) = alt_translation_column_name {
        if !column_key.contains_key(TRANSLATION_COLUMN) {
            if let Some(&col) = column_key.get(alt) {
                column_key.insert(TRANSLATION_COLUMN.to_string(), col);
            }
        }
    }
    column_key
}

/// Rebuild PO content from a workbook grid. Returns the entries with their
/// header and the `repo_last_revision` marker, if any.
///
/// `simple_mode` drops raw comments, occurrences and the obsolete sheet: the
/// result is only used to pick up translations.
pub fn parse_workbook(
    book: &SheetBook,
    simple_mode: bool,
    alt_translation_column_name: Option<&str>,
) -> (PoFile, Option<String>) {
    let mut po = PoFile::new();
    let revision = read_metadata(&mut po, book);

    if let Some(sheet) = book.sheet(DATA_SHEET) {
        let column_key = sheet_column_key(sheet, alt_translation_column_name);
        read_any_data(&mut po, sheet, &column_key, false, simple_mode);
    }
    if !simple_mode {
        if let Some(sheet) = book.sheet(OBSOLETE_SHEET) {
            let column_key = sheet_column_key(sheet, alt_translation_column_name);
            read_any_data(&mut po, sheet, &column_key, true, false);
        }
    }
    debug!(
        "Read {} entries from workbook (simple mode: {})",
        po.units.len(),
        simple_mode
    );
    (po, revision)
}

fn read_metadata(po: &mut PoFile, book: &SheetBook) -> Option<String> {
    let sheet = book.sheet(METADATA_SHEET)?;
    let mut revision = None;
    for row in 0..sheet.row_count() {
        let Some(name) = sheet.cell(row, 0) else {
            continue;
        };
        let value = sheet.cell(row, 1);
        if name == REVISION_KEY {
            revision = value.map(str::to_string);
        } else {
            po.set_metadata(name, value.unwrap_or(""));
        }
    }
    revision
}

fn read_value(sheet: &Sheet, row: usize, key: &str, column_key: &ColumnKey) -> String {
    read_optional(sheet, row, key, column_key)
        .unwrap_or_default()
}

fn read_optional(
    sheet: &Sheet,
    row: usize,
    key: &str,
    column_key: &ColumnKey,
) -> Option<String> {
    column_key
        .get(key)
        .and_then(|&col| sheet.cell(row, col))
        .map(str::to_string)
}

/// `path:line` only when there is exactly one colon and the line is numeric
fn parse_occurrence(token: &str) -> (String, String) {
    let parts: Vec<&str> = token.split(':').collect();
    match parts.as_slice() {
        [path, line] if !line.is_empty() && line.chars().all(|c| c.is_ascii_digit()) => {
            (path.to_string(), line.to_string())
        }
        _ => (token.to_string(), String::new()),
    }
}

fn read_any_data(
    po: &mut PoFile,
    sheet: &Sheet,
    column_key: &ColumnKey,
    obsolete: bool,
    simple_mode: bool,
) {
    for row in FIRST_DATA_ROW..sheet.row_count() {
        if sheet.row_is_blank(row) {
            continue;
        }

        let mut entry = StoreUnit {
            source: read_value(sheet, row, "Source", column_key),
            target: vec![read_value(sheet, row, TRANSLATION_COLUMN, column_key)],
            context: read_optional(sheet, row, CONTEXT_COLUMN, column_key),
            obsolete,
            translator_comment: read_value(sheet, row, "Translator Comment", column_key),
            previous_source: read_value(sheet, row, "Previous Source", column_key),
            previous_context: read_value(sheet, row, "Previous Context", column_key),
            ..Default::default()
        };

        let flags = read_value(sheet, row, "Flags", column_key);
        for flag in flags.split('\n').filter(|f| !f.is_empty()) {
            if flag == "fuzzy" {
                entry.fuzzy = true;
            } else {
                entry.flags.push(flag.to_string());
            }
        }

        if !simple_mode {
            entry.comment = read_value(sheet, row, "Comment", column_key);
            let occurrences = read_value(sheet, row, "Occurrences", column_key);
            entry.occurrences = occurrences
                .split('\n')
                .filter(|o| !o.is_empty())
                .map(parse_occurrence)
                .collect();
        }

        po.units.push(entry);
    }
}

/// Convert a workbook into `<name>.po` next to it, in simple mode.
/// Returns the PO path and the revision marker.
pub fn xlsx_to_po(
    xlsx_path: &Path,
    alt_translation_column_name: Option<&str>,
) -> TransyncResult<(PathBuf, Option<String>)> {
    let po_path = xlsx_path.with_extension("po");
    let (po, revision) =
        SpreadsheetImporter::new(xlsx_path).import(true, alt_translation_column_name)?;
    po.save(&po_path)?;
    Ok((po_path, revision))
}
