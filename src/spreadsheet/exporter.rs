//! PO → Excel workbook

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Color, Format, Workbook, Worksheet, XlsxError};
use tracing::{debug, info};

use crate::error::{TransyncError, TransyncResult};
use crate::format::{PoFile, StoreUnit};

use super::sheet::{ColumnKey, HeaderKind, Sheet, SheetBook};
use super::{
    AdditionalData, CONTEXT_COLUMN, DATA_SHEET, DNE_PREFIX, LEADING_COLUMNS, METADATA_SHEET,
    MULTI_LANG_FIELDS, OBSOLETE_SHEET, REVISION_KEY, TRAILING_COLUMNS, TRANSLATION_COLUMN,
};

/// First data row of the entry sheets (row 0 holds the headers)
const FIRST_DATA_ROW: usize = 1;

/// Builds a workbook from one PO file, or several languages of the same file
pub struct SpreadsheetExporter {
    po_data: Vec<PoFile>,
    revision: Option<String>,
}

/// Workbook grid plus the column layout decided for each entry sheet
#[derive(Debug, Clone)]
pub struct ExportedBook {
    pub book: SheetBook,
    pub column_keys: HashMap<String, ColumnKey>,
}

impl ExportedBook {
    /// Column keys of a sheet in left-to-right order
    pub fn ordered_columns(&self, sheet: &str) -> Vec<String> {
        let mut columns: Vec<(&String, &usize)> = self
            .column_keys
            .get(sheet)
            .map(|key| key.iter().collect())
            .unwrap_or_default();
        columns.sort_by_key(|(_, col)| **col);
        columns.into_iter().map(|(name, _)| name.clone()).collect()
    }
}

impl SpreadsheetExporter {
    pub fn new(mut po_data: Vec<PoFile>, revision: Option<String>) -> Self {
        sort_by_lang(&mut po_data);
        Self { po_data, revision }
    }

    fn is_multiple(&self) -> bool {
        self.po_data.len() > 1
    }

    /// Language codes (or `Translation`) in column order
    pub fn translation_columns(&self) -> Vec<String> {
        self.po_data
            .iter()
            .map(|po| trans_column_title(po, self.is_multiple()))
            .collect()
    }

    pub fn build(&self) -> TransyncResult<ExportedBook> {
        let primary = self
            .po_data
            .first()
            .ok_or_else(|| TransyncError::Spreadsheet("No PO data to export".to_string()))?;
        let parser = AdditionalData::new()?;
        let titles = self.translation_columns();
        let mut column_keys = HashMap::new();

        // data sheet
        let mut data = Sheet::new(DATA_SHEET);
        let entries: Vec<&StoreUnit> = primary.entries().collect();
        if !entries.is_empty() {
            let dne_columns = collect_dne_columns(&parser, &entries);
            let column_key = write_header_row(&mut data, &dne_columns, &titles);

            // (context, tweaked source) → rows, for the other languages
            let mut line_index: HashMap<(Option<String>, String), BTreeSet<usize>> =
                HashMap::new();
            for (i, entry) in entries.iter().enumerate() {
                let row = FIRST_DATA_ROW + i;
                add_entry(&parser, &mut data, row, &column_key, entry, &titles[0]);
                let translation = entry_translation(entry);
                let tweaked = if translation.is_empty() {
                    entry.source.clone()
                } else {
                    translation
                };
                line_index
                    .entry((entry.context.clone(), tweaked))
                    .or_default()
                    .insert(row);
            }

            for (po, title) in self.po_data.iter().zip(&titles).skip(1) {
                let Some(&col) = column_key.get(title) else {
                    continue;
                };
                for entry in po.entries() {
                    match line_index.get(&(entry.context.clone(), entry.source.clone())) {
                        Some(rows) => {
                            for &row in rows {
                                data.set(row, col, Some(entry_translation(entry)));
                            }
                        }
                        None => debug!("{}: no row for {}", title, entry.key()),
                    }
                }
            }
            column_keys.insert(DATA_SHEET.to_string(), column_key);
        }

        // metadata sheet
        let mut metadata = Sheet::new(METADATA_SHEET);
        let mut row = 0;
        for (name, value) in &primary.metadata {
            if !self.is_multiple() || MULTI_LANG_FIELDS.contains(&name.as_str()) {
                metadata.set(row, 0, Some(name.clone()));
                metadata.set(row, 1, Some(value.clone()));
                row += 1;
            }
        }
        metadata.set(row, 0, Some(REVISION_KEY.to_string()));
        metadata.set(row, 1, self.revision.clone());

        let mut book = SheetBook::new();
        book.add_sheet(data);
        book.add_sheet(metadata);

        // obsolete data sheet, single language only
        if !self.is_multiple() {
            let obsolete: Vec<&StoreUnit> = primary.obsolete_entries().collect();
            if !obsolete.is_empty() {
                let mut sheet = Sheet::new(OBSOLETE_SHEET);
                let dne_columns = collect_dne_columns(&parser, &obsolete);
                let column_key = write_header_row(&mut sheet, &dne_columns, &titles);
                for (i, entry) in obsolete.iter().enumerate() {
                    add_entry(
                        &parser,
                        &mut sheet,
                        FIRST_DATA_ROW + i,
                        &column_key,
                        entry,
                        &titles[0],
                    );
                }
                column_keys.insert(OBSOLETE_SHEET.to_string(), column_key);
                book.add_sheet(sheet);
            }
        }

        Ok(ExportedBook { book, column_keys })
    }

    /// Build and save the workbook to `output_path`
    pub fn export(&self, output_path: &Path) -> TransyncResult<()> {
        let exported = self.build()?;
        write_workbook(&exported.book, output_path)?;
        info!(
            "Exported {} language(s) to {}",
            self.po_data.len(),
            output_path.display()
        );
        Ok(())
    }
}

/// Export one PO file next to itself as `<name>.xlsx`
pub fn export(po_path: &Path, revision: Option<&str>) -> TransyncResult<PathBuf> {
    let po = PoFile::open(po_path)?;
    let output = po_path.with_extension("xlsx");
    SpreadsheetExporter::new(vec![po], revision.map(str::to_string)).export(&output)?;
    Ok(output)
}

/// Export several languages into one workbook named after the first file,
/// `<name>.all.xlsx`
pub fn export_multiple(po_paths: &[PathBuf], revision: Option<&str>) -> TransyncResult<PathBuf> {
    let first = po_paths
        .first()
        .ok_or_else(|| TransyncError::Spreadsheet("No PO files to export".to_string()))?;
    let mut name = first.with_extension("").into_os_string();
    name.push(".all.xlsx");
    let output = PathBuf::from(name);

    let po_data = po_paths
        .iter()
        .map(|path| PoFile::open(path))
        .collect::<TransyncResult<Vec<_>>>()?;
    SpreadsheetExporter::new(po_data, revision.map(str::to_string)).export(&output)?;
    Ok(output)
}

/// English first, then by language code
fn sort_by_lang(po_data: &mut [PoFile]) {
    if po_data.len() > 1 {
        po_data.sort_by_key(|po| {
            let lang = trans_column_title(po, true);
            if lang.starts_with("en") {
                format!("#{}", lang)
            } else {
                lang
            }
        });
    }
}

fn trans_column_title(po: &PoFile, multiple: bool) -> String {
    if multiple {
        if let Some(lang) = po.metadata_value("Language").filter(|l| !l.is_empty()) {
            return lang.to_string();
        }
    }
    TRANSLATION_COLUMN.to_string()
}

/// The single translation cell; plural entries export no translation
fn entry_translation(entry: &StoreUnit) -> String {
    if entry.is_plural() {
        String::new()
    } else {
        entry.target_text().to_string()
    }
}

fn collect_dne_columns(parser: &AdditionalData, entries: &[&StoreUnit]) -> Vec<String> {
    let keys: BTreeSet<String> = entries
        .iter()
        .flat_map(|entry| parser.analyze(&entry.comment).into_keys())
        .collect();
    keys.into_iter().collect()
}

fn write_header_row(sheet: &mut Sheet, dne_columns: &[String], titles: &[String]) -> ColumnKey {
    let mut column_key = ColumnKey::new();
    let mut important: Vec<String> = LEADING_COLUMNS.iter().map(|s| s.to_string()).collect();
    important.extend(titles.iter().cloned());
    important.push(CONTEXT_COLUMN.to_string());
    let trailing: Vec<String> = TRAILING_COLUMNS.iter().map(|s| s.to_string()).collect();

    let col = sheet.write_header_part(0, 0, &mut column_key, "", HeaderKind::Regular, &important);
    let col = sheet.write_header_part(
        0,
        col,
        &mut column_key,
        DNE_PREFIX,
        HeaderKind::AdditionalData,
        dne_columns,
    );
    sheet.write_header_part(0, col, &mut column_key, "", HeaderKind::Regular, &trailing);
    column_key
}

fn format_occurrence(path: &str, line: &str) -> String {
    if line.is_empty() {
        path.to_string()
    } else {
        format!("{}:{}", path, line)
    }
}

fn add_entry(
    parser: &AdditionalData,
    sheet: &mut Sheet,
    row: usize,
    column_key: &ColumnKey,
    entry: &StoreUnit,
    trans_title: &str,
) {
    let mut inject = |key: &str, value: Option<String>| {
        if let Some(&col) = column_key.get(key) {
            sheet.set(row, col, value);
        }
    };

    let mut flags: Vec<&str> = Vec::new();
    if entry.fuzzy {
        flags.push("fuzzy");
    }
    flags.extend(entry.flags.iter().map(String::as_str));
    let occurrences: Vec<String> = entry
        .occurrences
        .iter()
        .map(|(path, line)| format_occurrence(path, line))
        .collect();

    inject("Source", Some(entry.source.clone()));
    inject(trans_title, Some(entry_translation(entry)));
    inject(CONTEXT_COLUMN, entry.context.clone());
    inject("Comment", Some(entry.comment.clone()));
    inject("Translator Comment", Some(entry.translator_comment.clone()));
    inject("Occurrences", Some(occurrences.join("\n")));
    inject("Flags", Some(flags.join("\n")));
    inject("Previous Source", Some(entry.previous_source.clone()));
    inject("Previous Context", Some(entry.previous_context.clone()));
    for (key, value) in parser.analyze(&entry.comment) {
        inject(&format!("{}{}", DNE_PREFIX, key), value);
    }
}

fn xlsx_error(e: XlsxError) -> TransyncError {
    TransyncError::Spreadsheet(format!("Failed to write workbook: {}", e))
}

/// Save a workbook grid as `.xlsx`, styling header cells
pub fn write_workbook(book: &SheetBook, output_path: &Path) -> TransyncResult<()> {
    let mut workbook = Workbook::new();

    for sheet in &book.sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name).map_err(xlsx_error)?;
        if sheet.name == METADATA_SHEET {
            write_metadata_sheet(worksheet, sheet)?;
        } else {
            write_data_sheet(worksheet, sheet)?;
        }
    }

    workbook.save(output_path).map_err(xlsx_error)?;
    Ok(())
}

fn write_data_sheet(worksheet: &mut Worksheet, sheet: &Sheet) -> TransyncResult<()> {
    let columns = sheet.column_count();
    for col in 0..columns {
        let Some(value) = sheet.cell(0, col) else {
            continue;
        };
        let kind = sheet
            .header_kinds()
            .get(col)
            .copied()
            .unwrap_or(HeaderKind::Regular);
        let format = Format::new()
            .set_bold()
            .set_background_color(Color::RGB(kind.fill()));
        worksheet
            .write_string_with_format(0, col as u16, value, &format)
            .map_err(xlsx_error)?;
    }

    for row in FIRST_DATA_ROW..sheet.row_count() {
        for col in 0..columns {
            if let Some(value) = sheet.cell(row, col).filter(|v| !v.is_empty()) {
                worksheet
                    .write_string(row as u32, col as u16, value)
                    .map_err(xlsx_error)?;
            }
        }
    }

    if columns > 0 {
        let last_row = sheet.row_count().saturating_sub(1) as u32;
        worksheet
            .autofilter(0, 0, last_row, (columns - 1) as u16)
            .map_err(xlsx_error)?;
        worksheet.set_freeze_panes(1, 0).map_err(xlsx_error)?;
    }
    Ok(())
}

fn write_metadata_sheet(worksheet: &mut Worksheet, sheet: &Sheet) -> TransyncResult<()> {
    let bold = Format::new().set_bold();
    for row in 0..sheet.row_count() {
        if let Some(name) = sheet.cell(row, 0) {
            worksheet
                .write_string_with_format(row as u32, 0, name, &bold)
                .map_err(xlsx_error)?;
        }
        if let Some(value) = sheet.cell(row, 1).filter(|v| !v.is_empty()) {
            worksheet
                .write_string(row as u32, 1, value)
                .map_err(xlsx_error)?;
        }
    }
    Ok(())
}
