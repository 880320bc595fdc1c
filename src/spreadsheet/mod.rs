//! PO ⇄ Excel workbook interchange
//!
//! A workbook has up to three sheets:
//! - `data`: one row per entry, header row first
//! - `metadata`: header key/value rows plus the `repo_last_revision` marker
//! - `obsolete data`: obsolete entries (single-language workbooks only)
//!
//! Comments may carry `[AdditionalData] key: value` lines; on export every
//! key gets its own `[DNE]`-prefixed column.

mod exporter;
mod importer;
mod sheet;

use std::collections::BTreeMap;

use regex::Regex;

use crate::error::{TransyncError, TransyncResult};

pub use exporter::{export, export_multiple, SpreadsheetExporter};
pub use importer::{parse_workbook, xlsx_to_po, SpreadsheetImporter};
pub use sheet::{ColumnKey, HeaderKind, Sheet, SheetBook};

pub const DATA_SHEET: &str = "data";
pub const METADATA_SHEET: &str = "metadata";
pub const OBSOLETE_SHEET: &str = "obsolete data";

/// Metadata row carrying the revision the workbook was exported from
pub const REVISION_KEY: &str = "repo_last_revision";

/// Column key prefix of additional data columns
pub const DNE_PREFIX: &str = "[DNE]";

pub const TRANSLATION_COLUMN: &str = "Translation";

/// Columns left of the additional data
pub const LEADING_COLUMNS: [&str; 1] = ["Source"];
/// Context follows the translation column(s)
pub const CONTEXT_COLUMN: &str = "Context";
/// Columns right of the additional data; the raw comment goes last
pub const TRAILING_COLUMNS: [&str; 6] = [
    "Occurrences",
    "Flags",
    "Translator Comment",
    "Previous Source",
    "Previous Context",
    "Comment",
];

/// Header fields kept in the metadata sheet of a multi-language workbook
pub const MULTI_LANG_FIELDS: [&str; 3] =
    ["Project-Id-Version", "Report-Msgid-Bugs-To", "POT-Creation-Date"];

/// Extracts `[AdditionalData]` key/value lines from a comment
pub struct AdditionalData {
    empty: Regex,
    valued: Regex,
}

impl AdditionalData {
    pub fn new() -> TransyncResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| TransyncError::Spreadsheet(format!("Regex error: {}", e)))
        };
        Ok(Self {
            // trailing space tends to get lost for empty values
            empty: compile(r"(?m)^\[AdditionalData\] (?P<key>[^:]*):( ?)$")?,
            valued: compile(r"(?m)^\[AdditionalData\] (?P<key>[^:]*): (?P<value>[^\n]+)$")?,
        })
    }

    /// Key → value; keys declared without a value map to `None`
    pub fn analyze(&self, comment: &str) -> BTreeMap<String, Option<String>> {
        let mut data = BTreeMap::new();
        for caps in self.empty.captures_iter(comment) {
            data.insert(caps["key"].to_string(), None);
        }
        for caps in self.valued.captures_iter(comment) {
            data.insert(caps["key"].to_string(), Some(caps["value"].to_string()));
        }
        data
    }
}
