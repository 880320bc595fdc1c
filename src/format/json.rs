//! JSON translation files
//!
//! A document with a `header` object and a `units` array:
//!
//! ```json
//! {"header": {"Language": "de"},
//!  "units": [{"context": "menu", "source": "Open", "target": ["Öffnen"]}]}
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{TransyncError, TransyncResult};

use super::{FileFormat, FormatKind, StoreUnit, TranslationStore};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct JsonDocument {
    #[serde(default)]
    header: BTreeMap<String, String>,
    #[serde(default)]
    units: Vec<JsonUnit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct JsonUnit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_plural: Option<String>,
    #[serde(default)]
    target: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    fuzzy: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    flags: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    comment: String,
}

impl From<&StoreUnit> for JsonUnit {
    fn from(unit: &StoreUnit) -> Self {
        Self {
            context: unit.context.clone(),
            source: unit.source.clone(),
            source_plural: unit.source_plural.clone(),
            target: unit.target.clone(),
            fuzzy: unit.fuzzy,
            flags: unit.flags.clone(),
            comment: unit.comment.clone(),
        }
    }
}

impl From<JsonUnit> for StoreUnit {
    fn from(unit: JsonUnit) -> Self {
        let target = if unit.target.is_empty() {
            vec![String::new()]
        } else {
            unit.target
        };
        StoreUnit {
            context: unit.context,
            source: unit.source,
            source_plural: unit.source_plural,
            target,
            fuzzy: unit.fuzzy,
            flags: unit.flags,
            comment: unit.comment,
            ..Default::default()
        }
    }
}

/// JSON file backed translation store
#[derive(Debug, Clone, Default)]
pub struct JsonStore {
    path: Option<PathBuf>,
    header: Vec<(String, String)>,
    units: Vec<StoreUnit>,
}

impl JsonStore {
    fn from_document(document: JsonDocument, path: Option<PathBuf>) -> Self {
        Self {
            path,
            header: document.header.into_iter().collect(),
            units: document.units.into_iter().map(StoreUnit::from).collect(),
        }
    }

    fn to_document(header: &[(String, String)], units: &[StoreUnit]) -> JsonDocument {
        JsonDocument {
            header: header.iter().cloned().collect(),
            units: units.iter().map(JsonUnit::from).collect(),
        }
    }
}

impl TranslationStore for JsonStore {
    fn format(&self) -> FormatKind {
        FormatKind::Json
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn units(&self) -> &[StoreUnit] {
        &self.units
    }

    fn units_mut(&mut self) -> &mut Vec<StoreUnit> {
        &mut self.units
    }

    fn header(&self) -> Vec<(String, String)> {
        self.header.clone()
    }

    fn set_header_field(&mut self, name: &str, value: &str) {
        match self.header.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.header.push((name.to_string(), value.to_string())),
        }
    }

    fn to_bytes(&self) -> TransyncResult<Vec<u8>> {
        let document = Self::to_document(&self.header, &self.units);
        let mut bytes = serde_json::to_vec_pretty(&document)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// JSON unit list format
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl FileFormat for JsonFormat {
    fn id(&self) -> &'static str {
        "json"
    }

    fn name(&self) -> &'static str {
        "JSON file"
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn mimetype(&self) -> &'static str {
        "application/json"
    }

    fn parse(
        &self,
        path: &Path,
        _template: Option<&Path>,
        _language_code: &str,
    ) -> TransyncResult<Box<dyn TranslationStore>> {
        if !path.exists() {
            return Err(TransyncError::MissingFile(path.to_path_buf()));
        }
        let content = fs::read(path)?;
        let document: JsonDocument = serde_json::from_slice(&content)
            .map_err(|e| TransyncError::parse(path, e.to_string()))?;
        Ok(Box::new(JsonStore::from_document(
            document,
            Some(path.to_path_buf()),
        )))
    }

    fn load(
        &self,
        name: &str,
        content: &[u8],
        _template: Option<&Path>,
    ) -> TransyncResult<Box<dyn TranslationStore>> {
        let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);
        let document: JsonDocument = serde_json::from_slice(content)
            .map_err(|e| TransyncError::parse(name, e.to_string()))?;
        Ok(Box::new(JsonStore::from_document(document, None)))
    }

    fn serialize(
        &self,
        header: &[(String, String)],
        units: &[StoreUnit],
    ) -> TransyncResult<Vec<u8>> {
        let document = JsonStore::to_document(header, units);
        Ok(serde_json::to_vec_pretty(&document)?)
    }
}
