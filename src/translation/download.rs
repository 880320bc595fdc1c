//! File downloads
//!
//! Workbooks and archives are materialized in a scratch directory, read
//! back and deleted.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::error::{TransyncError, TransyncResult};
use crate::format::{FileFormat, FormatKind, PoFile, StoreUnit};
use crate::spreadsheet::{export, export_multiple};

use super::Translation;

pub const XLSX_MIMETYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const ZIP_MIMETYPE: &str = "application/zip";

/// Format id of a single workbook holding every language
pub const SINGLE_XLSX: &str = "singlexlsx";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Scope of a multi-file download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadLevel {
    Project,
    ProjectLanguage,
    Component,
}

/// Directory removed again when dropped
struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn new() -> TransyncResult<Self> {
        let path = std::env::temp_dir().join(format!("transync-{}", Uuid::new_v4()));
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}

fn read_and_delete(path: &Path) -> TransyncResult<Vec<u8>> {
    let data = fs::read(path)?;
    fs::remove_file(path)?;
    Ok(data)
}

fn download_name(translation: &Translation, extension: &str) -> String {
    format!(
        "{}-{}-{}.{}",
        translation.id.project, translation.id.component, translation.language_code, extension
    )
}

/// One translation as a file. `None` serves the file from the repository,
/// `xlsx` a single-language workbook; other format ids are serialized from
/// the database.
pub fn translation_file(
    translation: &mut Translation,
    fmt: Option<&str>,
) -> TransyncResult<DownloadFile> {
    match fmt {
        None => native_file(translation),
        Some("xlsx") => translation_workbook(translation),
        Some(id) => {
            let format = FormatKind::from_id(id)
                .map_err(|_| TransyncError::NotFound("File format not supported".to_string()))?;
            serialized_file(translation, format)
        }
    }
}

fn native_file(translation: &mut Translation) -> TransyncResult<DownloadFile> {
    let path = translation.full_path();
    if !path.exists() {
        return Err(TransyncError::MissingFile(translation.filename.clone()));
    }
    let format = translation.component.format;
    Ok(DownloadFile {
        filename: download_name(translation, format.extension()),
        content_type: format.mimetype().to_string(),
        data: fs::read(path)?,
    })
}

fn require_po(translation: &Translation) -> TransyncResult<()> {
    if translation.component.format != FormatKind::Po {
        return Err(TransyncError::FormatNotSupported(
            "Download Excel workbook".to_string(),
        ));
    }
    Ok(())
}

fn translation_workbook(translation: &mut Translation) -> TransyncResult<DownloadFile> {
    require_po(translation)?;
    let revision = translation.get_last_local_commit(true)?;

    let scratch = ScratchDir::new()?;
    let po_path = scratch.join(&format!("{}.po", translation.id.full_slug()));
    fs::copy(translation.full_path(), &po_path)?;
    let xlsx_path = export(&po_path, revision.as_deref())?;
    debug!("{}workbook written to {}", translation.log_prefix(), xlsx_path.display());

    Ok(DownloadFile {
        filename: download_name(translation, "xlsx"),
        content_type: XLSX_MIMETYPE.to_string(),
        data: read_and_delete(&xlsx_path)?,
    })
}

fn serialized_file(translation: &mut Translation, format: FormatKind) -> TransyncResult<DownloadFile> {
    let header = translation.store()?.header();
    let units: Vec<StoreUnit> = translation
        .services()
        .units
        .units(&translation.id)
        .iter()
        .map(|u| u.to_store_unit())
        .collect();
    Ok(DownloadFile {
        filename: download_name(translation, format.extension()),
        content_type: format.mimetype().to_string(),
        data: format.serialize(&header, &units)?,
    })
}

/// Several translations at once: a zip archive of the individual downloads,
/// or with `singlexlsx` one workbook with a column per language
pub fn component_files(
    translations: &mut [&mut Translation],
    fmt: Option<&str>,
    level: DownloadLevel,
) -> TransyncResult<DownloadFile> {
    if translations.is_empty() {
        return Err(TransyncError::NotFound("No translations to download".to_string()));
    }
    if fmt == Some(SINGLE_XLSX) {
        return multi_language_workbook(translations);
    }

    let first = &translations[0].id;
    let filename = match level {
        DownloadLevel::Project => format!("{}-all.zip", first.project),
        DownloadLevel::ProjectLanguage => format!("{}-{}-all.zip", first.project, first.language),
        DownloadLevel::Component => format!("{}-{}-all.zip", first.project, first.component),
    };

    let scratch = ScratchDir::new()?;
    let zip_path = scratch.join(&filename);
    let mut writer = ZipWriter::new(File::create(&zip_path)?);
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

    for translation in translations.iter_mut() {
        let file = translation_file(translation, fmt)?;
        let entry_name = match level {
            DownloadLevel::Component => file.filename.clone(),
            _ => format!("{}/{}", translation.id.component, file.filename),
        };
        writer.start_file(entry_name, options.clone())?;
        writer.write_all(&file.data)?;
    }
    writer.finish()?;

    Ok(DownloadFile {
        filename,
        content_type: ZIP_MIMETYPE.to_string(),
        data: read_and_delete(&zip_path)?,
    })
}

fn multi_language_workbook(translations: &mut [&mut Translation]) -> TransyncResult<DownloadFile> {
    let scratch = ScratchDir::new()?;
    let mut revision = None;
    let mut po_paths = Vec::new();

    for translation in translations.iter_mut() {
        require_po(translation)?;
        let last = translation.get_last_local_commit(true)?;
        revision = revision.or(last);
        // column titles come from the Language header
        let mut po = PoFile::open(&translation.full_path())?;
        if po.metadata_value("Language").map_or(true, str::is_empty) {
            po.set_metadata("Language", &translation.language_code);
        }
        let path = scratch.join(&format!("{}.po", translation.id.full_slug()));
        po.save(&path)?;
        po_paths.push(path);
    }

    let xlsx_path = export_multiple(&po_paths, revision.as_deref())?;
    let first = &translations[0].id;
    Ok(DownloadFile {
        filename: format!("{}-{}-all.xlsx", first.project, first.component),
        content_type: XLSX_MIMETYPE.to_string(),
        data: read_and_delete(&xlsx_path)?,
    })
}
