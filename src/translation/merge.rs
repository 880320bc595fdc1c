//! Merging external files into a translation

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{TransyncError, TransyncResult};
use crate::format::{FileFormat, FormatKind, FuzzyMode, TranslationStore};
use crate::spreadsheet::xlsx_to_po;
use crate::units::{Change, ChangeAction, Suggestion};
use crate::vcs::RepositoryLock;

use super::commit::CommitOptions;
use super::edit::record_edit;
use super::Translation;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Outcome of a merge, reported to the uploader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub not_found: usize,
    pub skipped: usize,
    pub accepted: usize,
    pub total: usize,
}

impl MergeSummary {
    /// `(not found, skipped, accepted, total)`
    pub fn as_tuple(&self) -> (usize, usize, usize, usize) {
        (self.not_found, self.skipped, self.accepted, self.total)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Replace translations that already exist
    pub overwrite: bool,
    /// Mark every merged unit fuzzy
    pub add_fuzzy: bool,
    pub fuzzy: FuzzyMode,
    /// Take over header fields of the merged file
    pub merge_header: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMethod {
    #[default]
    Translate,
    /// Merge as translations needing review
    Fuzzy,
    /// Merge as suggestions
    Suggest,
}

impl UploadMethod {
    pub fn from_id(id: &str) -> TransyncResult<Self> {
        match id {
            "" | "translate" => Ok(UploadMethod::Translate),
            "fuzzy" => Ok(UploadMethod::Fuzzy),
            "suggest" => Ok(UploadMethod::Suggest),
            other => Err(TransyncError::NotFound(format!("upload method '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    pub overwrite: bool,
    pub method: UploadMethod,
    pub fuzzy: FuzzyMode,
    pub merge_header: bool,
    /// For workbooks carrying a revision marker, only merge cells edited
    /// since that revision
    pub diff_past: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            method: UploadMethod::Translate,
            fuzzy: FuzzyMode::Skip,
            merge_header: true,
            diff_past: true,
        }
    }
}

fn strip_bom(content: &[u8]) -> &[u8] {
    content.strip_prefix(UTF8_BOM).unwrap_or(content)
}

fn is_workbook(name: &str) -> bool {
    name.to_lowercase().ends_with(".xlsx")
}

impl Translation {
    /// Merge translations of `store` into the database and commit them.
    /// Takes the component lock.
    pub fn merge_translations(
        &mut self,
        author: &str,
        store: &dyn TranslationStore,
        options: MergeOptions,
        old: Option<&dyn TranslationStore>,
    ) -> TransyncResult<MergeSummary> {
        let repository = Arc::clone(&self.component.repository);
        let lock = repository.lock();
        self.merge_translations_locked(&lock, author, store, options, old)
    }

    pub(crate) fn merge_translations_locked(
        &mut self,
        lock: &RepositoryLock<'_>,
        author: &str,
        store: &dyn TranslationStore,
        options: MergeOptions,
        old: Option<&dyn TranslationStore>,
    ) -> TransyncResult<MergeSummary> {
        self.commit_pending_locked(lock, Some(author))?;

        let units = Arc::clone(&self.services.units);
        let mut summary = MergeSummary {
            total: store.count_units(),
            ..Default::default()
        };

        for (set_fuzzy, external) in store.iterate_merge(options.fuzzy, old) {
            let Some(mut unit) = units.find(&self.id, &external.key()) else {
                summary.not_found += 1;
                continue;
            };
            if unit.translated && !options.overwrite {
                summary.skipped += 1;
                continue;
            }
            summary.accepted += 1;
            // no propagation: sibling components would need this lock
            record_edit(
                units.as_ref(),
                &mut unit,
                Some(author),
                external.target.clone(),
                options.add_fuzzy || set_fuzzy,
                Some(ChangeAction::Upload),
            );
        }

        if summary.accepted > 0 {
            self.update_stats();
            self.invalidate_last_change();
            if options.merge_header {
                let live = self.store()?;
                live.merge_header(store);
                live.save()?;
            }
            self.store_hash()?;
            self.git_commit_locked(lock, author, Utc::now(), CommitOptions::forced())?;
        }

        info!(
            "{}merged {} of {} units ({} skipped, {} not found)",
            self.log_prefix(),
            summary.accepted,
            summary.total,
            summary.skipped,
            summary.not_found
        );
        Ok(summary)
    }

    /// Record differing external translations as suggestions. With `old`,
    /// entries still matching that revision are left out.
    pub fn merge_suggestions(
        &mut self,
        author: &str,
        store: &dyn TranslationStore,
        fuzzy: FuzzyMode,
        old: Option<&dyn TranslationStore>,
    ) -> TransyncResult<MergeSummary> {
        let units = Arc::clone(&self.services.units);
        let mut summary = MergeSummary {
            total: store.count_units(),
            ..Default::default()
        };

        for (_, external) in store.iterate_merge(fuzzy, old) {
            let Some(unit) = units.find(&self.id, &external.key()) else {
                summary.not_found += 1;
                continue;
            };
            if unit.target == external.target {
                summary.skipped += 1;
                continue;
            }
            summary.accepted += 1;
            units.add_suggestion(Suggestion {
                id: 0,
                unit: unit.id,
                translation: self.id.clone(),
                target: external.target.clone(),
                user: Some(author.to_string()),
                timestamp: Utc::now(),
            });
            units.add_change(
                Change::new(ChangeAction::Suggestion, Some(&self.id))
                    .with_unit(unit.id)
                    .by(Some(author))
                    .with_target(external.target_text()),
            );
        }

        if summary.accepted > 0 {
            self.update_stats();
        }
        Ok(summary)
    }

    /// Merge an uploaded file. Workbooks are traced to the upload audit
    /// directory and converted to PO before merging.
    pub fn merge_upload(
        &mut self,
        author: &str,
        file_name: &str,
        content: &[u8],
        options: UploadOptions,
    ) -> TransyncResult<MergeSummary> {
        let content = strip_bom(content);
        let workbook = is_workbook(file_name);
        let template = self.component.template_path();

        let (store, revision) = if workbook {
            self.load_workbook_upload(content)?
        } else {
            let extension = Path::new(file_name)
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            let format = FormatKind::ALL
                .into_iter()
                .find(|f| f.extension() == extension)
                .unwrap_or(self.component.format);
            (format.load(file_name, content, template.as_deref())?, None)
        };

        if let Some(header) = store.header_value("Plural-Forms").filter(|h| !h.is_empty()) {
            if !self.language.same_plural(&header) {
                return Err(TransyncError::PluralMismatch {
                    expected: self.language.plural_form(),
                    found: header,
                });
            }
        }

        let old = match revision.filter(|_| options.diff_past && workbook) {
            Some(revision) => Some(self.load_revision(&revision)?),
            None => None,
        };

        let merge = MergeOptions {
            overwrite: options.overwrite,
            add_fuzzy: options.method == UploadMethod::Fuzzy,
            fuzzy: options.fuzzy,
            merge_header: options.merge_header,
        };
        match options.method {
            UploadMethod::Translate | UploadMethod::Fuzzy => {
                let repository = Arc::clone(&self.component.repository);
                let lock = repository.lock();
                self.merge_translations_locked(&lock, author, store.as_ref(), merge, old.as_deref())
            }
            UploadMethod::Suggest => {
                self.merge_suggestions(author, store.as_ref(), options.fuzzy, old.as_deref())
            }
        }
    }

    fn load_workbook_upload(
        &mut self,
        content: &[u8],
    ) -> TransyncResult<(Box<dyn TranslationStore>, Option<String>)> {
        if self.component.format != FormatKind::Po {
            return Err(TransyncError::FormatNotSupported(
                "Upload Excel workbook".to_string(),
            ));
        }

        let traces = self.services.data_dir.join("upload_traces");
        if let Err(e) = fs::create_dir_all(&traces) {
            if e.kind() != std::io::ErrorKind::AlreadyExists {
                return Err(e.into());
            }
        }
        let trace = traces.join(format!(
            "{}_{}.{}.xlsx",
            Utc::now().format("%Y%m%d_%H%M%S"),
            self.id.component_slug(),
            self.language_code
        ));
        fs::write(&trace, content)?;
        info!("{}upload traced to {}", self.log_prefix(), trace.display());

        let alt_column = self
            .store()?
            .header_value("Language")
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| self.language_code.clone());

        let (po_path, revision) = xlsx_to_po(&trace, Some(&alt_column))?;
        let bytes = fs::read(&po_path);
        fs::remove_file(&po_path)?;
        let store = FormatKind::Po.load(&trace.to_string_lossy(), &bytes?, None)?;
        Ok((store, revision))
    }

    /// The translation file as it was at `revision`
    fn load_revision(&self, revision: &str) -> TransyncResult<Box<dyn TranslationStore>> {
        let bytes = self
            .component
            .repository
            .retrieve_revision(revision, &self.filename)?;
        self.component
            .format
            .load(&self.filename.to_string_lossy(), &bytes, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom(b"\xEF\xBB\xBFmsgid"), b"msgid");
        assert_eq!(strip_bom(b"msgid"), b"msgid");
    }

    #[test]
    fn test_upload_method_from_id() {
        assert_eq!(UploadMethod::from_id("").unwrap(), UploadMethod::Translate);
        assert_eq!(UploadMethod::from_id("suggest").unwrap(), UploadMethod::Suggest);
        assert!(UploadMethod::from_id("replace").is_err());
    }

    #[test]
    fn test_summary_tuple() {
        let summary = MergeSummary {
            not_found: 1,
            skipped: 2,
            accepted: 3,
            total: 6,
        };
        assert_eq!(summary.as_tuple(), (1, 2, 3, 6));
    }
}
