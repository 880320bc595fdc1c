//! Translations: one language of one component
//!
//! A [`Translation`] ties a file in the component's repository to its rows in
//! the unit database. The synchronizer ([`Translation::check_sync`]) reads the
//! file into the database, the merge engine folds external files into the
//! database, and the commit coordinator writes pending database edits back
//! into the file and the repository.

mod commit;
pub mod download;
mod edit;
mod lock;
mod merge;
mod sync;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::cache::{check_count_key, check_count_keys, CountsCache};
use crate::config::{ComponentConfig, LockPolicy, Settings};
use crate::error::{TransyncError, TransyncResult};
use crate::format::{FileFormat, FormatKind, TranslationStore};
use crate::hooks::Notifier;
use crate::language::Language;
use crate::units::checks::{CheckInfo, CHECKS};
use crate::units::{Change, TranslationId, UnitAggregate, UnitStore};
use crate::vcs::Repository;

pub use commit::CommitOptions;
pub use edit::TranslateOutcome;
pub use lock::EditorLock;
pub use merge::{MergeOptions, MergeSummary, UploadMethod, UploadOptions};

/// Called when a translation file fails to parse
pub type ParseErrorHandler = Arc<dyn Fn(&TranslationId, &TransyncError) + Send + Sync>;

/// Collaborators shared by every translation
pub struct Services {
    pub units: Arc<dyn UnitStore>,
    pub cache: Arc<dyn CountsCache>,
    pub notifier: Arc<dyn Notifier>,
    pub site_url: String,
    pub data_dir: PathBuf,
    pub lazy_commits: bool,
    pub lock_policy: LockPolicy,
    pub parse_error_handler: Option<ParseErrorHandler>,
}

impl Services {
    pub fn new(
        settings: &Settings,
        units: Arc<dyn UnitStore>,
        cache: Arc<dyn CountsCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            units,
            cache,
            notifier,
            site_url: settings.site_url.trim_end_matches('/').to_string(),
            data_dir: settings.data_dir.clone(),
            lazy_commits: settings.lazy_commits,
            lock_policy: settings.lock_policy(),
            parse_error_handler: None,
        }
    }

    pub fn with_parse_error_handler(mut self, handler: ParseErrorHandler) -> Self {
        self.parse_error_handler = Some(handler);
        self
    }
}

/// A translatable project unit tracked in one checkout
pub struct Component {
    pub config: ComponentConfig,
    pub repository: Arc<dyn Repository>,
    pub format: FormatKind,
}

impl Component {
    pub fn new(config: ComponentConfig, repository: Arc<dyn Repository>) -> TransyncResult<Self> {
        let format = FormatKind::from_id(&config.file_format)?;
        Ok(Self {
            config,
            repository,
            format,
        })
    }

    pub fn project(&self) -> &str {
        &self.config.project
    }

    pub fn slug(&self) -> &str {
        &self.config.slug
    }

    /// Template file relative to the repository
    pub fn template(&self) -> Option<&Path> {
        self.config.template.as_deref()
    }

    pub fn template_path(&self) -> Option<PathBuf> {
        self.template().map(|t| self.repository.path().join(t))
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("project", &self.config.project)
            .field("slug", &self.config.slug)
            .field("repository", &self.repository.path())
            .field("format", &self.format)
            .finish()
    }
}

/// Percentage rounded to one decimal, never showing 0 or 100 for partial
/// progress
pub fn translation_percent(translated: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let percent = (1000.0 * translated as f64 / total as f64).round() / 10.0;
    if percent == 0.0 && translated != 0 {
        0.1
    } else if percent == 100.0 && translated < total {
        99.9
    } else {
        percent
    }
}

/// Statistics as reported to users
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationStats {
    pub translation: TranslationId,
    pub filename: PathBuf,
    pub revision: String,
    #[serde(flatten)]
    pub counts: UnitAggregate,
    pub translated_percent: f64,
    pub fuzzy_percent: f64,
    pub failing_checks_percent: f64,
    pub translated_words_percent: f64,
    pub locked_by: Option<String>,
}

pub struct Translation {
    pub id: TranslationId,
    pub component: Arc<Component>,
    pub language: Language,
    pub language_code: String,
    /// Path relative to the repository root
    pub filename: PathBuf,
    /// Content hash of the file(s) at the last sync
    pub revision: String,
    pub stats: UnitAggregate,
    pub enabled: bool,
    pub lock: Option<EditorLock>,
    /// Custom text appended to the next commit message, or an
    /// `__add__`/`__delete__` marker selecting another template
    pub commit_message: String,
    services: Arc<Services>,
    store: Option<Box<dyn TranslationStore>>,
    last_change: Option<Option<Change>>,
}

impl fmt::Debug for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translation")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("revision", &self.revision)
            .field("stats", &self.stats)
            .field("lock", &self.lock)
            .finish()
    }
}

impl Translation {
    pub fn new(
        component: Arc<Component>,
        language_code: &str,
        filename: impl Into<PathBuf>,
        services: Arc<Services>,
    ) -> Self {
        let id = TranslationId::new(component.project(), component.slug(), language_code);
        Self {
            id,
            language: Language::from_code(language_code),
            language_code: language_code.to_string(),
            filename: filename.into(),
            revision: String::new(),
            stats: UnitAggregate::default(),
            enabled: true,
            lock: None,
            commit_message: String::new(),
            component,
            services,
            store: None,
            last_change: None,
        }
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    fn units(&self) -> &dyn UnitStore {
        self.services.units.as_ref()
    }

    /// `project/component/language: `, prefixed to log lines
    pub fn log_prefix(&self) -> String {
        format!("{}: ", self.id)
    }

    pub fn full_path(&self) -> PathBuf {
        self.component.repository.path().join(&self.filename)
    }

    pub fn get_absolute_url(&self) -> String {
        format!(
            "{}/projects/{}/{}/{}/",
            self.services.site_url, self.id.project, self.id.component, self.language_code
        )
    }

    /// Files committed together for this translation: the translation file
    /// plus configured extra files that exist
    pub fn commit_files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.filename.clone()];
        let extra = &self.component.config.extra_commit_file;
        for line in extra.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let file = PathBuf::from(line.replace("%(language)s", &self.language_code));
            if self.component.repository.path().join(&file).exists() {
                files.push(file);
            }
        }
        files
    }

    /// The parsed file, loaded on first use and kept until the next
    /// resynchronization. Parse failures are reported to the configured
    /// handler and not cached.
    pub fn store(&mut self) -> TransyncResult<&mut Box<dyn TranslationStore>> {
        if self.store.is_none() {
            let loaded = self.load_store().map_err(|e| {
                if let Some(handler) = &self.services.parse_error_handler {
                    handler(&self.id, &e);
                }
                e
            })?;
            self.store = Some(loaded);
        }
        self.store
            .as_mut()
            .ok_or_else(|| TransyncError::Config("translation store unavailable".to_string()))
    }

    fn load_store(&self) -> TransyncResult<Box<dyn TranslationStore>> {
        debug!("{}loading {}", self.log_prefix(), self.filename.display());
        let template = self.component.template_path();
        self.component
            .format
            .parse(&self.full_path(), template.as_deref(), &self.language_code)
    }

    /// Forget the parsed file so the next access re-reads it
    pub fn reset_store(&mut self) {
        self.store = None;
    }

    /// Validate that the file exists and parses
    pub fn clean(&mut self) -> TransyncResult<()> {
        if !self.full_path().exists() {
            return Err(TransyncError::MissingFile(self.filename.clone()));
        }
        self.reset_store();
        self.store()?;
        Ok(())
    }

    /// Hash of the translation file, joined with the template hash when the
    /// component has one
    pub fn get_git_blob_hash(&self) -> TransyncResult<String> {
        let repository = &self.component.repository;
        let mut hash = repository.get_object_hash(&self.filename)?;
        if let Some(template) = self.component.template() {
            if template != self.filename {
                hash = format!("{},{}", hash, repository.get_object_hash(template)?);
            }
        }
        Ok(hash)
    }

    /// Remember the current file hash as synchronized
    pub fn store_hash(&mut self) -> TransyncResult<()> {
        self.revision = self.get_git_blob_hash()?;
        Ok(())
    }

    pub fn invalidate_cache(&self) {
        self.services.cache.delete_many(&check_count_keys(&self.id));
    }

    /// Failing check counts, served from the counts cache when possible
    pub fn translation_checks(&self) -> Vec<(CheckInfo, usize)> {
        CHECKS
            .iter()
            .map(|check| {
                let key = check_count_key(&self.id, check.id);
                let count = match self.services.cache.get(&key) {
                    Some(count) => count,
                    None => {
                        let count = self.units().count_failing(&self.id, check.id);
                        self.services.cache.set(&key, count);
                        count
                    }
                };
                (*check, count)
            })
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    /// Most recent content change, cached until the next commit
    pub fn last_change(&mut self) -> Option<Change> {
        if self.last_change.is_none() {
            self.last_change = Some(self.units().last_content_change(&self.id));
        }
        self.last_change.clone().flatten()
    }

    pub(crate) fn invalidate_last_change(&mut self) {
        self.last_change = None;
    }

    /// Author of the most recent content change
    pub fn get_last_author(&mut self) -> Option<String> {
        self.last_change().and_then(|c| c.author)
    }

    pub fn translated_percent(&self) -> f64 {
        translation_percent(self.stats.translated, self.stats.total)
    }

    pub fn fuzzy_percent(&self) -> f64 {
        translation_percent(self.stats.fuzzy, self.stats.total)
    }

    pub fn failing_checks_percent(&self) -> f64 {
        translation_percent(self.stats.failing_checks, self.stats.total)
    }

    pub fn translated_words_percent(&self) -> f64 {
        translation_percent(self.stats.translated_words, self.stats.total_words)
    }

    pub fn statistics(&self) -> TranslationStats {
        TranslationStats {
            translation: self.id.clone(),
            filename: self.filename.clone(),
            revision: self.revision.clone(),
            counts: self.stats,
            translated_percent: self.translated_percent(),
            fuzzy_percent: self.fuzzy_percent(),
            failing_checks_percent: self.failing_checks_percent(),
            translated_words_percent: self.translated_words_percent(),
            locked_by: self.lock.as_ref().map(|l| l.user.clone()),
        }
    }
}
