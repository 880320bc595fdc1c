//! Configured components and their translations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::cache::MemoryCountsCache;
use crate::config::{ComponentConfig, Settings};
use crate::error::{TransyncError, TransyncResult};
use crate::hooks::LogNotifier;
use crate::translation::download::{self, DownloadFile, DownloadLevel};
use crate::translation::{
    CommitOptions, Component, EditorLock, MergeSummary, Services, TranslateOutcome, Translation,
    TranslationStats, UploadOptions,
};
use crate::units::{MemoryUnitStore, TranslationId, UnitId};
use crate::vcs::open_repository;

/// Result of synchronizing one translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub translation: TranslationId,
    pub filename: PathBuf,
    pub synced: bool,
    pub error: Option<String>,
}

pub struct Workspace {
    services: Arc<Services>,
    components: Vec<Arc<Component>>,
    translations: Vec<Translation>,
}

/// `po/*.po` → `^po/(?P<lang>[^/]+)\.po$`
fn filemask_regex(filemask: &str) -> TransyncResult<Regex> {
    let (prefix, suffix) = filemask.split_once('*').ok_or_else(|| {
        TransyncError::Config(format!("filemask '{}' has no '*'", filemask))
    })?;
    let pattern = format!(
        "^{}(?P<lang>[^/]+){}$",
        regex::escape(prefix),
        regex::escape(suffix)
    );
    Regex::new(&pattern)
        .map_err(|e| TransyncError::Config(format!("Invalid filemask '{}': {}", filemask, e)))
}

/// Repository-relative paths of every file under `root`, dot entries skipped
fn repository_files(root: &Path) -> TransyncResult<Vec<String>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            files.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(files)
}

/// `(language code, file)` pairs matching the component filemask, sorted
pub fn discover_files(config: &ComponentConfig) -> TransyncResult<Vec<(String, PathBuf)>> {
    let re = filemask_regex(&config.filemask)?;
    let files = repository_files(&config.repo)?;
    let template = config
        .template
        .as_ref()
        .map(|t| t.to_string_lossy().replace('\\', "/"));

    let mut found: Vec<(String, PathBuf)> = files
        .into_iter()
        .filter(|f| Some(f) != template.as_ref())
        .filter_map(|f| {
            let lang = re.captures(&f)?.name("lang")?.as_str().to_string();
            Some((lang, PathBuf::from(f)))
        })
        .collect();
    found.sort();
    Ok(found)
}

impl Workspace {
    /// Open every configured repository, with in-memory unit and cache
    /// storage
    pub fn open(settings: &Settings) -> TransyncResult<Self> {
        let services = Services::new(
            settings,
            Arc::new(MemoryUnitStore::new()),
            Arc::new(MemoryCountsCache::new()),
            Arc::new(LogNotifier),
        );
        Self::with_services(settings, Arc::new(services))
    }

    pub fn with_services(settings: &Settings, services: Arc<Services>) -> TransyncResult<Self> {
        let mut components = Vec::new();
        for config in &settings.components {
            let repository = open_repository(config.vcs, &config.repo)?;
            components.push(Arc::new(Component::new(config.clone(), Arc::from(repository))?));
        }
        Ok(Self {
            services,
            components,
            translations: Vec::new(),
        })
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn components(&self) -> &[Arc<Component>] {
        &self.components
    }

    pub fn translations(&self) -> &[Translation] {
        &self.translations
    }

    /// Discover translation files and run the synchronizer on each. A file
    /// that moved or changed language is always resynchronized.
    pub fn sync_all(&mut self, force: bool) -> TransyncResult<Vec<SyncReport>> {
        let components = self.components.clone();
        let mut reports = Vec::new();
        for component in &components {
            reports.extend(self.sync_component(component, force)?);
        }
        Ok(reports)
    }

    pub fn sync_component_by_slug(
        &mut self,
        project: &str,
        component: &str,
        force: bool,
    ) -> TransyncResult<Vec<SyncReport>> {
        let found = self
            .components
            .iter()
            .find(|c| c.project() == project && c.slug() == component)
            .cloned()
            .ok_or_else(|| TransyncError::NotFound(format!("component {}/{}", project, component)))?;
        self.sync_component(&found, force)
    }

    fn sync_component(
        &mut self,
        component: &Arc<Component>,
        force: bool,
    ) -> TransyncResult<Vec<SyncReport>> {
        let files = discover_files(&component.config)?;
        info!(
            "{}/{}: found {} translation files",
            component.project(),
            component.slug(),
            files.len()
        );

        let mut reports = Vec::new();
        for (language, filename) in files {
            let existing = self.translations.iter().position(|t| {
                Arc::ptr_eq(&t.component, component)
                    && (t.language_code == language || t.filename == filename)
            });
            let (index, changed) = match existing {
                Some(index) => {
                    let translation = &mut self.translations[index];
                    let moved = translation.filename != filename;
                    let relabeled = translation.language_code != language;
                    let restored = !translation.enabled;
                    if restored {
                        info!("{}file is back, enabling", translation.log_prefix());
                        translation.enabled = true;
                        translation.reset_store();
                    }
                    if moved || relabeled {
                        info!(
                            "{}file is now {} ({})",
                            translation.log_prefix(),
                            filename.display(),
                            language
                        );
                    }
                    if relabeled {
                        self.services.units.delete_translation(&translation.id);
                        *translation = Translation::new(
                            Arc::clone(component),
                            &language,
                            filename.clone(),
                            Arc::clone(&self.services),
                        );
                    } else if moved {
                        translation.filename = filename.clone();
                        translation.reset_store();
                    }
                    (index, moved || relabeled || restored)
                }
                None => {
                    self.translations.push(Translation::new(
                        Arc::clone(component),
                        &language,
                        filename.clone(),
                        Arc::clone(&self.services),
                    ));
                    (self.translations.len() - 1, false)
                }
            };

            let translation = &mut self.translations[index];
            let report = match translation.check_sync(force || changed, None, None) {
                Ok(synced) => SyncReport {
                    translation: translation.id.clone(),
                    filename,
                    synced,
                    error: None,
                },
                Err(e) if e.is_user_facing() => {
                    error!("{}{}", translation.log_prefix(), e);
                    SyncReport {
                        translation: translation.id.clone(),
                        filename,
                        synced: false,
                        error: Some(e.to_string()),
                    }
                }
                Err(e) => return Err(e),
            };
            reports.push(report);
        }

        for translation in self
            .translations
            .iter_mut()
            .filter(|t| Arc::ptr_eq(&t.component, component))
        {
            if !translation.full_path().exists() && translation.enabled {
                warn!(
                    "{}{} disappeared, skipping",
                    translation.log_prefix(),
                    translation.filename.display()
                );
                translation.enabled = false;
            }
        }
        Ok(reports)
    }

    pub fn translation_mut(
        &mut self,
        project: &str,
        component: &str,
        language: &str,
    ) -> TransyncResult<&mut Translation> {
        self.translations
            .iter_mut()
            .find(|t| {
                t.id.project == project && t.id.component == component && t.id.language == language
            })
            .ok_or_else(|| {
                TransyncError::NotFound(format!(
                    "translation {}/{}/{}",
                    project, component, language
                ))
            })
    }

    /// Translations of a project, optionally narrowed to a component or a
    /// language
    pub fn select_mut(
        &mut self,
        project: &str,
        component: Option<&str>,
        language: Option<&str>,
    ) -> Vec<&mut Translation> {
        self.translations
            .iter_mut()
            .filter(|t| {
                t.enabled
                    && t.id.project == project
                    && component.map_or(true, |c| t.id.component == c)
                    && language.map_or(true, |l| t.id.language == l)
            })
            .collect()
    }

    pub fn statistics(&self) -> Vec<TranslationStats> {
        self.translations
            .iter()
            .filter(|t| t.enabled)
            .map(|t| t.statistics())
            .collect()
    }

    pub fn download(
        &mut self,
        project: &str,
        component: &str,
        language: &str,
        fmt: Option<&str>,
    ) -> TransyncResult<DownloadFile> {
        let translation = self.translation_mut(project, component, language)?;
        download::translation_file(translation, fmt)
    }

    pub fn download_many(
        &mut self,
        project: &str,
        component: Option<&str>,
        language: Option<&str>,
        fmt: Option<&str>,
    ) -> TransyncResult<DownloadFile> {
        let level = match (component, language) {
            (Some(_), _) => DownloadLevel::Component,
            (None, Some(_)) => DownloadLevel::ProjectLanguage,
            (None, None) => DownloadLevel::Project,
        };
        let mut selected = self.select_mut(project, component, language);
        download::component_files(&mut selected, fmt, level)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn upload(
        &mut self,
        project: &str,
        component: &str,
        language: &str,
        author: &str,
        file_name: &str,
        content: &[u8],
        options: UploadOptions,
    ) -> TransyncResult<MergeSummary> {
        self.translation_mut(project, component, language)?
            .merge_upload(author, file_name, content, options)
    }

    /// Commit pending edits of one translation right away
    pub fn commit(
        &mut self,
        project: &str,
        component: &str,
        language: &str,
        author: &str,
    ) -> TransyncResult<bool> {
        let translation = self.translation_mut(project, component, language)?;
        let author = translation.get_last_author().unwrap_or_else(|| author.to_string());
        translation.git_commit(&author, Utc::now(), CommitOptions::forced())
    }

    /// Commit every translation with pending edits
    pub fn commit_all(&mut self, author: &str) -> TransyncResult<usize> {
        let mut committed = 0;
        for translation in &mut self.translations {
            let author = translation
                .get_last_author()
                .unwrap_or_else(|| author.to_string());
            if translation.git_commit(&author, Utc::now(), CommitOptions::forced())? {
                committed += 1;
            }
        }
        Ok(committed)
    }

    /// Edit a unit and refresh the statistics of translations the edit
    /// propagated to
    #[allow(clippy::too_many_arguments)]
    pub fn translate(
        &mut self,
        project: &str,
        component: &str,
        language: &str,
        user: &str,
        unit: UnitId,
        target: Vec<String>,
        fuzzy: bool,
        now: DateTime<Utc>,
    ) -> TransyncResult<TranslateOutcome> {
        let outcome = self
            .translation_mut(project, component, language)?
            .translate(user, unit, target, fuzzy, now)?;
        for translation in &mut self.translations {
            if outcome.propagated.contains(&translation.id) {
                translation.update_stats();
            }
        }
        Ok(outcome)
    }

    /// Take or refresh an explicit editor lock for `user`
    pub fn lock(
        &mut self,
        project: &str,
        component: &str,
        language: &str,
        user: &str,
        now: DateTime<Utc>,
    ) -> TransyncResult<EditorLock> {
        let translation = self.translation_mut(project, component, language)?;
        if translation.is_user_locked(Some(user), now) {
            return Err(locked_error(translation));
        }
        translation.create_lock(Some(user), true, now);
        translation
            .lock
            .clone()
            .ok_or_else(|| TransyncError::Locked(String::new()))
    }

    /// Release the editor lock held by `user`
    pub fn unlock(
        &mut self,
        project: &str,
        component: &str,
        language: &str,
        user: &str,
        now: DateTime<Utc>,
    ) -> TransyncResult<()> {
        let translation = self.translation_mut(project, component, language)?;
        if translation.is_user_locked(Some(user), now) {
            return Err(locked_error(translation));
        }
        translation.create_lock(None, true, now);
        Ok(())
    }
}

fn locked_error(translation: &Translation) -> TransyncError {
    TransyncError::Locked(
        translation
            .lock
            .as_ref()
            .map(|l| l.user.clone())
            .unwrap_or_default(),
    )
}
