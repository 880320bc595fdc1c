//! Database → file → repository

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use tracing::{error, info, warn};

use crate::error::{TransyncError, TransyncResult};
use crate::format::HeaderUpdate;
use crate::units::{Change, ChangeAction};
use crate::vcs::RepositoryLock;

use super::Translation;

const ADD_MARKER: &str = "__add__";
const DELETE_MARKER: &str = "__delete__";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Commit even with lazy commits enabled
    pub force_commit: bool,
    /// Store the new file hash as the synchronized revision
    pub sync: bool,
    pub skip_push: bool,
    /// Commit without checking for changes first
    pub force_new: bool,
}

impl CommitOptions {
    pub fn forced() -> Self {
        Self {
            force_commit: true,
            sync: true,
            ..Default::default()
        }
    }
}

/// Render `%(key)s` placeholders; `%%` is a literal percent sign. Unknown
/// keys are left in place.
pub(crate) fn render_message(
    template: &str,
    values: &HashMap<&str, String>,
) -> TransyncResult<String> {
    let re = Regex::new(r"%\((\w+)\)s|%%")
        .map_err(|e| TransyncError::Config(format!("Invalid placeholder pattern: {}", e)))?;
    let rendered = re.replace_all(template, |caps: &Captures| match caps.get(1) {
        None => "%".to_string(),
        Some(key) => match values.get(key.as_str()) {
            Some(value) => value.clone(),
            None => {
                warn!("Unknown commit message placeholder '{}'", key.as_str());
                caps[0].to_string()
            }
        },
    });
    Ok(rendered.into_owned())
}

impl Translation {
    fn message_values(&self) -> HashMap<&'static str, String> {
        let config = &self.component.config;
        HashMap::from([
            ("language", self.language_code.clone()),
            ("language_name", self.language.name.clone()),
            ("subproject", config.display_name().to_string()),
            ("resource", config.display_name().to_string()),
            ("component", config.display_name().to_string()),
            ("project", config.display_project_name().to_string()),
            ("url", self.get_absolute_url()),
            ("total", self.stats.total.to_string()),
            ("fuzzy", self.stats.fuzzy.to_string()),
            ("fuzzy_percent", format!("{:.1}", self.fuzzy_percent())),
            ("translated", self.stats.translated.to_string()),
            ("translated_percent", format!("{:.1}", self.translated_percent())),
        ])
    }

    /// Commit message from the component template. The add/delete markers
    /// pick their own template, and a custom message is appended; both are
    /// consumed.
    pub fn get_commit_message(&mut self) -> TransyncResult<String> {
        let config = &self.component.config;
        let template = match self.commit_message.as_str() {
            ADD_MARKER => config.add_message.clone(),
            DELETE_MARKER => config.delete_message.clone(),
            _ => config.commit_message.clone(),
        };
        if self.commit_message == ADD_MARKER || self.commit_message == DELETE_MARKER {
            self.commit_message.clear();
        }

        let mut message = render_message(&template, &self.message_values())?;
        if !self.commit_message.is_empty() {
            message = format!("{}\n\n{}", message, self.commit_message);
            self.commit_message.clear();
        }
        Ok(message)
    }

    /// Pending database edits or uncommitted file changes exist
    pub fn repo_needs_commit(&self, lock: &RepositoryLock<'_>) -> TransyncResult<bool> {
        if self.services.units.has_pending(&self.id) {
            return Ok(true);
        }
        self.component
            .repository
            .needs_commit(lock, &self.commit_files())
    }

    /// Commit edits of the previous author when someone else is about to
    /// change the translation
    pub fn commit_pending(&mut self, author: Option<&str>) -> TransyncResult<bool> {
        let repository = Arc::clone(&self.component.repository);
        let lock = repository.lock();
        self.commit_pending_locked(&lock, author)
    }

    pub(crate) fn commit_pending_locked(
        &mut self,
        lock: &RepositoryLock<'_>,
        author: Option<&str>,
    ) -> TransyncResult<bool> {
        let Some(last) = self.last_change() else {
            return Ok(false);
        };
        let Some(last_author) = last.author.clone() else {
            return Ok(false);
        };
        if author == Some(last_author.as_str()) {
            return Ok(false);
        }
        self.git_commit_locked(lock, &last_author, last.timestamp, CommitOptions::forced())
    }

    /// Latest repository revision, optionally committing pending edits first
    pub fn get_last_local_commit(&mut self, commit_pending: bool) -> TransyncResult<Option<String>> {
        if commit_pending {
            self.commit_pending(None)?;
        }
        self.component.repository.last_revision()
    }

    /// Flush pending edits and commit the translation file under the
    /// component lock. Returns whether a commit was made.
    pub fn git_commit(
        &mut self,
        author: &str,
        timestamp: DateTime<Utc>,
        options: CommitOptions,
    ) -> TransyncResult<bool> {
        let repository = Arc::clone(&self.component.repository);
        let lock = repository.lock();
        self.git_commit_locked(&lock, author, timestamp, options)
    }

    pub(crate) fn git_commit_locked(
        &mut self,
        lock: &RepositoryLock<'_>,
        author: &str,
        timestamp: DateTime<Utc>,
        options: CommitOptions,
    ) -> TransyncResult<bool> {
        if !options.force_new && !self.repo_needs_commit(lock)? {
            return Ok(false);
        }
        if !options.force_commit && self.services.lazy_commits {
            info!("{}delaying commit as {}", self.log_prefix(), author);
            return Ok(false);
        }

        if !options.force_new {
            self.update_units(author)?;
            if !self.repo_needs_commit(lock)? {
                return Ok(false);
            }
        }

        let message = self.get_commit_message()?;
        info!("{}committing as {}", self.log_prefix(), author);
        self.services
            .units
            .add_change(Change::new(ChangeAction::Commit, Some(&self.id)).by(Some(author)));

        self.services.notifier.pre_commit(&self.id);
        let repository = &self.component.repository;
        repository.commit(lock, &message, author, timestamp, &self.commit_files())?;
        self.services.notifier.post_commit(&self.id);

        if options.sync {
            self.store_hash()?;
        }
        if !options.skip_push && self.component.config.push_on_commit {
            self.component.repository.push_if_needed(lock)?;
        }
        self.invalidate_last_change();
        Ok(true)
    }

    /// Write pending unit edits into the file
    pub fn update_units(&mut self, author: &str) -> TransyncResult<()> {
        let units = Arc::clone(&self.services.units);
        let pending = units.pending_units(&self.id);
        if pending.is_empty() {
            return Ok(());
        }

        let prefix = self.log_prefix();
        let store = self.store()?;
        let mut updated = false;

        for mut unit in pending {
            let context = unit.context.clone();
            let source = unit.source_text().to_string();

            let (index, template_unit) = match store.find_unit(&context, &source) {
                Some(index) => (Some(index), None),
                None => (None, store.find_template_unit(&context, &source)),
            };
            let add = template_unit.is_some();
            let file_unit = match (index, &template_unit) {
                (Some(index), _) => store.unit(index).cloned(),
                (None, Some(template)) => Some(template.clone()),
                (None, None) => None,
            };
            let Some(file_unit) = file_unit.filter(|u| !u.obsolete) else {
                error!("{}message {} disappeared!", prefix, unit);
                unit.pending = false;
                units.save(&unit);
                continue;
            };

            let target_empty = unit.target.iter().all(String::is_empty);
            if (!add || target_empty)
                && unit.target == file_unit.target
                && unit.fuzzy == file_unit.fuzzy
            {
                unit.pending = false;
                units.save(&unit);
                continue;
            }

            updated = true;
            let index = match (index, template_unit) {
                (Some(index), _) => index,
                (None, Some(template)) => store.add_unit(template),
                (None, None) => continue,
            };
            store.set_target(index, unit.target.clone());
            store.mark_fuzzy(index, unit.fuzzy);

            if let Some(entry) = store.unit(index) {
                unit.translated = entry.is_translated();
                unit.flags = entry.flags_string();
            }
            unit.pending = false;
            unit.refresh_checks();
            units.save(&unit);
        }

        if !updated {
            return Ok(());
        }

        let config = &self.component.config;
        let header = HeaderUpdate {
            last_translator: Some(author.to_string()),
            plural_forms: Some(self.language.plural_form()),
            language: Some(self.language_code.clone()),
            revision_date: Some(Utc::now().format("%Y-%m-%d %H:%M%z").to_string()),
            language_team: config
                .set_translation_team
                .then(|| format!("{} <{}>", self.language.name, self.get_absolute_url())),
            report_msgid_bugs_to: Some(config.report_source_bugs.clone())
                .filter(|s| !s.is_empty()),
        };
        let store = self.store()?;
        store.update_header(&header);
        store.save()?;

        self.update_stats();
        Ok(())
    }

    /// Delete the file from the repository and drop the translation's units
    pub fn remove(&mut self, user: &str) -> TransyncResult<()> {
        self.commit_message = DELETE_MARKER.to_string();
        let message = self.get_commit_message()?;

        let repository = Arc::clone(&self.component.repository);
        {
            let lock = repository.lock();
            repository.remove(&lock, &[self.filename.clone()], &message, user)?;
            if self.component.config.push_on_commit {
                repository.push_if_needed(&lock)?;
            }
        }

        let units = &self.services.units;
        let deleted = units.delete_translation(&self.id);
        units.add_change(
            Change::new(ChangeAction::Remove, Some(&self.id))
                .by(Some(user))
                .with_target(self.filename.to_string_lossy()),
        );
        info!("{}removed, dropped {} units", self.log_prefix(), deleted);
        self.reset_store();
        Ok(())
    }
}
