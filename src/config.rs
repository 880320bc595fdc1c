//! YAML configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{TransyncError, TransyncResult};
use crate::format::FormatKind;
use crate::vcs::VcsKind;

pub const DEFAULT_COMMIT_MESSAGE: &str = "Translated using Transync (%(language_name)s)\n\nCurrently translated at %(translated_percent)s%% (%(translated)s of %(total)s strings)";
pub const DEFAULT_ADD_MESSAGE: &str = "Added translation using Transync (%(language_name)s)";
pub const DEFAULT_DELETE_MESSAGE: &str = "Deleted translation using Transync (%(language_name)s)";

/// Editor lock durations, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub auto_lock: bool,
    pub lock_time: i64,
    pub auto_lock_time: i64,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            auto_lock: true,
            lock_time: 600,
            auto_lock_time: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub site_url: String,
    pub data_dir: PathBuf,
    /// Let edits accumulate until a forced commit
    pub lazy_commits: bool,
    pub auto_lock: bool,
    pub lock_time: i64,
    pub auto_lock_time: i64,
    pub components: Vec<ComponentConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        let lock = LockPolicy::default();
        Self {
            site_url: "http://localhost:8080".to_string(),
            data_dir: PathBuf::from("data"),
            lazy_commits: false,
            auto_lock: lock.auto_lock,
            lock_time: lock.lock_time,
            auto_lock_time: lock.auto_lock_time,
            components: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_yaml(content: &str) -> TransyncResult<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load a configuration file; relative paths are taken relative to
    /// the file's directory
    pub fn load(path: &Path) -> TransyncResult<Self> {
        if !path.exists() {
            return Err(TransyncError::Config(format!(
                "Configuration file {} not found",
                path.display()
            )));
        }
        let mut settings = Self::from_yaml(&fs::read_to_string(path)?)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        if settings.data_dir.is_relative() {
            settings.data_dir = base.join(&settings.data_dir);
        }
        for component in &mut settings.components {
            if component.repo.is_relative() {
                component.repo = base.join(&component.repo);
            }
        }
        Ok(settings)
    }

    fn validate(&self) -> TransyncResult<()> {
        for component in &self.components {
            if component.project.is_empty() || component.slug.is_empty() {
                return Err(TransyncError::Config(
                    "every component needs a project and a slug".to_string(),
                ));
            }
            if component.filemask.matches('*').count() != 1 {
                return Err(TransyncError::Config(format!(
                    "filemask '{}' of {}/{} must contain exactly one '*'",
                    component.filemask, component.project, component.slug
                )));
            }
            FormatKind::from_id(&component.file_format)?;
        }
        Ok(())
    }

    pub fn lock_policy(&self) -> LockPolicy {
        LockPolicy {
            auto_lock: self.auto_lock,
            lock_time: self.lock_time,
            auto_lock_time: self.auto_lock_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentConfig {
    pub project: String,
    pub slug: String,
    pub name: String,
    pub project_name: String,
    /// Checkout path
    pub repo: PathBuf,
    pub vcs: VcsKind,
    /// Translation file pattern, `*` stands for the language code
    pub filemask: String,
    pub template: Option<PathBuf>,
    pub file_format: String,
    pub commit_message: String,
    pub add_message: String,
    pub delete_message: String,
    /// Newline separated, `%(language)s` is substituted
    pub extra_commit_file: String,
    pub save_history: bool,
    pub push_on_commit: bool,
    pub set_translation_team: bool,
    pub report_source_bugs: String,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            slug: String::new(),
            name: String::new(),
            project_name: String::new(),
            repo: PathBuf::from("."),
            vcs: VcsKind::Git,
            filemask: "po/*.po".to_string(),
            template: None,
            file_format: "po".to_string(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            add_message: DEFAULT_ADD_MESSAGE.to_string(),
            delete_message: DEFAULT_DELETE_MESSAGE.to_string(),
            extra_commit_file: String::new(),
            save_history: true,
            push_on_commit: false,
            set_translation_team: true,
            report_source_bugs: String::new(),
        }
    }
}

impl ComponentConfig {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.slug
        } else {
            &self.name
        }
    }

    pub fn display_project_name(&self) -> &str {
        if self.project_name.is_empty() {
            &self.project
        } else {
            &self.project_name
        }
    }
}
