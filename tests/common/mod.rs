//! Shared fixtures: a plain (non-git) checkout in a temp directory

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use transync::cache::MemoryCountsCache;
use transync::config::{ComponentConfig, Settings};
use transync::hooks::Notifier;
use transync::translation::Services;
use transync::units::{MemoryUnitStore, TranslationId};
use transync::vcs::VcsKind;
use transync::workspace::Workspace;

pub const PLURAL_FORMS: &str = "nplurals=2; plural=(n != 1);";

/// PO file with a German header and the given entries
pub fn po(entries: &str) -> String {
    format!(
        r#"msgid ""
msgstr ""
"Project-Id-Version: demo 1.0\n"
"Content-Type: text/plain; charset=UTF-8\n"
"Language: de\n"
"Plural-Forms: {}\n"

{}"#,
        PLURAL_FORMS, entries
    )
}

pub const BASIC_ENTRIES: &str = r#"msgid "Hello"
msgstr "Hallo"

msgid "World"
msgstr ""

#, fuzzy
msgid "Open file"
msgstr "Datei offnen"
"#;

pub struct Fixture {
    pub dir: TempDir,
    pub repo: PathBuf,
    pub settings: Settings,
}

impl Fixture {
    /// One component `demo/app` with `po/*.po` files
    pub fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("repo");
        fs::create_dir_all(&repo).unwrap();
        for (name, content) in files {
            write(&repo, name, content);
        }

        let settings = Settings {
            data_dir: dir.path().join("data"),
            components: vec![component("demo", "app", &repo)],
            ..Default::default()
        };
        Self {
            dir,
            repo,
            settings,
        }
    }

    pub fn write(&self, name: &str, content: &str) {
        write(&self.repo, name, content);
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.repo.join(name)).unwrap()
    }

    /// Open the workspace and run a first sync
    pub fn workspace(&self) -> Workspace {
        let mut workspace = Workspace::open(&self.settings).unwrap();
        workspace.sync_all(false).unwrap();
        workspace
    }
}

/// Notifier remembering every event as `"<event> <translation>"`
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: &str, translation: &TranslationId) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{} {}", event, translation));
    }
}

impl Notifier for RecordingNotifier {
    fn new_string(&self, translation: &TranslationId) {
        self.record("new_string", translation);
    }

    fn pre_commit(&self, translation: &TranslationId) {
        self.record("pre_commit", translation);
    }

    fn post_commit(&self, translation: &TranslationId) {
        self.record("post_commit", translation);
    }
}

/// Collaborators a test keeps handles on
pub struct Observed {
    pub cache: Arc<MemoryCountsCache>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Fixture {
    /// Like [`Fixture::workspace`], with a cache and notifier the test can
    /// inspect
    pub fn observed_workspace(&self) -> (Workspace, Observed) {
        let observed = Observed {
            cache: Arc::new(MemoryCountsCache::new()),
            notifier: Arc::new(RecordingNotifier::default()),
        };
        let services = Services::new(
            &self.settings,
            Arc::new(MemoryUnitStore::new()),
            observed.cache.clone(),
            observed.notifier.clone(),
        );
        let mut workspace = Workspace::with_services(&self.settings, Arc::new(services)).unwrap();
        workspace.sync_all(false).unwrap();
        (workspace, observed)
    }
}

pub fn component(project: &str, slug: &str, repo: &Path) -> ComponentConfig {
    ComponentConfig {
        project: project.to_string(),
        slug: slug.to_string(),
        repo: repo.to_path_buf(),
        vcs: VcsKind::Plain,
        ..Default::default()
    }
}

pub fn write(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}
