//! Unit database
//!
//! [`UnitStore`] is the persistence contract the synchronizer and the merge
//! engine write through: unit rows, change history and suggestions.
//! [`MemoryUnitStore`] implements it in-process.

pub mod checks;
mod memory;

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::format::{StoreUnit, UnitKey};

pub use memory::MemoryUnitStore;

pub type UnitId = u64;

/// One language of one component
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TranslationId {
    pub project: String,
    pub component: String,
    pub language: String,
}

impl TranslationId {
    pub fn new(
        project: impl Into<String>,
        component: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            component: component.into(),
            language: language.into(),
        }
    }

    /// `project__component__language`, used in file names and cache keys
    pub fn full_slug(&self) -> String {
        format!("{}__{}__{}", self.project, self.component, self.language)
    }

    /// `project__component`
    pub fn component_slug(&self) -> String {
        format!("{}__{}", self.project, self.component)
    }
}

impl fmt::Display for TranslationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.project, self.component, self.language)
    }
}

/// Database row of a translatable string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub translation: TranslationId,
    pub context: String,
    /// Source plural forms, singular first
    pub source: Vec<String>,
    /// Target plural forms
    pub target: Vec<String>,
    pub fuzzy: bool,
    pub translated: bool,
    /// Comma separated format flags
    pub flags: String,
    pub comment: String,
    pub translator_comment: String,
    pub location: String,
    pub previous_source: String,
    /// Edited in the database but not yet written to the file
    pub pending: bool,
    pub num_words: usize,
    pub position: usize,
    pub failing_checks: Vec<String>,
    pub has_failing_check: bool,
    pub has_suggestion: bool,
    pub has_comment: bool,
}

impl Unit {
    pub fn key(&self) -> UnitKey {
        UnitKey::new(self.context.as_str(), self.source_text())
    }

    /// First source form
    pub fn source_text(&self) -> &str {
        self.source.first().map(String::as_str).unwrap_or("")
    }

    pub fn target_text(&self) -> &str {
        self.target.first().map(String::as_str).unwrap_or("")
    }

    pub fn is_plural(&self) -> bool {
        self.source.len() > 1
    }

    pub fn flag_list(&self) -> Vec<String> {
        self.flags
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Copy file content into the row. A pending row keeps its target state
    /// since the database is ahead of the file.
    pub fn apply_store_unit(&mut self, unit: &StoreUnit, position: usize) {
        self.context = unit.context_str().to_string();
        self.source = unit.sources();
        if !self.pending {
            self.target = unit.target.clone();
            self.fuzzy = unit.fuzzy;
            self.translated = unit.is_translated();
        }
        self.flags = unit.flags_string();
        self.comment = unit.comment.clone();
        self.translator_comment = unit.translator_comment.clone();
        self.location = unit
            .occurrences
            .iter()
            .map(|(path, line)| {
                if line.is_empty() {
                    path.clone()
                } else {
                    format!("{}:{}", path, line)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        self.previous_source = unit.previous_source.clone();
        self.position = position;
        self.num_words = self.source_text().split_whitespace().count();
        self.has_comment = !self.translator_comment.is_empty();
        self.refresh_checks();
    }

    /// Recompute failing checks from source, target and flags
    pub fn refresh_checks(&mut self) {
        self.failing_checks = if self.translated {
            checks::run_checks(&self.source, &self.target, &self.flag_list())
        } else {
            Vec::new()
        };
        self.has_failing_check = !self.failing_checks.is_empty();
    }

    /// Build a file entry from the row, for formats serialized from the
    /// database
    pub fn to_store_unit(&self) -> StoreUnit {
        StoreUnit {
            context: if self.context.is_empty() {
                None
            } else {
                Some(self.context.clone())
            },
            source: self.source_text().to_string(),
            source_plural: self.source.get(1).cloned(),
            target: self.target.clone(),
            fuzzy: self.fuzzy,
            flags: self.flag_list(),
            comment: self.comment.clone(),
            translator_comment: self.translator_comment.clone(),
            previous_source: self.previous_source.clone(),
            ..Default::default()
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Result of [`UnitStore::update_from_unit`]
#[derive(Debug, Clone)]
pub struct UnitUpdate {
    pub unit: Unit,
    pub is_new: bool,
    pub is_modified: bool,
    /// Row as it was before the update (defaults for a new row)
    pub old_unit: Unit,
}

/// Aggregated counters over the units of one translation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitAggregate {
    pub total: usize,
    pub total_words: usize,
    pub translated: usize,
    pub translated_words: usize,
    pub fuzzy: usize,
    pub fuzzy_words: usize,
    pub failing_checks: usize,
    pub failing_checks_words: usize,
    pub have_suggestion: usize,
    pub have_comment: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    /// Translation resynchronized from the file
    Update,
    /// Translation uploaded
    Upload,
    /// Existing translation edited
    Change,
    /// New translation
    New,
    DuplicateString,
    Commit,
    Suggestion,
    Remove,
}

impl ChangeAction {
    /// Actions that changed translated content
    pub fn is_content(self) -> bool {
        matches!(
            self,
            ChangeAction::Change | ChangeAction::New | ChangeAction::Upload
        )
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeAction::Update => "Resource update",
            ChangeAction::Upload => "Translation uploaded",
            ChangeAction::Change => "Translation changed",
            ChangeAction::New => "New translation",
            ChangeAction::DuplicateString => "Duplicate string",
            ChangeAction::Commit => "Committed changes",
            ChangeAction::Suggestion => "Suggestion added",
            ChangeAction::Remove => "Removed translation",
        };
        f.write_str(name)
    }
}

/// Append-only history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub action: ChangeAction,
    pub translation: Option<TranslationId>,
    pub unit: Option<UnitId>,
    pub user: Option<String>,
    pub author: Option<String>,
    pub target: String,
}

impl Change {
    pub fn new(action: ChangeAction, translation: Option<&TranslationId>) -> Self {
        Self {
            id: 0,
            timestamp: Utc::now(),
            action,
            translation: translation.cloned(),
            unit: None,
            user: None,
            author: None,
            target: String::new(),
        }
    }

    pub fn with_unit(mut self, unit: UnitId) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Set both the acting user and the author
    pub fn by(mut self, user: Option<&str>) -> Self {
        self.user = user.map(str::to_string);
        self.author = self.user.clone();
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }
}

/// Proposed translation waiting for review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: u64,
    pub unit: UnitId,
    pub translation: TranslationId,
    pub target: Vec<String>,
    pub user: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Persistence contract of the unit database
pub trait UnitStore: Send + Sync {
    /// Create or update the row matching `unit` by (context, source)
    fn update_from_unit(
        &self,
        translation: &TranslationId,
        unit: &StoreUnit,
        position: usize,
    ) -> UnitUpdate;

    fn get(&self, id: UnitId) -> Option<Unit>;

    /// Identity lookup
    fn find(&self, translation: &TranslationId, key: &UnitKey) -> Option<Unit>;

    /// Units of a translation by position
    fn units(&self, translation: &TranslationId) -> Vec<Unit>;

    fn pending_units(&self, translation: &TranslationId) -> Vec<Unit>;

    fn has_pending(&self, translation: &TranslationId) -> bool {
        !self.pending_units(translation).is_empty()
    }

    /// Persist a modified row
    fn save(&self, unit: &Unit);

    /// Rows of `translation` whose id is not in `keep`
    fn stale_units(&self, translation: &TranslationId, keep: &HashSet<UnitId>) -> Vec<UnitId>;

    fn delete_units(&self, ids: &[UnitId]);

    /// Drop every row of a translation, returning how many were removed
    fn delete_translation(&self, translation: &TranslationId) -> usize;

    /// Aggregate counters; `None` when the translation has no units
    fn aggregate(&self, translation: &TranslationId) -> Option<UnitAggregate>;

    /// Units of `translation` failing the given check
    fn count_failing(&self, translation: &TranslationId, check: &str) -> usize;

    /// Units with the same identity in other components of the same
    /// project and language
    fn propagation_targets(&self, unit: &Unit) -> Vec<Unit>;

    fn add_change(&self, change: Change) -> Change;

    /// Insert several history rows in one write
    fn add_changes(&self, changes: Vec<Change>);

    /// History of a translation, newest first
    fn changes(&self, translation: &TranslationId) -> Vec<Change>;

    fn last_content_change(&self, translation: &TranslationId) -> Option<Change> {
        self.changes(translation)
            .into_iter()
            .find(|c| c.action.is_content())
    }

    /// Store a suggestion and flag its unit
    fn add_suggestion(&self, suggestion: Suggestion) -> Suggestion;

    fn suggestions(&self, unit: UnitId) -> Vec<Suggestion>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_store_unit_sets_derived_fields() {
        let mut store_unit = StoreUnit::new(Some("menu"), "Open file", "Open file");
        store_unit.translator_comment = "verb".to_string();
        store_unit.occurrences = vec![("a.c".to_string(), "1".to_string())];
        let mut unit = Unit::default();
        unit.apply_store_unit(&store_unit, 3);
        assert_eq!(unit.position, 3);
        assert_eq!(unit.num_words, 2);
        assert!(unit.translated);
        assert!(unit.has_comment);
        assert_eq!(unit.failing_checks, vec!["same"]);
        assert_eq!(unit.location, "a.c:1");
    }

    #[test]
    fn test_pending_unit_keeps_database_target() {
        let mut unit = Unit {
            target: vec!["Öffnen".to_string()],
            translated: true,
            pending: true,
            ..Default::default()
        };
        unit.apply_store_unit(&StoreUnit::new(None, "Open", ""), 1);
        assert_eq!(unit.target_text(), "Öffnen");
        assert!(unit.translated);
    }

    #[test]
    fn test_to_store_unit_plural() {
        let unit = Unit {
            source: vec!["%d file".to_string(), "%d files".to_string()],
            target: vec!["%d Datei".to_string(), "%d Dateien".to_string()],
            flags: "c-format".to_string(),
            ..Default::default()
        };
        let store_unit = unit.to_store_unit();
        assert_eq!(store_unit.source_plural.as_deref(), Some("%d files"));
        assert_eq!(store_unit.context, None);
        assert_eq!(store_unit.flags, vec!["c-format"]);
    }

    #[test]
    fn test_full_slug() {
        let id = TranslationId::new("demo", "app", "de");
        assert_eq!(id.full_slug(), "demo__app__de");
        assert_eq!(id.to_string(), "demo/app/de");
    }
}
