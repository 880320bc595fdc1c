//! In-process unit database

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use crate::format::{StoreUnit, UnitKey};

use super::{
    Change, Suggestion, TranslationId, Unit, UnitAggregate, UnitId, UnitStore, UnitUpdate,
};

#[derive(Debug, Default)]
struct Tables {
    next_id: u64,
    units: BTreeMap<UnitId, Unit>,
    /// Newest last
    changes: Vec<Change>,
    suggestions: Vec<Suggestion>,
}

impl Tables {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn find(&self, translation: &TranslationId, key: &UnitKey) -> Option<&Unit> {
        self.units
            .values()
            .find(|u| &u.translation == translation && &u.key() == key)
    }
}

/// Thread-safe [`UnitStore`] kept in memory
#[derive(Debug, Default)]
pub struct MemoryUnitStore {
    tables: Mutex<Tables>,
}

impl MemoryUnitStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| {
            warn!("unit store mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Every stored change, oldest first
    pub fn all_changes(&self) -> Vec<Change> {
        self.tables().changes.clone()
    }
}

impl UnitStore for MemoryUnitStore {
    fn update_from_unit(
        &self,
        translation: &TranslationId,
        unit: &StoreUnit,
        position: usize,
    ) -> UnitUpdate {
        let mut tables = self.tables();
        let existing = tables.find(translation, &unit.key()).cloned();
        let is_new = existing.is_none();

        let old_unit = existing.unwrap_or_else(|| Unit {
            translation: translation.clone(),
            ..Default::default()
        });
        let mut updated = old_unit.clone();
        if is_new {
            updated.id = tables.allocate_id();
        }
        updated.apply_store_unit(unit, position);

        let is_modified = is_new || updated != old_unit;
        if is_modified {
            tables.units.insert(updated.id, updated.clone());
        }

        UnitUpdate {
            unit: updated,
            is_new,
            is_modified,
            old_unit,
        }
    }

    fn get(&self, id: UnitId) -> Option<Unit> {
        self.tables().units.get(&id).cloned()
    }

    fn find(&self, translation: &TranslationId, key: &UnitKey) -> Option<Unit> {
        self.tables().find(translation, key).cloned()
    }

    fn units(&self, translation: &TranslationId) -> Vec<Unit> {
        let mut units: Vec<Unit> = self
            .tables()
            .units
            .values()
            .filter(|u| &u.translation == translation)
            .cloned()
            .collect();
        units.sort_by_key(|u| u.position);
        units
    }

    fn pending_units(&self, translation: &TranslationId) -> Vec<Unit> {
        self.units(translation)
            .into_iter()
            .filter(|u| u.pending)
            .collect()
    }

    fn save(&self, unit: &Unit) {
        self.tables().units.insert(unit.id, unit.clone());
    }

    fn stale_units(&self, translation: &TranslationId, keep: &HashSet<UnitId>) -> Vec<UnitId> {
        self.tables()
            .units
            .values()
            .filter(|u| &u.translation == translation && !keep.contains(&u.id))
            .map(|u| u.id)
            .collect()
    }

    fn delete_units(&self, ids: &[UnitId]) {
        let mut tables = self.tables();
        for id in ids {
            tables.units.remove(id);
        }
        tables.suggestions.retain(|s| !ids.contains(&s.unit));
    }

    fn delete_translation(&self, translation: &TranslationId) -> usize {
        let mut tables = self.tables();
        let before = tables.units.len();
        tables.units.retain(|_, u| &u.translation != translation);
        tables.suggestions.retain(|s| &s.translation != translation);
        before - tables.units.len()
    }

    fn aggregate(&self, translation: &TranslationId) -> Option<UnitAggregate> {
        let tables = self.tables();
        let mut found = false;
        let mut agg = UnitAggregate::default();
        for unit in tables.units.values().filter(|u| &u.translation == translation) {
            found = true;
            let words = unit.num_words;
            agg.total += 1;
            agg.total_words += words;
            if unit.translated {
                agg.translated += 1;
                agg.translated_words += words;
            }
            if unit.fuzzy {
                agg.fuzzy += 1;
                agg.fuzzy_words += words;
            }
            if unit.has_failing_check {
                agg.failing_checks += 1;
                agg.failing_checks_words += words;
            }
            if unit.has_suggestion {
                agg.have_suggestion += 1;
            }
            if unit.has_comment {
                agg.have_comment += 1;
            }
        }
        found.then_some(agg)
    }

    fn count_failing(&self, translation: &TranslationId, check: &str) -> usize {
        self.tables()
            .units
            .values()
            .filter(|u| &u.translation == translation)
            .filter(|u| u.failing_checks.iter().any(|c| c == check))
            .count()
    }

    fn propagation_targets(&self, unit: &Unit) -> Vec<Unit> {
        let key = unit.key();
        self.tables()
            .units
            .values()
            .filter(|u| {
                u.id != unit.id
                    && u.translation.project == unit.translation.project
                    && u.translation.language == unit.translation.language
                    && u.translation.component != unit.translation.component
                    && u.key() == key
            })
            .cloned()
            .collect()
    }

    fn add_change(&self, mut change: Change) -> Change {
        let mut tables = self.tables();
        change.id = tables.allocate_id();
        tables.changes.push(change.clone());
        change
    }

    fn add_changes(&self, changes: Vec<Change>) {
        let mut tables = self.tables();
        for mut change in changes {
            change.id = tables.allocate_id();
            tables.changes.push(change);
        }
    }

    fn changes(&self, translation: &TranslationId) -> Vec<Change> {
        self.tables()
            .changes
            .iter()
            .rev()
            .filter(|c| c.translation.as_ref() == Some(translation))
            .cloned()
            .collect()
    }

    fn add_suggestion(&self, mut suggestion: Suggestion) -> Suggestion {
        let mut tables = self.tables();
        suggestion.id = tables.allocate_id();
        if let Some(unit) = tables.units.get_mut(&suggestion.unit) {
            unit.has_suggestion = true;
        }
        tables.suggestions.push(suggestion.clone());
        suggestion
    }

    fn suggestions(&self, unit: UnitId) -> Vec<Suggestion> {
        self.tables()
            .suggestions
            .iter()
            .filter(|s| s.unit == unit)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{ChangeAction, UnitStore};
    use chrono::Utc;

    fn tid(lang: &str) -> TranslationId {
        TranslationId::new("demo", "app", lang)
    }

    #[test]
    fn test_update_from_unit_create_then_unchanged() {
        let store = MemoryUnitStore::new();
        let unit = StoreUnit::new(None, "Open", "Öffnen");
        let first = store.update_from_unit(&tid("de"), &unit, 1);
        assert!(first.is_new);
        assert!(first.is_modified);
        assert!(!first.old_unit.translated);

        let second = store.update_from_unit(&tid("de"), &unit, 1);
        assert!(!second.is_new);
        assert!(!second.is_modified);
        assert_eq!(second.unit.id, first.unit.id);
    }

    #[test]
    fn test_update_detects_target_change() {
        let store = MemoryUnitStore::new();
        store.update_from_unit(&tid("de"), &StoreUnit::new(None, "Open", "Öffnen"), 1);
        let update =
            store.update_from_unit(&tid("de"), &StoreUnit::new(None, "Open", "Aufmachen"), 1);
        assert!(update.is_modified);
        assert_eq!(update.old_unit.target_text(), "Öffnen");
        assert_eq!(update.unit.target_text(), "Aufmachen");
    }

    #[test]
    fn test_aggregate_none_without_units() {
        let store = MemoryUnitStore::new();
        assert_eq!(store.aggregate(&tid("de")), None);
        store.update_from_unit(&tid("de"), &StoreUnit::new(None, "Open file", "Datei öffnen"), 1);
        store.update_from_unit(&tid("de"), &StoreUnit::new(None, "Close", ""), 2);
        let agg = store.aggregate(&tid("de")).unwrap();
        assert_eq!(agg.total, 2);
        assert_eq!(agg.total_words, 3);
        assert_eq!(agg.translated, 1);
        assert_eq!(agg.translated_words, 2);
    }

    #[test]
    fn test_stale_units_and_delete() {
        let store = MemoryUnitStore::new();
        let a = store.update_from_unit(&tid("de"), &StoreUnit::new(None, "a", ""), 1);
        store.update_from_unit(&tid("de"), &StoreUnit::new(None, "b", ""), 2);
        let keep: HashSet<UnitId> = [a.unit.id].into_iter().collect();
        let stale = store.stale_units(&tid("de"), &keep);
        assert_eq!(stale.len(), 1);
        store.delete_units(&stale);
        assert_eq!(store.units(&tid("de")).len(), 1);
    }

    #[test]
    fn test_suggestion_flags_unit() {
        let store = MemoryUnitStore::new();
        let update = store.update_from_unit(&tid("de"), &StoreUnit::new(None, "a", ""), 1);
        store.add_suggestion(Suggestion {
            id: 0,
            unit: update.unit.id,
            translation: tid("de"),
            target: vec!["A".to_string()],
            user: None,
            timestamp: Utc::now(),
        });
        assert!(store.get(update.unit.id).unwrap().has_suggestion);
        assert_eq!(store.suggestions(update.unit.id).len(), 1);
    }

    #[test]
    fn test_changes_newest_first() {
        let store = MemoryUnitStore::new();
        store.add_change(Change::new(ChangeAction::Update, Some(&tid("de"))));
        store.add_change(Change::new(ChangeAction::New, Some(&tid("de"))).by(Some("jane")));
        store.add_change(Change::new(ChangeAction::Commit, Some(&tid("fr"))));
        let changes = store.changes(&tid("de"));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].action, ChangeAction::New);
        assert_eq!(
            store.last_content_change(&tid("de")).unwrap().author.as_deref(),
            Some("jane")
        );
    }

    #[test]
    fn test_propagation_targets_same_language_other_component() {
        let store = MemoryUnitStore::new();
        let unit = StoreUnit::new(None, "Open", "");
        let source = store.update_from_unit(&tid("de"), &unit, 1).unit;
        store.update_from_unit(&TranslationId::new("demo", "web", "de"), &unit, 1);
        store.update_from_unit(&TranslationId::new("demo", "web", "fr"), &unit, 1);
        store.update_from_unit(&TranslationId::new("other", "web", "de"), &unit, 1);
        let targets = store.propagation_targets(&source);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].translation.component, "web");
    }
}
