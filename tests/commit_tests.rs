//! Commit coordinator tests: pending edits → file → repository

mod common;

use chrono::{Duration, Utc};
use common::{po, Fixture, BASIC_ENTRIES};
use pretty_assertions::assert_eq;
use transync::translation::CommitOptions;
use transync::units::{ChangeAction, UnitId};
use transync::Translation;

fn unit_id(translation: &Translation, source: &str) -> UnitId {
    translation
        .services()
        .units
        .units(&translation.id)
        .into_iter()
        .find(|u| u.source_text() == source)
        .map(|u| u.id)
        .unwrap()
}

fn lazy_fixture() -> Fixture {
    let mut fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    fixture.settings.lazy_commits = true;
    fixture
}

// ═══════════════════════════════════════════════════════════════════════════
// LAZY COMMITS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_lazy_commit_is_delayed_until_forced() {
    let fixture = lazy_fixture();
    let mut workspace = fixture.workspace();
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    let world = unit_id(translation, "World");

    translation
        .translate("alice", world, vec!["Welt".to_string()], false, Utc::now())
        .unwrap();
    let committed = translation
        .git_commit("alice", Utc::now(), CommitOptions::default())
        .unwrap();
    assert!(!committed);
    assert!(translation.services().units.has_pending(&translation.id));
    assert!(!fixture.read("po/de.po").contains("Welt"));

    let committed = translation
        .git_commit("alice", Utc::now(), CommitOptions::forced())
        .unwrap();
    assert!(committed);
    assert!(!translation.services().units.has_pending(&translation.id));
    assert!(fixture.read("po/de.po").contains("msgstr \"Welt\""));
}

#[test]
fn test_nothing_to_commit() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();

    let committed = translation
        .git_commit("alice", Utc::now(), CommitOptions::forced())
        .unwrap();
    assert!(!committed);
}

#[test]
fn test_force_new_commit_leaves_pending_units() {
    let fixture = lazy_fixture();
    let mut workspace = fixture.workspace();
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    let world = unit_id(translation, "World");
    translation
        .translate("alice", world, vec!["Welt".to_string()], false, Utc::now())
        .unwrap();

    let options = CommitOptions {
        force_new: true,
        ..CommitOptions::forced()
    };
    let committed = translation.git_commit("alice", Utc::now(), options).unwrap();
    assert!(committed);
    assert!(translation.services().units.has_pending(&translation.id));
    assert!(!fixture.read("po/de.po").contains("Welt"));
}

#[test]
fn test_edit_by_other_author_commits_previous_edits() {
    let fixture = lazy_fixture();
    let mut workspace = fixture.workspace();
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    let world = unit_id(translation, "World");
    let hello = unit_id(translation, "Hello");
    let now = Utc::now();

    translation
        .translate("alice", world, vec!["Welt".to_string()], false, now)
        .unwrap();
    // alice's automatic lock has expired by then
    translation
        .translate("bob", hello, vec!["Servus".to_string()], false, now + Duration::minutes(5))
        .unwrap();

    let content = fixture.read("po/de.po");
    assert!(content.contains("msgstr \"Welt\""));
    assert!(content.contains("Last-Translator: alice"));
    assert!(content.contains("msgstr \"Hallo\""));

    let pending = translation.services().units.pending_units(&translation.id);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, hello);
    assert_eq!(translation.get_last_author().as_deref(), Some("bob"));
}

#[test]
fn test_commit_all_uses_last_author() {
    let fixture = lazy_fixture();
    let mut workspace = fixture.workspace();
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    let world = unit_id(translation, "World");
    translation
        .translate("alice", world, vec!["Welt".to_string()], false, Utc::now())
        .unwrap();

    assert_eq!(workspace.commit_all("fallback").unwrap(), 1);
    assert!(fixture.read("po/de.po").contains("Last-Translator: alice"));
    assert_eq!(workspace.commit_all("fallback").unwrap(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// FILE HEADER
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_update_units_refreshes_header() {
    let fixture = lazy_fixture();
    let mut workspace = fixture.workspace();
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    let world = unit_id(translation, "World");
    translation
        .translate("alice", world, vec!["Welt".to_string()], false, Utc::now())
        .unwrap();

    translation.update_units("alice").unwrap();

    let content = fixture.read("po/de.po");
    assert!(content.contains("Last-Translator: alice"));
    assert!(content.contains("Language-Team: German <http://localhost:8080/projects/demo/app/de/>"));
    assert!(content.contains("PO-Revision-Date: "));
    assert!(content.contains("Project-Id-Version: demo 1.0"));
    assert!(!translation.services().units.has_pending(&translation.id));
    assert_eq!(translation.stats.translated, 2);
}

#[test]
fn test_unchanged_pending_unit_is_cleared_without_write() {
    let fixture = lazy_fixture();
    let mut workspace = fixture.workspace();
    let original = fixture.read("po/de.po");
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    let hello = unit_id(translation, "Hello");

    let units = translation.services().units.clone();
    let mut unit = units.get(hello).unwrap();
    unit.pending = true;
    units.save(&unit);

    translation.update_units("alice").unwrap();
    assert!(!units.has_pending(&translation.id));
    assert_eq!(fixture.read("po/de.po"), original);
}

#[test]
fn test_pending_unit_missing_from_file_is_dropped() {
    let fixture = lazy_fixture();
    let mut workspace = fixture.workspace();
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    let world = unit_id(translation, "World");

    translation
        .translate("alice", world, vec!["Welt".to_string()], false, Utc::now())
        .unwrap();
    // the string vanished from the file before the edit was written back
    let trimmed = po("msgid \"Hello\"\nmsgstr \"Hallo\"\n");
    fixture.write("po/de.po", &trimmed);
    translation.reset_store();

    translation.update_units("alice").unwrap();
    let units = translation.services().units.clone();
    assert!(!units.has_pending(&translation.id));
    assert!(!units.get(world).unwrap().pending);
    assert_eq!(fixture.read("po/de.po"), trimmed);
}

// ═══════════════════════════════════════════════════════════════════════════
// COMMIT MESSAGES
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_commit_message_from_template() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();

    assert_eq!(
        translation.get_commit_message().unwrap(),
        "Translated using Transync (German)\n\nCurrently translated at 33.3% (1 of 3 strings)"
    );
}

#[test]
fn test_commit_message_markers_and_custom_text() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();

    translation.commit_message = "__add__".to_string();
    assert_eq!(
        translation.get_commit_message().unwrap(),
        "Added translation using Transync (German)"
    );
    assert!(translation.commit_message.is_empty());

    translation.commit_message = "Reviewed by the German team".to_string();
    let message = translation.get_commit_message().unwrap();
    assert!(message.ends_with("\n\nReviewed by the German team"));
    assert!(translation.commit_message.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// REMOVAL
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_remove_deletes_file_and_units() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();

    translation.remove("alice").unwrap();

    assert!(!fixture.repo.join("po/de.po").exists());
    assert!(translation.services().units.units(&translation.id).is_empty());
    let changes = translation.services().units.changes(&translation.id);
    assert_eq!(changes[0].action, ChangeAction::Remove);
}
