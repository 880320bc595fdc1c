//! Synchronizer tests: file → unit database

mod common;

use std::path::PathBuf;

use common::{po, Fixture, BASIC_ENTRIES};
use pretty_assertions::assert_eq;
use transync::cache::{check_count_key, check_count_keys, CountsCache};
use transync::units::{ChangeAction, TranslationId};
use transync::workspace::discover_files;

// ═══════════════════════════════════════════════════════════════════════════
// FIRST PASS AND IDEMPOTENCE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_initial_sync_creates_units_and_stats() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();

    assert_eq!(translation.stats.total, 3);
    assert_eq!(translation.stats.translated, 1);
    assert_eq!(translation.stats.fuzzy, 1);
    assert_eq!(translation.stats.total_words, 4);
    assert_eq!(translation.translated_percent(), 33.3);
    assert!(!translation.revision.is_empty());

    let units = translation.services().units.units(&translation.id);
    let sources: Vec<&str> = units.iter().map(|u| u.source_text()).collect();
    assert_eq!(sources, vec!["Hello", "World", "Open file"]);
    let positions: Vec<usize> = units.iter().map(|u| u.position).collect();
    assert_eq!(positions, vec![1, 2, 3]);
}

#[test]
fn test_unchanged_file_is_skipped() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    let changes_before = translation.services().units.changes(&translation.id).len();

    assert!(!translation.check_sync(false, None, None).unwrap());
    assert!(workspace.sync_all(false).unwrap().iter().all(|r| !r.synced));

    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    let changes = translation.services().units.changes(&translation.id);
    assert_eq!(changes.len(), changes_before);
    assert_eq!(changes_before, 1);
    assert_eq!(changes[0].action, ChangeAction::Update);
}

#[test]
fn test_forced_sync_keeps_unit_identity() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    let before = translation.services().units.units(&translation.id);
    let stats_before = translation.stats;

    assert!(translation.check_sync(true, None, None).unwrap());

    let after = translation.services().units.units(&translation.id);
    assert_eq!(before, after);
    assert_eq!(translation.stats, stats_before);
}

// ═══════════════════════════════════════════════════════════════════════════
// FILE CHANGES
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_removed_strings_are_deleted() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();

    fixture.write("po/de.po", &po("msgid \"Hello\"\nmsgstr \"Hallo\"\n"));
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    assert!(translation.check_sync(false, None, None).unwrap());

    let units = translation.services().units.units(&translation.id);
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].source_text(), "Hello");
    assert_eq!(translation.stats.total, 1);
    assert_eq!(translation.translated_percent(), 100.0);
}

#[test]
fn test_changed_target_updates_unit() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();

    fixture.write(
        "po/de.po",
        &po(&BASIC_ENTRIES.replace("msgstr \"\"", "msgstr \"Welt\"")),
    );
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    translation.check_sync(false, None, None).unwrap();

    assert_eq!(translation.stats.translated, 2);
}

#[test]
fn test_duplicate_strings_keep_first_occurrence() {
    let entries = "msgid \"Hello\"\nmsgstr \"Hallo\"\n\nmsgid \"Hello\"\nmsgstr \"Servus\"\n";
    let fixture = Fixture::new(&[("po/de.po", &po(entries))]);
    let mut workspace = fixture.workspace();
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();

    let units = translation.services().units.units(&translation.id);
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].target_text(), "Hallo");

    let changes = translation.services().units.changes(&translation.id);
    assert!(changes
        .iter()
        .any(|c| c.action == ChangeAction::DuplicateString && c.unit == Some(units[0].id)));
}

#[test]
fn test_upload_action_records_history_for_modified_units() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();

    fixture.write(
        "po/de.po",
        &po(&BASIC_ENTRIES.replace("msgstr \"Hallo\"", "msgstr \"Servus\"")),
    );
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    translation
        .check_sync(false, Some("alice"), Some(ChangeAction::Upload))
        .unwrap();

    let changes = translation.services().units.changes(&translation.id);
    let unit_uploads: Vec<_> = changes
        .iter()
        .filter(|c| c.action == ChangeAction::Upload && c.unit.is_some())
        .collect();
    assert_eq!(unit_uploads.len(), 1);
    assert_eq!(unit_uploads[0].target, "Servus");
    assert_eq!(unit_uploads[0].author.as_deref(), Some("alice"));

    // summary entry for the whole pass comes last
    assert_eq!(changes[0].action, ChangeAction::Upload);
    assert_eq!(changes[0].unit, None);
}

#[test]
fn test_pending_edit_survives_resync() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    let world = translation
        .services()
        .units
        .units(&translation.id)
        .into_iter()
        .find(|u| u.source_text() == "World")
        .unwrap();

    translation
        .translate("alice", world.id, vec!["Welt".to_string()], false, chrono::Utc::now())
        .unwrap();
    translation.check_sync(true, None, None).unwrap();

    let world = translation.services().units.get(world.id).unwrap();
    assert!(world.pending);
    assert_eq!(world.target_text(), "Welt");
    assert!(world.translated);
}

// ═══════════════════════════════════════════════════════════════════════════
// WORKSPACE DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_discovery_reports_parse_errors() {
    let fixture = Fixture::new(&[
        ("po/de.po", &po(BASIC_ENTRIES)),
        ("po/fr.po", "msgid \"a\"\nmsgstr \"unterminated\n"),
    ]);
    let mut workspace = transync::Workspace::open(&fixture.settings).unwrap();
    let reports = workspace.sync_all(false).unwrap();

    assert_eq!(reports.len(), 2);
    let de = reports.iter().find(|r| r.translation.language == "de").unwrap();
    assert!(de.synced);
    let fr = reports.iter().find(|r| r.translation.language == "fr").unwrap();
    assert!(!fr.synced);
    assert!(fr.error.as_deref().unwrap().contains("po/fr.po"));
}

#[test]
fn test_template_is_not_a_translation() {
    let mut fixture = Fixture::new(&[
        ("po/de.po", &po(BASIC_ENTRIES)),
        ("po/en.po", &po(BASIC_ENTRIES)),
    ]);
    fixture.settings.components[0].template = Some("po/en.po".into());
    let workspace = fixture.workspace();

    let languages: Vec<&str> = workspace
        .translations()
        .iter()
        .map(|t| t.language_code.as_str())
        .collect();
    assert_eq!(languages, vec!["de"]);
}

#[test]
fn test_deleted_file_disables_translation() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();

    std::fs::remove_file(fixture.repo.join("po/de.po")).unwrap();
    workspace.sync_all(false).unwrap();

    assert!(!workspace.translations()[0].enabled);
    assert!(workspace.select_mut("demo", None, None).is_empty());
    assert!(workspace.statistics().is_empty());
}

#[test]
fn test_restored_file_enables_translation() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();

    std::fs::remove_file(fixture.repo.join("po/de.po")).unwrap();
    workspace.sync_all(false).unwrap();
    fixture.write("po/de.po", &po("msgid \"Hello\"\nmsgstr \"Hallo\"\n"));
    let reports = workspace.sync_all(false).unwrap();

    assert!(reports[0].synced);
    assert!(workspace.translations()[0].enabled);
    assert_eq!(workspace.select_mut("demo", None, None).len(), 1);
    let stats = workspace.statistics();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].counts.total, 1);
}

#[test]
fn test_discovery_skips_dot_directories() {
    let fixture = Fixture::new(&[
        ("po/de.po", &po(BASIC_ENTRIES)),
        ("po/.backup/fr.po", &po(BASIC_ENTRIES)),
        (".git/po/it.po", &po(BASIC_ENTRIES)),
        ("po/nested/es.po", &po(BASIC_ENTRIES)),
    ]);

    let files = discover_files(&fixture.settings.components[0]).unwrap();
    assert_eq!(files, vec![("de".to_string(), PathBuf::from("po/de.po"))]);
}

// ═══════════════════════════════════════════════════════════════════════════
// NOTIFICATIONS AND COUNTS CACHE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_new_strings_are_notified() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let (mut workspace, observed) = fixture.observed_workspace();
    assert_eq!(observed.notifier.events(), vec!["new_string demo/app/de"]);

    // a changed translation of an already translated string is not new
    fixture.write("po/de.po", &po(&BASIC_ENTRIES.replace("\"Hallo\"", "\"Hallo!\"")));
    workspace.sync_all(false).unwrap();
    assert_eq!(observed.notifier.events().len(), 1);

    fixture.write(
        "po/de.po",
        &po(&format!("{}\nmsgid \"Close\"\nmsgstr \"\"\n", BASIC_ENTRIES)),
    );
    workspace.sync_all(false).unwrap();
    assert_eq!(
        observed.notifier.events(),
        vec!["new_string demo/app/de", "new_string demo/app/de"]
    );
}

#[test]
fn test_stale_units_invalidate_check_counts() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let (mut workspace, observed) = fixture.observed_workspace();
    let id = TranslationId::new("demo", "app", "de");
    let key = check_count_key(&id, "same");

    observed.cache.set(&key, 7);
    fixture.write("po/de.po", &po(&BASIC_ENTRIES.replace("\"Hallo\"", "\"Hallo!\"")));
    workspace.sync_all(false).unwrap();
    assert_eq!(observed.cache.get(&key), Some(7));

    fixture.write("po/de.po", &po("msgid \"Hello\"\nmsgstr \"Hallo\"\n"));
    workspace.sync_all(false).unwrap();
    for key in check_count_keys(&id) {
        assert_eq!(observed.cache.get(&key), None);
    }
}
