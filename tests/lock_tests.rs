//! Editor lock tests

mod common;

use chrono::{Duration, Utc};
use common::{po, Fixture, BASIC_ENTRIES};
use pretty_assertions::assert_eq;
use transync::error::TransyncError;

fn first_unit(workspace: &mut transync::Workspace) -> u64 {
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    translation.services().units.units(&translation.id)[1].id
}

#[test]
fn test_explicit_lock_blocks_other_users() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();
    let unit = first_unit(&mut workspace);
    let now = Utc::now();

    let lock = workspace.lock("demo", "app", "de", "alice", now).unwrap();
    assert_eq!(lock.user, "alice");
    assert_eq!(lock.expires, now + Duration::seconds(600));

    let err = workspace
        .translate("demo", "app", "de", "bob", unit, vec!["Welt".to_string()], false, now)
        .unwrap_err();
    assert!(matches!(err, TransyncError::Locked(ref user) if user == "alice"));

    let outcome = workspace
        .translate("demo", "app", "de", "alice", unit, vec!["Welt".to_string()], false, now)
        .unwrap();
    assert!(outcome.saved);
}

#[test]
fn test_expired_lock_is_released() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();
    let now = Utc::now();
    workspace.lock("demo", "app", "de", "alice", now).unwrap();

    let later = now + Duration::minutes(11);
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    assert!(!translation.is_user_locked(Some("bob"), later));
    assert!(translation.lock.is_none());
}

#[test]
fn test_edit_never_shortens_explicit_lock() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();
    let unit = first_unit(&mut workspace);
    let now = Utc::now();
    workspace.lock("demo", "app", "de", "alice", now).unwrap();

    workspace
        .translate("demo", "app", "de", "alice", unit, vec!["Welt".to_string()], false, now)
        .unwrap();

    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    let lock = translation.lock.clone().unwrap();
    assert_eq!(lock.expires, now + Duration::seconds(600));
}

#[test]
fn test_edit_takes_automatic_lock() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();
    let unit = first_unit(&mut workspace);
    let now = Utc::now();

    workspace
        .translate("demo", "app", "de", "alice", unit, vec!["Welt".to_string()], false, now)
        .unwrap();

    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    let lock = translation.lock.clone().unwrap();
    assert_eq!(lock.user, "alice");
    assert_eq!(lock.expires, now + Duration::seconds(60));
    assert_eq!(translation.statistics().locked_by.as_deref(), Some("alice"));
}

#[test]
fn test_auto_lock_disabled() {
    let mut fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    fixture.settings.auto_lock = false;
    let mut workspace = fixture.workspace();
    let unit = first_unit(&mut workspace);

    workspace
        .translate("demo", "app", "de", "alice", unit, vec!["Welt".to_string()], false, Utc::now())
        .unwrap();

    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    assert!(translation.lock.is_none());
}

#[test]
fn test_unlock_only_by_holder() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();
    let now = Utc::now();
    workspace.lock("demo", "app", "de", "alice", now).unwrap();

    let err = workspace.unlock("demo", "app", "de", "bob", now).unwrap_err();
    assert!(matches!(err, TransyncError::Locked(_)));

    workspace.unlock("demo", "app", "de", "alice", now).unwrap();
    let translation = workspace.translation_mut("demo", "app", "de").unwrap();
    assert!(translation.lock.is_none());
}
