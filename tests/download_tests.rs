//! Download surface tests: single files, zip bundles, workbooks

mod common;

use std::io::Cursor;

use common::{component, po, write, Fixture, BASIC_ENTRIES};
use pretty_assertions::assert_eq;
use transync::error::TransyncError;
use transync::spreadsheet::{SpreadsheetImporter, DATA_SHEET};
use transync::translation::download::{XLSX_MIMETYPE, ZIP_MIMETYPE};

fn two_languages() -> Fixture {
    let fr = po("msgid \"Hello\"\nmsgstr \"Bonjour\"\n")
        .replace("Language: de", "Language: fr")
        .replace("plural=(n != 1)", "plural=(n > 1)");
    Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES)), ("po/fr.po", &fr)])
}

fn zip_names(data: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(data.to_vec())).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

// ═══════════════════════════════════════════════════════════════════════════
// SINGLE TRANSLATION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_native_download_serves_repository_file() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();

    let file = workspace.download("demo", "app", "de", None).unwrap();
    assert_eq!(file.filename, "demo-app-de.po");
    assert_eq!(String::from_utf8(file.data).unwrap(), fixture.read("po/de.po"));
}

#[test]
fn test_json_download_is_built_from_units() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();

    let file = workspace.download("demo", "app", "de", Some("json")).unwrap();
    assert_eq!(file.filename, "demo-app-de.json");

    let document: serde_json::Value = serde_json::from_slice(&file.data).unwrap();
    let units = document["units"].as_array().unwrap();
    assert_eq!(units.len(), 3);
    assert_eq!(units[0]["source"], "Hello");
    assert_eq!(units[0]["target"][0], "Hallo");
    assert_eq!(document["header"]["Language"], "de");
}

#[test]
fn test_workbook_download() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();

    let file = workspace.download("demo", "app", "de", Some("xlsx")).unwrap();
    assert_eq!(file.filename, "demo-app-de.xlsx");
    assert_eq!(file.content_type, XLSX_MIMETYPE);

    let path = fixture.dir.path().join("download.xlsx");
    std::fs::write(&path, &file.data).unwrap();
    let (imported, _) = SpreadsheetImporter::new(&path).import(false, None).unwrap();
    assert_eq!(imported.units.len(), 3);
    assert_eq!(imported.units[0].source, "Hello");
}

#[test]
fn test_unknown_format_is_not_found() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();

    let err = workspace.download("demo", "app", "de", Some("docx")).unwrap_err();
    assert!(matches!(err, TransyncError::NotFound(ref m) if m == "File format not supported"));
}

#[test]
fn test_workbook_download_requires_po() {
    let fixture = Fixture::new(&[]);
    write(
        &fixture.repo,
        "json/de.json",
        r#"{"header": {"Language": "de"}, "units": [{"source": "Hello", "target": ["Hallo"]}]}"#,
    );
    let mut settings = fixture.settings.clone();
    let mut config = component("demo", "app", &fixture.repo);
    config.filemask = "json/*.json".to_string();
    config.file_format = "json".to_string();
    settings.components = vec![config];
    let mut workspace = transync::Workspace::open(&settings).unwrap();
    workspace.sync_all(false).unwrap();

    let err = workspace.download("demo", "app", "de", Some("xlsx")).unwrap_err();
    assert!(matches!(err, TransyncError::FormatNotSupported(_)));
}

// ═══════════════════════════════════════════════════════════════════════════
// MULTI-FILE DOWNLOADS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_component_zip() {
    let fixture = two_languages();
    let mut workspace = fixture.workspace();

    let file = workspace
        .download_many("demo", Some("app"), None, None)
        .unwrap();
    assert_eq!(file.filename, "demo-app-all.zip");
    assert_eq!(file.content_type, ZIP_MIMETYPE);
    assert_eq!(
        zip_names(&file.data),
        vec!["demo-app-de.po", "demo-app-fr.po"]
    );
}

#[test]
fn test_project_zip_nests_components() {
    let fixture = two_languages();
    let mut workspace = fixture.workspace();

    let file = workspace.download_many("demo", None, None, None).unwrap();
    assert_eq!(file.filename, "demo-all.zip");
    assert_eq!(
        zip_names(&file.data),
        vec!["app/demo-app-de.po", "app/demo-app-fr.po"]
    );

    let file = workspace
        .download_many("demo", None, Some("fr"), None)
        .unwrap();
    assert_eq!(file.filename, "demo-fr-all.zip");
    assert_eq!(zip_names(&file.data), vec!["app/demo-app-fr.po"]);
}

#[test]
fn test_single_workbook_has_a_column_per_language() {
    let fixture = two_languages();
    let mut workspace = fixture.workspace();

    let file = workspace
        .download_many("demo", Some("app"), None, Some("singlexlsx"))
        .unwrap();
    assert_eq!(file.filename, "demo-app-all.xlsx");
    assert_eq!(file.content_type, XLSX_MIMETYPE);

    let path = fixture.dir.path().join("all.xlsx");
    std::fs::write(&path, &file.data).unwrap();
    let book = SpreadsheetImporter::new(&path).read_book().unwrap();
    let header = book.sheet(DATA_SHEET).unwrap().read_header_row(0);
    assert!(header.contains_key("de"));
    assert!(header.contains_key("fr"));
    assert!(!header.contains_key("Translation"));
}

#[test]
fn test_nothing_to_download() {
    let fixture = Fixture::new(&[("po/de.po", &po(BASIC_ENTRIES))]);
    let mut workspace = fixture.workspace();

    let err = workspace
        .download_many("other", None, None, None)
        .unwrap_err();
    assert!(matches!(err, TransyncError::NotFound(_)));
}
