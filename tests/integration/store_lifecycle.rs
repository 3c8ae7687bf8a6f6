//! Load, mutate, write and reload a plain document.

use conftree::config::StoreSettings;
use conftree::hooks::Diagnostic;
use conftree::{ConfError, ConfStore, LoadStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;

use crate::integration::{canonical, load, read, write};

#[test]
fn test_write_reproduces_untouched_document() {
    let temp_dir = TempDir::new().unwrap();
    let body = canonical(
        "<app name=\"svc\">\n  <listeners>\n    <listener port=\"80\"/>\n  </listeners>\n  <log>info</log>\n</app>\n",
    );
    let file = write(temp_dir.path(), "app.conf", &body);

    let mut store = load(&file);
    assert_eq!(store.xml_in_mem().unwrap(), body);
    store.write_file().unwrap();
    assert_eq!(read(&file), body);
}

#[test]
fn test_set_string_appends_and_survives_reload() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "app.conf", "<app><opts/></app>");

    let mut store = load(&file);
    let opts = store.get_section(None, "/app/opts").unwrap();
    assert!(store.set_string(opts, "flag", "a"));
    assert!(store.set_string(opts, "flag", "b"));
    assert!(store.set_boolean(opts, "@enabled", true));
    store.write_file().unwrap();

    let store = load(&file);
    let flags = store.get_sections(None, "/app/opts/flag");
    assert_eq!(flags.len(), 2);
    assert_eq!(store.get_string(None, "/app/opts/flag").as_deref(), Some("b"));
    assert_eq!(store.get_boolean(None, "/app/opts/@enabled"), Some(true));
}

#[test]
fn test_parse_failure_retains_document_and_reports() {
    let temp_dir = TempDir::new().unwrap();
    let good = write(temp_dir.path(), "good.conf", "<app><x>1</x></app>");
    let bad = write(temp_dir.path(), "bad.conf", "<app>\n<x>1</y>\n</app>");

    let seen: Arc<Mutex<Vec<Diagnostic>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut store = ConfStore::new(&StoreSettings::default());
    store.set_diagnostic_sink(move |d: &Diagnostic| sink.lock().push(d.clone()));
    store.load(&good).unwrap();
    let generation = store.generation();

    let err = store.load(&bad).unwrap_err();
    assert!(matches!(err, ConfError::Parse { .. }));
    assert_eq!(seen.lock().len(), 1);
    assert_eq!(store.get_int(None, "/app/x"), Some(1));
    assert_eq!(store.generation(), generation);
    assert_eq!(
        store.config_filename(),
        Some(dunce::canonicalize(&good).unwrap().as_path())
    );
}

#[test]
fn test_stale_ids_after_reload() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "app.conf", "<app><x>1</x></app>");

    let mut store = load(&file);
    let x = store.get_section(None, "/app/x").unwrap();
    store.load(&file).unwrap();

    assert!(!store.set_string(x, "y", "2"));
    assert_eq!(store.get_string(Some(x), "."), None);
    assert!(store.node_path(x).is_none());
    assert!(store.remove_section(x).is_err());
}

#[test]
fn test_missing_include_gives_partial_status() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(
        temp_dir.path(),
        "app.conf",
        r#"<app><include file="nope.conf"/><x>1</x></app>"#,
    );
    let mut store = ConfStore::new(&StoreSettings::default());
    match store.load(&file).unwrap() {
        LoadStatus::Partial { failures } => {
            assert_eq!(failures, vec![temp_dir.path().join("nope.conf")])
        }
        LoadStatus::Complete => panic!("expected a partial load"),
    }
    assert_eq!(store.get_int(None, "/app/x"), Some(1));
}

#[test]
fn test_default_fallbacks() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "app.conf", "<conftree><modules/></conftree>");
    let store = load(&file);
    assert_eq!(
        store.get_string(None, "/conftree/modules/@directory").as_deref(),
        Some("/usr/local/lib/conftree")
    );
    assert!(store
        .get_string(None, "/conftree/eventer/@implementation")
        .is_some());
    assert_eq!(store.get_string(None, "/conftree/other"), None);
}

#[test]
fn test_remove_section_is_written() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "app.conf", "<app><a/><b/></app>");
    let mut store = load(&file);
    let a = store.get_section(None, "/app/a").unwrap();
    store.remove_section(a).unwrap();
    store.write_file().unwrap();
    assert_eq!(read(&file), canonical("<app>\n  <b/>\n</app>\n"));
}
