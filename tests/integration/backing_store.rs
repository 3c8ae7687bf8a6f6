//! Subtrees mirrored into directories, one file per leaf.

use tempfile::TempDir;

use crate::integration::{canonical, entries, load, read, write};

#[test]
fn test_marker_attributes_only_produce_attrs_file() {
    let temp_dir = TempDir::new().unwrap();
    let master = write(
        temp_dir.path(),
        "app.conf",
        r#"<app><db backingstore="db"/></app>"#,
    );

    let mut store = load(&master);
    let db = store.get_section(None, "/app/db").unwrap();
    assert!(store.set_string(db, "@a", "1"));
    store.write_file().unwrap();

    let dir = temp_dir.path().join("db");
    assert_eq!(entries(&dir), vec![".attrs"]);
    assert_eq!(read(&dir.join(".attrs")), canonical("<db a=\"1\"/>\n"));
}

#[test]
fn test_inline_children_move_into_the_store() {
    let temp_dir = TempDir::new().unwrap();
    let master = write(
        temp_dir.path(),
        "app.conf",
        r#"<app><db backingstore="db"><group name="g"><port>80</port></group></db></app>"#,
    );

    let mut store = load(&master);
    store.request_write();
    store.write_file().unwrap();

    assert_eq!(
        read(&master),
        canonical("<app>\n  <db backingstore=\"db\"/>\n</app>\n")
    );
    let dir = temp_dir.path().join("db");
    assert_eq!(entries(&dir), vec!["group#1"]);
    assert_eq!(entries(&dir.join("group#1")), vec![".attrs", "port#2.xml"]);
    assert_eq!(
        read(&dir.join("group#1").join("port#2.xml")),
        canonical("<port>80</port>\n")
    );

    // The live view keeps the content after the flush.
    assert_eq!(store.get_int(None, "/app/db/group/port"), Some(80));
    let store = load(&master);
    assert_eq!(
        store.get_string(None, "/app/db/group/@name").as_deref(),
        Some("g")
    );
    assert_eq!(store.get_int(None, "/app/db/group/port"), Some(80));
}

#[test]
fn test_generation_ids_are_never_reused() {
    let temp_dir = TempDir::new().unwrap();
    let master = write(
        temp_dir.path(),
        "app.conf",
        r#"<app><db backingstore="db"><check>1</check></db></app>"#,
    );
    let dir = temp_dir.path().join("db");

    let mut store = load(&master);
    store.write_file().unwrap();
    assert_eq!(entries(&dir), vec!["check#1.xml"]);

    store.load(&master).unwrap();
    assert_eq!(store.backing().max_generation(), 1);
    let db = store.get_section(None, "/app/db").unwrap();
    assert!(store.set_string(db, "check", "2"));
    store.write_file().unwrap();
    assert_eq!(entries(&dir), vec!["check#1.xml", "check#2.xml"]);

    let first = store.get_section(None, "/app/db/check").unwrap();
    store.remove_section(first).unwrap();
    store.write_file().unwrap();
    assert_eq!(entries(&dir), vec!["check#2.xml"]);

    store.load(&master).unwrap();
    let db = store.get_section(None, "/app/db").unwrap();
    assert!(store.set_string(db, "check", "3"));
    store.write_file().unwrap();
    assert_eq!(entries(&dir), vec!["check#2.xml", "check#3.xml"]);
    assert_eq!(store.backing().max_generation(), 3);
}

#[test]
fn test_deletions_are_drained_once() {
    let temp_dir = TempDir::new().unwrap();
    let master = write(
        temp_dir.path(),
        "app.conf",
        r#"<app><db backingstore="db"><grp><a>1</a><b>2</b></grp></db></app>"#,
    );
    let dir = temp_dir.path().join("db");

    let mut store = load(&master);
    store.write_file().unwrap();
    assert_eq!(entries(&dir), vec!["grp#1"]);

    let grp = store.get_section(None, "/app/db/grp").unwrap();
    store.remove_section(grp).unwrap();
    // Leaves first, then their container.
    assert_eq!(store.backing().pending_len(), 3);

    store.write_file().unwrap();
    assert_eq!(store.backing().pending_len(), 0);
    assert!(entries(&dir).is_empty());
    store.write_file().unwrap();
}

#[test]
fn test_clean_entries_are_not_rewritten() {
    let temp_dir = TempDir::new().unwrap();
    let master = write(
        temp_dir.path(),
        "app.conf",
        r#"<app><db backingstore="db"><a>1</a><b>2</b></db></app>"#,
    );
    let dir = temp_dir.path().join("db");

    let mut store = load(&master);
    store.write_file().unwrap();
    let watermark = store.backing().watermark();
    std::fs::remove_file(dir.join("a#1.xml")).unwrap();
    std::fs::remove_file(dir.join("b#2.xml")).unwrap();

    store.write_file().unwrap();
    assert!(entries(&dir).is_empty());
    assert_eq!(store.backing().watermark(), watermark);

    let b = store.get_section(None, "/app/db/b").unwrap();
    assert!(store.set_string(b, "@touched", "yes"));
    store.write_file().unwrap();
    assert_eq!(entries(&dir), vec!["b#2.xml"]);
    assert!(store.backing().watermark() > watermark);
}

#[test]
fn test_leaf_files_carry_root_namespaces() {
    let temp_dir = TempDir::new().unwrap();
    let master = write(
        temp_dir.path(),
        "app.conf",
        r#"<app xmlns:m="conftree://module/m"><db backingstore="db"><cfg><m:opt>1</m:opt></cfg></db></app>"#,
    );
    let dir = temp_dir.path().join("db");

    let mut store = load(&master);
    store.set_leaf_predicate(|name| name == "cfg");
    let cfg = store.get_section(None, "/app/db/cfg").unwrap();
    assert!(store.set_string(cfg, "plain", "2"));
    store.write_file().unwrap();

    let leaf = read(&dir.join("cfg#1.xml"));
    assert!(leaf.contains("xmlns:m=\"conftree://module/m\""));

    let store = load(&master);
    let cfg = store.get_section(None, "/app/db/cfg").unwrap();
    assert!(store.tree().attr(cfg, "xmlns:m").is_none());
    let ns = store.get_namespaced_hash(None, "/app/db/cfg", "m").unwrap();
    assert_eq!(ns.get("opt").map(String::as_str), Some("1"));
    let plain = store.get_hash(None, "/app/db/cfg");
    assert_eq!(plain.get("plain").map(String::as_str), Some("2"));
}

#[test]
fn test_reload_discards_queued_deletions() {
    let temp_dir = TempDir::new().unwrap();
    let master = write(
        temp_dir.path(),
        "app.conf",
        r#"<app><db backingstore="db"><check>1</check></db></app>"#,
    );
    let dir = temp_dir.path().join("db");

    let mut store = load(&master);
    store.write_file().unwrap();
    assert_eq!(entries(&dir), vec!["check#1.xml"]);

    let check = store.get_section(None, "/app/db/check").unwrap();
    store.remove_section(check).unwrap();
    assert_eq!(store.backing().pending_len(), 1);

    // The unflushed removal goes away with the document it was made on.
    store.load(&master).unwrap();
    assert_eq!(store.backing().pending_len(), 0);
    store.write_file().unwrap();
    assert_eq!(entries(&dir), vec!["check#1.xml"]);

    let store = load(&master);
    assert_eq!(store.get_int(None, "/app/db/check"), Some(1));
}

#[test]
fn test_failed_entry_is_retried_on_next_flush() {
    let temp_dir = TempDir::new().unwrap();
    let master = write(
        temp_dir.path(),
        "app.conf",
        r#"<app><db backingstore="db"><a>1</a></db></app>"#,
    );
    let dir = temp_dir.path().join("db");

    let mut store = load(&master);
    store.write_file().unwrap();
    let leaf = dir.join("a#1.xml");
    assert_eq!(read(&leaf), canonical("<a>1</a>\n"));

    let a = store.get_section(None, "/app/db/a").unwrap();
    assert!(store.set_string(a, "@x", "1"));

    // A directory in the leaf's place makes the rename fail.
    std::fs::remove_file(&leaf).unwrap();
    std::fs::create_dir(&leaf).unwrap();
    assert!(store.write_file().is_err());

    std::fs::remove_dir(&leaf).unwrap();
    store.write_file().unwrap();
    assert_eq!(read(&leaf), canonical("<a x=\"1\">1</a>\n"));
}
