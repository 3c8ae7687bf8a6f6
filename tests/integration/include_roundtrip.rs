//! Includes are merged into the live view and written back to their own files.

use tempfile::TempDir;

use crate::integration::{canonical, load, read, write};

#[test]
fn test_undo_serialize_redo_reproduces_every_file() {
    let temp_dir = TempDir::new().unwrap();
    let master_body = canonical(
        "<app>\n  <include file=\"doc.conf\"/>\n  <include file=\"snip.conf\" snippet=\"true\"/>\n</app>\n",
    );
    let doc_body = canonical("<doc>\n  <a>1</a>\n</doc>\n");
    let snip_body = "<c>2</c>\n<d/>\n";
    let master = write(temp_dir.path(), "app.conf", &master_body);
    let doc = write(temp_dir.path(), "doc.conf", &doc_body);
    let snip = write(temp_dir.path(), "snip.conf", snip_body);

    let mut store = load(&master);
    assert_eq!(store.get_int(None, "/app/include/a"), Some(1));
    assert_eq!(store.get_int(None, "/app/include/c"), Some(2));

    assert_eq!(store.xml_in_mem().unwrap(), master_body);
    // The merged view is back after serializing.
    assert!(store.includes().iter().all(|r| r.is_spliced()));
    assert_eq!(store.get_int(None, "/app/include/a"), Some(1));

    store.write_file().unwrap();
    assert_eq!(read(&master), master_body);
    assert_eq!(read(&doc), doc_body);
    assert_eq!(read(&snip), snip_body);
    assert!(store.includes().iter().all(|r| r.is_spliced()));
}

#[test]
fn test_edits_land_in_the_included_file() {
    let temp_dir = TempDir::new().unwrap();
    let master_body = canonical("<app>\n  <include file=\"doc.conf\"/>\n</app>\n");
    let master = write(temp_dir.path(), "app.conf", &master_body);
    let doc = write(
        temp_dir.path(),
        "doc.conf",
        &canonical("<doc>\n  <a>1</a>\n</doc>\n"),
    );

    let mut store = load(&master);
    let a = store.get_section(None, "/app/include/a").unwrap();
    assert!(store.set_int(a, "@v", 9));
    store.write_file().unwrap();

    assert_eq!(read(&master), master_body);
    assert_eq!(read(&doc), canonical("<doc>\n  <a v=\"9\">1</a>\n</doc>\n"));
}

#[test]
fn test_only_the_writable_sibling_is_rewritten() {
    let temp_dir = TempDir::new().unwrap();
    let master = write(
        temp_dir.path(),
        "app.conf",
        r#"<app><ro><include file="ro.conf" readonly="true"/></ro><rw><include file="rw.conf"/></rw></app>"#,
    );
    let original = "<doc><a>1</a></doc>";
    let ro = write(temp_dir.path(), "ro.conf", original);
    let rw = write(temp_dir.path(), "rw.conf", original);

    let mut store = load(&master);
    let ro_a = store.get_section(None, "/app/ro/include/a").unwrap();
    assert!(store.set_string(ro_a, "extra", "x"));
    let rw_a = store.get_section(None, "/app/rw/include/a").unwrap();
    assert!(store.set_string(rw_a, "extra", "y"));
    store.write_file().unwrap();

    assert_eq!(read(&ro), original);
    assert_eq!(
        read(&rw),
        canonical("<doc>\n  <a>1<extra>y</extra></a>\n</doc>\n")
    );
    // The live view still carries the readonly edit.
    assert_eq!(
        store.get_string(None, "/app/ro/include/a/extra").as_deref(),
        Some("x")
    );
}

#[test]
fn test_nested_includes_resolve_relative_to_their_file() {
    let temp_dir = TempDir::new().unwrap();
    let master_body = canonical("<app>\n  <include file=\"sub/outer.conf\"/>\n</app>\n");
    let outer_body = canonical("<outer>\n  <include file=\"inner.conf\"/>\n</outer>\n");
    let inner_body = canonical("<inner>\n  <leaf>deep</leaf>\n</inner>\n");
    let master = write(temp_dir.path(), "app.conf", &master_body);
    let outer = write(temp_dir.path(), "sub/outer.conf", &outer_body);
    let inner = write(temp_dir.path(), "sub/inner.conf", &inner_body);

    let mut store = load(&master);
    assert_eq!(
        store.get_string(None, "/app/include/include/leaf").as_deref(),
        Some("deep")
    );
    assert_eq!(store.includes()[0].nested.len(), 1);

    store.write_file().unwrap();
    assert_eq!(read(&master), master_body);
    assert_eq!(read(&outer), outer_body);
    assert_eq!(read(&inner), inner_body);
}

#[test]
fn test_removing_section_with_include_drops_record() {
    let temp_dir = TempDir::new().unwrap();
    let master = write(
        temp_dir.path(),
        "app.conf",
        r#"<app><group><include file="doc.conf"/></group><keep/></app>"#,
    );
    let doc_body = "<doc><a>1</a></doc>";
    let doc = write(temp_dir.path(), "doc.conf", doc_body);

    let mut store = load(&master);
    assert_eq!(store.includes().len(), 1);
    let group = store.get_section(None, "/app/group").unwrap();
    store.remove_section(group).unwrap();
    assert!(store.includes().is_empty());

    store.write_file().unwrap();
    assert_eq!(read(&master), canonical("<app>\n  <keep/>\n</app>\n"));
    assert_eq!(read(&doc), doc_body);
}
