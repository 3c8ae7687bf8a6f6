//! Route table commands against a real document.

use conftree::cli::{exit_code, Commands, RunContext};
use conftree::ConfError;
use tempfile::TempDir;

use crate::integration::{read, write};

const DOC: &str = r#"<app>
  <listeners>
    <listener id="web" port="80"><config><timeout>5</timeout></config></listener>
    <listener port="443"/>
  </listeners>
</app>"#;

#[test]
fn test_show_get_and_sections() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "app.conf", DOC);

    let out = RunContext::new(&file, None, false)
        .unwrap()
        .execute(&Commands::Show)
        .unwrap();
    assert!(out.contains("<listener port=\"443\"/>"));

    let out = RunContext::new(&file, None, false)
        .unwrap()
        .execute(&Commands::Get {
            path: "@port".to_string(),
            section: Some("//listener[@id=\"web\"]".to_string()),
        })
        .unwrap();
    assert_eq!(out, "80");

    let out = RunContext::new(&file, None, true)
        .unwrap()
        .execute(&Commands::Sections {
            path: "//listener".to_string(),
        })
        .unwrap();
    let rows: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 2);
    assert_eq!(rows[1]["path"], "/app/listeners/listener[2]");
}

#[test]
fn test_set_and_remove_persist() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "app.conf", DOC);

    RunContext::new(&file, None, false)
        .unwrap()
        .execute(&Commands::Set {
            section: "/app/listeners".to_string(),
            key: "@backlog".to_string(),
            value: "64".to_string(),
        })
        .unwrap();
    assert!(read(&file).contains("<listeners backlog=\"64\">"));

    let out = RunContext::new(&file, None, false)
        .unwrap()
        .execute(&Commands::Remove {
            path: "/app/listeners/listener[2]".to_string(),
        })
        .unwrap();
    assert_eq!(out, "removed /app/listeners/listener[2]");
    assert!(!read(&file).contains("443"));
}

#[test]
fn test_hash_as_json() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "app.conf", DOC);
    let out = RunContext::new(&file, None, true)
        .unwrap()
        .execute(&Commands::Hash {
            path: "//listener/config".to_string(),
            ns: None,
        })
        .unwrap();
    let hash: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(hash["timeout"], "5");
}

#[test]
fn test_missing_value_maps_to_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "app.conf", DOC);
    let err = RunContext::new(&file, None, false)
        .unwrap()
        .execute(&Commands::Get {
            path: "/app/nothing".to_string(),
            section: None,
        })
        .unwrap_err();
    assert!(matches!(err, ConfError::NotFound(_)));
    assert_eq!(exit_code(&err), 2);
}
