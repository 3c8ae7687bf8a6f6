//! The recurring tick: one journal entry per burst, flushes on request.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use conftree::coalesce::CoalescerTask;
use conftree::journal::ConfigJournal;
use conftree::{ConfError, ConfStore};
use flate2::read::ZlibDecoder;
use parking_lot::Mutex;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::integration::{load, read, write};

#[tokio::test(start_paused = true)]
async fn test_journal_fires_once_per_burst() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "app.conf", "<app><opts/></app>");
    let mut store = load(&file);
    store.set_coalesce_window(2);
    let opts = store.get_section(None, "/app/opts").unwrap();
    for i in 0..3 {
        store.set_int(opts, "@n", i);
    }
    let store = Arc::new(Mutex::new(store));

    let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let task = CoalescerTask::spawn(
        Arc::clone(&store),
        Duration::from_secs(1),
        move |store: &mut ConfStore| -> Result<(), ConfError> {
            recorder.lock().push(store.generation());
            Ok(())
        },
    );

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(seen.lock().len(), 1);

    let generation = {
        let mut guard = store.lock();
        guard.set_int(opts, "@n", 10);
        guard.set_int(opts, "@n", 11);
        guard.generation()
    };
    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(seen.lock().len(), 2);
    assert_eq!(seen.lock().last().copied(), Some(generation));

    task.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_write_requests_are_flushed() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "app.conf", "<app/>");
    let mut store = load(&file);
    let root = store.root().unwrap();
    store.set_string(root, "added", "yes");
    let store = Arc::new(Mutex::new(store));

    let task = CoalescerTask::spawn(
        Arc::clone(&store),
        Duration::from_millis(100),
        |_: &mut ConfStore| -> Result<(), ConfError> { Ok(()) },
    );
    tokio::time::sleep(Duration::from_millis(350)).await;
    task.shutdown().await;

    assert!(read(&file).contains("<added>yes</added>"));
    assert!(!store.lock().coalescer().write_requested());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_task_stops_ticking() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "app.conf", "<app/>");
    let store = Arc::new(Mutex::new(load(&file)));

    let task = CoalescerTask::spawn(
        Arc::clone(&store),
        Duration::from_secs(1),
        |_: &mut ConfStore| -> Result<(), ConfError> { Ok(()) },
    );
    let cancel = task.cancel_handle();
    cancel.cancel();
    assert!(cancel.is_cancelled());
    task.shutdown().await;

    store.lock().mark_changed();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(store.lock().coalescer().remaining(), 5);
}

#[test]
fn test_journal_entries_skip_unchanged_generation() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "app.conf", "<app/>");
    let mut store = load(&file);
    let mut journal = ConfigJournal::new(Vec::new(), false);

    assert!(journal.write_entry(&mut store).unwrap());
    assert!(!journal.write_entry(&mut store).unwrap());
    let root = store.root().unwrap();
    store.set_string(root, "@v", "1");
    assert!(journal.write_entry(&mut store).unwrap());

    let out = String::from_utf8(journal.into_inner()).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    let fields: Vec<&str> = lines[1].split('\t').collect();
    assert_eq!(fields[0], "n");
    let compressed = STANDARD.decode(fields[3]).unwrap();
    let mut xml = String::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_string(&mut xml)
        .unwrap();
    assert_eq!(fields[2], xml.len().to_string());
    assert_eq!(xml, store.xml_in_mem().unwrap());
}

#[test]
fn test_notify_only_journal_has_no_payload() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "app.conf", "<app/>");
    let mut store = load(&file);
    let mut journal = ConfigJournal::new(Vec::new(), true);
    journal.write_entry(&mut store).unwrap();
    let out = String::from_utf8(journal.into_inner()).unwrap();
    assert!(out.starts_with("n\t"));
    assert!(out.ends_with("\t0\t\n"));
}
