//! Backing-store generation ids only grow, across writes and reloads

use conftree::config::StoreSettings;
use conftree::ConfStore;
use proptest::prelude::*;
use std::collections::HashSet;
use tempfile::TempDir;

#[derive(Debug, Clone)]
enum Op {
    Add(u8),
    RemoveFirst,
    Write,
    Reload,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<u8>().prop_map(Op::Add),
        1 => Just(Op::RemoveFirst),
        2 => Just(Op::Write),
        1 => Just(Op::Reload),
    ]
}

fn generations_on_disk(dir: &std::path::Path) -> HashSet<u64> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                conftree::backing::parse_entry_name(&name).map(|(_, generation)| generation)
            })
            .collect(),
        Err(_) => HashSet::new(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn generation_ids_are_never_reused(ops in prop::collection::vec(op(), 1..24)) {
        let temp_dir = TempDir::new().unwrap();
        let master = temp_dir.path().join("app.conf");
        std::fs::write(&master, r#"<app><db backingstore="db"/></app>"#).unwrap();
        let dir = temp_dir.path().join("db");

        let mut store = ConfStore::new(&StoreSettings::default());
        store.load(&master).unwrap();
        let mut retired: HashSet<u64> = HashSet::new();
        let mut live: HashSet<u64> = HashSet::new();
        let mut max_seen = 0;

        for op in ops {
            match op {
                Op::Add(v) => {
                    let db = store.get_section(None, "/app/db").unwrap();
                    prop_assert!(store.set_int(db, "item", i32::from(v)));
                }
                Op::RemoveFirst => {
                    if let Some(item) = store.get_section(None, "/app/db/item") {
                        store.remove_section(item).unwrap();
                    }
                }
                Op::Write => {
                    store.write_file().unwrap();
                    let now = generations_on_disk(&dir);
                    for generation in now.difference(&live) {
                        prop_assert!(!retired.contains(generation));
                        prop_assert!(*generation > max_seen);
                    }
                    retired.extend(live.difference(&now).copied());
                    max_seen = max_seen.max(now.iter().copied().max().unwrap_or(0));
                    live = now;
                }
                Op::Reload => {
                    let before = store.backing().max_generation();
                    store.load(&master).unwrap();
                    prop_assert!(store.backing().max_generation() >= before);
                }
            }
        }
    }
}
