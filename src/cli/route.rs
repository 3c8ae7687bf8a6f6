//! CLI route: single route table and run context.

use crate::cli::parse::Commands;
use crate::cli::presentation::{format_hash, format_sections, format_value, SectionRow};
use crate::coalesce::CoalescerTask;
use crate::config::{Settings, SettingsLoader};
use crate::error::ConfError;
use crate::journal::ConfigJournal;
use crate::store::{ConfStore, LoadStatus};
use crate::tree::NodeId;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runtime context for CLI execution: settings and the loaded store.
pub struct RunContext {
    settings: Settings,
    store: ConfStore,
    json: bool,
}

impl RunContext {
    pub fn new(file: &Path, settings_path: Option<PathBuf>, json: bool) -> Result<Self, ConfError> {
        let settings = SettingsLoader::load(settings_path.as_deref())?;
        let mut store = ConfStore::new(&settings.store);
        if let LoadStatus::Partial { failures } = store.load(file)? {
            for path in failures {
                warn!(path = %path.display(), "include or backing store not loaded");
            }
        }
        Ok(Self {
            settings,
            store,
            json,
        })
    }

    pub fn store(&self) -> &ConfStore {
        &self.store
    }

    fn section(&self, path: &str) -> Result<NodeId, ConfError> {
        self.store
            .get_section(None, path)
            .ok_or_else(|| ConfError::NotFound(path.to_string()))
    }

    pub fn execute(mut self, command: &Commands) -> Result<String, ConfError> {
        match command {
            Commands::Show => self.store.xml_in_mem(),
            Commands::Get { path, section } => {
                let ctx = match section {
                    Some(section) => Some(self.section(section)?),
                    None => None,
                };
                let value = self
                    .store
                    .get_string(ctx, path)
                    .ok_or_else(|| ConfError::NotFound(path.clone()))?;
                format_value(path, &value, self.json)
            }
            Commands::Set {
                section,
                key,
                value,
            } => {
                let node = self.section(section)?;
                if !self.store.set_string(node, key, value) {
                    return Err(ConfError::invalid_path(key, "expected `name` or `@name`"));
                }
                let bytes = self.store.write_file()?;
                debug!(bytes, "document written");
                let location = self.store.node_path(node).unwrap_or_else(|| section.clone());
                Ok(format!("{} {} = {}", location, key, value))
            }
            Commands::Hash { path, ns } => {
                let hash = match ns {
                    Some(ns) => self
                        .store
                        .get_namespaced_hash(None, path, ns)
                        .unwrap_or_default(),
                    None => self.store.get_hash(None, path),
                };
                format_hash(&hash, self.json)
            }
            Commands::Sections { path } => {
                let tree = self.store.tree();
                let rows: Vec<SectionRow> = self
                    .store
                    .get_sections(None, path)
                    .into_iter()
                    .filter(|id| tree.is_element(*id))
                    .map(|id| SectionRow {
                        path: self.store.node_path(id).unwrap_or_default(),
                        children: tree.element_children(id).count(),
                        attributes: tree.attrs(id).map(|a| a.len()).unwrap_or(0),
                    })
                    .collect();
                format_sections(&rows, self.json)
            }
            Commands::Remove { path } => {
                let node = self.section(path)?;
                let location = self.store.node_path(node).unwrap_or_else(|| path.clone());
                self.store.remove_section(node)?;
                self.store.write_file()?;
                Ok(format!("removed {}", location))
            }
            Commands::Watch { interval_ms } => self.watch(*interval_ms),
        }
    }

    /// Drive the coalescer until Ctrl-C, then flush any pending write.
    fn watch(self, interval_ms: Option<u64>) -> Result<String, ConfError> {
        let interval =
            Duration::from_millis(interval_ms.unwrap_or(self.settings.store.tick_interval_ms).max(1));
        let journal = self.settings.journal.clone();
        let store = Arc::new(Mutex::new(self.store));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ConfError::ConfigError(format!("Failed to start runtime: {}", e)))?;

        runtime.block_on(async {
            let task = match &journal.path {
                Some(path) => {
                    let file = std::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(path)
                        .map_err(ConfError::Journal)?;
                    CoalescerTask::spawn(
                        Arc::clone(&store),
                        interval,
                        ConfigJournal::new(file, journal.notify_only),
                    )
                }
                None => CoalescerTask::spawn(Arc::clone(&store), interval, |store: &mut ConfStore| {
                    debug!(generation = store.generation(), "configuration settled");
                    Ok(())
                }),
            };
            info!(interval_ms = interval.as_millis() as u64, "watching configuration");
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to wait for Ctrl-C");
            }
            task.shutdown().await;
            Ok::<(), ConfError>(())
        })?;

        let mut store = store.lock();
        if store.coalescer().write_requested() {
            store.write_file()?;
        }
        Ok(format!("stopped at generation {}", store.generation()))
    }
}
