//! Settings
//!
//! Runtime settings for the store, the journal and logging. Sources are
//! merged with the `config` crate: built-in defaults, the global settings
//! file, an explicit file, then `CONFTREE_*` environment overrides.

use crate::error::ConfError;
use crate::logging::LoggingConfig;
use config::File;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

mod merge;
mod sources;

/// Root settings structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub journal: JournalSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Name of the top-level section; instantiates `%s` in fallback keys
    #[serde(default = "default_toplevel")]
    pub toplevel: String,

    /// Quiet ticks after a change before the journal fires
    #[serde(default = "default_coalesce_window")]
    pub coalesce_window_secs: u32,

    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Scheme used for module namespace URIs
    #[serde(default = "default_namespace_base")]
    pub namespace_base: String,

    /// Values returned when a lookup misses, keyed by absolute path pattern
    #[serde(default = "default_fallbacks")]
    pub fallbacks: BTreeMap<String, String>,
}

fn default_toplevel() -> String {
    "conftree".to_string()
}

fn default_coalesce_window() -> u32 {
    5
}

fn default_tick_interval() -> u64 {
    1000
}

fn default_namespace_base() -> String {
    "conftree".to_string()
}

#[cfg(target_os = "linux")]
const DEFAULT_EVENTER: &str = "epoll";
#[cfg(any(target_os = "macos", target_os = "freebsd", target_os = "openbsd"))]
const DEFAULT_EVENTER: &str = "kqueue";
#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "openbsd"
)))]
const DEFAULT_EVENTER: &str = "poll";

fn default_fallbacks() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "/%s/eventer/@implementation".to_string(),
            DEFAULT_EVENTER.to_string(),
        ),
        (
            "/%s/modules/@directory".to_string(),
            "/usr/local/lib/conftree".to_string(),
        ),
    ])
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            toplevel: default_toplevel(),
            coalesce_window_secs: default_coalesce_window(),
            tick_interval_ms: default_tick_interval(),
            namespace_base: default_namespace_base(),
            fallbacks: default_fallbacks(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JournalSettings {
    /// Record that a change happened without the document payload
    #[serde(default)]
    pub notify_only: bool,

    /// Journal file; no journal is kept when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfError> {
        if self.store.tick_interval_ms == 0 {
            return Err(ConfError::ConfigError(
                "store.tick_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.store.toplevel.trim().is_empty() {
            return Err(ConfError::ConfigError(
                "store.toplevel cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builds [`Settings`] from every configured source
pub struct SettingsLoader;

impl SettingsLoader {
    /// Load settings; `explicit` is layered over the global file.
    pub fn load(explicit: Option<&Path>) -> Result<Settings, ConfError> {
        let mut builder = merge::merge_policy::builder_with_defaults()?;
        builder = sources::global_file::add_to_builder(builder)?;
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = sources::environment::add_to_builder(builder);

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load a single file over the defaults, ignoring other sources.
    pub fn load_from_file(path: &Path) -> Result<Settings, ConfError> {
        let settings: Settings = merge::merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn global_config_path() -> Option<PathBuf> {
        sources::global_file::global_config_path()
    }
}
