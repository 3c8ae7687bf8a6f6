//! Merge rules: defaults first, then the global file, the explicit file and
//! the environment, later sources overriding earlier ones.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Fallback patterns have no defaults here: their keys contain path
/// characters the builder cannot address, so they default through serde.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("store.toplevel", "conftree")?
        .set_default("store.coalesce_window_secs", 5)?
        .set_default("store.tick_interval_ms", 1000)?
        .set_default("store.namespace_base", "conftree")?
        .set_default("journal.notify_only", false)
}
