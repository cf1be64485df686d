//! Merge rules: defaults, override order, conflict handling.
//!
//! Sources are layered in this order, later ones winning per key:
//! defaults, global file, workspace files, environment.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("storage.backend", "sled")?
        .set_default("storage.path", ".cardwright/store")?
        .set_default("generation.mode", "mock")?
        .set_default("generation.max_attempts", 3)?
        .set_default("generation.base_delay_ms", 250)?
        .set_default("generation.max_jitter_ms", 120)
}
