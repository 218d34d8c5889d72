//! Configuration system for the Laguna world renderer.
//!
//! Runtime-tunable policy (projection, LOD, loader pacing, recovery interval,
//! asset caching, interaction throttles) persisted to disk as RON. Supports
//! CLI overrides via clap, hot-reload detection, and forward/backward
//! compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    AssetConfig, Config, DebugConfig, InteractionConfig, LoaderConfig, LodBreakpointConfig, LodConfig,
    ProjectionConfig, RecoveryConfig, SceneConfig, default_config_dir,
};
pub use error::ConfigError;
