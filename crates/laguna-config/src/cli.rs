//! Command-line argument parsing for the Laguna world renderer.

use std::path::PathBuf;

use clap::Args;

use crate::Config;

/// Configuration overrides accepted on the command line.
///
/// CLI values override settings loaded from `config.ron`. Binaries embed this
/// with `#[command(flatten)]`.
#[derive(Args, Debug, Clone, Default)]
pub struct CliArgs {
    /// Latitude of the scene origin.
    #[arg(long)]
    pub center_lat: Option<f64>,

    /// Longitude of the scene origin.
    #[arg(long)]
    pub center_lng: Option<f64>,

    /// Scene units per degree.
    #[arg(long)]
    pub scale: Option<f64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Root directory for model files.
    #[arg(long)]
    pub model_root: Option<PathBuf>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(lat) = args.center_lat {
            self.projection.center_lat = lat;
        }
        if let Some(lng) = args.center_lng {
            self.projection.center_lng = lng;
        }
        if let Some(scale) = args.scale {
            self.projection.scale = scale;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if let Some(ref root) = args.model_root {
            self.assets.model_root = root.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            center_lat: Some(41.9028),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.projection.center_lat, 41.9028);
        assert_eq!(config.debug.log_level, "debug");
        // Non-overridden fields retain defaults
        assert_eq!(config.projection.center_lng, 12.3358);
        assert_eq!(config.projection.scale, 1000.0);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }
}
