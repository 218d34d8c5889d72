//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level renderer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Geographic to scene-space projection.
    pub projection: ProjectionConfig,
    /// Level-of-detail policy.
    pub lod: LodConfig,
    /// Layered scene settings.
    pub scene: SceneConfig,
    /// Failure retry settings.
    pub recovery: RecoveryConfig,
    /// Incremental entity loading.
    pub loader: LoaderConfig,
    /// Asset and record caching.
    pub assets: AssetConfig,
    /// Pointer interaction.
    pub interaction: InteractionConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Projection from latitude/longitude to scene units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Latitude mapped to the scene origin.
    pub center_lat: f64,
    /// Longitude mapped to the scene origin.
    pub center_lng: f64,
    /// Scene units per degree.
    pub scale: f64,
    /// Longitude compression applied at this latitude band.
    pub lat_correction_factor: f64,
    /// Points farther than this many degrees from the center are rejected.
    pub max_radius_deg: f64,
    /// Height used when callers do not supply one.
    pub default_height: f32,
}

/// One row of the distance to detail table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LodBreakpointConfig {
    /// Upper distance bound in scene units. `None` means unbounded.
    pub max_distance: Option<f32>,
    /// Detail multiplier in `(0, 1]`.
    pub reduction: f32,
}

/// Level-of-detail configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Ascending distance breakpoints.
    pub breakpoints: Vec<LodBreakpointConfig>,
    /// Minimum time between LOD recomputations.
    pub update_interval_ms: u64,
    /// Douglas-Peucker tolerance at full detail, in scene units.
    pub base_epsilon: f32,
}

/// Layered scene configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SceneConfig {
    /// Fraction of polygons that must produce a base mesh before the
    /// coarse fallback map is used instead.
    pub fallback_threshold: f32,
    /// Interval of the visibility sweep.
    pub visibility_interval_ms: u64,
    /// Radius of the centroid marker used when polygon geometry fails.
    pub marker_radius: f32,
    /// Optional cap on live meshes in the scene graph.
    pub max_meshes: Option<usize>,
    /// Number of scratch vertex buffers kept for geometry building.
    pub scratch_pool_size: usize,
}

/// Recovery loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Interval between retry cycles.
    pub interval_ms: u64,
}

/// Incremental loader pacing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoaderConfig {
    /// Size of the first, interactive batch.
    pub initial_batch: usize,
    /// Page size for background fetches.
    pub page_size: usize,
    /// Entities rendered per sub-batch.
    pub render_batch: usize,
    /// Pause between page fetches.
    pub page_pause_ms: u64,
    /// Pause between render sub-batches.
    pub render_pause_ms: u64,
}

/// Asset resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssetConfig {
    /// Root directory that candidate model paths are resolved against.
    pub model_root: PathBuf,
    /// Lifetime of cached detail records.
    pub record_ttl_secs: u64,
    /// Lifetime of resolved models, fallbacks included.
    pub model_ttl_secs: u64,
    /// Models above this vertex count are simplified on load.
    pub max_vertices: usize,
    /// Distance under which vertices are welded during simplification.
    pub merge_tolerance: f32,
}

/// Pointer interaction configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InteractionConfig {
    /// Minimum spacing of processed pointer moves.
    pub move_throttle_ms: u64,
    /// Minimum spacing of processed clicks.
    pub click_throttle_ms: u64,
    /// Pointer travel that turns a press into a drag.
    pub drag_threshold_px: f32,
    /// Default picking tolerance in scene units.
    pub pick_tolerance: f32,
    /// Tolerance multiplier for the second picking pass.
    pub tolerance_multiplier: f32,
    /// Handler failures tolerated inside the window before disabling.
    pub error_limit: usize,
    /// Rolling window for counting handler failures.
    pub error_window_ms: u64,
    /// How long the dispatcher stays disabled.
    pub cooldown_ms: u64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Directory for JSON log files in debug builds.
    pub log_dir: Option<PathBuf>,
}

// --- Default implementations ---

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            center_lat: 45.4371,
            center_lng: 12.3358,
            scale: 1000.0,
            lat_correction_factor: 0.7,
            max_radius_deg: 0.5,
            default_height: 0.0,
        }
    }
}

impl Default for LodConfig {
    fn default() -> Self {
        let row = |max_distance, reduction| LodBreakpointConfig {
            max_distance,
            reduction,
        };
        Self {
            breakpoints: vec![
                row(Some(10.0), 1.0),
                row(Some(30.0), 0.75),
                row(Some(60.0), 0.5),
                row(Some(100.0), 0.25),
                row(None, 0.1),
            ],
            update_interval_ms: 500,
            base_epsilon: 0.05,
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            fallback_threshold: 0.5,
            visibility_interval_ms: 1000,
            marker_radius: 0.5,
            max_meshes: None,
            scratch_pool_size: 16,
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self { interval_ms: 5000 }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            initial_batch: 20,
            page_size: 20,
            render_batch: 10,
            page_pause_ms: 200,
            render_pause_ms: 50,
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            model_root: PathBuf::from("assets/models"),
            record_ttl_secs: 300,
            model_ttl_secs: 300,
            max_vertices: 5000,
            merge_tolerance: 0.01,
        }
    }
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            move_throttle_ms: 16,
            click_throttle_ms: 100,
            drag_threshold_px: 5.0,
            pick_tolerance: 0.25,
            tolerance_multiplier: 4.0,
            error_limit: 5,
            error_window_ms: 10_000,
            cooldown_ms: 5000,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

/// Platform config directory for Laguna, if the platform has one.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("laguna"))
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let config = read_config(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::Write {
            path: config_path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let new_config = read_config(&config_path)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("center_lat: 45.4371"));
        assert!(ron_str.contains("initial_batch: 20"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_default_lod_table_ends_unbounded() {
        let lod = LodConfig::default();
        assert_eq!(lod.breakpoints.len(), 5);
        assert_eq!(lod.breakpoints[0].reduction, 1.0);
        let last = lod.breakpoints.last().unwrap();
        assert_eq!(last.max_distance, None);
        assert_eq!(last.reduction, 0.1);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(projection: (scale: 500.0))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.projection.scale, 500.0);
        assert_eq!(config.projection.center_lat, 45.4371);
        assert_eq!(config.loader, LoaderConfig::default());
        assert_eq!(config.recovery.interval_ms, 5000);
    }

    #[test]
    fn test_extra_field_ignored() {
        let ron_str = "(future_setting: true)";
        let result: Result<Config, _> = ron::from_str(ron_str);
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.projection.center_lat = 41.9;
        config.interaction.error_limit = 8;
        config.scene.max_meshes = Some(2048);

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.loader.page_size = 50;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.unwrap().loader.page_size, 50);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_file_error_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ron");
        std::fs::write(&path, "{{not valid}}").unwrap();

        let err = Config::load_or_create(dir.path()).unwrap_err();
        assert!(matches!(&err, ConfigError::Parse { path: p, .. } if *p == path));
        assert!(err.to_string().contains("config.ron"));
    }

    #[test]
    fn test_reload_of_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::default().reload(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
