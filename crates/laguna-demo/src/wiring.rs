//! Conversions from config sections to component settings.

use std::time::Duration;

use laguna_assets::{AssetCacheConfig, ModelCacheConfig};
use laguna_config::{AssetConfig, Config, InteractionConfig, LodConfig, ProjectionConfig};
use laguna_coords::{CoordinateTransform, SceneBounds, TransformError};
use laguna_input::DispatcherConfig;
use laguna_loader::LoaderConfig;
use laguna_lod::{LodBreakpoint, LodController, LodError, LodTable};
use laguna_world::SceneManagerConfig;

pub fn transform(projection: &ProjectionConfig) -> Result<CoordinateTransform, TransformError> {
    let bounds = SceneBounds::new(
        projection.center_lat,
        projection.center_lng,
        projection.scale,
        projection.lat_correction_factor,
    );
    Ok(CoordinateTransform::with_radius(bounds, projection.max_radius_deg)?
        .with_default_height(projection.default_height))
}

/// Unbounded rows (`max_distance: None`) become infinite distances.
pub fn lod(lod: &LodConfig) -> Result<LodController, LodError> {
    let table = LodTable::new(
        lod.breakpoints
            .iter()
            .map(|row| LodBreakpoint::new(row.max_distance.unwrap_or(f32::INFINITY), row.reduction))
            .collect(),
    )?;
    Ok(LodController::new(
        table,
        Duration::from_millis(lod.update_interval_ms),
        lod.base_epsilon,
    ))
}

pub fn scene_manager(config: &Config) -> SceneManagerConfig {
    SceneManagerConfig {
        fallback_threshold: config.scene.fallback_threshold,
        visibility_interval: Duration::from_millis(config.scene.visibility_interval_ms),
        recovery_interval: Duration::from_millis(config.recovery.interval_ms),
        marker_radius: config.scene.marker_radius,
        base_height: config.projection.default_height,
        scratch_pool_size: config.scene.scratch_pool_size,
        ..SceneManagerConfig::default()
    }
}

pub fn loader(config: &Config) -> LoaderConfig {
    LoaderConfig {
        initial_batch: config.loader.initial_batch,
        page_size: config.loader.page_size,
        render_batch: config.loader.render_batch,
        page_pause: Duration::from_millis(config.loader.page_pause_ms),
        render_pause: Duration::from_millis(config.loader.render_pause_ms),
        recovery_interval: Duration::from_millis(config.recovery.interval_ms),
    }
}

pub fn assets(assets: &AssetConfig) -> AssetCacheConfig {
    AssetCacheConfig {
        model: ModelCacheConfig {
            ttl: Duration::from_secs(assets.model_ttl_secs),
            max_vertices: assets.max_vertices,
            merge_tolerance: assets.merge_tolerance,
        },
        record_ttl: Duration::from_secs(assets.record_ttl_secs),
    }
}

pub fn dispatcher(interaction: &InteractionConfig) -> DispatcherConfig {
    DispatcherConfig {
        move_throttle: Duration::from_millis(interaction.move_throttle_ms),
        click_throttle: Duration::from_millis(interaction.click_throttle_ms),
        drag_threshold: interaction.drag_threshold_px,
        pick_tolerance: interaction.pick_tolerance,
        tolerance_multiplier: interaction.tolerance_multiplier,
        error_limit: interaction.error_limit,
        error_window: Duration::from_millis(interaction.error_window_ms),
        cooldown: Duration::from_millis(interaction.cooldown_ms),
    }
}
