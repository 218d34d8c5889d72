//! Drives the Laguna rendering core against synthetic Venetian data.
//!
//! Parcels go through the layered scene manager, buildings and citizens
//! through the paged entity loader (backed by a source that fails on
//! purpose), and a scripted pointer exercises the interaction dispatcher.
//! Everything runs cooperatively on one thread, frame by frame.

mod synthetic;
mod wiring;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use glam::{Vec2, Vec3};
use laguna_assets::RonModelLoader;
use laguna_config::{CliArgs, Config, default_config_dir};
use laguna_coords::TransformError;
use laguna_input::{
    Camera, HandlerError, Hit, InteractionDispatcher, InteractionHandler, InteractionOutcome,
    PickContext, PointerEvent, screen_positions,
};
use laguna_loader::{AsyncEntityLoader, StepOutcome};
use laguna_lod::LodError;
use laguna_scene::{EntityId, MeshRegistry, Scene, SceneEvent};
use laguna_world::{GeoPolygon, LayeredSceneManager, ViewMode, WorldCommand};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::synthetic::FlakySource;

#[derive(Parser, Debug)]
#[command(name = "laguna-demo", about = "Headless run of the Laguna rendering core")]
struct DemoArgs {
    #[command(flatten)]
    cli: CliArgs,

    /// Number of frames to simulate.
    #[arg(long, default_value_t = 600)]
    frames: u32,

    /// Seed for the synthetic data.
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// RON file with a list of parcels, instead of synthetic ones.
    #[arg(long)]
    polygons: Option<PathBuf>,

    /// Synthetic parcel count.
    #[arg(long, default_value_t = 144)]
    parcels: usize,

    /// Synthetic entity count.
    #[arg(long, default_value_t = 150)]
    entities: usize,

    /// Probability that a page fetch fails.
    #[arg(long, default_value_t = 0.15)]
    failure_rate: f64,

    /// Print the final summary as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Error)]
enum DemoError {
    #[error("invalid projection: {0}")]
    Projection(#[from] TransformError),

    #[error("invalid LOD table: {0}")]
    Lod(#[from] LodError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },

    #[error("failed to start runtime: {0}")]
    Runtime(std::io::Error),
}

/// End-of-run counters.
#[derive(Debug, Default, Serialize)]
struct Summary {
    frames: u32,
    parcels: usize,
    parcels_rendered: usize,
    parcels_as_markers: usize,
    parcels_failed: usize,
    fallback_map: bool,
    overlays: usize,
    indicators: usize,
    entities_rendered: usize,
    entities_created: usize,
    entities_removed: usize,
    page_fetches: usize,
    page_failures: usize,
    recovered: u64,
    still_failing: usize,
    hover_changes: usize,
    clicks: usize,
    drags: usize,
    dispatcher_disables: u64,
    details_lookups: usize,
    live_meshes: usize,
}

/// Collects pointer notifications as world commands.
#[derive(Default)]
struct SelectionHandler {
    commands: Vec<WorldCommand>,
    clicked: Option<EntityId>,
}

impl InteractionHandler for SelectionHandler {
    fn on_hover(&mut self, hit: Option<&Hit>) -> Result<(), HandlerError> {
        self.commands
            .push(WorldCommand::HoverChanged(hit.map(|h| h.entity.clone())));
        Ok(())
    }

    fn on_click(&mut self, hit: Option<&Hit>) -> Result<(), HandlerError> {
        let id = hit.map(|h| h.entity.clone());
        self.clicked.clone_from(&id);
        self.commands.push(WorldCommand::SelectionChanged(id));
        Ok(())
    }
}

fn main() -> ExitCode {
    let args = DemoArgs::parse();

    let config_dir = args.cli.config.clone().or_else(default_config_dir);
    let mut config = match &config_dir {
        Some(dir) => Config::load_or_create(dir).unwrap_or_else(|e| {
            eprintln!("Failed to load config: {e}, using defaults");
            Config::default()
        }),
        None => Config::default(),
    };
    config.apply_cli_overrides(&args.cli);

    let log_dir = config
        .debug
        .log_dir
        .clone()
        .or_else(|| config_dir.as_ref().map(|dir| dir.join("logs")));
    laguna_log::init_logging(log_dir.as_deref(), cfg!(debug_assertions), Some(&config));

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("{}", DemoError::Runtime(e));
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&args, &config)) {
        Ok(summary) => {
            if args.json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{json}"),
                    Err(e) => warn!("Failed to serialize summary: {e}"),
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn load_polygons(path: &Path) -> Result<Vec<GeoPolygon>, DemoError> {
    let contents = std::fs::read_to_string(path).map_err(|source| DemoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&contents).map_err(|source| DemoError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Scripted pointer input for one frame: a slow sweep across the viewport,
/// a click every 45 frames and a drag every 150.
fn pointer_script(frame: u32, at: Instant, viewport: Vec2) -> Vec<PointerEvent> {
    let t = frame as f32 * 0.01;
    let pos = viewport * Vec2::new(0.5 + 0.35 * t.sin(), 0.5 + 0.3 * (t * 1.7).cos());
    let mut events = vec![PointerEvent::Move { pos, at }];
    if frame % 45 == 0 {
        events.push(PointerEvent::Down { pos, at });
        events.push(PointerEvent::Up { pos, at });
    }
    match frame % 150 {
        100 => events.push(PointerEvent::Down { pos, at }),
        101..=109 => events.push(PointerEvent::Move {
            pos: pos + Vec2::new(4.0 * (frame % 150 - 100) as f32, 0.0),
            at,
        }),
        110 => events.push(PointerEvent::Up { pos, at }),
        _ => {}
    }
    events
}

async fn run(args: &DemoArgs, config: &Config) -> Result<Summary, DemoError> {
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let transform = wiring::transform(&config.projection)?;
    let center = transform.bounds().center();

    let mut scene = Scene::new();
    scene.set_capacity_limit(config.scene.max_meshes);

    // Parcels.
    let mut manager = LayeredSceneManager::new(
        transform.clone(),
        wiring::lod(&config.lod)?,
        wiring::scene_manager(config),
    );
    manager.set_owner_styles(&mut scene, synthetic::owner_table());
    let polygons = match &args.polygons {
        Some(path) => load_polygons(path)?,
        None => synthetic::parcels(&mut rng, center, args.parcels),
    };
    let parcel_ids: Vec<EntityId> = polygons.iter().map(|p| p.id.clone()).collect();
    let build = manager.create_bases(&mut scene, polygons, Instant::now());
    info!(
        total = build.total,
        rendered = build.rendered,
        markers = build.degraded,
        failed = build.failed,
        fallback_map = manager.is_fallback_map(),
        "Parcels built"
    );

    // Entities.
    let source = FlakySource::new(
        synthetic::entities(&mut rng, center, args.entities),
        args.seed,
        args.failure_rate,
        Duration::from_millis(30),
    );
    let mut loader = AsyncEntityLoader::new(
        &source,
        transform,
        Box::new(RonModelLoader::new(config.assets.model_root.clone())),
        wiring::loader(config),
        wiring::assets(&config.assets),
    );
    loader.load_initial(&mut scene).await;
    info!(rendered = loader.rendered_count(), "View interactive");

    // Interaction.
    let mut dispatcher = InteractionDispatcher::new(wiring::dispatcher(&config.interaction));
    let mut handler = SelectionHandler::default();

    let mut summary = Summary {
        frames: args.frames,
        parcels: build.total,
        parcels_rendered: build.rendered,
        parcels_as_markers: build.degraded,
        parcels_failed: build.failed,
        ..Summary::default()
    };
    let modes = [ViewMode::Land, ViewMode::Income, ViewMode::Buildings, ViewMode::Citizens];
    let frame_time = Duration::from_millis(16);

    for frame in 0..args.frames {
        let now = Instant::now();

        // Background loading, one page at a time.
        if loader.status().background && frame % 12 == 0 {
            match loader.step(&mut scene).await {
                StepOutcome::Failed => summary.page_failures += 1,
                StepOutcome::Exhausted => info!(rendered = loader.rendered_count(), "Background loading finished"),
                _ => {}
            }
        }
        if frame == args.frames / 2 {
            source.remove_tail(args.entities / 10);
            info!("Refreshing entity data");
            loader.refresh(&mut scene).await;
        }

        // Camera orbit.
        let angle = frame as f32 * 0.004;
        let camera = Camera::looking_at(
            Vec3::new(40.0 * angle.sin(), 60.0, 40.0 * angle.cos()),
            Vec3::ZERO,
        );
        manager.set_camera(camera.position);

        // Pointer input.
        for event in pointer_script(frame, now, camera.viewport) {
            let registries: [&dyn MeshRegistry; 2] = [&loader, &manager];
            let cx = PickContext {
                camera: &camera,
                scene: &scene,
                registries: &registries,
            };
            match dispatcher.handle(event, &cx, &mut handler) {
                InteractionOutcome::Click(_) => summary.clicks += 1,
                InteractionOutcome::DragEnded => summary.drags += 1,
                _ => {}
            }
        }
        for command in handler.commands.drain(..) {
            if matches!(command, WorldCommand::HoverChanged(_)) {
                summary.hover_changes += 1;
            }
            manager.apply(&mut scene, command);
        }
        if let Some(id) = handler.clicked.take()
            && loader.mesh_for(&id).is_some()
        {
            match loader.details(&id).await {
                Ok(details) => {
                    summary.details_lookups += 1;
                    debug!(id = %id, name = %details.name, "Details");
                }
                Err(e) => warn!(id = %id, error = %e, "Details unavailable"),
            }
        }

        // Scripted data changes.
        if frame > 0 && frame % 200 == 0 {
            let mode = modes[(frame / 200) as usize % modes.len()];
            manager.apply(&mut scene, WorldCommand::ViewModeChanged(mode));
        }
        if frame > 0 && frame % 250 == 0 {
            let mut incomes = Vec::new();
            for id in &parcel_ids {
                if rng.random_bool(0.3) {
                    incomes.push((id.clone(), rng.random_range(50.0..5000.0)));
                }
            }
            manager.apply(&mut scene, WorldCommand::IncomeDataChanged(incomes));
        }

        // Upkeep.
        if let Some(report) = manager.tick(&mut scene, now) {
            summary.recovered += report.recovered.len() as u64;
        }
        if let Some(report) = loader.tick(&mut scene, now) {
            summary.recovered += report.recovered.len() as u64;
        }
        for event in manager.events_mut().drain().into_iter().chain(loader.events_mut().drain()) {
            match event {
                SceneEvent::EntityCreated { .. } => summary.entities_created += 1,
                SceneEvent::EntityRemoved { .. } => summary.entities_removed += 1,
                SceneEvent::DegradedModeChanged { active } => info!(active, "Degraded mode changed"),
            }
        }
        if frame % 100 == 0 {
            let on_screen = screen_positions(&camera, &scene, &loader).len();
            debug!(frame, on_screen, "Overlay anchors");
        }

        tokio::time::sleep(frame_time).await;
    }

    summary.fallback_map = manager.is_fallback_map();
    summary.overlays = manager.overlay_count();
    summary.indicators = manager.indicator_count();
    summary.entities_rendered = loader.rendered_count();
    summary.page_fetches = loader.fetch_count();
    summary.still_failing = manager.recovery().failed_count() + loader.recovery().failed_count();
    summary.dispatcher_disables = dispatcher.stats().disables;
    summary.live_meshes = scene.len();
    info!(
        entities = summary.entities_rendered,
        fetches = summary.page_fetches,
        injected_failures = source.failures(),
        recovered = summary.recovered,
        still_failing = summary.still_failing,
        live_meshes = summary.live_meshes,
        "Run finished"
    );

    loader.teardown(&mut scene);
    manager.teardown(&mut scene);
    Ok(summary)
}
