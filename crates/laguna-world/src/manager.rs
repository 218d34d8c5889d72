//! The layered scene manager.

use std::time::{Duration, Instant};

use glam::Vec3;
use laguna_coords::CoordinateTransform;
use laguna_lod::LodController;
use laguna_recovery::{ErrorRecoveryCoordinator, Outcome, RecoveryReport};
use laguna_scene::{EntityId, EventBuffer, Layer, MeshId, MeshRegistry, Scene, SceneEvent};

use crate::command::WorldCommand;
use crate::layers::Layers;
use crate::polygon::{GeoPolygon, OwnerTable};
use crate::view::ViewMode;

/// Runtime settings for [`LayeredSceneManager`].
#[derive(Clone, Debug, PartialEq)]
pub struct SceneManagerConfig {
    /// Minimum share of polygons with a base mesh before the fallback map is used.
    pub fallback_threshold: f32,
    pub visibility_interval: Duration,
    pub recovery_interval: Duration,
    /// Radius of centroid markers.
    pub marker_radius: f32,
    /// Radius of owner indicators.
    pub indicator_radius: f32,
    /// Scene height of parcel footprints.
    pub base_height: f32,
    pub scratch_pool_size: usize,
}

impl Default for SceneManagerConfig {
    fn default() -> Self {
        Self {
            fallback_threshold: 0.5,
            visibility_interval: Duration::from_secs(1),
            recovery_interval: Duration::from_secs(5),
            marker_radius: 0.5,
            indicator_radius: 0.2,
            base_height: 0.0,
            scratch_pool_size: 16,
        }
    }
}

/// Counts from [`LayeredSceneManager::create_bases`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub total: usize,
    /// Full footprints.
    pub rendered: usize,
    /// Centroid markers.
    pub degraded: usize,
    /// Neither; parked for recovery.
    pub failed: usize,
}

/// Where a polygon is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolygonState {
    Absent,
    BaseCreated,
    OverlayCreated,
    OverlaySkipped,
}

struct Ctx<'a> {
    layers: &'a mut Layers,
    scene: &'a mut Scene,
}

/// Owns the base, overlay and indicator layers of every parcel.
///
/// All mutation of those layers goes through this type; readers use the
/// [`MeshRegistry`] implementation.
pub struct LayeredSceneManager {
    layers: Layers,
    recovery: ErrorRecoveryCoordinator,
    next_visibility_sweep: Option<Instant>,
    torn_down: bool,
}

impl LayeredSceneManager {
    pub fn new(transform: CoordinateTransform, lod: LodController, config: SceneManagerConfig) -> Self {
        let recovery = ErrorRecoveryCoordinator::new(config.recovery_interval);
        Self {
            layers: Layers::new(transform, lod, config),
            recovery,
            next_visibility_sweep: None,
            torn_down: false,
        }
    }

    // --- building ---

    /// Build the base mesh of one polygon, falling back to a centroid marker.
    ///
    /// Bases are created once; calling this again for a known id only
    /// refreshes the stored polygon data.
    pub fn create_base(&mut self, scene: &mut Scene, polygon: GeoPolygon) -> Outcome<MeshId> {
        let id = polygon.id.clone();
        self.layers.polygons.insert(id.clone(), polygon.clone());
        if let Some(entry) = self.layers.bases.get(&id) {
            return if entry.is_marker() {
                Outcome::Degraded(entry.mesh)
            } else {
                Outcome::Rendered(entry.mesh)
            };
        }

        let mut cx = Ctx {
            layers: &mut self.layers,
            scene: &mut *scene,
        };
        let outcome = self.recovery.run_with_fallback(
            "land",
            &id,
            &mut cx,
            |cx| cx.layers.build_base(cx.scene, &polygon),
            |cx| cx.layers.build_marker(cx.scene, &polygon),
        );
        if !outcome.is_failed() {
            self.layers.remove_placeholder(scene, &id);
            self.decorate(scene, &id);
        }
        outcome
    }

    /// Build every polygon, then switch to the fallback map if too few
    /// produced a base mesh. Arms the recovery loop.
    pub fn create_bases(
        &mut self,
        scene: &mut Scene,
        polygons: impl IntoIterator<Item = GeoPolygon>,
        now: Instant,
    ) -> BuildReport {
        let polygons: Vec<GeoPolygon> = polygons.into_iter().collect();
        for polygon in &polygons {
            self.layers.polygons.insert(polygon.id.clone(), polygon.clone());
        }
        self.layers.recompute_income_range();

        let mut report = BuildReport {
            total: polygons.len(),
            ..BuildReport::default()
        };
        for polygon in polygons {
            match self.create_base(scene, polygon) {
                Outcome::Rendered(_) => report.rendered += 1,
                Outcome::Degraded(_) => report.degraded += 1,
                Outcome::Failed => report.failed += 1,
            }
        }
        tracing::info!(
            total = report.total,
            rendered = report.rendered,
            degraded = report.degraded,
            failed = report.failed,
            "Parcel bases built"
        );

        self.evaluate_degraded(scene);
        self.recovery.start(now);
        self.next_visibility_sweep
            .get_or_insert(now + self.layers.config.visibility_interval);
        report
    }

    fn decorate(&mut self, scene: &mut Scene, id: &EntityId) {
        let mut cx = Ctx {
            layers: &mut self.layers,
            scene,
        };
        self.recovery.run("overlay", id, &mut cx, |cx| {
            cx.layers.rebuild_decorations(cx.scene, id)
        });
    }

    fn decorate_all(&mut self, scene: &mut Scene) {
        let ids: Vec<EntityId> = self.layers.bases.keys().cloned().collect();
        for id in ids {
            self.decorate(scene, &id);
        }
    }

    // --- degraded mode ---

    fn evaluate_degraded(&mut self, scene: &mut Scene) {
        let ratio = self.layers.base_ratio();
        let degraded = ratio < self.layers.config.fallback_threshold;

        if degraded {
            self.layers.ensure_background(scene);
            self.layers.ensure_placeholders(scene);
        }
        if self.recovery.set_fallback_mode(degraded) {
            if degraded {
                tracing::info!(ratio, "Entering fallback map");
            } else {
                self.layers.clear_fallback_map(scene);
                tracing::info!(ratio, "Leaving fallback map");
            }
            self.layers
                .events
                .send(SceneEvent::DegradedModeChanged { active: degraded });
        }
    }

    pub fn is_fallback_map(&self) -> bool {
        self.recovery.is_fallback_mode()
    }

    // --- view state ---

    /// Switch overlays to `mode`. Returns `false` without touching the scene
    /// if `mode` is already active.
    pub fn set_view_mode(&mut self, scene: &mut Scene, mode: ViewMode) -> bool {
        if self.layers.view_mode == mode {
            return false;
        }
        tracing::debug!(from = ?self.layers.view_mode, to = ?mode, "View mode changed");
        self.layers.view_mode = mode;
        self.layers.clear_decorations(scene);
        self.decorate_all(scene);
        true
    }

    pub fn view_mode(&self) -> ViewMode {
        self.layers.view_mode
    }

    pub fn set_selection(&mut self, scene: &mut Scene, id: Option<EntityId>) {
        let previous = std::mem::replace(&mut self.layers.selection, id.clone());
        for id in [previous, id].into_iter().flatten() {
            self.layers.refresh_highlight(scene, &id);
        }
    }

    pub fn set_hover(&mut self, scene: &mut Scene, id: Option<EntityId>) {
        let previous = std::mem::replace(&mut self.layers.hover, id.clone());
        for id in [previous, id].into_iter().flatten() {
            self.layers.refresh_highlight(scene, &id);
        }
    }

    pub fn selection(&self) -> Option<&EntityId> {
        self.layers.selection.as_ref()
    }

    pub fn hover(&self) -> Option<&EntityId> {
        self.layers.hover.as_ref()
    }

    pub fn set_ownership(&mut self, scene: &mut Scene, id: &EntityId, owner: Option<String>) {
        let Some(polygon) = self.layers.polygons.get_mut(id) else {
            tracing::debug!(id = %id, "Ownership change for unknown parcel");
            return;
        };
        polygon.owner = owner;
        if self.layers.bases.contains_key(id) {
            self.decorate(scene, id);
        }
    }

    pub fn set_incomes(&mut self, scene: &mut Scene, incomes: Vec<(EntityId, f64)>) {
        for (id, income) in incomes {
            if let Some(polygon) = self.layers.polygons.get_mut(&id) {
                polygon.simulated_income = Some(income);
            }
        }
        self.layers.recompute_income_range();
        if self.layers.view_mode == ViewMode::Income {
            self.decorate_all(scene);
        }
    }

    pub fn set_owner_styles(&mut self, scene: &mut Scene, owners: OwnerTable) {
        self.layers.owners = owners;
        if self.layers.view_mode == ViewMode::Land {
            self.decorate_all(scene);
        }
    }

    /// Apply an inbound notification.
    pub fn apply(&mut self, scene: &mut Scene, command: WorldCommand) {
        match command {
            WorldCommand::ViewModeChanged(mode) => {
                self.set_view_mode(scene, mode);
            }
            WorldCommand::SelectionChanged(id) => self.set_selection(scene, id),
            WorldCommand::HoverChanged(id) => self.set_hover(scene, id),
            WorldCommand::OwnershipChanged { id, owner } => self.set_ownership(scene, &id, owner),
            WorldCommand::IncomeDataChanged(incomes) => self.set_incomes(scene, incomes),
            WorldCommand::OwnerStylesChanged(owners) => self.set_owner_styles(scene, owners),
        }
    }

    // --- frame work ---

    pub fn set_camera(&mut self, position: Vec3) {
        self.layers.lod.set_camera(position);
    }

    /// Force every tracked mesh visible and mark its material dirty.
    pub fn visibility_guard(&mut self, scene: &mut Scene) -> usize {
        let mut touched = 0;
        for id in self.layers.all_meshes() {
            if let Some(mesh) = scene.get_mut(id) {
                mesh.visible = true;
                mesh.material.needs_update = true;
                touched += 1;
            }
        }
        touched
    }

    /// Per-frame upkeep: recovery cycle, fallback-map evaluation, visibility
    /// sweep and LOD refresh, each on its own schedule.
    pub fn tick(&mut self, scene: &mut Scene, now: Instant) -> Option<RecoveryReport> {
        if self.torn_down {
            return None;
        }

        let mut cx = Ctx {
            layers: &mut self.layers,
            scene: &mut *scene,
        };
        let report = self
            .recovery
            .tick(now, &mut cx, |cx, id| cx.layers.render_full(cx.scene, id));
        if report.is_some() || self.recovery.is_fallback_mode() {
            self.evaluate_degraded(scene);
        }

        let interval = self.layers.config.visibility_interval;
        let due = *self.next_visibility_sweep.get_or_insert(now + interval);
        if now >= due {
            let touched = self.visibility_guard(scene);
            tracing::trace!(touched, "Visibility sweep");
            self.next_visibility_sweep = Some(now + interval);
        }

        if self.layers.lod.should_update(now) {
            self.refresh_lod(scene);
        }
        report
    }

    fn refresh_lod(&mut self, scene: &mut Scene) {
        let ids: Vec<EntityId> = self
            .layers
            .bases
            .iter()
            .filter(|(_, entry)| !entry.is_marker())
            .map(|(id, _)| id.clone())
            .collect();
        let mut refreshed = 0usize;
        for id in ids {
            match self.layers.refresh_base(scene, &id) {
                Ok(true) => refreshed += 1,
                Ok(false) => {}
                Err(error) => tracing::debug!(id = %id, error = %error, "LOD refresh skipped"),
            }
        }
        if refreshed > 0 {
            tracing::debug!(refreshed, "Parcel LOD refreshed");
        }
    }

    /// Remove every mesh and stop the recovery loop.
    pub fn teardown(&mut self, scene: &mut Scene) {
        for id in self.layers.all_meshes().collect::<Vec<_>>() {
            scene.remove(id);
        }
        for (id, _) in self.layers.bases.drain() {
            self.layers.events.send(SceneEvent::EntityRemoved {
                id,
                layer: Layer::Base,
            });
        }
        self.layers.overlays.clear();
        self.layers.indicators.clear();
        self.layers.placeholders.clear();
        self.layers.background = None;
        self.recovery.shutdown();
        self.torn_down = true;
        tracing::info!("Layered scene torn down");
    }

    // --- inspection ---

    pub fn polygon_state(&self, id: &EntityId) -> PolygonState {
        if !self.layers.bases.contains_key(id) {
            PolygonState::Absent
        } else if self.layers.overlays.contains_key(id) {
            PolygonState::OverlayCreated
        } else if !self.layers.view_mode.shows_overlay() {
            PolygonState::OverlaySkipped
        } else {
            PolygonState::BaseCreated
        }
    }

    pub fn base_mesh(&self, id: &EntityId) -> Option<MeshId> {
        self.layers.bases.get(id).map(|b| b.mesh)
    }

    pub fn overlay_mesh(&self, id: &EntityId) -> Option<MeshId> {
        self.layers.overlays.get(id).copied()
    }

    pub fn indicator_mesh(&self, id: &EntityId) -> Option<MeshId> {
        self.layers.indicators.get(id).copied()
    }

    pub fn is_marker(&self, id: &EntityId) -> bool {
        self.layers.bases.get(id).is_some_and(|b| b.is_marker())
    }

    pub fn polygon(&self, id: &EntityId) -> Option<&GeoPolygon> {
        self.layers.polygons.get(id)
    }

    pub fn base_count(&self) -> usize {
        self.layers.bases.len()
    }

    pub fn overlay_count(&self) -> usize {
        self.layers.overlays.len()
    }

    pub fn indicator_count(&self) -> usize {
        self.layers.indicators.len()
    }

    pub fn placeholder_count(&self) -> usize {
        self.layers.placeholders.len()
    }

    pub fn background(&self) -> Option<MeshId> {
        self.layers.background
    }

    pub fn recovery(&self) -> &ErrorRecoveryCoordinator {
        &self.recovery
    }

    pub fn transform(&self) -> &CoordinateTransform {
        &self.layers.transform
    }

    pub fn events(&self) -> &EventBuffer<SceneEvent> {
        &self.layers.events
    }

    pub fn events_mut(&mut self) -> &mut EventBuffer<SceneEvent> {
        &mut self.layers.events
    }
}

impl MeshRegistry for LayeredSceneManager {
    fn for_each_mesh(&self, f: &mut dyn FnMut(&EntityId, MeshId)) {
        for (id, entry) in &self.layers.bases {
            f(id, entry.mesh);
        }
    }

    fn mesh_for(&self, id: &EntityId) -> Option<MeshId> {
        self.base_mesh(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polygon::OwnerStyle;
    use crate::view::{HOVER_COLOR, SELECTION_COLOR, income_color};
    use laguna_coords::{GeoPoint, SceneBounds};
    use laguna_scene::Color;

    const LAT: f64 = 45.4371;
    const LNG: f64 = 12.3358;

    fn manager() -> LayeredSceneManager {
        let transform = CoordinateTransform::new(SceneBounds::default()).unwrap();
        LayeredSceneManager::new(transform, LodController::default(), SceneManagerConfig::default())
    }

    /// Square parcel of `half` degrees around an offset from the center.
    fn square(id: &str, dlat: f64, dlng: f64, half: f64) -> GeoPolygon {
        let (lat, lng) = (LAT + dlat, LNG + dlng);
        GeoPolygon::new(
            id,
            vec![
                GeoPoint::new(lat - half, lng - half),
                GeoPoint::new(lat - half, lng + half),
                GeoPoint::new(lat + half, lng + half),
                GeoPoint::new(lat + half, lng - half),
            ],
        )
    }

    fn broken(id: &str) -> GeoPolygon {
        GeoPolygon::new(id, vec![GeoPoint::new(91.0, 0.0), GeoPoint::new(f64::NAN, 0.0)])
    }

    fn id(s: &str) -> EntityId {
        EntityId::new(s)
    }

    #[test]
    fn test_create_base_builds_footprint() {
        let mut scene = Scene::new();
        let mut mgr = manager();
        let out = mgr.create_base(&mut scene, square("a", 0.0, 0.0, 0.001));

        let Outcome::Rendered(mesh) = out else {
            panic!("expected a footprint, got {out:?}");
        };
        let mesh = scene.get(mesh).unwrap();
        assert_eq!(mesh.layer, Layer::Base);
        assert!(mesh.tag.is_base_land);
        assert_eq!(mgr.polygon_state(&id("a")), PolygonState::OverlayCreated);
        assert!(matches!(
            mgr.events().read().next(),
            Some(SceneEvent::EntityCreated { layer: Layer::Base, .. })
        ));
    }

    #[test]
    fn test_too_few_vertices_degrades_to_marker() {
        let mut scene = Scene::new();
        let mut mgr = manager();
        let polygon = GeoPolygon::new("m", vec![GeoPoint::new(LAT, LNG), GeoPoint::new(LAT + 0.001, LNG)])
            .with_centroid(GeoPoint::new(LAT, LNG));

        let out = mgr.create_base(&mut scene, polygon);
        assert!(out.is_degraded());
        assert!(mgr.is_marker(&id("m")));
        let mesh = scene.get(mgr.base_mesh(&id("m")).unwrap()).unwrap();
        assert!(!mesh.tag.is_base_land);
        assert!(!mgr.recovery().is_failed(&id("m")));
    }

    #[test]
    fn test_unrenderable_polygon_enters_failure_set() {
        let mut scene = Scene::new();
        let mut mgr = manager();
        assert!(mgr.create_base(&mut scene, broken("x")).is_failed());
        assert!(mgr.recovery().is_failed(&id("x")));
        assert_eq!(mgr.polygon_state(&id("x")), PolygonState::Absent);
    }

    /// A repeated view mode leaves every overlay handle untouched.
    #[test]
    fn test_set_view_mode_is_idempotent() {
        let mut scene = Scene::new();
        let mut mgr = manager();
        mgr.create_bases(
            &mut scene,
            [
                square("a", 0.0, 0.0, 0.001).with_income(1.0),
                square("b", 0.003, 0.0, 0.001).with_income(2.0),
            ],
            Instant::now(),
        );
        assert!(mgr.set_view_mode(&mut scene, ViewMode::Income));
        assert_eq!(mgr.overlay_count(), 2);
        let before: Vec<_> = ["a", "b"].iter().map(|s| mgr.overlay_mesh(&id(s))).collect();
        let meshes = scene.len();

        assert!(!mgr.set_view_mode(&mut scene, ViewMode::Income));
        let after: Vec<_> = ["a", "b"].iter().map(|s| mgr.overlay_mesh(&id(s))).collect();
        assert_eq!(before, after);
        assert_eq!(scene.len(), meshes);
    }

    #[test]
    fn test_view_switch_keeps_bases_and_rebuilds_overlays() {
        let mut scene = Scene::new();
        let mut mgr = manager();
        let polygon = square("a", 0.0, 0.0, 0.001).with_owner("Dandolo").with_income(10.0);
        mgr.create_bases(&mut scene, [polygon], Instant::now());
        let base = mgr.base_mesh(&id("a"));
        let overlay = mgr.overlay_mesh(&id("a"));
        assert!(mgr.indicator_mesh(&id("a")).is_some());

        mgr.set_view_mode(&mut scene, ViewMode::Income);
        assert_eq!(mgr.base_mesh(&id("a")), base);
        assert_ne!(mgr.overlay_mesh(&id("a")), overlay);
        assert!(!scene.contains(overlay.unwrap()));
        assert_eq!(mgr.indicator_count(), 0);

        mgr.set_view_mode(&mut scene, ViewMode::Buildings);
        assert_eq!(mgr.overlay_count(), 0);
        assert_eq!(mgr.polygon_state(&id("a")), PolygonState::OverlaySkipped);
    }

    #[test]
    fn test_income_overlay_follows_live_range() {
        let mut scene = Scene::new();
        let mut mgr = manager();
        mgr.create_bases(
            &mut scene,
            [
                square("poor", 0.0, 0.0, 0.001).with_income(0.0),
                square("rich", 0.003, 0.0, 0.001).with_income(100.0),
            ],
            Instant::now(),
        );
        mgr.set_view_mode(&mut scene, ViewMode::Income);
        let color = |mgr: &LayeredSceneManager, scene: &Scene, s: &str| {
            scene.get(mgr.overlay_mesh(&id(s)).unwrap()).unwrap().material.color
        };
        assert!(color(&mgr, &scene, "poor").approx_eq(&income_color(0.0, 0.0, 100.0), 1e-6));

        mgr.apply(
            &mut scene,
            WorldCommand::IncomeDataChanged(vec![(id("rich"), 50.0)]),
        );
        assert!(color(&mgr, &scene, "rich").approx_eq(&income_color(1.0, 0.0, 1.0), 1e-6));
    }

    #[test]
    fn test_ownership_change_adds_indicator() {
        let mut scene = Scene::new();
        let mut mgr = manager();
        let mut owners = OwnerTable::new();
        owners.insert(
            "Morosini",
            OwnerStyle {
                color: Color::from_hex(0x004080),
                coat_of_arms: Some("arms/morosini.png".into()),
            },
        );
        mgr.apply(&mut scene, WorldCommand::OwnerStylesChanged(owners));
        mgr.create_bases(&mut scene, [square("a", 0.0, 0.0, 0.001)], Instant::now());
        assert_eq!(mgr.indicator_count(), 0);

        mgr.apply(
            &mut scene,
            WorldCommand::OwnershipChanged {
                id: id("a"),
                owner: Some("Morosini".into()),
            },
        );
        let indicator = scene.get(mgr.indicator_mesh(&id("a")).unwrap()).unwrap();
        assert_eq!(indicator.material.color, Color::from_hex(0x004080));
        assert_eq!(indicator.material.texture.as_deref(), Some("arms/morosini.png"));
    }

    #[test]
    fn test_selection_wins_over_hover() {
        let mut scene = Scene::new();
        let mut mgr = manager();
        mgr.create_bases(&mut scene, [square("a", 0.0, 0.0, 0.001)], Instant::now());
        let base = mgr.base_mesh(&id("a")).unwrap();
        let original = scene.get(base).unwrap().material.color;
        let color = |scene: &Scene| scene.get(base).unwrap().material.color;

        mgr.set_selection(&mut scene, Some(id("a")));
        mgr.set_hover(&mut scene, Some(id("a")));
        assert_eq!(color(&scene), SELECTION_COLOR);

        mgr.set_selection(&mut scene, None);
        assert_eq!(color(&scene), HOVER_COLOR);

        mgr.set_hover(&mut scene, None);
        assert_eq!(color(&scene), original);
    }

    #[test]
    fn test_visibility_guard_reshows_hidden_meshes() {
        let mut scene = Scene::new();
        let mut mgr = manager();
        let t0 = Instant::now();
        mgr.create_bases(&mut scene, [square("a", 0.0, 0.0, 0.001)], t0);
        let base = mgr.base_mesh(&id("a")).unwrap();
        scene.get_mut(base).unwrap().visible = false;

        mgr.tick(&mut scene, t0 + Duration::from_millis(500));
        assert!(!scene.get(base).unwrap().visible);

        mgr.tick(&mut scene, t0 + Duration::from_millis(1000));
        let mesh = scene.get(base).unwrap();
        assert!(mesh.visible);
        assert!(mesh.material.needs_update);
    }

    #[test]
    fn test_visibility_sweep_runs_for_single_creates() {
        let mut scene = Scene::new();
        let mut mgr = manager();
        mgr.create_base(&mut scene, square("a", 0.0, 0.0, 0.001));
        let base = mgr.base_mesh(&id("a")).unwrap();
        scene.get_mut(base).unwrap().visible = false;

        let t0 = Instant::now();
        mgr.tick(&mut scene, t0);
        assert!(!scene.get(base).unwrap().visible);

        mgr.tick(&mut scene, t0 + Duration::from_millis(1000));
        assert!(scene.get(base).unwrap().visible);
    }

    #[test]
    fn test_mass_failure_draws_fallback_map() {
        let mut scene = Scene::new();
        let mut mgr = manager();
        let report = mgr.create_bases(
            &mut scene,
            [square("ok", 0.0, 0.0, 0.001), broken("b1"), broken("b2"), broken("b3")],
            Instant::now(),
        );

        assert_eq!(report.rendered, 1);
        assert_eq!(report.failed, 3);
        assert!(mgr.is_fallback_map());
        assert!(mgr.background().is_some_and(|m| scene.contains(m)));
        assert_eq!(mgr.placeholder_count(), 3);
        assert!(
            mgr.events()
                .read()
                .any(|e| *e == SceneEvent::DegradedModeChanged { active: true })
        );
    }

    #[test]
    fn test_majority_success_stays_normal() {
        let mut scene = Scene::new();
        let mut mgr = manager();
        mgr.create_bases(
            &mut scene,
            [square("a", 0.0, 0.0, 0.001), square("b", 0.003, 0.0, 0.001), broken("c")],
            Instant::now(),
        );
        assert!(!mgr.is_fallback_map());
        assert_eq!(mgr.placeholder_count(), 0);
        assert_eq!(mgr.background(), None);
    }

    /// Capacity failures park parcels; once room frees up recovery renders
    /// them and the fallback map is dismantled.
    #[test]
    fn test_recovery_leaves_fallback_map() {
        let mut scene = Scene::with_capacity_limit(1);
        let mut mgr = manager();
        mgr.set_view_mode(&mut scene, ViewMode::Buildings);
        let t0 = Instant::now();
        mgr.create_bases(
            &mut scene,
            (0..4).map(|i| square(&format!("p{i}"), 0.003 * i as f64, 0.0, 0.001)),
            t0,
        );
        assert!(mgr.is_fallback_map());
        assert_eq!(mgr.recovery().failed_count(), 3);

        scene.set_capacity_limit(None);
        assert!(mgr.tick(&mut scene, t0 + Duration::from_secs(1)).is_none());
        assert!(mgr.is_fallback_map());
        assert!(mgr.background().is_some(), "background retried while degraded");

        let report = mgr.tick(&mut scene, t0 + Duration::from_secs(5)).unwrap();
        assert_eq!(report.recovered.len(), 3);
        assert_eq!(mgr.base_count(), 4);
        assert!(!mgr.is_fallback_map());
        assert_eq!(mgr.placeholder_count(), 0);
        assert_eq!(mgr.background(), None);
        assert_eq!(scene.len(), 4);
        assert!(
            mgr.events()
                .read()
                .any(|e| *e == SceneEvent::DegradedModeChanged { active: false })
        );
    }

    #[test]
    fn test_lod_refresh_updates_geometry_in_place() {
        let mut scene = Scene::new();
        let mut mgr = manager();
        let ring: Vec<GeoPoint> = (0..40)
            .map(|i| {
                let t = i as f64 / 40.0 * std::f64::consts::TAU;
                GeoPoint::new(LAT + 0.002 * t.sin(), LNG + 0.002 * t.cos())
            })
            .collect();
        let t0 = Instant::now();
        mgr.create_bases(&mut scene, [GeoPolygon::new("round", ring)], t0);
        let mesh = mgr.base_mesh(&id("round")).unwrap();
        assert_eq!(scene.get(mesh).unwrap().geometry.vertex_count(), 40);

        mgr.set_camera(Vec3::new(0.0, 500.0, 0.0));
        mgr.tick(&mut scene, t0);
        assert_eq!(mgr.base_mesh(&id("round")), Some(mesh));
        assert!(scene.get(mesh).unwrap().geometry.vertex_count() < 40);
    }

    #[test]
    fn test_teardown_clears_scene_and_stops_recovery() {
        let mut scene = Scene::new();
        let mut mgr = manager();
        let t0 = Instant::now();
        mgr.create_bases(&mut scene, [square("a", 0.0, 0.0, 0.001), broken("b")], t0);
        mgr.teardown(&mut scene);

        assert!(scene.is_empty());
        assert_eq!(mgr.base_count(), 0);
        assert!(mgr.tick(&mut scene, t0 + Duration::from_secs(60)).is_none());
        assert!(
            mgr.events()
                .read()
                .any(|e| matches!(e, SceneEvent::EntityRemoved { .. }))
        );
    }

    #[test]
    fn test_registry_lists_bases() {
        let mut scene = Scene::new();
        let mut mgr = manager();
        mgr.create_bases(
            &mut scene,
            [square("a", 0.0, 0.0, 0.001), square("b", 0.003, 0.0, 0.001)],
            Instant::now(),
        );
        let mut seen = Vec::new();
        mgr.for_each_mesh(&mut |id, mesh| seen.push((id.clone(), mesh)));
        seen.sort();
        assert_eq!(seen.len(), 2);
        assert_eq!(mgr.mesh_for(&id("a")), Some(seen[0].1));
    }
}
