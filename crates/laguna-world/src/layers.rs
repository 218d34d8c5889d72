//! Mesh registries and the builders that fill them.
//!
//! Everything here returns `Result<_, RenderError>`; the manager routes
//! calls through the recovery coordinator so nothing escapes to callers.

use std::collections::BTreeMap;

use glam::{Vec2, Vec3};
use laguna_coords::CoordinateTransform;
use laguna_lod::{LodController, MIN_POINTS};
use laguna_pool::ObjectPool;
use laguna_recovery::RenderError;
use laguna_scene::{
    Color, EntityId, EventBuffer, Geometry, GeometryError, Layer, Material, Mesh, MeshId, MeshTag,
    Scene, SceneError, SceneEvent, Transform,
};
use rustc_hash::FxHashMap;

use crate::manager::SceneManagerConfig;
use crate::polygon::{GeoPolygon, OwnerTable};
use crate::view::{HOVER_COLOR, SELECTION_COLOR, ViewMode, income_color};

const BASE_COLOR: Color = Color::rgb(0.76, 0.7, 0.55);
const MARKER_COLOR: Color = Color::rgb(0.85, 0.45, 0.2);
const PLACEHOLDER_COLOR: Color = Color::rgb(0.6, 0.6, 0.6);
const BACKGROUND_COLOR: Color = Color::rgb(0.25, 0.4, 0.5);
const OVERLAY_OPACITY: f32 = 0.6;
const OVERLAY_LIFT: f32 = 0.02;
const INDICATOR_LIFT: f32 = 0.05;
const MARKER_SEGMENTS: u32 = 16;

/// Base-layer bookkeeping for one polygon.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BaseEntry {
    pub mesh: MeshId,
    /// Detail level the footprint was simplified at; `None` for markers.
    pub detail: Option<f32>,
}

impl BaseEntry {
    pub fn is_marker(&self) -> bool {
        self.detail.is_none()
    }
}

pub(crate) struct Layers {
    pub transform: CoordinateTransform,
    pub lod: LodController,
    pub config: SceneManagerConfig,
    pub owners: OwnerTable,
    pub polygons: BTreeMap<EntityId, GeoPolygon>,
    pub bases: FxHashMap<EntityId, BaseEntry>,
    pub overlays: FxHashMap<EntityId, MeshId>,
    pub indicators: FxHashMap<EntityId, MeshId>,
    pub placeholders: FxHashMap<EntityId, MeshId>,
    pub background: Option<MeshId>,
    pub view_mode: ViewMode,
    pub selection: Option<EntityId>,
    pub hover: Option<EntityId>,
    pub income_range: Option<(f64, f64)>,
    pub scratch: ObjectPool<Vec<Vec2>>,
    pub events: EventBuffer<SceneEvent>,
}

impl Layers {
    pub fn new(transform: CoordinateTransform, lod: LodController, config: SceneManagerConfig) -> Self {
        let scratch = ObjectPool::new(config.scratch_pool_size, Vec::new).with_reset(Vec::clear);
        Self {
            transform,
            lod,
            config,
            owners: OwnerTable::new(),
            polygons: BTreeMap::new(),
            bases: FxHashMap::default(),
            overlays: FxHashMap::default(),
            indicators: FxHashMap::default(),
            placeholders: FxHashMap::default(),
            background: None,
            view_mode: ViewMode::default(),
            selection: None,
            hover: None,
            income_range: None,
            scratch,
            events: EventBuffer::new(),
        }
    }

    // --- base layer ---

    /// Project, clean and simplify a polygon ring into scene XZ.
    ///
    /// Vertices that fail validation are dropped; fewer than three survivors
    /// is a geometry error.
    pub fn footprint(&mut self, polygon: &GeoPolygon) -> Result<(Vec<Vec2>, f32), RenderError> {
        let transform = &self.transform;
        let lod = &self.lod;
        let height = self.config.base_height;
        self.scratch.with(|ring| {
            for vertex in &polygon.vertices {
                match transform.try_to_scene_at(*vertex, height) {
                    Ok(p) => ring.push(Vec2::new(p.x, p.z)),
                    Err(error) => {
                        tracing::debug!(id = %polygon.id, error = %error, "Dropping vertex");
                    }
                }
            }
            let closed = ring.len() > 1 && ring[0].distance_squared(ring[ring.len() - 1]) <= f32::EPSILON;
            if closed {
                ring.pop();
            }
            if ring.len() < MIN_POINTS {
                return Err(GeometryError::TooFewVertices(ring.len()).into());
            }

            let center = ring.iter().copied().sum::<Vec2>() / ring.len() as f32;
            let detail = lod.detail_level(Vec3::new(center.x, height, center.y));
            Ok((lod.simplify(ring, detail), detail))
        })
    }

    pub fn build_base(&mut self, scene: &mut Scene, polygon: &GeoPolygon) -> Result<MeshId, RenderError> {
        let (ring, detail) = self.footprint(polygon)?;
        let geometry = Geometry::polygon(&ring, self.config.base_height)?;
        let mesh = Mesh::new(geometry, Material::solid(BASE_COLOR), Layer::Base).with_tag(MeshTag {
            entity: Some(polygon.id.clone()),
            is_base_land: true,
            is_fallback: false,
        });
        let id = scene.insert(mesh)?;
        self.register_base(
            &polygon.id,
            BaseEntry {
                mesh: id,
                detail: Some(detail),
            },
        );
        Ok(id)
    }

    /// Small disc at the polygon's centroid.
    pub fn build_marker(&mut self, scene: &mut Scene, polygon: &GeoPolygon) -> Result<MeshId, RenderError> {
        let point = polygon
            .marker_point()
            .ok_or(GeometryError::TooFewVertices(0))?;
        let center = self
            .transform
            .try_to_scene_at(point, self.config.base_height)?;
        let geometry = Geometry::disc(Vec3::ZERO, self.config.marker_radius, MARKER_SEGMENTS)?;
        let mesh = Mesh::new(geometry, Material::solid(MARKER_COLOR), Layer::Base)
            .with_transform(Transform::from_translation(center))
            .with_tag(MeshTag {
                entity: Some(polygon.id.clone()),
                is_base_land: false,
                is_fallback: true,
            });
        let id = scene.insert(mesh)?;
        self.register_base(&polygon.id, BaseEntry { mesh: id, detail: None });
        Ok(id)
    }

    fn register_base(&mut self, id: &EntityId, entry: BaseEntry) {
        self.bases.insert(id.clone(), entry);
        self.events.send(SceneEvent::EntityCreated {
            id: id.clone(),
            layer: Layer::Base,
        });
    }

    /// Re-simplify a footprint in place if its detail level moved.
    pub fn refresh_base(&mut self, scene: &mut Scene, id: &EntityId) -> Result<bool, RenderError> {
        let Some(entry) = self.bases.get(id).copied() else {
            return Ok(false);
        };
        let Some(current) = entry.detail else {
            return Ok(false);
        };
        let Some(polygon) = self.polygons.get(id).cloned() else {
            return Ok(false);
        };
        let (ring, detail) = self.footprint(&polygon)?;
        if (detail - current).abs() <= f32::EPSILON {
            return Ok(false);
        }
        let geometry = Geometry::polygon(&ring, self.config.base_height)?;

        scene.try_get_mut(entry.mesh)?.geometry = geometry.clone();
        if let Some(overlay) = self.overlays.get(id).and_then(|m| scene.get_mut(*m)) {
            overlay.geometry = geometry;
        }
        self.bases.insert(
            id.clone(),
            BaseEntry {
                mesh: entry.mesh,
                detail: Some(detail),
            },
        );
        Ok(true)
    }

    /// Full, non-fallback render of one polygon, used by recovery.
    pub fn render_full(&mut self, scene: &mut Scene, id: &EntityId) -> Result<(), RenderError> {
        let Some(polygon) = self.polygons.get(id).cloned() else {
            return Ok(());
        };
        if !self.bases.contains_key(id) {
            self.build_base(scene, &polygon)?;
        }
        self.remove_placeholder(scene, id);
        self.rebuild_decorations(scene, id)
    }

    // --- overlay and indicator layers ---

    /// Recreate the overlay and indicator of one polygon for the current mode.
    pub fn rebuild_decorations(&mut self, scene: &mut Scene, id: &EntityId) -> Result<(), RenderError> {
        remove_from(scene, &mut self.overlays, id);
        remove_from(scene, &mut self.indicators, id);
        self.build_overlay(scene, id)?;
        self.build_indicator(scene, id)?;
        self.refresh_highlight(scene, id);
        Ok(())
    }

    fn overlay_color(&self, polygon: &GeoPolygon) -> Option<Color> {
        match self.view_mode {
            ViewMode::Land => Some(self.owners.color_for(polygon.owner.as_deref())),
            ViewMode::Income => {
                let (min, max) = self.income_range?;
                Some(income_color(polygon.simulated_income?, min, max))
            }
            ViewMode::Buildings | ViewMode::Citizens => None,
        }
    }

    fn build_overlay(&mut self, scene: &mut Scene, id: &EntityId) -> Result<Option<MeshId>, RenderError> {
        let (Some(polygon), Some(base)) = (self.polygons.get(id), self.bases.get(id)) else {
            return Ok(None);
        };
        let Some(color) = self.overlay_color(polygon) else {
            return Ok(None);
        };
        let base_mesh = scene
            .get(base.mesh)
            .ok_or(SceneError::StaleHandle(base.mesh))?;
        let mut transform = base_mesh.transform;
        transform.translation.y += OVERLAY_LIFT;
        let mesh = Mesh::new(
            base_mesh.geometry.clone(),
            Material::translucent(color, OVERLAY_OPACITY),
            Layer::Overlay,
        )
        .with_transform(transform)
        .with_tag(MeshTag {
            entity: Some(id.clone()),
            ..MeshTag::default()
        });
        let mesh_id = scene.insert(mesh)?;
        self.overlays.insert(id.clone(), mesh_id);
        Ok(Some(mesh_id))
    }

    fn build_indicator(&mut self, scene: &mut Scene, id: &EntityId) -> Result<Option<MeshId>, RenderError> {
        if !self.view_mode.shows_indicators() {
            return Ok(None);
        }
        let (Some(polygon), Some(base)) = (self.polygons.get(id), self.bases.get(id)) else {
            return Ok(None);
        };
        let Some(owner) = polygon.owner.as_deref() else {
            return Ok(None);
        };
        let center = scene
            .get(base.mesh)
            .and_then(Mesh::world_bounds)
            .map(|b| b.center())
            .ok_or(SceneError::StaleHandle(base.mesh))?;

        let mut material = Material::solid(self.owners.color_for(Some(owner)));
        material.texture = self.owners.get(owner).and_then(|s| s.coat_of_arms.clone());
        let geometry = Geometry::disc(Vec3::ZERO, self.config.indicator_radius, MARKER_SEGMENTS)?;
        let mesh = Mesh::new(geometry, material, Layer::Indicator)
            .with_transform(Transform::from_translation(center + Vec3::Y * INDICATOR_LIFT))
            .with_tag(MeshTag {
                entity: Some(id.clone()),
                ..MeshTag::default()
            });
        let mesh_id = scene.insert(mesh)?;
        self.indicators.insert(id.clone(), mesh_id);
        Ok(Some(mesh_id))
    }

    pub fn clear_decorations(&mut self, scene: &mut Scene) {
        for (_, mesh) in self.overlays.drain().chain(self.indicators.drain()) {
            scene.remove(mesh);
        }
    }

    pub fn recompute_income_range(&mut self) {
        self.income_range = self
            .polygons
            .values()
            .filter_map(|p| p.simulated_income)
            .filter(|v| v.is_finite())
            .fold(None, |range, v| match range {
                None => Some((v, v)),
                Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
            });
    }

    // --- highlights ---

    /// Apply the selection/hover precedence to every mesh of `id`.
    pub fn refresh_highlight(&mut self, scene: &mut Scene, id: &EntityId) {
        let wanted = if self.selection.as_ref() == Some(id) {
            Some(SELECTION_COLOR)
        } else if self.hover.as_ref() == Some(id) {
            Some(HOVER_COLOR)
        } else {
            None
        };
        let meshes = [
            self.bases.get(id).map(|b| b.mesh),
            self.overlays.get(id).copied(),
        ];
        for m in meshes.into_iter().flatten() {
            let Some(mesh) = scene.get_mut(m) else { continue };
            match wanted {
                Some(color) => mesh.highlight(color),
                None => mesh.clear_highlight(),
            }
        }
    }

    // --- fallback map ---

    pub fn ensure_background(&mut self, scene: &mut Scene) {
        if self.background.is_some_and(|m| scene.contains(m)) {
            return;
        }
        let bounds = self.transform.bounds();
        let extent = 2.0 * self.transform.max_radius_deg() * bounds.scale;
        let width = (extent * bounds.lat_correction_factor) as f32;
        let plane = Geometry::plane(width, extent as f32, self.config.base_height - OVERLAY_LIFT);
        let inserted = plane.map_err(RenderError::from).and_then(|geometry| {
            let mesh = Mesh::new(geometry, Material::solid(BACKGROUND_COLOR), Layer::Background)
                .with_tag(MeshTag {
                    is_fallback: true,
                    ..MeshTag::default()
                });
            scene.insert(mesh).map_err(RenderError::from)
        });
        match inserted {
            Ok(mesh) => self.background = Some(mesh),
            Err(error) => tracing::warn!(error = %error, "Fallback background unavailable"),
        }
    }

    /// One placeholder per polygon without a base mesh.
    pub fn ensure_placeholders(&mut self, scene: &mut Scene) {
        let missing: Vec<EntityId> = self
            .polygons
            .keys()
            .filter(|id| !self.bases.contains_key(*id))
            .filter(|id| !self.placeholders.get(*id).is_some_and(|m| scene.contains(*m)))
            .cloned()
            .collect();
        for id in missing {
            let Some(polygon) = self.polygons.get(&id) else {
                continue;
            };
            let position = match polygon.marker_point() {
                Some(point) => self.transform.to_scene_at(point, self.config.base_height),
                None => self.transform.center_position(self.config.base_height),
            };
            let size = Vec3::new(
                self.config.marker_radius * 2.0,
                self.config.marker_radius,
                self.config.marker_radius * 2.0,
            );
            let inserted = Geometry::cuboid(size)
                .map_err(RenderError::from)
                .and_then(|geometry| {
                    let mesh = Mesh::new(geometry, Material::solid(PLACEHOLDER_COLOR), Layer::Placeholder)
                        .with_transform(Transform::from_translation(position))
                        .with_tag(MeshTag {
                            entity: Some(id.clone()),
                            is_base_land: false,
                            is_fallback: true,
                        });
                    scene.insert(mesh).map_err(RenderError::from)
                });
            match inserted {
                Ok(mesh) => {
                    self.placeholders.insert(id, mesh);
                }
                Err(error) => tracing::warn!(id = %id, error = %error, "Placeholder unavailable"),
            }
        }
    }

    pub fn remove_placeholder(&mut self, scene: &mut Scene, id: &EntityId) {
        remove_from(scene, &mut self.placeholders, id);
    }

    pub fn clear_fallback_map(&mut self, scene: &mut Scene) {
        for (_, mesh) in self.placeholders.drain() {
            scene.remove(mesh);
        }
        if let Some(mesh) = self.background.take() {
            scene.remove(mesh);
        }
    }

    /// Share of known polygons that have a base mesh (footprint or marker).
    pub fn base_ratio(&self) -> f32 {
        if self.polygons.is_empty() {
            return 1.0;
        }
        self.bases.len() as f32 / self.polygons.len() as f32
    }

    /// Every mesh this component tracks.
    pub fn all_meshes(&self) -> impl Iterator<Item = MeshId> + '_ {
        self.bases
            .values()
            .map(|b| b.mesh)
            .chain(self.overlays.values().copied())
            .chain(self.indicators.values().copied())
            .chain(self.placeholders.values().copied())
            .chain(self.background)
    }
}

fn remove_from(scene: &mut Scene, registry: &mut FxHashMap<EntityId, MeshId>, id: &EntityId) {
    if let Some(mesh) = registry.remove(id) {
        scene.remove(mesh);
    }
}
