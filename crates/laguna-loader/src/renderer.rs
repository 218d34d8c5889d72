//! One renderer for every entity kind.

use std::time::Instant;

use glam::Vec3;
use laguna_assets::ModelCache;
use laguna_coords::CoordinateTransform;
use laguna_recovery::RenderError;
use laguna_scene::{Color, Geometry, Layer, Material, Mesh, MeshId, MeshTag, Scene, SceneError, Transform};

use crate::entity::{Entity, EntityKind};

/// Per-kind placement rules.
struct KindProfile {
    scale: Vec3,
    /// Vertical offset above the ground.
    lift: f32,
    placeholder_size: Vec3,
}

impl KindProfile {
    fn of(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Building => Self {
                scale: Vec3::ONE,
                lift: 0.0,
                placeholder_size: Vec3::new(1.0, 1.5, 1.0),
            },
            EntityKind::Bridge => Self {
                scale: Vec3::ONE,
                lift: 0.1,
                placeholder_size: Vec3::new(2.0, 0.3, 1.0),
            },
            EntityKind::Dock => Self {
                scale: Vec3::ONE,
                lift: 0.0,
                placeholder_size: Vec3::new(1.5, 0.2, 1.0),
            },
            EntityKind::Citizen => Self {
                scale: Vec3::splat(0.3),
                lift: 0.15,
                placeholder_size: Vec3::new(0.3, 0.6, 0.3),
            },
        }
    }
}

/// Builds, updates and disposes entity meshes.
pub struct EntityRenderer {
    transform: CoordinateTransform,
}

impl EntityRenderer {
    pub fn new(transform: CoordinateTransform) -> Self {
        Self { transform }
    }

    pub fn transform(&self) -> &CoordinateTransform {
        &self.transform
    }

    fn build(&self, models: &mut ModelCache, entity: &Entity, now: Instant) -> Result<Mesh, RenderError> {
        let position = self.transform.try_to_scene(entity.position)?;
        let profile = KindProfile::of(entity.kind);
        let resolution = models.resolve(entity.asset_type(), entity.variant.as_deref(), now);
        let model = resolution.model;

        let transform = Transform::from_translation(position + Vec3::Y * profile.lift)
            .with_rotation_y(entity.rotation)
            .with_scale(profile.scale);
        Ok(
            Mesh::new(model.geometry.clone(), model.material.clone(), Layer::Entity)
                .with_transform(transform)
                .with_tag(MeshTag {
                    entity: Some(entity.id.clone()),
                    is_base_land: false,
                    is_fallback: model.is_fallback_model,
                }),
        )
    }

    /// Full render at the entity's validated position.
    pub fn render(
        &self,
        scene: &mut Scene,
        models: &mut ModelCache,
        entity: &Entity,
        now: Instant,
    ) -> Result<MeshId, RenderError> {
        let mesh = self.build(models, entity, now)?;
        Ok(scene.insert(mesh)?)
    }

    /// Rebuild an existing mesh in place from fresh entity data.
    pub fn update(
        &self,
        scene: &mut Scene,
        mesh_id: MeshId,
        models: &mut ModelCache,
        entity: &Entity,
        now: Instant,
    ) -> Result<(), RenderError> {
        let fresh = self.build(models, entity, now)?;
        fresh.geometry.validate()?;
        if !fresh.transform.is_finite() {
            return Err(SceneError::InvalidTransform.into());
        }
        let mesh = scene.try_get_mut(mesh_id)?;
        mesh.geometry = fresh.geometry;
        mesh.material = fresh.material;
        mesh.transform = fresh.transform;
        mesh.tag = fresh.tag;
        mesh.highlight_origin = None;
        Ok(())
    }

    pub fn dispose(&self, scene: &mut Scene, mesh: MeshId) -> bool {
        scene.remove(mesh).is_some()
    }

    /// Cheap stand-in box. Invalid positions land on the scene center.
    pub fn render_placeholder(&self, scene: &mut Scene, entity: &Entity) -> Result<MeshId, RenderError> {
        let profile = KindProfile::of(entity.kind);
        let position = self.transform.to_scene(entity.position);
        let lift = Vec3::Y * profile.placeholder_size.y * 0.5;
        let mesh = Mesh::new(
            Geometry::cuboid(profile.placeholder_size)?,
            Material::solid(Color::MAGENTA),
            Layer::Entity,
        )
        .with_transform(Transform::from_translation(position + lift).with_rotation_y(entity.rotation))
        .with_tag(MeshTag {
            entity: Some(entity.id.clone()),
            is_base_land: false,
            is_fallback: true,
        });
        Ok(scene.insert(mesh)?)
    }
}
