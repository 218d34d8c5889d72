//! Mesh, material and placement types.

use glam::{Mat4, Quat, Vec3};

use crate::color::Color;
use crate::geometry::{Aabb, Geometry};
use crate::id::EntityId;

/// Which registry a mesh belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Permanent parcel footprint.
    Base,
    /// View-mode coloring above the footprint.
    Overlay,
    /// Small per-owner marker.
    Indicator,
    /// Loaded entity such as a building.
    Entity,
    /// Stand-in drawn while the scene is in fallback-map mode.
    Placeholder,
    /// Single background plane of the fallback map.
    Background,
}

/// Untextured-by-default surface description.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub color: Color,
    pub opacity: f32,
    /// Asset reference of an optional texture.
    pub texture: Option<String>,
    /// Set whenever the renderer should re-upload this material.
    pub needs_update: bool,
}

impl Material {
    pub fn solid(color: Color) -> Self {
        Self {
            color,
            opacity: 1.0,
            texture: None,
            needs_update: true,
        }
    }

    pub fn translucent(color: Color, opacity: f32) -> Self {
        Self {
            opacity: opacity.clamp(0.0, 1.0),
            ..Self::solid(color)
        }
    }

    /// Drop texture references.
    pub fn flattened(mut self) -> Self {
        self.texture = None;
        self.needs_update = true;
        self
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
        self.needs_update = true;
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::solid(Color::WHITE)
    }
}

/// Placement of a mesh in scene space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn with_rotation_y(mut self, radians: f32) -> Self {
        self.rotation = Quat::from_rotation_y(radians);
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn is_finite(&self) -> bool {
        self.translation.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Bookkeeping attached to a mesh by whoever created it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshTag {
    pub entity: Option<EntityId>,
    /// `false` when a parcel is shown as a centroid marker instead of its footprint.
    pub is_base_land: bool,
    /// Built from a placeholder rather than real data.
    pub is_fallback: bool,
}

/// A drawable object.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: Material,
    pub transform: Transform,
    pub visible: bool,
    pub layer: Layer,
    pub tag: MeshTag,
    /// Color before the first highlight, restored when the highlight ends.
    pub highlight_origin: Option<Color>,
}

impl Mesh {
    pub fn new(geometry: Geometry, material: Material, layer: Layer) -> Self {
        Self {
            geometry,
            material,
            transform: Transform::IDENTITY,
            visible: true,
            layer,
            tag: MeshTag::default(),
            highlight_origin: None,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_tag(mut self, tag: MeshTag) -> Self {
        self.tag = tag;
        self
    }

    /// Apply a highlight color, remembering the original the first time.
    pub fn highlight(&mut self, color: Color) {
        if self.highlight_origin.is_none() {
            self.highlight_origin = Some(self.material.color);
        }
        self.material.set_color(color);
    }

    /// Restore the pre-highlight color, if any highlight is active.
    pub fn clear_highlight(&mut self) {
        if let Some(original) = self.highlight_origin.take() {
            self.material.set_color(original);
        }
    }

    /// Scene-space bounds, ignoring rotation but covering it via the
    /// bounding sphere in [`world_sphere`](Self::world_sphere).
    pub fn world_bounds(&self) -> Option<Aabb> {
        let local = self.geometry.bounds()?;
        let m = self.transform.matrix();
        let a = m.transform_point3(local.min);
        let b = m.transform_point3(local.max);
        Some(Aabb {
            min: a.min(b),
            max: a.max(b),
        })
    }

    /// Bounding sphere `(center, radius)` in scene space.
    pub fn world_sphere(&self) -> Option<(Vec3, f32)> {
        let local = self.geometry.bounds()?;
        let center = self.transform.matrix().transform_point3(local.center());
        let radius = local.radius() * self.transform.scale.abs().max_element();
        Some((center, radius))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh() -> Mesh {
        Mesh::new(
            Geometry::cuboid(Vec3::ONE).unwrap(),
            Material::solid(Color::GRAY),
            Layer::Base,
        )
    }

    #[test]
    fn test_highlight_remembers_first_color() {
        let mut m = mesh();
        m.highlight(Color::WHITE);
        m.highlight(Color::MAGENTA);
        assert_eq!(m.material.color, Color::MAGENTA);
        assert_eq!(m.highlight_origin, Some(Color::GRAY));

        m.clear_highlight();
        assert_eq!(m.material.color, Color::GRAY);
        assert_eq!(m.highlight_origin, None);
    }

    #[test]
    fn test_clear_without_highlight_is_noop() {
        let mut m = mesh();
        m.material.needs_update = false;
        m.clear_highlight();
        assert_eq!(m.material.color, Color::GRAY);
        assert!(!m.material.needs_update);
    }

    #[test]
    fn test_world_sphere_follows_transform() {
        let m = mesh().with_transform(
            Transform::from_translation(Vec3::new(10.0, 0.0, 0.0)).with_scale(Vec3::splat(2.0)),
        );
        let (center, radius) = m.world_sphere().unwrap();
        assert!((center - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-5);
        assert!((radius - 3.0f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_flattened_material_has_no_texture() {
        let mut mat = Material::solid(Color::WHITE);
        mat.texture = Some("roof.png".into());
        assert_eq!(mat.flattened().texture, None);
    }
}
