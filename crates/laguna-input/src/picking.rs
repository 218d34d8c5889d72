//! Ray casting against registered meshes.

use std::ops::{Deref, DerefMut};

use glam::Vec3;
use laguna_scene::{EntityId, MeshId, MeshRegistry, Scene};

/// A half-line in scene space. `direction` is unit length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.try_normalize().unwrap_or(Vec3::NEG_Y),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Shortest distance from the ray to `point`.
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        let t = (point - self.origin).dot(self.direction).max(0.0);
        self.at(t).distance(point)
    }

    /// Nearest non-negative ray parameter inside the sphere, if any.
    pub fn intersect_sphere(&self, center: Vec3, radius: f32) -> Option<f32> {
        let to_center = center - self.origin;
        let along = to_center.dot(self.direction);
        let offset_sq = to_center.length_squared() - along * along;
        let radius_sq = radius * radius;
        if offset_sq > radius_sq {
            return None;
        }
        let half_chord = (radius_sq - offset_sq).sqrt();
        let near = along - half_chord;
        let far = along + half_chord;
        if far < 0.0 {
            None
        } else {
            Some(near.max(0.0))
        }
    }
}

/// A picked entity.
#[derive(Clone, Debug, PartialEq)]
pub struct Hit {
    pub entity: EntityId,
    pub mesh: MeshId,
    /// Entry point on the widened bounding sphere.
    pub point: Vec3,
    /// Distance along the ray.
    pub distance: f32,
}

/// Bounding-sphere picker with a tolerance added to every radius.
#[derive(Clone, Debug, PartialEq)]
pub struct Picker {
    tolerance: f32,
}

impl Picker {
    pub fn new(tolerance: f32) -> Self {
        Self {
            tolerance: tolerance.max(0.0),
        }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// Multiply the tolerance until the returned guard is dropped.
    pub fn widen(&mut self, factor: f32) -> ToleranceGuard<'_> {
        let original = self.tolerance;
        self.tolerance = original * factor.max(1.0);
        ToleranceGuard {
            picker: self,
            original,
        }
    }

    /// Nearest visible mesh hit by `ray` across `registries`.
    pub fn pick(&self, ray: &Ray, scene: &Scene, registries: &[&dyn MeshRegistry]) -> Option<Hit> {
        let mut best: Option<Hit> = None;
        for registry in registries {
            registry.for_each_mesh(&mut |entity, mesh_id| {
                let Some(mesh) = scene.get(mesh_id) else {
                    return;
                };
                if !mesh.visible {
                    return;
                }
                let Some((center, radius)) = mesh.world_sphere() else {
                    return;
                };
                let Some(t) = ray.intersect_sphere(center, radius + self.tolerance) else {
                    return;
                };
                if best.as_ref().is_none_or(|b| t < b.distance) {
                    best = Some(Hit {
                        entity: entity.clone(),
                        mesh: mesh_id,
                        point: ray.at(t),
                        distance: t,
                    });
                }
            });
        }
        best
    }

    /// Pick at the current tolerance, then once more widened by
    /// `multiplier` if nothing was hit. The tolerance is restored either way.
    pub fn pick_two_pass(
        &mut self,
        ray: &Ray,
        scene: &Scene,
        registries: &[&dyn MeshRegistry],
        multiplier: f32,
    ) -> Option<Hit> {
        if let Some(hit) = self.pick(ray, scene, registries) {
            return Some(hit);
        }
        let widened = self.widen(multiplier);
        let hit = widened.pick(ray, scene, registries);
        if let Some(hit) = &hit {
            tracing::trace!(entity = %hit.entity, tolerance = widened.tolerance(), "Picked on widened pass");
        }
        hit
    }
}

impl Default for Picker {
    fn default() -> Self {
        Self::new(0.25)
    }
}

/// Restores a [`Picker`]'s tolerance on drop, including during unwinding.
pub struct ToleranceGuard<'a> {
    picker: &'a mut Picker,
    original: f32,
}

impl Deref for ToleranceGuard<'_> {
    type Target = Picker;

    fn deref(&self) -> &Picker {
        self.picker
    }
}

impl DerefMut for ToleranceGuard<'_> {
    fn deref_mut(&mut self) -> &mut Picker {
        self.picker
    }
}

impl Drop for ToleranceGuard<'_> {
    fn drop(&mut self) {
        self.picker.tolerance = self.original;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laguna_scene::{Color, Geometry, Layer, Material, Mesh, Transform};
    use std::collections::BTreeMap;

    struct Registry(BTreeMap<EntityId, MeshId>);

    impl MeshRegistry for Registry {
        fn for_each_mesh(&self, f: &mut dyn FnMut(&EntityId, MeshId)) {
            for (id, mesh) in &self.0 {
                f(id, *mesh);
            }
        }

        fn mesh_for(&self, id: &EntityId) -> Option<MeshId> {
            self.0.get(id).copied()
        }
    }

    fn cube_at(scene: &mut Scene, position: Vec3) -> MeshId {
        let mesh = Mesh::new(
            Geometry::cuboid(Vec3::ONE).unwrap(),
            Material::solid(Color::GRAY),
            Layer::Entity,
        )
        .with_transform(Transform::from_translation(position));
        scene.insert(mesh).unwrap()
    }

    fn down_ray(x: f32, z: f32) -> Ray {
        Ray::new(Vec3::new(x, 50.0, z), Vec3::NEG_Y)
    }

    #[test]
    fn test_sphere_intersection() {
        let ray = down_ray(0.0, 0.0);
        let t = ray.intersect_sphere(Vec3::ZERO, 1.0).unwrap();
        assert!((t - 49.0).abs() < 1e-4);
        assert!(ray.intersect_sphere(Vec3::new(3.0, 0.0, 0.0), 1.0).is_none());
        assert!(ray.intersect_sphere(Vec3::new(0.0, 60.0, 0.0), 1.0).is_none(), "behind origin");
    }

    #[test]
    fn test_pick_nearest_visible() {
        let mut scene = Scene::new();
        let low = cube_at(&mut scene, Vec3::ZERO);
        let high = cube_at(&mut scene, Vec3::new(0.0, 10.0, 0.0));
        let registry = Registry(BTreeMap::from([
            (EntityId::new("low"), low),
            (EntityId::new("high"), high),
        ]));
        let picker = Picker::default();

        let hit = picker.pick(&down_ray(0.0, 0.0), &scene, &[&registry]).unwrap();
        assert_eq!(hit.entity, EntityId::new("high"));

        scene.get_mut(high).unwrap().visible = false;
        let hit = picker.pick(&down_ray(0.0, 0.0), &scene, &[&registry]).unwrap();
        assert_eq!(hit.entity, EntityId::new("low"));
    }

    #[test]
    fn test_second_pass_widens_and_restores() {
        let mut scene = Scene::new();
        let mesh = cube_at(&mut scene, Vec3::ZERO);
        let registry = Registry(BTreeMap::from([(EntityId::new("a"), mesh)]));
        let mut picker = Picker::new(0.25);

        // Cube sphere radius is ~0.87; 1.5 away misses at 0.25 but hits at 1.0.
        let ray = down_ray(1.5, 0.0);
        assert!(picker.pick(&ray, &scene, &[&registry]).is_none());
        let hit = picker.pick_two_pass(&ray, &scene, &[&registry], 4.0);
        assert_eq!(hit.map(|h| h.entity), Some(EntityId::new("a")));
        assert_eq!(picker.tolerance(), 0.25);
    }

    #[test]
    fn test_guard_restores_on_panic() {
        let mut picker = Picker::new(0.5);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let guard = picker.widen(4.0);
            assert_eq!(guard.tolerance(), 2.0);
            panic!("handler blew up");
        }));
        assert!(result.is_err());
        assert_eq!(picker.tolerance(), 0.5);
    }
}
