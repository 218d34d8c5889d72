//! Mesh arena with generational handles.

use crate::geometry::GeometryError;
use crate::id::EntityId;
use crate::mesh::Mesh;

/// Errors from scene-graph operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SceneError {
    #[error("scene is full ({limit} meshes)")]
    CapacityExceeded { limit: usize },

    #[error("mesh rejected: {0}")]
    InvalidMesh(#[from] GeometryError),

    #[error("mesh transform is not finite")]
    InvalidTransform,

    #[error("stale or unknown mesh handle {0:?}")]
    StaleHandle(MeshId),
}

/// Handle to a mesh in a [`Scene`]. Handles of removed meshes never resolve
/// again, even after their slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId {
    index: u32,
    generation: u32,
}

struct Slot {
    generation: u32,
    mesh: Option<Mesh>,
}

/// Arena owning every mesh in the world.
#[derive(Default)]
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    capacity: Option<usize>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scene that refuses inserts past `limit` live meshes.
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            capacity: Some(limit),
            ..Self::default()
        }
    }

    pub fn set_capacity_limit(&mut self, limit: Option<usize>) {
        self.capacity = limit;
    }

    pub fn capacity_limit(&self) -> Option<usize> {
        self.capacity
    }

    /// Validate and insert a mesh.
    pub fn insert(&mut self, mesh: Mesh) -> Result<MeshId, SceneError> {
        if let Some(limit) = self.capacity
            && self.live >= limit
        {
            return Err(SceneError::CapacityExceeded { limit });
        }
        mesh.geometry.validate()?;
        if !mesh.transform.is_finite() {
            return Err(SceneError::InvalidTransform);
        }

        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.mesh = Some(mesh);
            return Ok(MeshId {
                index,
                generation: slot.generation,
            });
        }
        self.slots.push(Slot {
            generation: 0,
            mesh: Some(mesh),
        });
        Ok(MeshId {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
        })
    }

    /// Remove a mesh, returning it. `None` for stale handles.
    pub fn remove(&mut self, id: MeshId) -> Option<Mesh> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let mesh = slot.mesh.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(mesh)
    }

    pub fn get(&self, id: MeshId) -> Option<&Mesh> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.mesh.as_ref())
    }

    pub fn get_mut(&mut self, id: MeshId) -> Option<&mut Mesh> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.mesh.as_mut())
    }

    /// Mutable access that reports stale handles as an error.
    pub fn try_get_mut(&mut self, id: MeshId) -> Result<&mut Mesh, SceneError> {
        self.get_mut(id).ok_or(SceneError::StaleHandle(id))
    }

    pub fn contains(&self, id: MeshId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (MeshId, &Mesh)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.mesh.as_ref().map(|mesh| {
                (
                    MeshId {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    mesh,
                )
            })
        })
    }

    /// Remove every mesh. Outstanding handles become stale.
    pub fn clear(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.mesh.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(i as u32);
            }
        }
        self.live = 0;
    }
}

/// Read-only view of a component's `EntityId -> MeshId` registry.
///
/// Readers such as hit-testing and screen-position lookup go through this
/// trait and never mutate the owning component.
pub trait MeshRegistry {
    /// Visit every tracked `(entity, mesh)` pair.
    fn for_each_mesh(&self, f: &mut dyn FnMut(&EntityId, MeshId));

    /// The primary mesh for an entity, if tracked.
    fn mesh_for(&self, id: &EntityId) -> Option<MeshId>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::geometry::Geometry;
    use crate::mesh::{Layer, Material, Transform};
    use glam::Vec3;

    fn cube() -> Mesh {
        Mesh::new(
            Geometry::cuboid(Vec3::ONE).unwrap(),
            Material::solid(Color::GRAY),
            Layer::Entity,
        )
    }

    #[test]
    fn test_insert_get_remove() {
        let mut scene = Scene::new();
        let id = scene.insert(cube()).unwrap();
        assert!(scene.contains(id));
        assert_eq!(scene.len(), 1);

        assert!(scene.remove(id).is_some());
        assert!(!scene.contains(id));
        assert!(scene.remove(id).is_none());
        assert!(scene.is_empty());
    }

    #[test]
    fn test_reused_slot_invalidates_old_handle() {
        let mut scene = Scene::new();
        let a = scene.insert(cube()).unwrap();
        scene.remove(a);
        let b = scene.insert(cube()).unwrap();
        assert_ne!(a, b);
        assert!(scene.get(a).is_none());
        assert!(scene.get(b).is_some());
        assert!(matches!(
            scene.try_get_mut(a),
            Err(SceneError::StaleHandle(_))
        ));
    }

    #[test]
    fn test_capacity_limit() {
        let mut scene = Scene::with_capacity_limit(2);
        let a = scene.insert(cube()).unwrap();
        scene.insert(cube()).unwrap();
        assert_eq!(
            scene.insert(cube()),
            Err(SceneError::CapacityExceeded { limit: 2 })
        );
        scene.remove(a);
        assert!(scene.insert(cube()).is_ok());
    }

    #[test]
    fn test_rejects_invalid_mesh() {
        let mut scene = Scene::new();
        let mut bad = cube();
        bad.geometry.positions[0] = Vec3::NAN;
        assert!(matches!(
            scene.insert(bad),
            Err(SceneError::InvalidMesh(GeometryError::NonFinite))
        ));

        let bad = cube().with_transform(Transform::from_translation(Vec3::splat(f32::INFINITY)));
        assert_eq!(scene.insert(bad), Err(SceneError::InvalidTransform));
        assert!(scene.is_empty());
    }

    #[test]
    fn test_clear_stales_all_handles() {
        let mut scene = Scene::new();
        let ids: Vec<_> = (0..3).map(|_| scene.insert(cube()).unwrap()).collect();
        scene.clear();
        assert!(scene.is_empty());
        assert!(ids.iter().all(|id| !scene.contains(*id)));
        assert_eq!(scene.iter().count(), 0);
    }
}
