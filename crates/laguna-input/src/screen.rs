use std::collections::BTreeMap;

use glam::Vec2;
use laguna_scene::{EntityId, MeshRegistry, Scene};

use crate::camera::Camera;

/// Screen position of every visible, on-screen mesh in `registry`, keyed by
/// entity. Used by overlay UI such as tooltips and connector lines.
pub fn screen_positions(camera: &Camera, scene: &Scene, registry: &dyn MeshRegistry) -> BTreeMap<EntityId, Vec2> {
    let mut positions = BTreeMap::new();
    registry.for_each_mesh(&mut |id, mesh_id| {
        let Some(mesh) = scene.get(mesh_id).filter(|m| m.visible) else {
            return;
        };
        let anchor = mesh
            .world_sphere()
            .map_or(mesh.transform.translation, |(center, _)| center);
        if let Some(pos) = camera.world_to_screen(anchor) {
            positions.insert(id.clone(), pos);
        }
    });
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use laguna_scene::{Color, Geometry, Layer, Material, Mesh, MeshId, Transform};

    struct Registry(Vec<(EntityId, MeshId)>);

    impl MeshRegistry for Registry {
        fn for_each_mesh(&self, f: &mut dyn FnMut(&EntityId, MeshId)) {
            for (id, mesh) in &self.0 {
                f(id, *mesh);
            }
        }

        fn mesh_for(&self, id: &EntityId) -> Option<MeshId> {
            self.0.iter().find(|(e, _)| e == id).map(|(_, m)| *m)
        }
    }

    #[test]
    fn test_lookup_skips_hidden_and_offscreen() {
        let mut scene = Scene::new();
        let cube = |scene: &mut Scene, at: Vec3| {
            scene
                .insert(
                    Mesh::new(
                        Geometry::cuboid(Vec3::ONE).unwrap(),
                        Material::solid(Color::GRAY),
                        Layer::Entity,
                    )
                    .with_transform(Transform::from_translation(at)),
                )
                .unwrap()
        };
        let center = cube(&mut scene, Vec3::ZERO);
        let hidden = cube(&mut scene, Vec3::new(2.0, 0.0, 0.0));
        let above = cube(&mut scene, Vec3::new(0.0, 80.0, 0.0));
        scene.get_mut(hidden).unwrap().visible = false;

        let registry = Registry(vec![
            (EntityId::new("center"), center),
            (EntityId::new("hidden"), hidden),
            (EntityId::new("above"), above),
        ]);
        let camera = Camera::looking_at(Vec3::new(0.0, 50.0, 0.0), Vec3::ZERO);
        let positions = screen_positions(&camera, &scene, &registry);

        assert_eq!(positions.len(), 1);
        let pos = positions[&EntityId::new("center")];
        assert!((pos - Vec2::new(640.0, 360.0)).length() < 1e-2);
    }
}
