//! Graphics-API agnostic scene graph used by the rendering core.
//!
//! [`Scene`] is an arena of [`Mesh`]es addressed by generational [`MeshId`]s.
//! Components that create meshes keep their own `EntityId -> MeshId`
//! registries and expose them read-only through [`MeshRegistry`]; all scene
//! mutation goes through the owning component.

mod color;
mod events;
mod geometry;
mod id;
mod mesh;
mod scene;

pub use color::Color;
pub use events::{EventBuffer, SceneEvent};
pub use geometry::{Aabb, Geometry, GeometryError};
pub use id::EntityId;
pub use mesh::{Layer, Material, Mesh, MeshTag, Transform};
pub use scene::{MeshId, MeshRegistry, Scene, SceneError};
