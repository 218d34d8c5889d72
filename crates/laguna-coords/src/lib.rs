//! Geographic to scene-space coordinate transformation.
//!
//! The scene is a flat local tangent plane anchored at a configured center.
//! Longitude maps to +X (compressed by a latitude correction factor), latitude
//! maps to -Z, and height maps to +Y.
//!
//! Invalid input never propagates as an error out of [`CoordinateTransform::to_scene`]:
//! it is logged and replaced by the center position, which callers can detect
//! with [`CoordinateTransform::is_center_sentinel`].

mod geo;
mod transform;

pub use geo::{GeoPoint, MAX_LAT, MAX_LNG};
pub use transform::{CoordinateTransform, DEFAULT_MAX_RADIUS_DEG, SceneBounds, TransformError};
