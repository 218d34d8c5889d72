//! Projection between geographic coordinates and scene space.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Default validity radius around the center, in degrees (~50 km).
pub const DEFAULT_MAX_RADIUS_DEG: f64 = 0.5;

/// Errors produced by strict coordinate conversion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransformError {
    /// Non-finite or out-of-Earth-range coordinates.
    #[error("invalid coordinates ({lat}, {lng})")]
    InvalidCoordinates { lat: f64, lng: f64 },

    /// Valid coordinates too far from the configured center.
    #[error("({lat}, {lng}) is {distance:.3} deg from center, limit {limit} deg")]
    OutOfRange {
        lat: f64,
        lng: f64,
        distance: f64,
        limit: f64,
    },

    /// Scene-space position that cannot be mapped back.
    #[error("non-finite scene position {0:?}")]
    NonFinitePosition(Vec3),

    /// The projection parameters themselves are unusable.
    #[error("invalid scene bounds: {0}")]
    InvalidBounds(&'static str),
}

/// Immutable projection parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneBounds {
    pub center_lat: f64,
    pub center_lng: f64,
    /// Scene units per degree.
    pub scale: f64,
    /// Longitude compression, roughly `cos(center_lat)`.
    pub lat_correction_factor: f64,
}

impl SceneBounds {
    pub fn new(center_lat: f64, center_lng: f64, scale: f64, lat_correction_factor: f64) -> Self {
        Self {
            center_lat,
            center_lng,
            scale,
            lat_correction_factor,
        }
    }

    /// Check that the bounds define an invertible projection.
    pub fn validate(&self) -> Result<(), TransformError> {
        if !GeoPoint::new(self.center_lat, self.center_lng).is_valid() {
            return Err(TransformError::InvalidBounds("center is not a valid coordinate"));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(TransformError::InvalidBounds("scale must be positive"));
        }
        if !self.lat_correction_factor.is_finite() || self.lat_correction_factor <= 0.0 {
            return Err(TransformError::InvalidBounds(
                "lat_correction_factor must be positive",
            ));
        }
        Ok(())
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(self.center_lat, self.center_lng)
    }
}

impl Default for SceneBounds {
    fn default() -> Self {
        Self::new(45.4371, 12.3358, 1000.0, 0.7)
    }
}

/// Converts between [`GeoPoint`]s and scene-space [`Vec3`]s.
#[derive(Clone, Debug)]
pub struct CoordinateTransform {
    bounds: SceneBounds,
    max_radius_deg: f64,
    default_height: f32,
}

impl CoordinateTransform {
    /// Create a transform with the default validity radius.
    pub fn new(bounds: SceneBounds) -> Result<Self, TransformError> {
        Self::with_radius(bounds, DEFAULT_MAX_RADIUS_DEG)
    }

    /// Create a transform with a custom validity radius in degrees.
    pub fn with_radius(bounds: SceneBounds, max_radius_deg: f64) -> Result<Self, TransformError> {
        bounds.validate()?;
        if !max_radius_deg.is_finite() || max_radius_deg <= 0.0 {
            return Err(TransformError::InvalidBounds("max radius must be positive"));
        }
        Ok(Self {
            bounds,
            max_radius_deg,
            default_height: 0.0,
        })
    }

    /// Set the height used by [`to_scene`](Self::to_scene).
    pub fn with_default_height(mut self, height: f32) -> Self {
        self.default_height = height;
        self
    }

    pub fn bounds(&self) -> &SceneBounds {
        &self.bounds
    }

    pub fn max_radius_deg(&self) -> f64 {
        self.max_radius_deg
    }

    pub fn default_height(&self) -> f32 {
        self.default_height
    }

    /// Check a point against Earth range and the validity radius.
    pub fn validate(&self, point: GeoPoint) -> Result<(), TransformError> {
        if !point.is_valid() {
            return Err(TransformError::InvalidCoordinates {
                lat: point.lat,
                lng: point.lng,
            });
        }
        let distance = point.degree_distance(&self.bounds.center());
        if distance > self.max_radius_deg {
            return Err(TransformError::OutOfRange {
                lat: point.lat,
                lng: point.lng,
                distance,
                limit: self.max_radius_deg,
            });
        }
        Ok(())
    }

    /// Strict conversion at the default height.
    pub fn try_to_scene(&self, point: GeoPoint) -> Result<Vec3, TransformError> {
        self.try_to_scene_at(point, self.default_height)
    }

    /// Strict conversion at an explicit height.
    pub fn try_to_scene_at(&self, point: GeoPoint, height: f32) -> Result<Vec3, TransformError> {
        self.validate(point)?;
        let b = &self.bounds;
        let x = (point.lng - b.center_lng) * b.scale * b.lat_correction_factor;
        let z = -(point.lat - b.center_lat) * b.scale;
        Ok(Vec3::new(x as f32, height, z as f32))
    }

    /// Fail-soft conversion at the default height.
    ///
    /// Invalid or out-of-range input is logged and mapped to the center.
    pub fn to_scene(&self, point: GeoPoint) -> Vec3 {
        self.to_scene_at(point, self.default_height)
    }

    /// Fail-soft conversion at an explicit height.
    pub fn to_scene_at(&self, point: GeoPoint, height: f32) -> Vec3 {
        match self.try_to_scene_at(point, height) {
            Ok(position) => position,
            Err(error) => {
                tracing::warn!(%error, "coordinate rejected, using scene center");
                self.center_position(height)
            }
        }
    }

    /// Inverse projection. Height is discarded.
    pub fn try_to_geo(&self, position: Vec3) -> Result<GeoPoint, TransformError> {
        if !position.is_finite() {
            return Err(TransformError::NonFinitePosition(position));
        }
        let b = &self.bounds;
        let lng = b.center_lng + position.x as f64 / (b.scale * b.lat_correction_factor);
        let lat = b.center_lat - position.z as f64 / b.scale;
        Ok(GeoPoint::new(lat, lng))
    }

    /// Fail-soft inverse projection: non-finite positions map to the center.
    pub fn to_geo(&self, position: Vec3) -> GeoPoint {
        self.try_to_geo(position).unwrap_or_else(|error| {
            tracing::warn!(%error, "scene position rejected, using geographic center");
            self.bounds.center()
        })
    }

    /// The position returned for rejected input.
    pub fn center_position(&self, height: f32) -> Vec3 {
        Vec3::new(0.0, height, 0.0)
    }

    /// Whether a position sits exactly on the center in the ground plane.
    pub fn is_center_sentinel(&self, position: Vec3) -> bool {
        position.x == 0.0 && position.z == 0.0
    }
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self {
            bounds: SceneBounds::default(),
            max_radius_deg: DEFAULT_MAX_RADIUS_DEG,
            default_height: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn venice() -> CoordinateTransform {
        CoordinateTransform::new(SceneBounds::new(45.4371, 12.3358, 1000.0, 0.7)).unwrap()
    }

    #[test]
    fn test_center_maps_to_origin() {
        let t = venice();
        let p = t.to_scene(GeoPoint::new(45.4371, 12.3358));
        assert!(p.length() < 1e-4);
    }

    #[test]
    fn test_axes_orientation() {
        let t = venice();
        let east = t.to_scene(GeoPoint::new(45.4371, 12.3458));
        assert!((east.x - 7.0).abs() < 1e-3, "0.01 deg east * 1000 * 0.7 = 7");
        assert!(east.z.abs() < 1e-4);

        let north = t.to_scene(GeoPoint::new(45.4471, 12.3358));
        assert!((north.z + 10.0).abs() < 1e-3, "north is -Z");
    }

    #[test]
    fn test_round_trip_within_radius() {
        let t = venice();
        let samples = [
            (45.4371, 12.3358),
            (45.44, 12.34),
            (45.40, 12.30),
            (45.80, 12.60),
            (45.0, 12.1),
            (45.9, 12.3358),
        ];
        for (lat, lng) in samples {
            let back = t.to_geo(t.to_scene(GeoPoint::new(lat, lng)));
            assert!((back.lat - lat).abs() < 1e-5, "lat {lat} -> {}", back.lat);
            assert!((back.lng - lng).abs() < 1e-5, "lng {lng} -> {}", back.lng);
        }
    }

    #[test]
    fn test_out_of_earth_range_fails_soft_to_center() {
        let t = venice();
        let p = t.to_scene(GeoPoint::new(91.0, 0.0));
        assert_eq!(p, t.center_position(0.0));
        assert!(t.is_center_sentinel(p));
    }

    #[test]
    fn test_outside_radius_fails_soft_to_center() {
        let t = venice();
        let p = t.to_scene(GeoPoint::new(45.44, 70.0));
        assert_eq!(p, t.center_position(0.0));
    }

    #[test]
    fn test_non_finite_fails_soft() {
        let t = venice();
        assert!(t.is_center_sentinel(t.to_scene(GeoPoint::new(f64::NAN, 12.0))));
        assert!(t.is_center_sentinel(t.to_scene(GeoPoint::new(45.0, f64::INFINITY))));
    }

    #[test]
    fn test_strict_conversion_reports_reason() {
        let t = venice();
        assert!(matches!(
            t.try_to_scene(GeoPoint::new(91.0, 0.0)),
            Err(TransformError::InvalidCoordinates { .. })
        ));
        assert!(matches!(
            t.try_to_scene(GeoPoint::new(45.44, 70.0)),
            Err(TransformError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_fail_soft_keeps_requested_height() {
        let t = venice();
        let p = t.to_scene_at(GeoPoint::new(-100.0, 0.0), 3.5);
        assert_eq!(p, Vec3::new(0.0, 3.5, 0.0));
    }

    #[test]
    fn test_to_geo_non_finite_returns_center() {
        let t = venice();
        let g = t.to_geo(Vec3::new(f32::NAN, 0.0, 0.0));
        assert_eq!(g, t.bounds().center());
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        assert!(CoordinateTransform::new(SceneBounds::new(45.0, 12.0, 0.0, 0.7)).is_err());
        assert!(CoordinateTransform::new(SceneBounds::new(45.0, 12.0, 1000.0, -1.0)).is_err());
        assert!(CoordinateTransform::new(SceneBounds::new(95.0, 12.0, 1000.0, 0.7)).is_err());
        assert!(CoordinateTransform::with_radius(SceneBounds::default(), 0.0).is_err());
    }
}
