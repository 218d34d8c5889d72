//! Triangle geometry and the primitive constructors used by the renderers.

use glam::{Vec2, Vec3};
use rustc_hash::FxHashMap;

/// Errors raised while building or validating geometry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// A polygon needs at least three distinct vertices.
    #[error("polygon has {0} usable vertices, need at least 3")]
    TooFewVertices(usize),

    #[error("geometry contains non-finite values")]
    NonFinite,

    #[error("polygon has zero area")]
    Degenerate,

    /// Ear clipping could not find an ear, usually a self-intersecting ring.
    #[error("triangulation failed after {0} triangles")]
    TriangulationFailed(usize),

    #[error("index {index} out of range for {vertices} vertices")]
    IndexOutOfRange { index: u32, vertices: usize },

    #[error("index count {0} is not a multiple of 3")]
    RaggedIndices(usize),

    #[error("invalid primitive parameter: {0}")]
    InvalidParameter(&'static str),
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Radius of the bounding sphere around [`center`](Self::center).
    pub fn radius(&self) -> f32 {
        self.size().length() * 0.5
    }
}

/// Indexed triangle list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self { positions, indices }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Check for non-finite positions and broken index buffers.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.positions.iter().any(|p| !p.is_finite()) {
            return Err(GeometryError::NonFinite);
        }
        if self.indices.len() % 3 != 0 {
            return Err(GeometryError::RaggedIndices(self.indices.len()));
        }
        if let Some(&index) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.positions.len())
        {
            return Err(GeometryError::IndexOutOfRange {
                index,
                vertices: self.positions.len(),
            });
        }
        Ok(())
    }

    pub fn bounds(&self) -> Option<Aabb> {
        let first = *self.positions.first()?;
        let (min, max) = self
            .positions
            .iter()
            .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Some(Aabb { min, max })
    }

    /// Flat polygon in the XZ plane at `height`, triangulated by ear clipping.
    ///
    /// `ring` holds `(x, z)` pairs without a repeated closing vertex.
    pub fn polygon(ring: &[Vec2], height: f32) -> Result<Self, GeometryError> {
        let mut points: Vec<Vec2> = Vec::with_capacity(ring.len());
        for &p in ring {
            if !p.is_finite() {
                return Err(GeometryError::NonFinite);
            }
            if points.last().is_none_or(|last: &Vec2| last.distance_squared(p) > f32::EPSILON) {
                points.push(p);
            }
        }
        if points.len() > 1 && points[0].distance_squared(points[points.len() - 1]) <= f32::EPSILON
        {
            points.pop();
        }
        if points.len() < 3 {
            return Err(GeometryError::TooFewVertices(points.len()));
        }

        let area = signed_area(&points);
        if area.abs() <= f32::EPSILON {
            return Err(GeometryError::Degenerate);
        }

        let indices = ear_clip(&points, area > 0.0)?;
        let positions = points
            .iter()
            .map(|p| Vec3::new(p.x, height, p.y))
            .collect();
        Ok(Self { positions, indices })
    }

    /// Flat disc facing +Y, used for point markers.
    pub fn disc(center: Vec3, radius: f32, segments: u32) -> Result<Self, GeometryError> {
        if !center.is_finite() {
            return Err(GeometryError::NonFinite);
        }
        if !(radius.is_finite() && radius > 0.0) {
            return Err(GeometryError::InvalidParameter("disc radius must be positive"));
        }
        let segments = segments.max(3);
        let mut positions = Vec::with_capacity(segments as usize + 1);
        positions.push(center);
        for i in 0..segments {
            let t = i as f32 / segments as f32 * std::f32::consts::TAU;
            positions.push(center + Vec3::new(t.cos() * radius, 0.0, t.sin() * radius));
        }
        let mut indices = Vec::with_capacity(segments as usize * 3);
        for i in 0..segments {
            let next = (i + 1) % segments;
            indices.extend_from_slice(&[0, next + 1, i + 1]);
        }
        Ok(Self { positions, indices })
    }

    /// Box centered on the origin.
    pub fn cuboid(size: Vec3) -> Result<Self, GeometryError> {
        if !size.is_finite() || size.min_element() <= 0.0 {
            return Err(GeometryError::InvalidParameter("cuboid size must be positive"));
        }
        Ok(Self::box_between(size * -0.5, size * 0.5))
    }

    /// Ground plane centered on the origin at `height`.
    pub fn plane(width: f32, depth: f32, height: f32) -> Result<Self, GeometryError> {
        if !(width.is_finite() && depth.is_finite() && width > 0.0 && depth > 0.0) {
            return Err(GeometryError::InvalidParameter("plane extent must be positive"));
        }
        let (hw, hd) = (width * 0.5, depth * 0.5);
        Ok(Self {
            positions: vec![
                Vec3::new(-hw, height, -hd),
                Vec3::new(hw, height, -hd),
                Vec3::new(hw, height, hd),
                Vec3::new(-hw, height, hd),
            ],
            indices: vec![0, 2, 1, 0, 3, 2],
        })
    }

    /// Replace this geometry with its bounding box.
    pub fn bounding_box(&self) -> Option<Self> {
        let bounds = self.bounds()?;
        Some(Self::box_between(bounds.min, bounds.max))
    }

    fn box_between(min: Vec3, max: Vec3) -> Self {
        let positions = vec![
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(max.x, max.y, max.z),
            Vec3::new(min.x, max.y, max.z),
        ];
        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1, 0, 3, 2, // -z
            4, 5, 6, 4, 6, 7, // +z
            0, 1, 5, 0, 5, 4, // -y
            3, 6, 2, 3, 7, 6, // +y
            0, 4, 7, 0, 7, 3, // -x
            1, 2, 6, 1, 6, 5, // +x
        ];
        Self { positions, indices }
    }

    /// Weld vertices closer than `tolerance` and drop triangles that collapse.
    pub fn merge_vertices(&self, tolerance: f32) -> Self {
        let cell = if tolerance.is_finite() && tolerance > 0.0 {
            tolerance
        } else {
            f32::EPSILON
        };
        let mut lookup: FxHashMap<(i64, i64, i64), u32> = FxHashMap::default();
        let mut positions = Vec::new();
        let remap: Vec<u32> = self
            .positions
            .iter()
            .map(|p| {
                let key = (
                    (p.x / cell).round() as i64,
                    (p.y / cell).round() as i64,
                    (p.z / cell).round() as i64,
                );
                *lookup.entry(key).or_insert_with(|| {
                    positions.push(*p);
                    (positions.len() - 1) as u32
                })
            })
            .collect();

        let mut indices = Vec::with_capacity(self.indices.len());
        for tri in self.indices.chunks_exact(3) {
            let corner = |i: usize| remap.get(tri[i] as usize).copied();
            let (Some(a), Some(b), Some(c)) = (corner(0), corner(1), corner(2)) else {
                continue;
            };
            if a != b && b != c && a != c {
                indices.extend_from_slice(&[a, b, c]);
            }
        }
        Self { positions, indices }
    }
}

/// Shoelace area, positive for counter-clockwise rings.
fn signed_area(points: &[Vec2]) -> f32 {
    let n = points.len();
    (0..n)
        .map(|i| points[i].perp_dot(points[(i + 1) % n]))
        .sum::<f32>()
        * 0.5
}

fn ear_clip(points: &[Vec2], ccw: bool) -> Result<Vec<u32>, GeometryError> {
    let mut remaining: Vec<usize> = (0..points.len()).collect();
    if !ccw {
        remaining.reverse();
    }
    let mut indices = Vec::with_capacity((points.len() - 2) * 3);

    while remaining.len() > 3 {
        let n = remaining.len();
        let ear = (0..n).find(|&i| {
            let prev = points[remaining[(i + n - 1) % n]];
            let curr = points[remaining[i]];
            let next = points[remaining[(i + 1) % n]];
            if (curr - prev).perp_dot(next - curr) <= 0.0 {
                return false;
            }
            !remaining.iter().any(|&j| {
                let p = points[j];
                p != prev && p != curr && p != next && point_in_triangle(p, prev, curr, next)
            })
        });

        let Some(i) = ear else {
            return Err(GeometryError::TriangulationFailed(indices.len() / 3));
        };
        let prev = remaining[(i + n - 1) % n];
        let next = remaining[(i + 1) % n];
        indices.extend_from_slice(&[prev as u32, remaining[i] as u32, next as u32]);
        remaining.remove(i);
    }
    indices.extend(remaining.iter().map(|&i| i as u32));
    Ok(indices)
}

fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let d1 = (b - a).perp_dot(p - a);
    let d2 = (c - b).perp_dot(p - b);
    let d3 = (a - c).perp_dot(p - c);
    d1 >= 0.0 && d2 >= 0.0 && d3 >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Vec2> {
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ]
    }

    #[test]
    fn test_polygon_square_has_two_triangles() {
        let g = Geometry::polygon(&square(), 0.0).unwrap();
        assert_eq!(g.vertex_count(), 4);
        assert_eq!(g.triangle_count(), 2);
        g.validate().unwrap();
    }

    #[test]
    fn test_polygon_winding_independent() {
        let mut ring = square();
        ring.reverse();
        let g = Geometry::polygon(&ring, 2.0).unwrap();
        assert_eq!(g.triangle_count(), 2);
        assert!(g.positions.iter().all(|p| p.y == 2.0));
    }

    #[test]
    fn test_polygon_concave_l_shape() {
        let ring = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(2.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 2.0),
            Vec2::new(0.0, 2.0),
        ];
        let g = Geometry::polygon(&ring, 0.0).unwrap();
        assert_eq!(g.triangle_count(), 4);
    }

    #[test]
    fn test_polygon_drops_closing_duplicate() {
        let mut ring = square();
        ring.push(ring[0]);
        let g = Geometry::polygon(&ring, 0.0).unwrap();
        assert_eq!(g.vertex_count(), 4);
    }

    #[test]
    fn test_polygon_errors() {
        assert_eq!(
            Geometry::polygon(&[Vec2::ZERO, Vec2::X], 0.0),
            Err(GeometryError::TooFewVertices(2))
        );
        assert_eq!(
            Geometry::polygon(&[Vec2::ZERO, Vec2::X, Vec2::new(2.0, 0.0)], 0.0),
            Err(GeometryError::Degenerate)
        );
        assert_eq!(
            Geometry::polygon(&[Vec2::ZERO, Vec2::X, Vec2::new(f32::NAN, 1.0)], 0.0),
            Err(GeometryError::NonFinite)
        );
    }

    #[test]
    fn test_disc_marker() {
        let g = Geometry::disc(Vec3::new(1.0, 0.0, 1.0), 0.5, 12).unwrap();
        assert_eq!(g.vertex_count(), 13);
        assert_eq!(g.triangle_count(), 12);
        assert!(Geometry::disc(Vec3::ZERO, 0.0, 12).is_err());
        assert!(Geometry::disc(Vec3::splat(f32::NAN), 1.0, 12).is_err());
    }

    #[test]
    fn test_cuboid_bounds() {
        let g = Geometry::cuboid(Vec3::new(2.0, 4.0, 6.0)).unwrap();
        let b = g.bounds().unwrap();
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(b.max, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(g.triangle_count(), 12);
        g.validate().unwrap();
    }

    #[test]
    fn test_merge_vertices_welds_duplicates() {
        // Two triangles sharing an edge but with duplicated vertices.
        let g = Geometry::new(
            vec![
                Vec3::ZERO,
                Vec3::X,
                Vec3::Z,
                Vec3::X + Vec3::splat(0.001),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::Z,
            ],
            vec![0, 1, 2, 3, 4, 5],
        );
        let merged = g.merge_vertices(0.01);
        assert_eq!(merged.vertex_count(), 4);
        assert_eq!(merged.triangle_count(), 2);
        merged.validate().unwrap();
    }

    #[test]
    fn test_merge_drops_collapsed_triangles() {
        let g = Geometry::new(
            vec![Vec3::ZERO, Vec3::splat(0.0001), Vec3::X],
            vec![0, 1, 2],
        );
        assert!(g.merge_vertices(0.01).is_empty());
    }

    #[test]
    fn test_merge_skips_out_of_range_triangles() {
        let g = Geometry::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Z],
            vec![0, 1, 2, 0, 1, 999_999],
        );
        let merged = g.merge_vertices(0.01);
        assert_eq!(merged.triangle_count(), 1);
        merged.validate().unwrap();
    }

    #[test]
    fn test_bounding_box_replacement() {
        let g = Geometry::disc(Vec3::ZERO, 2.0, 64).unwrap();
        let bb = g.bounding_box().unwrap();
        assert_eq!(bb.vertex_count(), 8);
        assert!(Geometry::default().bounding_box().is_none());
    }

    #[test]
    fn test_validate_catches_bad_indices() {
        let g = Geometry::new(vec![Vec3::ZERO], vec![0, 0, 5]);
        assert!(matches!(
            g.validate(),
            Err(GeometryError::IndexOutOfRange { index: 5, .. })
        ));
        let g = Geometry::new(vec![Vec3::ZERO], vec![0, 0]);
        assert_eq!(g.validate(), Err(GeometryError::RaggedIndices(2)));
    }
}
