//! Parcel input data.

use laguna_coords::GeoPoint;
use laguna_scene::{Color, EntityId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A land parcel as delivered by the data layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPolygon {
    pub id: EntityId,
    /// Ring vertices. A repeated closing vertex is tolerated.
    pub vertices: Vec<GeoPoint>,
    #[serde(default)]
    pub centroid: Option<GeoPoint>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub simulated_income: Option<f64>,
}

impl GeoPolygon {
    pub fn new(id: impl Into<EntityId>, vertices: Vec<GeoPoint>) -> Self {
        Self {
            id: id.into(),
            vertices,
            centroid: None,
            owner: None,
            simulated_income: None,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_income(mut self, income: f64) -> Self {
        self.simulated_income = Some(income);
        self
    }

    pub fn with_centroid(mut self, centroid: GeoPoint) -> Self {
        self.centroid = Some(centroid);
        self
    }

    /// Supplied centroid, else the mean of the valid vertices.
    pub fn marker_point(&self) -> Option<GeoPoint> {
        if let Some(c) = self.centroid.filter(GeoPoint::is_valid) {
            return Some(c);
        }
        let valid: Vec<GeoPoint> = self
            .vertices
            .iter()
            .copied()
            .filter(GeoPoint::is_valid)
            .collect();
        GeoPoint::centroid(&valid)
    }
}

/// How an owner is drawn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OwnerStyle {
    pub color: Color,
    /// Asset reference of the owner's coat of arms, used on indicators.
    #[serde(default)]
    pub coat_of_arms: Option<String>,
}

/// Owner name to style lookup.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnerTable {
    styles: FxHashMap<String, OwnerStyle>,
}

impl OwnerTable {
    /// Color of parcels without an owner.
    pub const UNOWNED: Color = Color::rgb(0.55, 0.55, 0.5);
    /// Color of owners missing from the table.
    pub const UNKNOWN_OWNER: Color = Color::rgb(0.75, 0.7, 0.6);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, owner: impl Into<String>, style: OwnerStyle) {
        self.styles.insert(owner.into(), style);
    }

    pub fn get(&self, owner: &str) -> Option<&OwnerStyle> {
        self.styles.get(owner)
    }

    pub fn color_for(&self, owner: Option<&str>) -> Color {
        match owner {
            None => Self::UNOWNED,
            Some(name) => self
                .styles
                .get(name)
                .map(|s| s.color)
                .unwrap_or(Self::UNKNOWN_OWNER),
        }
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_point_prefers_centroid() {
        let p = GeoPolygon::new("p", vec![GeoPoint::new(45.0, 12.0)])
            .with_centroid(GeoPoint::new(45.5, 12.5));
        assert_eq!(p.marker_point(), Some(GeoPoint::new(45.5, 12.5)));
    }

    #[test]
    fn test_marker_point_skips_invalid_vertices() {
        let p = GeoPolygon::new(
            "p",
            vec![
                GeoPoint::new(45.0, 12.0),
                GeoPoint::new(f64::NAN, 12.0),
                GeoPoint::new(46.0, 13.0),
            ],
        );
        assert_eq!(p.marker_point(), Some(GeoPoint::new(45.5, 12.5)));

        let none = GeoPolygon::new("q", vec![GeoPoint::new(95.0, 0.0)]);
        assert_eq!(none.marker_point(), None);
    }

    #[test]
    fn test_owner_colors() {
        let mut table = OwnerTable::new();
        table.insert(
            "Contarini",
            OwnerStyle {
                color: Color::from_hex(0x8b0000),
                coat_of_arms: Some("arms/contarini.png".into()),
            },
        );
        assert_eq!(table.color_for(Some("Contarini")), Color::from_hex(0x8b0000));
        assert_eq!(table.color_for(Some("Nobody")), OwnerTable::UNKNOWN_OWNER);
        assert_eq!(table.color_for(None), OwnerTable::UNOWNED);
    }

    #[test]
    fn test_polygon_from_ron() {
        let src = r#"(
            id: "parcel-1",
            vertices: [(lat: 45.43, lng: 12.33), (lat: 45.44, lng: 12.33), (lat: 45.44, lng: 12.34)],
            owner: Some("Dandolo"),
        )"#;
        let p: GeoPolygon = ron::from_str(src).unwrap();
        assert_eq!(p.id.as_str(), "parcel-1");
        assert_eq!(p.vertices.len(), 3);
        assert_eq!(p.owner.as_deref(), Some("Dandolo"));
        assert_eq!(p.simulated_income, None);
    }
}
