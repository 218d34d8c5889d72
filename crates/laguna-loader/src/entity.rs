//! Entity records delivered by the data layer.

use std::collections::BTreeMap;

use laguna_coords::GeoPoint;
use laguna_scene::EntityId;
use serde::{Deserialize, Serialize};

/// Broad category of a renderable entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Building,
    Bridge,
    Dock,
    Citizen,
}

impl EntityKind {
    /// Lowercase name, used for logging and default model lookup.
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Building => "building",
            EntityKind::Bridge => "bridge",
            EntityKind::Dock => "dock",
            EntityKind::Citizen => "citizen",
        }
    }
}

/// One entity as seen by the renderer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Asset type, e.g. `"market-stall"`. Empty means the kind's default.
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub variant: Option<String>,
    pub position: GeoPoint,
    /// Yaw in radians.
    #[serde(default)]
    pub rotation: f32,
    #[serde(default)]
    pub owner: Option<String>,
}

impl Entity {
    pub fn new(id: impl Into<EntityId>, kind: EntityKind, position: GeoPoint) -> Self {
        Self {
            id: id.into(),
            kind,
            type_name: String::new(),
            variant: None,
            position,
            rotation: 0.0,
            owner: None,
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>, variant: Option<&str>) -> Self {
        self.type_name = type_name.into();
        self.variant = variant.map(str::to_string);
        self
    }

    /// Asset type to resolve, falling back to the kind name.
    pub fn asset_type(&self) -> &str {
        if self.type_name.is_empty() {
            self.kind.name()
        } else {
            &self.type_name
        }
    }
}

/// Detail record fetched on demand, e.g. for a tooltip or panel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDetails {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}
