//! Layered parcel rendering.
//!
//! [`LayeredSceneManager`] turns [`GeoPolygon`]s into three mesh layers:
//!
//! - **base**: the permanent footprint, created once per polygon and only
//!   removed on teardown. When the footprint cannot be built a small disc
//!   marker at the centroid takes its place.
//! - **overlay**: view-mode coloring (owner or income), rebuilt on every
//!   view-mode switch.
//! - **indicator**: small per-owner markers, rebuilt on ownership and view
//!   changes.
//!
//! When fewer than a configurable share of polygons end up with a base mesh
//! the manager switches to a coarse fallback map (one background plane plus a
//! placeholder per missing polygon) and leaves it again once recovery has
//! brought enough polygons back.

mod command;
mod layers;
mod manager;
mod polygon;
mod view;

pub use command::WorldCommand;
pub use manager::{BuildReport, LayeredSceneManager, PolygonState, SceneManagerConfig};
pub use polygon::{GeoPolygon, OwnerStyle, OwnerTable};
pub use view::{HOVER_COLOR, SELECTION_COLOR, ViewMode, income_color};
