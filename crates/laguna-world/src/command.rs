use laguna_scene::EntityId;

use crate::polygon::OwnerTable;
use crate::view::ViewMode;

/// Inbound notification for [`LayeredSceneManager::apply`](crate::LayeredSceneManager::apply).
#[derive(Clone, Debug, PartialEq)]
pub enum WorldCommand {
    ViewModeChanged(ViewMode),
    SelectionChanged(Option<EntityId>),
    HoverChanged(Option<EntityId>),
    OwnershipChanged { id: EntityId, owner: Option<String> },
    /// New simulated income per parcel. Parcels not listed keep their value.
    IncomeDataChanged(Vec<(EntityId, f64)>),
    OwnerStylesChanged(OwnerTable),
}
