//! Incremental loading and rendering of large entity collections.
//!
//! [`AsyncEntityLoader`] fetches entities page by page from an
//! [`EntitySource`], rendering a small initial batch right away and the rest
//! in paced background steps. Every page is reconciled against what is
//! already on screen: new entities are created, changed ones updated in
//! place, and at the end of a session entities that vanished from the source
//! are disposed. Sessions carry a generation number so pages fetched for a
//! superseded session are ignored.

mod entity;
mod loader;
mod renderer;
mod source;

pub use entity::{Entity, EntityDetails, EntityKind};
pub use loader::{
    AsyncEntityLoader, FetchedPage, LoadCursor, LoadSession, LoadStatus, LoaderConfig,
    PageRequest, StepOutcome,
};
pub use renderer::EntityRenderer;
pub use source::{EntitySource, SourceError};
