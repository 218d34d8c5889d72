//! Pointer interaction for the rendered scene.
//!
//! [`InteractionDispatcher`] turns raw pointer events into throttled hover
//! and click notifications, classifies drags, hit-tests through read-only
//! [`MeshRegistry`](laguna_scene::MeshRegistry) views, and disables itself for
//! a cooldown when its handler keeps failing. [`screen_positions`] gives UI
//! overlays an id to screen-position lookup.

mod camera;
mod dispatcher;
mod picking;
mod screen;

pub use camera::{Camera, Projection};
pub use dispatcher::{
    DispatcherConfig, DispatcherStats, HandlerError, InteractionDispatcher, InteractionHandler,
    InteractionOutcome, PickContext, PointerEvent,
};
pub use picking::{Hit, Picker, Ray, ToleranceGuard};
pub use screen::screen_positions;
